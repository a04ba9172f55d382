use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

/// Red for gains, green for losses, as quoted on the mainland exchanges.
fn direction_color(value: f64) -> Color {
    if value >= 0.0 { Color::Red } else { Color::Green }
}

/// Formats a fractional change (`0.005`) as a signed percentage (`+0.50%`).
pub fn format_percent(fraction: f64) -> String {
    format!("{:+.2}%", fraction * 100.0)
}

/// Creates a cell for a fractional change with color coding.
pub fn percent_cell(fraction: f64) -> Cell {
    Cell::new(format_percent(fraction))
        .fg(direction_color(fraction))
        .set_alignment(CellAlignment::Right)
}

/// Creates a cell for a signed amount with color coding.
pub fn signed_cell(value: f64, decimals: usize) -> Cell {
    Cell::new(format!("{value:+.decimals$}"))
        .fg(direction_color(value))
        .set_alignment(CellAlignment::Right)
}

/// Like [`signed_cell`], "N/A" when missing.
pub fn optional_signed_cell(value: Option<f64>, decimals: usize) -> Cell {
    match value {
        Some(v) => signed_cell(v, decimals),
        None => format_optional_cell(None::<f64>, |v| v.to_string()),
    }
}

/// Creates a spinner shown while a request is in flight.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent_scales_fraction() {
        assert_eq!(format_percent(0.005), "+0.50%");
        assert_eq!(format_percent(-0.0125), "-1.25%");
        assert_eq!(format_percent(0.0), "+0.00%");
    }
}
