use super::ui;
use crate::core::{Fund, InstrumentCode, StockPrice};
use crate::valuation::{MARKET_INDICES, ValuationService};
use anyhow::Result;
use comfy_table::{Cell, Table};
use std::collections::HashMap;
use std::io::Write;

/// Table of valuations, one row per fund.
pub fn valuation_table(funds: &[Fund]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Valuation"),
        ui::header_cell("Change"),
        ui::header_cell("Change (%)"),
        ui::header_cell("Time"),
    ]);

    for fund in funds {
        table.add_row(vec![
            Cell::new(fund.code.as_str()),
            Cell::new(&fund.name),
            ui::format_optional_cell(Some(fund.valuation), |v| format!("{v:.4}")),
            ui::signed_cell(fund.change, 4),
            ui::percent_cell(fund.change_percent),
            Cell::new(&fund.valuation_time),
        ]);
    }
    table
}

/// Writes valuations and names the codes the feed had nothing for.
pub fn write_valuations<W: Write>(
    out: &mut W,
    codes: &[InstrumentCode],
    funds: &[Fund],
) -> std::io::Result<()> {
    writeln!(out, "{}", valuation_table(funds))?;

    let missing: Vec<&str> = codes
        .iter()
        .filter(|code| !funds.iter().any(|f| &f.code == *code))
        .map(InstrumentCode::as_str)
        .collect();
    if !missing.is_empty() {
        writeln!(
            out,
            "{}",
            ui::style_text(
                &format!("No valuation available for: {}", missing.join(", ")),
                ui::StyleType::Subtle
            )
        )?;
    }
    Ok(())
}

pub async fn run<W: Write>(
    service: &ValuationService,
    codes: &[InstrumentCode],
    out: &mut W,
) -> Result<()> {
    let pb = ui::new_spinner("Fetching valuations...");
    let result = service.get_fund_valuation(codes).await;
    pb.finish_and_clear();

    let funds = result?;
    write_valuations(out, codes, &funds)?;
    Ok(())
}

/// Table of the headline indices in their usual order. `None` when the feed
/// returned none of them.
pub fn indices_table(indices: &HashMap<InstrumentCode, StockPrice>) -> Option<Table> {
    let ordered: Vec<&StockPrice> = MARKET_INDICES
        .iter()
        .filter_map(|code| indices.values().find(|quote| quote.code.as_str() == *code))
        .collect();
    if ordered.is_empty() {
        return None;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Index"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
        ui::header_cell("Change (%)"),
    ]);
    for quote in ordered {
        table.add_row(vec![
            Cell::new(quote.code.as_str()),
            Cell::new(&quote.name),
            ui::format_optional_cell(Some(quote.price), |p| format!("{p:.2}")),
            ui::signed_cell(quote.change, 2),
            ui::percent_cell(quote.percent),
        ]);
    }
    Some(table)
}

pub async fn run_indices<W: Write>(service: &ValuationService, out: &mut W) -> Result<()> {
    let pb = ui::new_spinner("Fetching market indices...");
    let indices = service.market_indices().await;
    pb.finish_and_clear();

    match indices_table(&indices) {
        Some(table) => {
            writeln!(
                out,
                "\n{}",
                ui::style_text("Market Indices", ui::StyleType::Title)
            )?;
            writeln!(out, "{table}")?;
        }
        None => writeln!(
            out,
            "{}",
            ui::style_text("Market indices are unavailable", ui::StyleType::Error)
        )?,
    }
    Ok(())
}
