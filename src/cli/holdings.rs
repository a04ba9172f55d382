use super::ui;
use crate::core::portfolio::{self, HoldingView, PortfolioTotals};
use crate::core::{Holding, InstrumentCode};
use crate::state::AppState;
use crate::valuation::ValuationService;
use anyhow::{Result, anyhow};
use comfy_table::{Attribute, Cell, Table};

pub fn holdings_table(views: &[HoldingView], totals: &PortfolioTotals) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Shares"),
        ui::header_cell("Cost"),
        ui::header_cell("Valuation"),
        ui::header_cell("Value"),
        ui::header_cell("Daily Profit"),
        ui::header_cell("Holding Profit"),
    ]);

    for view in views {
        table.add_row(vec![
            Cell::new(view.holding.code.as_str()),
            Cell::new(view.name.as_deref().unwrap_or("-")),
            ui::format_optional_cell(Some(view.holding.amount), |a| format!("{a:.2}")),
            ui::format_optional_cell(Some(view.holding.total_cost), |c| format!("{c:.2}")),
            ui::format_optional_cell(view.valuation, |v| format!("{v:.4}")),
            ui::format_optional_cell(view.holding_value, |v| format!("{v:.2}")),
            ui::optional_signed_cell(view.daily_profit, 2),
            ui::optional_signed_cell(view.holding_profit, 2),
        ]);
    }

    table.add_row(vec![
        Cell::new(ui::style_text("Total", ui::StyleType::TotalLabel))
            .add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        ui::format_optional_cell(Some(totals.total_assets), |v| format!("{v:.2}"))
            .add_attribute(Attribute::Bold),
        ui::signed_cell(totals.total_daily_profit, 2).add_attribute(Attribute::Bold),
        ui::signed_cell(totals.total_holding_profit, 2).add_attribute(Attribute::Bold),
    ]);
    table
}

pub async fn list(state: &AppState, service: &ValuationService) -> Result<()> {
    let holdings = state.holdings();
    if holdings.is_empty() {
        println!("No holdings yet. Add one with `fundwatch holdings add`.");
        return Ok(());
    }

    let codes: Vec<InstrumentCode> = holdings.iter().map(|h| h.code.clone()).collect();
    let pb = ui::new_spinner("Fetching valuations...");
    let result = service.get_fund_valuation(&codes).await;
    pb.finish_and_clear();
    let funds = result?;

    let views = portfolio::derive_views(holdings, &funds);
    let totals = PortfolioTotals::from_views(&views);

    println!("\n{}", ui::style_text("Holdings", ui::StyleType::Title));
    println!("{}", holdings_table(&views, &totals));
    if totals.missing > 0 {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "{} holding(s) without a valuation are left out of the totals",
                    totals.missing
                ),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}

pub async fn add(state: &mut AppState, holding: Holding) -> Result<()> {
    let code = holding.code.clone();
    state.add_holding(holding).await?;
    println!("Added holding {code}");
    Ok(())
}

pub async fn update(state: &mut AppState, holding: Holding) -> Result<()> {
    let code = holding.code.clone();
    if !state.update_holding(holding).await? {
        return Err(anyhow!("No holding for {code}"));
    }
    println!("Updated holding {code}");
    Ok(())
}

pub async fn remove(state: &mut AppState, code: &InstrumentCode) -> Result<()> {
    if state.remove_holding(code).await? {
        println!("Removed holding {code}");
    } else {
        println!("{code} is not held");
    }
    Ok(())
}
