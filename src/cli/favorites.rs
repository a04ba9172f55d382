use super::{quote, ui};
use crate::core::InstrumentCode;
use crate::state::AppState;
use crate::valuation::ValuationService;
use anyhow::Result;

pub async fn list(state: &AppState, service: &ValuationService) -> Result<()> {
    if state.favorites().is_empty() {
        println!("No favorites yet. Add one with `fundwatch favorites add <code>`.");
        return Ok(());
    }
    println!("\n{}", ui::style_text("Favorites", ui::StyleType::Title));
    quote::run(service, state.favorites(), &mut std::io::stdout()).await
}

pub async fn add(state: &mut AppState, code: InstrumentCode) -> Result<()> {
    if state.add_favorite(code.clone()).await? {
        println!("Added {code} to favorites");
    } else {
        println!("{code} is already a favorite");
    }
    Ok(())
}

pub async fn remove(state: &mut AppState, code: &InstrumentCode) -> Result<()> {
    if state.remove_favorite(code).await? {
        println!("Removed {code} from favorites");
    } else {
        println!("{code} is not a favorite");
    }
    Ok(())
}
