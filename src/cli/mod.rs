//! Terminal front end for the valuation pipeline

pub mod favorites;
pub mod holdings;
pub mod quote;
pub mod setup;
pub mod ui;
pub mod watch;
