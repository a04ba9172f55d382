//! Core domain types and abstractions

pub mod code;
pub mod config;
pub mod error;
pub mod fund;
pub mod log;
pub mod portfolio;
pub mod quote;
pub mod storage;

// Re-export main types for cleaner imports
pub use code::{InstrumentCode, QuoteKind};
pub use error::ValuationError;
pub use fund::{Fund, Holding};
pub use quote::{QuoteSource, StockPrice};
pub use storage::{KeyValueCollection, Store};
