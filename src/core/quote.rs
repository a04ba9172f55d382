//! Market quote abstractions and core types

use crate::core::code::InstrumentCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized market quote. `percent` is a fraction, so `0.005` means 0.5%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPrice {
    pub code: InstrumentCode,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub percent: f64,
}

/// Batched quote lookup.
///
/// Implementations never fail: codes that could not be quoted are absent from
/// the returned map, and a total failure yields an empty map.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quotes(&self, codes: &[InstrumentCode]) -> HashMap<InstrumentCode, StockPrice>;
}
