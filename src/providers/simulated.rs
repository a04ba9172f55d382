//! Offline quote source producing random quotes for any code.

use crate::core::code::{InstrumentCode, QuoteKind, unique_codes};
use crate::core::{QuoteSource, StockPrice};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Latency the simulated feed answers with.
pub const SIMULATED_LATENCY: Duration = Duration::from_millis(300);

const UP_PROBABILITY: f64 = 0.55;
const MAX_MOVE: f64 = 0.03;
const FLAGSHIP_INDEX_MARKER: &str = "000001";
const FLAGSHIP_INDEX_BASE: f64 = 3000.0;
const DEFAULT_BASE: f64 = 100.0;

pub struct SimulatedQuoteSource {
    latency: Duration,
}

impl SimulatedQuoteSource {
    pub fn new() -> Self {
        Self::with_latency(SIMULATED_LATENCY)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    /// A random move of up to 3% around a base price picked from the code.
    pub fn simulate(code: &InstrumentCode) -> StockPrice {
        let mut rng = rand::rng();
        let direction = if rng.random_bool(UP_PROBABILITY) {
            1.0
        } else {
            -1.0
        };
        let percent = rng.random_range(0.0..MAX_MOVE) * direction;
        let base = if code.as_str().contains(FLAGSHIP_INDEX_MARKER) {
            FLAGSHIP_INDEX_BASE
        } else {
            DEFAULT_BASE
        };
        let name = match code.kind() {
            QuoteKind::Index => "Simulated Index",
            QuoteKind::Equity => "Simulated Stock",
        };

        StockPrice {
            code: code.clone(),
            name: name.to_string(),
            price: base * (1.0 + percent),
            change: base * percent,
            percent,
        }
    }
}

impl Default for SimulatedQuoteSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for SimulatedQuoteSource {
    async fn fetch_quotes(&self, codes: &[InstrumentCode]) -> HashMap<InstrumentCode, StockPrice> {
        let codes = unique_codes(codes);
        if codes.is_empty() {
            return HashMap::new();
        }

        let results: HashMap<_, _> = codes
            .iter()
            .map(|code| (code.clone(), Self::simulate(code)))
            .collect();
        debug!("Simulated {} quotes", results.len());

        // Callers rely on the result arriving asynchronously
        tokio::time::sleep(self.latency).await;
        results
    }
}
