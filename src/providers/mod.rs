pub mod sina;
pub mod simulated;

use crate::core::QuoteSource;
use crate::core::config::{AppConfig, QuoteMode};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Builds the quote source selected by the config.
pub fn quote_source_from_config(config: &AppConfig) -> Result<Arc<dyn QuoteSource>> {
    match config.mode {
        QuoteMode::Live => {
            let sina = &config.providers.sina;
            debug!("Using live quotes from {}", sina.base_url);
            Ok(Arc::new(sina::SinaQuoteSource::new(
                &sina.base_url,
                &sina.referer,
            )?))
        }
        QuoteMode::Simulated => {
            debug!("Using simulated quotes");
            Ok(Arc::new(simulated::SimulatedQuoteSource::new()))
        }
    }
}
