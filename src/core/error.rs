//! Error kinds of the valuation pipeline

use thiserror::Error;

/// Failures raised while turning feed data into valuations.
///
/// The two kinds are handled differently on purpose by their callers:
/// `SourceUnavailable` is swallowed by quote sources and turned into an empty
/// result, while `NormalizationFailed` reaches the poller and raises its error
/// flag.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    #[error("Quote source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Normalization failed: {0}")]
    NormalizationFailed(String),
}

impl From<reqwest::Error> for ValuationError {
    fn from(err: reqwest::Error) -> Self {
        ValuationError::SourceUnavailable(err.to_string())
    }
}
