//! Turns market quotes into fund valuations.

use crate::core::code::unique_codes;
use crate::core::{Fund, InstrumentCode, QuoteSource, StockPrice, ValuationError};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Headline indices: SSE Composite, SZSE Component, ChiNext.
pub const MARKET_INDICES: [&str; 3] = ["s_sh000001", "s_sz399001", "s_sz399006"];

const VALUATION_TIME_FORMAT: &str = "%H:%M:%S";

/// Anything that can produce valuations for a batch of codes.
#[async_trait]
pub trait ValuationSource: Send + Sync {
    async fn fetch_valuations(&self, codes: &[InstrumentCode]) -> Result<Vec<Fund>, ValuationError>;
}

pub struct ValuationService {
    source: Arc<dyn QuoteSource>,
}

impl ValuationService {
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        Self { source }
    }

    /// Valuations for `codes`, captured now. Codes the source could not quote
    /// are absent.
    #[instrument(name = "FundValuation", skip(self, codes), fields(count = codes.len()))]
    pub async fn get_fund_valuation(
        &self,
        codes: &[InstrumentCode],
    ) -> Result<Vec<Fund>, ValuationError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let prices = self.source.fetch_quotes(codes).await;
        normalize(codes, prices, Local::now())
    }

    pub async fn market_indices(&self) -> HashMap<InstrumentCode, StockPrice> {
        let codes: Vec<InstrumentCode> = MARKET_INDICES
            .iter()
            .filter_map(|code| code.parse().ok())
            .collect();
        self.source.fetch_quotes(&codes).await
    }
}

#[async_trait]
impl ValuationSource for ValuationService {
    async fn fetch_valuations(&self, codes: &[InstrumentCode]) -> Result<Vec<Fund>, ValuationError> {
        self.get_fund_valuation(codes).await
    }
}

/// Maps quotes to valuations in requested order.
///
/// Fails when a quote is filed under another code than its own or carries a
/// non-finite number; a single bad record fails the batch.
pub fn normalize(
    codes: &[InstrumentCode],
    mut prices: HashMap<InstrumentCode, StockPrice>,
    captured_at: DateTime<Local>,
) -> Result<Vec<Fund>, ValuationError> {
    for (key, price) in &prices {
        if key != &price.code {
            return Err(ValuationError::NormalizationFailed(format!(
                "quote for {} was returned under {}",
                price.code, key
            )));
        }
        if !(price.price.is_finite() && price.change.is_finite() && price.percent.is_finite()) {
            return Err(ValuationError::NormalizationFailed(format!(
                "non-finite quote for {}",
                price.code
            )));
        }
    }

    let valuation_time = captured_at.format(VALUATION_TIME_FORMAT).to_string();
    let funds: Vec<Fund> = unique_codes(codes)
        .iter()
        .filter_map(|code| prices.remove(code))
        .map(|price| Fund {
            code: price.code,
            name: price.name,
            fund_type: None,
            valuation: price.price,
            valuation_time: valuation_time.clone(),
            change: price.change,
            change_percent: price.percent,
        })
        .collect();

    if !prices.is_empty() {
        debug!("Dropped {} quotes for unrequested codes", prices.len());
    }
    Ok(funds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn code(c: &str) -> InstrumentCode {
        c.parse().unwrap()
    }

    fn price(c: &str, price: f64, change: f64, percent: f64) -> StockPrice {
        StockPrice {
            code: code(c),
            name: format!("Name {c}"),
            price,
            change,
            percent,
        }
    }

    /// Quote source answering with a fixed set of quotes.
    struct FixedQuoteSource {
        quotes: Vec<StockPrice>,
        calls: AtomicUsize,
    }

    impl FixedQuoteSource {
        fn new(quotes: Vec<StockPrice>) -> Self {
            Self {
                quotes,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for FixedQuoteSource {
        async fn fetch_quotes(
            &self,
            codes: &[InstrumentCode],
        ) -> HashMap<InstrumentCode, StockPrice> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.quotes
                .iter()
                .filter(|q| codes.contains(&q.code))
                .map(|q| (q.code.clone(), q.clone()))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_maps_quote_fields_to_valuation() {
        let source = Arc::new(FixedQuoteSource::new(vec![price(
            "s_sh000001",
            3000.0,
            15.0,
            0.005,
        )]));
        let service = ValuationService::new(source);

        let funds = service
            .get_fund_valuation(&[code("s_sh000001")])
            .await
            .unwrap();

        assert_eq!(funds.len(), 1);
        let fund = &funds[0];
        assert_eq!(fund.code, code("s_sh000001"));
        assert_eq!(fund.name, "Name s_sh000001");
        assert_eq!(fund.valuation, 3000.0);
        assert_eq!(fund.change, 15.0);
        assert_eq!(fund.change_percent, 0.005);
        assert!(fund.fund_type.is_none());
        assert_eq!(fund.valuation_time.len(), "HH:MM:SS".len());
    }

    #[tokio::test]
    async fn test_missing_codes_are_absent_and_order_follows_request() {
        let source = Arc::new(FixedQuoteSource::new(vec![
            price("sh600000", 10.6, 0.6, 0.06),
            price("sz000002", 8.0, -0.2, -0.0244),
        ]));
        let service = ValuationService::new(source);

        let funds = service
            .get_fund_valuation(&[code("sz000002"), code("sz399999"), code("sh600000")])
            .await
            .unwrap();

        let order: Vec<&str> = funds.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(order, vec!["sz000002", "sh600000"]);
    }

    #[tokio::test]
    async fn test_empty_codes_skip_the_source() {
        let source = Arc::new(FixedQuoteSource::new(vec![]));
        let service = ValuationService::new(source.clone());

        assert!(service.get_fund_valuation(&[]).await.unwrap().is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_market_indices_requests_headline_indices() {
        let source = Arc::new(FixedQuoteSource::new(vec![
            price("s_sh000001", 3000.0, 15.0, 0.005),
            price("s_sz399006", 2000.0, -10.0, -0.005),
            price("sh600000", 10.6, 0.6, 0.06),
        ]));
        let service = ValuationService::new(source);

        let indices = service.market_indices().await;
        assert_eq!(indices.len(), 2);
        assert!(indices.contains_key(&code("s_sh000001")));
        assert!(indices.contains_key(&code("s_sz399006")));
    }

    #[test]
    fn test_normalize_is_idempotent_apart_from_time() {
        let quotes: HashMap<_, _> = [price("sh600000", 10.6, 0.6, 0.06)]
            .into_iter()
            .map(|q| (q.code.clone(), q))
            .collect();
        let codes = [code("sh600000")];

        let morning = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let afternoon = Local.with_ymd_and_hms(2024, 3, 1, 14, 45, 5).unwrap();
        let first = normalize(&codes, quotes.clone(), morning).unwrap();
        let second = normalize(&codes, quotes, afternoon).unwrap();

        assert_eq!(first[0].valuation, second[0].valuation);
        assert_eq!(first[0].change, second[0].change);
        assert_eq!(first[0].change_percent, second[0].change_percent);
        assert_eq!(first[0].valuation_time, "09:30:00");
        assert_eq!(second[0].valuation_time, "14:45:05");
    }

    #[test]
    fn test_normalize_rejects_misfiled_quote() {
        let mut quotes = HashMap::new();
        quotes.insert(code("sh600000"), price("sh600036", 31.0, 2.0, 0.069));

        let result = normalize(&[code("sh600000")], quotes, Local::now());
        assert!(matches!(
            result,
            Err(ValuationError::NormalizationFailed(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_non_finite_values() {
        let mut quotes = HashMap::new();
        quotes.insert(code("sh600000"), price("sh600000", 10.0, f64::NAN, 0.0));

        let result = normalize(&[code("sh600000")], quotes, Local::now());
        assert!(matches!(
            result,
            Err(ValuationError::NormalizationFailed(_))
        ));
    }
}
