//! Quote source for the Sina `hq` feed.
//!
//! The feed answers a batched request with one JavaScript assignment per code:
//!
//! ```text
//! var hq_str_s_sh000001="SSE Composite,3094.668,-128.073,-3.97,436653,5458126";
//! var hq_str_sh600000="SPDB,10.50,10.40,10.60,10.70,10.38,...";
//! ```
//!
//! Index codes (`s_` prefix) carry `name, price, change, percent * 100`.
//! Equity codes carry `name, open, previous close, price, ...` and the change
//! has to be derived.

use crate::core::code::{InstrumentCode, QuoteKind, unique_codes};
use crate::core::{QuoteSource, StockPrice, ValuationError};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::REFERER;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, instrument, warn};

static FEED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"hq_str_([A-Za-z0-9_.]+)="([^"]*)";"#).expect("feed line pattern is valid")
});

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One matched feed line, before any field is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub code: String,
    pub name: String,
    /// Fields following the name, in feed order
    pub fields: Vec<String>,
}

/// Numeric fields of a feed line, by layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuoteFields {
    Index {
        price: f64,
        change: f64,
        /// Percent change as published, `-3.97` means -3.97%
        percent_scaled: f64,
    },
    Equity {
        prev_close: f64,
        price: f64,
    },
}

impl QuoteFields {
    /// Reads the fields for `kind`. `None` when fields are missing or not numeric.
    pub fn parse(kind: QuoteKind, fields: &[String]) -> Option<Self> {
        let number = |index: usize| -> Option<f64> {
            fields
                .get(index)
                .and_then(|field| field.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
        };

        match kind {
            QuoteKind::Index => Some(QuoteFields::Index {
                price: number(0)?,
                change: number(1)?,
                percent_scaled: number(2)?,
            }),
            // fields[0] is the open price
            QuoteKind::Equity => Some(QuoteFields::Equity {
                prev_close: number(1)?,
                price: number(2)?,
            }),
        }
    }
}

impl RawQuote {
    pub fn to_stock_price(&self) -> Option<StockPrice> {
        let code: InstrumentCode = self.code.parse().ok()?;
        let (price, change, percent) = match QuoteFields::parse(code.kind(), &self.fields)? {
            QuoteFields::Index {
                price,
                change,
                percent_scaled,
            } => (price, change, percent_scaled / 100.0),
            QuoteFields::Equity { prev_close, price } => {
                if prev_close <= 0.0 {
                    return None;
                }
                let change = price - prev_close;
                (price, change, change / prev_close)
            }
        };

        Some(StockPrice {
            code,
            name: self.name.clone(),
            price,
            change,
            percent,
        })
    }
}

/// Extracts every feed assignment from a response body. Lines that do not
/// look like an assignment, or assign an empty string, are skipped.
pub fn parse_feed(text: &str) -> Vec<RawQuote> {
    text.lines()
        .filter_map(|line| {
            let captures = FEED_LINE.captures(line)?;
            let body = &captures[2];
            if body.is_empty() {
                debug!("Feed returned no data for {}", &captures[1]);
                return None;
            }
            let mut parts = body.split(',').map(str::to_string);
            let name = parts.next()?;
            Some(RawQuote {
                code: captures[1].to_string(),
                name,
                fields: parts.collect(),
            })
        })
        .collect()
}

pub struct SinaQuoteSource {
    base_url: String,
    referer: String,
    client: reqwest::Client,
}

impl SinaQuoteSource {
    pub fn new(base_url: &str, referer: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fundwatch/1.0")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            referer: referer.to_string(),
            client,
        })
    }

    /// Fetches and parses one batch, reporting a total failure explicitly.
    #[instrument(name = "SinaQuoteFetch", skip(self, codes), fields(count = codes.len()))]
    pub async fn try_fetch_quotes(
        &self,
        codes: &[InstrumentCode],
    ) -> Result<HashMap<InstrumentCode, StockPrice>, ValuationError> {
        let codes = unique_codes(codes);
        if codes.is_empty() {
            return Ok(HashMap::new());
        }

        let list = codes
            .iter()
            .map(InstrumentCode::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/list={}", self.base_url, list);
        debug!("Requesting quotes from {}", url);

        let response = self
            .client
            .get(&url)
            .header(REFERER, &self.referer)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;

        let requested: HashSet<&InstrumentCode> = codes.iter().collect();
        let mut results = HashMap::new();
        for raw in parse_feed(&text) {
            match raw.to_stock_price() {
                Some(quote) if requested.contains(&quote.code) => {
                    results.insert(quote.code.clone(), quote);
                }
                Some(quote) => debug!("Ignoring unrequested code {}", quote.code),
                None => debug!(raw = ?raw, "Skipping unparseable feed line"),
            }
        }

        debug!("Parsed {} of {} requested quotes", results.len(), codes.len());
        Ok(results)
    }
}

#[async_trait]
impl QuoteSource for SinaQuoteSource {
    async fn fetch_quotes(&self, codes: &[InstrumentCode]) -> HashMap<InstrumentCode, StockPrice> {
        match self.try_fetch_quotes(codes).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Quote fetch failed, returning no quotes");
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REFERER_URL: &str = "https://finance.sina.com.cn";

    fn codes(list: &[&str]) -> Vec<InstrumentCode> {
        list.iter().map(|c| c.parse().unwrap()).collect()
    }

    fn code(c: &str) -> InstrumentCode {
        c.parse().unwrap()
    }

    async fn create_sina_mock_server(list: &str, body: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/list={list}")))
            .and(header("Referer", REFERER_URL))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[test]
    fn test_parse_feed_lines() {
        let text = concat!(
            "var hq_str_s_sh000001=\"SSE Composite,3094.668,-128.073,-3.97,436653,5458126\";\n",
            "garbage line\n",
            "var hq_str_sh600000=\"SPDB,10.50,10.40,10.60,10.70,10.38\";\n",
            "var hq_str_sz999999=\"\";\n",
        );

        let raw = parse_feed(text);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].code, "s_sh000001");
        assert_eq!(raw[0].name, "SSE Composite");
        assert_eq!(raw[0].fields[0], "3094.668");
        assert_eq!(raw[1].code, "sh600000");
        assert_eq!(raw[1].fields.len(), 5);
    }

    #[test]
    fn test_index_percent_is_divided_by_100() {
        let raw = RawQuote {
            code: "s_sz399001".to_string(),
            name: "SZSE Component".to_string(),
            fields: vec!["9500.10", "-120.5", "-1.25", "1000"]
                .into_iter()
                .map(String::from)
                .collect(),
        };

        let quote = raw.to_stock_price().unwrap();
        assert_eq!(quote.price, 9500.10);
        assert_eq!(quote.change, -120.5);
        assert!((quote.percent - -0.0125).abs() < 1e-12);
    }

    #[test]
    fn test_equity_change_is_derived_from_previous_close() {
        let raw = RawQuote {
            code: "sh600000".to_string(),
            name: "SPDB".to_string(),
            fields: vec!["10.50", "10.00", "10.60"]
                .into_iter()
                .map(String::from)
                .collect(),
        };

        let quote = raw.to_stock_price().unwrap();
        assert_eq!(quote.price, 10.60);
        assert!((quote.change - 0.60).abs() < 1e-9);
        assert!((quote.percent - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_short_or_invalid_lines_are_skipped() {
        let short_index = RawQuote {
            code: "s_sh000001".to_string(),
            name: "SSE".to_string(),
            fields: vec!["3000".to_string(), "15".to_string()],
        };
        assert!(short_index.to_stock_price().is_none());

        let short_equity = RawQuote {
            code: "sh600000".to_string(),
            name: "SPDB".to_string(),
            fields: vec!["10.50".to_string(), "10.00".to_string()],
        };
        assert!(short_equity.to_stock_price().is_none());

        let not_numeric = RawQuote {
            code: "sh600000".to_string(),
            name: "SPDB".to_string(),
            fields: vec!["10.50", "n/a", "10.60"]
                .into_iter()
                .map(String::from)
                .collect(),
        };
        assert!(not_numeric.to_stock_price().is_none());

        let zero_close = RawQuote {
            code: "sh600000".to_string(),
            name: "SPDB".to_string(),
            fields: vec!["0.00", "0.00", "0.00"]
                .into_iter()
                .map(String::from)
                .collect(),
        };
        assert!(zero_close.to_stock_price().is_none());
    }

    #[tokio::test]
    async fn test_successful_batch_fetch() {
        let body = concat!(
            "var hq_str_s_sh000001=\"SSE Composite,3000.00,15.00,0.50,436653,5458126\";\n",
            "var hq_str_sh600000=\"SPDB,10.50,10.00,10.60,10.70,10.38\";\n",
        );
        let mock_server = create_sina_mock_server("s_sh000001,sh600000", body, 200).await;
        let source = SinaQuoteSource::new(&mock_server.uri(), REFERER_URL).unwrap();

        let results = source
            .fetch_quotes(&codes(&["s_sh000001", "sh600000"]))
            .await;

        assert_eq!(results.len(), 2);
        let index = &results[&code("s_sh000001")];
        assert_eq!(index.name, "SSE Composite");
        assert_eq!(index.price, 3000.0);
        assert_eq!(index.change, 15.0);
        assert!((index.percent - 0.005).abs() < 1e-12);

        let equity = &results[&code("sh600000")];
        assert_eq!(equity.price, 10.60);
        assert!((equity.percent - 0.06).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_result_keys_are_subset_of_requested() {
        let body = concat!(
            "var hq_str_sh600000=\"SPDB,10.50,10.00,10.60\";\n",
            "var hq_str_sh600036=\"CMB,30.00,29.00,31.00\";\n",
            "var hq_str_sz000002=\"\";\n",
        );
        let mock_server = create_sina_mock_server("sh600000,sz000002", body, 200).await;
        let source = SinaQuoteSource::new(&mock_server.uri(), REFERER_URL).unwrap();

        let requested = codes(&["sh600000", "sz000002"]);
        let results = source.fetch_quotes(&requested).await;

        assert_eq!(results.len(), 1);
        assert!(results.keys().all(|k| requested.contains(k)));
        assert!(results.contains_key(&code("sh600000")));
    }

    #[tokio::test]
    async fn test_duplicate_codes_are_requested_once() {
        let body = "var hq_str_sh600000=\"SPDB,10.50,10.00,10.60\";\n";
        let mock_server = create_sina_mock_server("sh600000", body, 200).await;
        let source = SinaQuoteSource::new(&mock_server.uri(), REFERER_URL).unwrap();

        let results = source
            .fetch_quotes(&codes(&["sh600000", "sh600000"]))
            .await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
        let source = SinaQuoteSource::new(&mock_server.uri(), REFERER_URL).unwrap();

        let results = source.fetch_quotes(&[]).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_yields_empty_map() {
        let mock_server = create_sina_mock_server("sh600000", "Server Error", 500).await;
        let source = SinaQuoteSource::new(&mock_server.uri(), REFERER_URL).unwrap();

        let requested = codes(&["sh600000"]);
        let explicit = source.try_fetch_quotes(&requested).await;
        assert!(matches!(explicit, Err(ValuationError::SourceUnavailable(_))));

        let results = source.fetch_quotes(&requested).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_referer_is_rejected_upstream() {
        let body = "var hq_str_sh600000=\"SPDB,10.50,10.00,10.60\";\n";
        let mock_server = create_sina_mock_server("sh600000", body, 200).await;
        // Any request not matching the mock (wrong referer) gets a 404
        let source = SinaQuoteSource::new(&mock_server.uri(), "https://example.com").unwrap();

        let results = source.fetch_quotes(&codes(&["sh600000"])).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_feed_yields_empty_map() {
        // Nothing listens on port 9 locally
        let source = SinaQuoteSource::new("http://127.0.0.1:9", REFERER_URL).unwrap();

        let results = source.fetch_quotes(&codes(&["sh600000"])).await;
        assert!(results.is_empty());
    }
}
