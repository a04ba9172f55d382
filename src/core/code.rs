//! Instrument codes and their quote layout

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

/// Prefix the feed uses for index codes, e.g. `s_sh000001`.
pub const INDEX_PREFIX: &str = "s_";

/// Field layout of a feed line, decided once per code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    Index,
    Equity,
}

/// Identifier of a tradable instrument or index, e.g. `sh600000` or `s_sz399001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentCode(String);

impl InstrumentCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> QuoteKind {
        if self.0.starts_with(INDEX_PREFIX) {
            QuoteKind::Index
        } else {
            QuoteKind::Equity
        }
    }
}

impl FromStr for InstrumentCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.is_empty() {
            return Err(anyhow!("Instrument code must not be empty"));
        }
        // Codes are joined with commas into a single request
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(anyhow!("Invalid instrument code: {}", s));
        }
        Ok(InstrumentCode(code.to_string()))
    }
}

impl TryFrom<String> for InstrumentCode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstrumentCode> for String {
    fn from(code: InstrumentCode) -> Self {
        code.0
    }
}

impl Display for InstrumentCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Removes repeated codes, keeping the first occurrence of each.
pub fn unique_codes(codes: &[InstrumentCode]) -> Vec<InstrumentCode> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .filter(|code| seen.insert(*code))
        .cloned()
        .collect()
}
