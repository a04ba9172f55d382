use crate::core::code::InstrumentCode;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Estimated valuation of a fund, captured at normalization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fund {
    pub code: InstrumentCode,
    pub name: String,
    pub fund_type: Option<String>,
    pub valuation: f64,
    /// Local wall-clock time the valuation was captured, `HH:MM:SS`
    pub valuation_time: String,
    pub change: f64,
    /// Fraction of the previous value, `0.005` means 0.5%
    pub change_percent: f64,
}

/// A recorded position in a fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub code: InstrumentCode,
    pub cost_price: f64,
    /// Share count
    pub amount: f64,
    pub total_cost: f64,
}

impl Holding {
    /// Builds a holding whose total cost is `cost_price * amount` unless given.
    pub fn new(
        code: InstrumentCode,
        cost_price: f64,
        amount: f64,
        total_cost: Option<f64>,
    ) -> Result<Self> {
        let holding = Self {
            code,
            cost_price,
            amount,
            total_cost: total_cost.unwrap_or(cost_price * amount),
        };
        holding.validate()?;
        Ok(holding)
    }

    /// Every number must be finite and non-negative. JSON has no encoding for
    /// NaN or infinity.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("cost price", self.cost_price),
            ("amount", self.amount),
            ("total cost", self.total_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!(
                    "Invalid {field} for {}: {value}, expected a finite non-negative number",
                    self.code
                );
            }
        }
        Ok(())
    }
}
