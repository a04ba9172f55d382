//! Derived holding figures. Nothing here is ever persisted.

use crate::core::code::InstrumentCode;
use crate::core::fund::{Fund, Holding};
use std::collections::HashMap;
use tracing::debug;

/// A holding joined with its latest valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingView {
    pub holding: Holding,
    pub name: Option<String>,
    pub valuation: Option<f64>,
    /// `amount * valuation`
    pub holding_value: Option<f64>,
    /// `amount * change`
    pub daily_profit: Option<f64>,
    /// `holding_value - total_cost`
    pub holding_profit: Option<f64>,
}

impl HoldingView {
    pub fn derive(holding: &Holding, valuation: Option<&Fund>) -> Self {
        match valuation {
            Some(fund) => {
                let holding_value = holding.amount * fund.valuation;
                Self {
                    holding: holding.clone(),
                    name: Some(fund.name.clone()),
                    valuation: Some(fund.valuation),
                    holding_value: Some(holding_value),
                    daily_profit: Some(holding.amount * fund.change),
                    holding_profit: Some(holding_value - holding.total_cost),
                }
            }
            None => {
                debug!("No valuation available for holding {}", holding.code);
                Self {
                    holding: holding.clone(),
                    name: None,
                    valuation: None,
                    holding_value: None,
                    daily_profit: None,
                    holding_profit: None,
                }
            }
        }
    }
}

/// Derives a view for every holding, in holding order.
pub fn derive_views(holdings: &[Holding], funds: &[Fund]) -> Vec<HoldingView> {
    let by_code: HashMap<&InstrumentCode, &Fund> =
        funds.iter().map(|fund| (&fund.code, fund)).collect();
    holdings
        .iter()
        .map(|holding| HoldingView::derive(holding, by_code.get(&holding.code).copied()))
        .collect()
}

/// Sums over the holdings that have a valuation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortfolioTotals {
    pub total_assets: f64,
    pub total_daily_profit: f64,
    pub total_holding_profit: f64,
    /// Holdings left out because no valuation was available
    pub missing: usize,
}

impl PortfolioTotals {
    pub fn from_views(views: &[HoldingView]) -> Self {
        views.iter().fold(Self::default(), |mut totals, view| {
            match (view.holding_value, view.daily_profit, view.holding_profit) {
                (Some(value), Some(daily), Some(profit)) => {
                    totals.total_assets += value;
                    totals.total_daily_profit += daily;
                    totals.total_holding_profit += profit;
                }
                _ => totals.missing += 1,
            }
            totals
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fund(code: &str, valuation: f64, change: f64) -> Fund {
        Fund {
            code: code.parse().unwrap(),
            name: format!("Fund {code}"),
            fund_type: None,
            valuation,
            valuation_time: "10:00:00".to_string(),
            change,
            change_percent: change / (valuation - change),
        }
    }

    #[test]
    fn test_derive_with_valuation() {
        let holding = Holding::new("000001".parse().unwrap(), 1.0, 1000.0, None).unwrap();
        let view = HoldingView::derive(&holding, Some(&fund("000001", 1.2, 0.02)));

        assert_eq!(view.name.as_deref(), Some("Fund 000001"));
        assert!((view.holding_value.unwrap() - 1200.0).abs() < 1e-9);
        assert!((view.daily_profit.unwrap() - 20.0).abs() < 1e-9);
        assert!((view.holding_profit.unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_derive_without_valuation() {
        let holding = Holding::new("000001".parse().unwrap(), 1.0, 1000.0, None).unwrap();
        let view = HoldingView::derive(&holding, None);

        assert!(view.holding_value.is_none());
        assert!(view.daily_profit.is_none());
        assert!(view.holding_profit.is_none());
    }

    #[test]
    fn test_totals_skip_missing_valuations() {
        let holdings = vec![
            Holding::new("000001".parse().unwrap(), 1.0, 1000.0, None).unwrap(),
            Holding::new("110011".parse().unwrap(), 2.0, 500.0, None).unwrap(),
            Holding::new("000123".parse().unwrap(), 1.5, 100.0, None).unwrap(),
        ];
        let funds = vec![fund("000001", 1.1, 0.01), fund("110011", 1.8, -0.05)];

        let views = derive_views(&holdings, &funds);
        assert_eq!(views.len(), 3);
        assert_eq!(views[2].holding.code.as_str(), "000123");

        let totals = PortfolioTotals::from_views(&views);
        assert!((totals.total_assets - 2000.0).abs() < 1e-9);
        assert!((totals.total_daily_profit - (10.0 - 25.0)).abs() < 1e-9);
        assert!((totals.total_holding_profit - (100.0 - 100.0)).abs() < 1e-9);
        assert_eq!(totals.missing, 1);
    }
}
