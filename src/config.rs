use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// engine configuration: validation tolerances for the split calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// allowed gap between the sum of exact amounts and the expense total
    pub exact_sum_tolerance: Decimal,
    /// allowed gap between the sum of percentages and 100
    pub percent_tolerance: Decimal,
}

impl EngineConfig {
    /// one cent of slack on exact sums, 0.01 on percentage sums
    pub fn standard() -> Self {
        Self {
            exact_sum_tolerance: Decimal::new(1, 2),
            percent_tolerance: Decimal::new(1, 2),
        }
    }

    /// no slack at all: sums must match to the cent
    pub fn strict() -> Self {
        Self {
            exact_sum_tolerance: Decimal::ZERO,
            percent_tolerance: Decimal::ZERO,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}
