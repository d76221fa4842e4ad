use std::ops::Mul;

use crate::quantity::{cost::Cost, power::Watts, price::Price};

quantity!(WattHours(i64), "Wh", Mul<i64>, Div<i64>);

impl WattHours {
    /// Portion of `total` in percents, rounded to the nearest integer.
    #[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn percent_of(self, total: Self) -> Option<i64> {
        (total.0 != 0).then(|| (self.0 as f64 * 100.0 / total.0 as f64).round() as i64)
    }

    /// Average power of this energy spread over the given number of quarters.
    pub const fn over_quarters(self, n_quarters: i64) -> Watts {
        Watts(self.0 * 4 / n_quarters)
    }
}

impl Mul<Price> for WattHours {
    type Output = Cost;

    #[expect(clippy::cast_precision_loss)]
    fn mul(self, rhs: Price) -> Self::Output {
        Cost(self.0 as f64 * rhs.0 / 1_000_000.0)
    }
}
