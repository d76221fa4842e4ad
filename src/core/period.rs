use chrono::{DateTime, Local, TimeDelta};

use crate::quantity::{energy::WattHours, price::Price};

/// Duration class of a [`Period`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub enum Resolution {
    Quarter,
    Hour,
}

impl Resolution {
    pub const fn n_quarters(self) -> i64 {
        match self {
            Self::Quarter => 1,
            Self::Hour => 4,
        }
    }

    pub const fn duration(self) -> TimeDelta {
        TimeDelta::minutes(15 * self.n_quarters())
    }
}

/// One optimization period with its forecast and energy limits.
///
/// All energies are positive amounts for the whole period.
#[must_use]
#[derive(Clone, Debug, PartialEq, bon::Builder)]
pub struct Period {
    pub start: DateTime<Local>,
    pub resolution: Resolution,
    pub production: WattHours,
    pub consumption: WattHours,
    pub price: Price,
    pub max_charge: WattHours,
    pub max_discharge: WattHours,
    pub max_grid_buy: WattHours,
}

impl Period {
    pub fn end(&self) -> DateTime<Local> {
        self.start + self.resolution.duration()
    }

    pub fn contains(&self, time: DateTime<Local>) -> bool {
        self.start <= time && time < self.end()
    }

    /// Merge four consecutive quarters into an hourly period.
    pub fn hour(quarters: &[Self; 4]) -> Self {
        Self {
            start: quarters[0].start,
            resolution: Resolution::Hour,
            production: quarters.iter().map(|quarter| quarter.production).sum(),
            consumption: quarters.iter().map(|quarter| quarter.consumption).sum(),
            price: quarters.iter().map(|quarter| quarter.price).sum::<Price>() / 4.0,
            max_charge: quarters.iter().map(|quarter| quarter.max_charge).sum(),
            max_discharge: quarters.iter().map(|quarter| quarter.max_discharge).sum(),
            max_grid_buy: quarters.iter().map(|quarter| quarter.max_grid_buy).sum(),
        }
    }
}

#[cfg(test)]
pub mod fixtures {
    use chrono::TimeZone;

    use super::*;

    pub fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    /// Quarter-hour period with 10 kW power limits.
    pub fn quarter(production: i64, consumption: i64, price: f64) -> Period {
        Period::builder()
            .start(noon())
            .resolution(Resolution::Quarter)
            .production(WattHours(production))
            .consumption(WattHours(consumption))
            .price(Price(price))
            .max_charge(WattHours(2_500))
            .max_discharge(WattHours(2_500))
            .max_grid_buy(WattHours(2_500))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};

    #[test]
    fn hour_contains() {
        let period = Period { resolution: Resolution::Hour, ..quarter(0, 0, 0.0) };
        assert_eq!(period.end(), noon() + TimeDelta::hours(1));
        assert!(period.contains(noon() + TimeDelta::minutes(59)));
        assert!(!period.contains(period.end()));
    }

    #[test]
    fn aggregate_hour() {
        let quarters = [
            quarter(100, 400, 10.0),
            quarter(200, 300, 20.0),
            quarter(300, 200, 30.0),
            quarter(400, 100, 40.0),
        ];
        let hour = Period::hour(&quarters);
        assert_eq!(hour.resolution, Resolution::Hour);
        assert_eq!(hour.start, noon());
        assert_eq!(hour.production, WattHours(1_000));
        assert_eq!(hour.consumption, WattHours(1_000));
        assert_eq!(hour.price, Price(25.0));
        assert_eq!(hour.max_charge, WattHours(10_000));
    }
}
