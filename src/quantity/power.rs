use crate::quantity::energy::WattHours;

quantity!(Watts(i64), "W", Mul<f64>);

impl Watts {
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Energy delivered by this constant power over one quarter of an hour.
    ///
    /// Integer division, fractional watt-hours are dropped.
    pub const fn per_quarter(self) -> WattHours {
        WattHours(self.0 / 4)
    }
}
