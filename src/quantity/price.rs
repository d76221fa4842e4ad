quantity!(
    /// Energy price per megawatt-hour.
    Price(f64),
    "/MWh",
    Div<f64>,
);

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn nan_sorts_last() {
        let mut prices = [Price(f64::NAN), Price(20.0), Price(-5.0)];
        prices.sort();
        assert_eq!(prices[..2], [Price(-5.0), Price(20.0)]);
        assert!(prices[2].0.is_nan());
    }

    #[test]
    fn scale() {
        assert_abs_diff_eq!((Price(120.0) / 4.0).0, 30.0);
        assert_eq!(Price(120.0).to_string(), "120 /MWh");
    }
}
