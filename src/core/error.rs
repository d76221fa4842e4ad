/// Live input that the context cannot be built without.
///
/// Returned wrapped in [`anyhow::Error`], the run-loop downcasts it to decide whether to retry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InputUnavailable {
    #[error("battery telemetry is unavailable")]
    Battery,

    #[error("battery capacity is unavailable")]
    Capacity,

    #[error("battery state of charge is unavailable")]
    StateOfCharge,

    #[error("production forecast is unavailable")]
    Production,

    #[error("consumption forecast is unavailable")]
    Consumption,

    #[error("price forecast is unavailable")]
    Prices,
}

impl InputUnavailable {
    /// Check whether the error chain carries missing input.
    pub fn is_cause_of(error: &anyhow::Error) -> bool {
        error.downcast_ref::<Self>().is_some()
    }
}
