use crate::quantity::power::Watts;

/// Limits how much a set-point may change per device cycle.
#[derive(Copy, Clone, Debug, Default)]
pub struct RampFilter {
    last: Option<Watts>,
}

impl RampFilter {
    /// Move from the last output towards `target` by at most `max_step`.
    ///
    /// The first call starts from zero.
    pub fn apply(&mut self, target: Watts, max_step: Watts) -> Watts {
        let last = self.last.unwrap_or(Watts::ZERO);
        let output = target.clamp(last - max_step, last + max_step);
        self.last = Some(output);
        output
    }

    pub const fn reset(&mut self) {
        self.last = None;
    }
}
