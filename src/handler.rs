//! Consumers of the published schedule.

pub mod ess;
pub mod load;
pub mod ramp;

use std::sync::Arc;

use crate::core::{
    mode::{HandlerDescriptor, HandlerModes},
    solution::HandlerSchedule,
};

/// Downstream controller that takes part in the schedule.
pub trait ScheduleHandler: Send + Sync {
    /// Unique handler identifier, also the key in the applied modes.
    fn id(&self) -> &str;

    /// Modes the optimizer may choose from, queried at the start of every cycle.
    fn modes(&self) -> HandlerModes;

    /// Receive the freshly published plan for this handler.
    fn apply(&self, schedule: &HandlerSchedule);
}

/// Describe the handlers for building the mode combinations.
pub fn describe(handlers: &[Arc<dyn ScheduleHandler>]) -> Vec<HandlerDescriptor> {
    handlers
        .iter()
        .map(|handler| HandlerDescriptor { id: handler.id().to_owned(), modes: handler.modes() })
        .collect()
}
