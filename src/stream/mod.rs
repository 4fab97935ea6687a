//! Stream combinators for async telemetry consumers.

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
