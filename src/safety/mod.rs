//! Safety checks applied before messages reach the upstream model.

mod crisis;

pub use crisis::{CRISIS_RESPONSE, detect_crisis};
