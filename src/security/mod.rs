//! Command security checks

mod deny_list;
mod gate;

pub use deny_list::DenyListValidator;
pub use gate::{CommandValidator, NO_VALIDATOR_REASON, SecurityGate, Verdict};
