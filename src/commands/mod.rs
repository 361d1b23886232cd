//! Command patterns, registry and matching

mod matcher;
mod registry;
mod types;

pub use matcher::{match_command, normalize};
pub use registry::{CompiledPattern, PatternRegistry};
pub use types::{Category, CommandPattern, HandlerName, Importance, MatchResult, PatternConfig};
