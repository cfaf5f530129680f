//! Parameterized path pattern compilation and matching.

mod matcher;

pub use matcher::{MatchOutcome, PathMatcher, Segment};
