//! Process exit codes

/// Successful termination
pub const OK: i32 = 0;

/// Any failure: a node failed, a lookup came back empty, bad input
pub const FAILURE: i32 = 1;
