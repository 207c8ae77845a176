//! Stable exit codes for the gate.

/// Every fatal step passed.
pub const OK: u8 = 0;
/// At least one fatal step failed or lacked its capability.
pub const FAILED: u8 = 1;
/// Invalid configuration, environment toggle, or usage.
pub const INVALID: u8 = 2;
/// The run was cancelled before completing.
pub const CANCELLED: u8 = 130;
