//! Stable exit codes for jailfile CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Parse, validation, configuration, or usage failure.
pub const INVALID: i32 = 1;
/// A directive's command failed during a phase.
pub const EXECUTION_FAILED: i32 = 2;
/// The jail backend was unreachable or interrupted.
pub const BACKEND_UNAVAILABLE: i32 = 3;
