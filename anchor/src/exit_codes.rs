//! Stable exit codes for the `anchor` binary.

/// The loop finished, or stopped at the turn budget.
pub const OK: i32 = 0;
/// Invalid arguments or config, or a fatal model error.
pub const FAILED: i32 = 1;
/// The user cancelled a prompt or a wait.
pub const INTERRUPTED: i32 = 130;
