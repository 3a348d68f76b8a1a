//! Process-wide logging setup shared by the binaries.

/// Tracing subscriber configuration.
pub mod tracing;

/// Initialize logging for the process. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    tracing::init();
}
