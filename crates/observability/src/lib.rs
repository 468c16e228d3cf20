//! Process-wide tracing/logging setup.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, UnknownLogFormat};

/// Initialize tracing/logging with the given output format.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init(format: LogFormat) {
    self::tracing::init(format);
}
