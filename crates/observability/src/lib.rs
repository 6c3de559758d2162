//! Process-wide logging setup shared by the server binary and tests.

pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize logging with the format chosen by `LOG_FORMAT`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    self::tracing::init(format);
}
