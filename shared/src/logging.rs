//! Shared logging utilities for consistent tracing across the harness

use chrono::{DateTime, Utc};

/// Initialize the tracing subscriber for the harness binary.
///
/// `RUST_LOG` wins when set; otherwise the harness crates log at `level`
/// and everything else at `warn`.
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,tester={level},shared={level}")));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for step-aware info logging
#[macro_export]
macro_rules! step_info {
    ($step:expr, $($arg:tt)*) => {
        tracing::info!(
            step = %$step,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for step-aware warning logging
#[macro_export]
macro_rules! step_warn {
    ($step:expr, $($arg:tt)*) => {
        tracing::warn!(
            step = %$step,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for step-aware error logging
#[macro_export]
macro_rules! step_error {
    ($step:expr, $($arg:tt)*) => {
        tracing::error!(
            step = %$step,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for step-aware debug logging
#[macro_export]
macro_rules! step_debug {
    ($step:expr, $($arg:tt)*) => {
        tracing::debug!(
            step = %$step,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}
