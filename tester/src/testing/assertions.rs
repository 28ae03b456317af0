//! Final-state assertions
//!
//! These are the only checks whose failure fails a run; everything they
//! report is an `AssertionError`.

use std::path::Path;

use crate::error::{TesterError, TesterResult};
use crate::runtime::WorkloadStatus;

/// The workload's status must equal `expected`. `last_error` is the read
/// failure seen after the last good observation, if any.
pub fn assert_status(
    target: &str,
    observed: &WorkloadStatus,
    expected: &str,
    last_error: Option<&str>,
) -> TesterResult<()> {
    if observed.as_str() == expected {
        tracing::info!("✅ {} is {}", target, expected);
        return Ok(());
    }

    let mut message = format!("{target} expected status {expected}, observed {observed}");
    if let Some(error) = last_error {
        message.push_str(&format!(" (last read error: {error})"));
    }
    Err(TesterError::assertion(message))
}

/// A capture log must exist on disk for the label
pub async fn assert_capture_log(label: &str, path: &Path) -> TesterResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {
            tracing::debug!("📄 Capture log for {} holds {} bytes so far", label, meta.len());
            Ok(())
        }
        _ => Err(TesterError::assertion(format!(
            "no capture log for {label} at {}",
            path.display()
        ))),
    }
}
