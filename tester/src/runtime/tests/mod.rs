//! Runtime component tests
//!
//! Executor, poller, capture and namespace tests. Each component has its own
//! file; helpers shared between them live in `common`.


#[cfg(test)]
pub mod common {
    use shared::ExecutionResult;
    use std::path::Path;
    use std::time::Duration;

    use crate::runtime::CommandLine;

    /// Upper bound for waiting on real child processes in tests
    pub const PROCESS_WAIT: Duration = Duration::from_secs(5);

    pub fn ok(command: &CommandLine, stdout: &str) -> ExecutionResult {
        ExecutionResult {
            command: command.to_string(),
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(command: &CommandLine, exit_code: i32, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            command: command.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Wait (real time) until `path` holds at least `needle`
    pub async fn wait_for_content(path: &Path, needle: &str) -> String {
        let deadline = tokio::time::Instant::now() + PROCESS_WAIT;
        loop {
            let content = tokio::fs::read_to_string(path).await.unwrap_or_default();
            if content.contains(needle) || tokio::time::Instant::now() >= deadline {
                return content;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
