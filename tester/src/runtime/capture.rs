//! Background log capture
//!
//! A capture is a long-running child process whose stdout and stderr go
//! straight into a log file. Starting one returns a [`CaptureHandle`] at
//! once; the process keeps streaming while the foreground test polls and
//! asserts, until [`CaptureManager::stop`] terminates it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use shared::KeyValuePair;

use crate::error::{TesterError, TesterResult};
use crate::runtime::executor::CommandLine;

/// How long a capture gets to exit after SIGTERM before it is killed
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// What to capture and where to write it
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub label: String,
    pub namespace: String,
    pub command: CommandLine,
    pub output_path: PathBuf,
}

impl CaptureRequest {
    pub fn new(
        label: impl Into<String>,
        namespace: impl Into<String>,
        command: CommandLine,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            namespace: namespace.into(),
            command,
            output_path: output_path.into(),
        }
    }

    /// Captures are keyed by namespace and label
    pub fn artifact_id(&self) -> String {
        format!("{}/{}", self.namespace, self.label)
    }
}

/// One running capture, owned by the [`CaptureManager`] until stopped
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureHandle {
    pub artifact_id: String,
    pub namespace: String,
    pub label: String,
    pub process_id: u32,
    pub output_path: PathBuf,
    pub pid_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

struct RunningCapture {
    handle: CaptureHandle,
    kill_tx: Option<oneshot::Sender<()>>,
    stopping: Arc<AtomicBool>,
    watcher: JoinHandle<io::Result<ExitStatus>>,
}

/// Starts and stops capture processes
pub struct CaptureManager {
    envs: Vec<KeyValuePair>,
    stop_grace: Duration,
    running: Mutex<HashMap<String, RunningCapture>>,
}

impl Default for CaptureManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureManager {
    pub fn new() -> Self {
        Self {
            envs: Vec::new(),
            stop_grace: DEFAULT_STOP_GRACE,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Environment passed to every capture process
    pub fn with_envs(mut self, envs: Vec<KeyValuePair>) -> Self {
        self.envs = envs;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Launch a capture and return without waiting for it.
    ///
    /// Fails with `CaptureCollision` when the artifact id or the output path
    /// is already used by a running capture.
    pub async fn start(&self, request: CaptureRequest) -> TesterResult<CaptureHandle> {
        let artifact_id = request.artifact_id();
        let mut running = self.running.lock().await;

        if let Some(existing) = running
            .values()
            .find(|c| c.handle.artifact_id == artifact_id || c.handle.output_path == request.output_path)
        {
            return Err(TesterError::CaptureCollision {
                artifact_id,
                path: existing.handle.output_path.display().to_string(),
            });
        }

        if let Some(dir) = request.output_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&request.output_path)?;
        let stderr_log = log.try_clone()?;

        let rendered = request.command.to_string();
        let mut cmd = request.command.to_command(&self.envs);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr_log))
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| TesterError::SpawnFailed {
            command: rendered.clone(),
            source,
        })?;
        let process_id = child.id().unwrap_or_default();

        let pid_path = request.output_path.with_extension("pid");
        if let Err(e) = tokio::fs::write(&pid_path, format!("{process_id}\n")).await {
            tracing::warn!("⚠️ Could not write pid marker {}: {}", pid_path.display(), e);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let stopping = Arc::new(AtomicBool::new(false));
        let watcher = tokio::spawn(watch(child, kill_rx, stopping.clone(), artifact_id.clone()));

        let handle = CaptureHandle {
            artifact_id: artifact_id.clone(),
            namespace: request.namespace,
            label: request.label,
            process_id,
            output_path: request.output_path,
            pid_path,
            started_at: Utc::now(),
        };

        tracing::info!(
            "🎥 Capture {} started (pid {}) -> {}",
            artifact_id,
            process_id,
            handle.output_path.display()
        );
        tracing::debug!("Capture command: {}", rendered);

        running.insert(
            artifact_id,
            RunningCapture {
                handle: handle.clone(),
                kill_tx: Some(kill_tx),
                stopping,
                watcher,
            },
        );

        Ok(handle)
    }

    /// Stop a capture. Unknown, already stopped and naturally exited captures
    /// are a no-op. Only a process that survives SIGKILL is an error.
    pub async fn stop(&self, handle: &CaptureHandle) -> TesterResult<()> {
        self.stop_by_id(&handle.artifact_id).await
    }

    pub async fn stop_by_id(&self, artifact_id: &str) -> TesterResult<()> {
        let entry = self.running.lock().await.remove(artifact_id);
        let Some(mut entry) = entry else {
            tracing::debug!("Capture {} is not running, nothing to stop", artifact_id);
            return Ok(());
        };

        entry.stopping.store(true, Ordering::SeqCst);
        if !entry.watcher.is_finished() {
            terminate(entry.handle.process_id);
        }

        if let Ok(joined) = tokio::time::timeout(self.stop_grace, &mut entry.watcher).await {
            return finish(artifact_id, joined);
        }

        tracing::warn!(
            "🔨 Capture {} ignored SIGTERM for {:?}, killing",
            artifact_id,
            self.stop_grace
        );
        if let Some(kill_tx) = entry.kill_tx.take() {
            let _ = kill_tx.send(());
        }

        match tokio::time::timeout(self.stop_grace, &mut entry.watcher).await {
            Ok(joined) => finish(artifact_id, joined),
            Err(_) => {
                entry.watcher.abort();
                Err(TesterError::cleanup(
                    artifact_id,
                    format!("process {} still running after SIGKILL", entry.handle.process_id),
                ))
            }
        }
    }

    /// Stop every running capture, collecting failures instead of bailing out
    pub async fn stop_all(&self) -> Vec<TesterError> {
        let ids: Vec<String> = self.running.lock().await.keys().cloned().collect();
        let mut failures = Vec::new();
        for id in ids {
            if let Err(e) = self.stop_by_id(&id).await {
                tracing::warn!("⚠️ Failed to stop capture {}: {}", id, e);
                failures.push(e);
            }
        }
        failures
    }

    #[cfg(test)]
    pub(crate) async fn is_running(&self, artifact_id: &str) -> bool {
        self.running
            .lock()
            .await
            .get(artifact_id)
            .is_some_and(|c| !c.watcher.is_finished())
    }

    pub async fn handles(&self) -> Vec<CaptureHandle> {
        self.running.lock().await.values().map(|c| c.handle.clone()).collect()
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        let running = self.running.get_mut();
        if running.is_empty() {
            return;
        }
        tracing::warn!("🚨 Capture manager dropped with {} captures still running, killing them", running.len());
        for (id, capture) in running.iter_mut() {
            if let Some(kill_tx) = capture.kill_tx.take() {
                if kill_tx.send(()).is_err() {
                    tracing::debug!("Capture {} already exited", id);
                }
            }
        }
    }
}

/// Owns the child until it exits on its own or is told to die
async fn watch(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    stopping: Arc<AtomicBool>,
    artifact_id: String,
) -> io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => {
            match &status {
                Ok(_) if stopping.load(Ordering::SeqCst) => {}
                Ok(s) if s.success() => tracing::info!("📼 Capture {} ended", artifact_id),
                Ok(s) => tracing::warn!("⚠️ Capture {} exited early ({}), partial output kept", artifact_id, s),
                Err(e) => tracing::warn!("⚠️ Lost track of capture {}: {}", artifact_id, e),
            }
            status
        }
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                tracing::debug!("Kill of capture {} failed: {}", artifact_id, e);
            }
            child.wait().await
        }
    }
}

fn finish(artifact_id: &str, joined: Result<io::Result<ExitStatus>, tokio::task::JoinError>) -> TesterResult<()> {
    match joined {
        Ok(Ok(status)) => {
            tracing::info!("⏹️ Capture {} stopped ({})", artifact_id, status);
            Ok(())
        }
        Ok(Err(e)) => Err(TesterError::cleanup(artifact_id, e.to_string())),
        Err(e) => Err(TesterError::cleanup(artifact_id, format!("watcher task failed: {e}"))),
    }
}

#[cfg(unix)]
fn terminate(process_id: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    // pid 0 would signal our whole process group
    let Ok(raw) = i32::try_from(process_id) else {
        return;
    };
    if raw == 0 {
        return;
    }

    match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => tracing::debug!("📤 Sent SIGTERM to capture process {}", process_id),
        Err(Errno::ESRCH) => tracing::debug!("✅ Capture process {} already gone", process_id),
        Err(e) => tracing::warn!("⚠️ Failed to signal capture process {}: {}", process_id, e),
    }
}

#[cfg(not(unix))]
fn terminate(_process_id: u32) {}

/// Size of a capture's log on disk, zero when it does not exist yet
pub async fn captured_bytes(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}
