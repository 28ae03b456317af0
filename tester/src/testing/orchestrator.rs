//! Test run sequencing
//!
//! One run: clear the namespace name, create it, submit the workloads, wait
//! for their pods, attach log captures, wait for the workload status and
//! assert it. Whatever happens in that sequence (error, panic, timeout,
//! cancellation) the run then dumps resources, stops every capture and
//! deletes the namespace it created, each step bounded by its own timeout.

use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use shared::{Fixture, NamespaceRecord, TestStep, step_debug, step_error, step_info, step_warn};

use crate::config::{PreflightAction, SuiteConfig, WorkloadTarget};
use crate::error::{TesterError, TesterResult};
use crate::runtime::capture::captured_bytes;
use crate::runtime::{
    ArtifactLayout, CaptureManager, CaptureRequest, Cluster, ClusterClient, LogSource, NamespaceLifecycleController,
    PodRow, PollError, PollSpec, ResourcePoller, TargetState, WorkloadStatus,
};
use crate::testing::assertions;
use crate::testing::report::{Outcome, TestReport};
use crate::traits::{CommandExecutor, WorkloadSubmitter};

/// Mutable bookkeeping for one run, shared between body and cleanup
struct RunState {
    report: TestReport,
    step: TestStep,
    /// Set once this run may have created the namespace
    owned: bool,
    controllers_attached: bool,
}

impl RunState {
    fn new(namespace: &str) -> Self {
        Self {
            report: TestReport::new(namespace),
            step: TestStep::EnsureAbsent,
            owned: false,
            controllers_attached: false,
        }
    }

    fn enter(&mut self, step: TestStep) {
        self.step = step;
        step_debug!(step, "entering step");
    }
}

/// How the body ended
enum BodyExit {
    Finished(TesterResult<()>),
    Panicked(Box<dyn Any + Send>),
    Cancelled,
    TimedOut,
}

/// Per-run collaborators, built fresh for every namespace
struct RunContext<'a, E: CommandExecutor> {
    record: &'a NamespaceRecord,
    layout: ArtifactLayout,
    poller: ResourcePoller,
    namespaces: NamespaceLifecycleController<E>,
    captures: CaptureManager,
}

pub struct TestOrchestrator<E: CommandExecutor, W: WorkloadSubmitter> {
    config: SuiteConfig,
    client: ClusterClient<E>,
    submitter: W,
}

impl<E: CommandExecutor, W: WorkloadSubmitter> TestOrchestrator<E, W> {
    pub fn new(config: SuiteConfig, executor: Arc<E>, submitter: W) -> Self {
        let client = ClusterClient::new(executor, Cluster::new(&config.cli), config.command_timeout);
        Self {
            config,
            client,
            submitter,
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn client(&self) -> &ClusterClient<E> {
        &self.client
    }

    /// Apply the configured cluster adjustments, in order
    pub async fn preflight(&self) -> TesterResult<()> {
        for action in &self.config.preflight {
            step_info!(TestStep::Preflight, "Running preflight action {:?}", action);
            match action {
                PreflightAction::RestartRollout { namespace, deployment } => {
                    self.client
                        .restart_rollout(namespace, deployment, self.config.command_timeout)
                        .await?;
                }
                PreflightAction::Patch {
                    kind,
                    name,
                    namespace,
                    patch_type,
                    patch,
                } => {
                    self.client
                        .patch(kind, name, namespace.as_deref(), *patch_type, patch)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Run `targets` in a freshly named namespace derived from the fixture
    pub async fn run(&self, fixture: &Fixture, targets: &[WorkloadTarget], cancel: &CancellationToken) -> TestReport {
        let record = match NamespaceRecord::generate(&fixture.resource_name) {
            Ok(record) if self.config.keep_namespaces => record.retained(),
            Ok(record) => record,
            Err(e) => {
                let mut report = TestReport::new(fixture.resource_name.clone());
                report.outcome = Outcome::Aborted {
                    reason: TesterError::from(e).to_string(),
                };
                report.finished_at = Utc::now();
                return report;
            }
        };
        self.run_in(&record, fixture, targets, cancel).await
    }

    /// Run `targets` in the namespace named by `record`.
    ///
    /// The same record is used for setup, body and teardown.
    pub async fn run_in(
        &self,
        record: &NamespaceRecord,
        fixture: &Fixture,
        targets: &[WorkloadTarget],
        cancel: &CancellationToken,
    ) -> TestReport {
        let poller = ResourcePoller::with_cancellation(cancel.clone());
        let ctx = RunContext {
            record,
            layout: ArtifactLayout::for_run(&self.config.artifacts_root, &record.name),
            namespaces: NamespaceLifecycleController::new(self.client.clone())
                .with_poller(poller.clone())
                .with_removal_timing(self.config.namespace_removal),
            poller,
            captures: CaptureManager::new()
                .with_envs(self.config.envs.clone())
                .with_stop_grace(self.config.capture_stop_grace),
        };
        let mut state = RunState::new(&record.name);

        tracing::info!(
            "🧪 Run {} starting: {} target(s) in namespace {}",
            state.report.run_id,
            targets.len(),
            record.name
        );

        let exit = {
            let body = AssertUnwindSafe(self.body(&ctx, fixture, targets, &mut state)).catch_unwind();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => BodyExit::Cancelled,
                _ = tokio::time::sleep(self.config.test_timeout) => BodyExit::TimedOut,
                finished = body => match finished {
                    Ok(result) => BodyExit::Finished(result),
                    Err(panic) => BodyExit::Panicked(panic),
                },
            }
        };

        let result = match exit {
            BodyExit::Finished(result) => result,
            BodyExit::Panicked(panic) => Err(TesterError::StepPanicked {
                step: state.step.to_string(),
                message: panic_message(panic.as_ref()),
            }),
            BodyExit::Cancelled => Err(TesterError::Cancelled {
                subject: format!("{} during {}", record.name, state.step),
            }),
            BodyExit::TimedOut => Err(TesterError::Cancelled {
                subject: format!(
                    "{} after the {:?} test timeout during {}",
                    record.name, self.config.test_timeout, state.step
                ),
            }),
        };

        if let Err(e) = &result {
            step_error!(state.step, "❌ Run in {} stopped: {}", record.name, e);
        }

        self.cleanup(&ctx, &mut state).await;

        let mut report = state.report;
        report.outcome = Outcome::from_result(&result);
        report.finished_at = Utc::now();

        if let Err(e) = report.write_to(&ctx.layout.report_path()).await {
            tracing::warn!("⚠️ Could not write report for {}: {}", record.name, e);
        }
        tracing::info!("📋 {}", report.summary());
        report
    }

    async fn body(
        &self,
        ctx: &RunContext<'_, E>,
        fixture: &Fixture,
        targets: &[WorkloadTarget],
        state: &mut RunState,
    ) -> TesterResult<()> {
        let namespace = ctx.record.name.as_str();

        state.enter(TestStep::EnsureAbsent);
        ctx.namespaces.ensure_absent(namespace).await?;

        state.enter(TestStep::CreateNamespace);
        ctx.namespaces.verify_unused(namespace).await?;
        // from here on a half-finished create still leaves our namespace behind
        state.owned = true;
        ctx.namespaces
            .provision(namespace, &fixture.display_name, &fixture.description)
            .await?;

        for target in targets {
            state.enter(TestStep::SubmitWorkload);
            self.submitter.submit(ctx.record, target).await?;
            state.report.target_mut(&target.name);
        }

        for target in targets {
            state.enter(TestStep::AwaitPod);
            let pod = self.await_pod(ctx, target).await?;
            step_info!(TestStep::AwaitPod, "🟢 Pod {} is Running", pod.name);
            state.report.target_mut(&target.name).pod = Some(pod.name.clone());

            state.enter(TestStep::AttachCapture);
            let capture_log = self.attach_pod_capture(ctx, target, &pod, state).await;
            if !state.controllers_attached {
                self.attach_controller_captures(ctx, state).await;
                state.controllers_attached = true;
            }

            state.enter(TestStep::AwaitStatus);
            let expected = self.config.expected_status(target).to_string();
            let (observed, last_error) = self.await_status(ctx, target, &expected).await?;

            state.enter(TestStep::Assert);
            state.report.target_mut(&target.name).final_status = Some(observed.to_string());
            assertions::assert_status(&target.name, &observed, &expected, last_error.as_deref())?;
            if let Some(path) = capture_log {
                assertions::assert_capture_log(&target.name, &path).await?;
            }
        }

        Ok(())
    }

    async fn await_pod(&self, ctx: &RunContext<'_, E>, target: &WorkloadTarget) -> TesterResult<PodRow> {
        let namespace = ctx.record.name.as_str();
        let spec = PollSpec::new(
            format!("pod {}* in {}", target.pod_prefix, namespace),
            TargetState::Running,
            self.config.pod_timing,
        );
        let client = &self.client;
        let pod = ctx
            .poller
            .poll(&spec, || client.find_pod(namespace, &target.pod_prefix))
            .await?;

        pod.ok_or_else(|| TesterError::PollTimeout {
            subject: spec.subject.clone(),
            target: spec.target.to_string(),
            elapsed: spec.timeout,
            last_state: "no matching pod".to_string(),
        })
    }

    /// Wait for the status probe. Running out of time is not an error here:
    /// the last observed status, and the fetch error that followed it if
    /// any, go on to the assertion.
    async fn await_status(
        &self,
        ctx: &RunContext<'_, E>,
        target: &WorkloadTarget,
        expected: &str,
    ) -> TesterResult<(WorkloadStatus, Option<String>)> {
        let namespace = ctx.record.name.as_str();
        let probe = &self.config.status_probe;
        let spec = PollSpec::new(
            format!("{}/{} in {}", probe.kind, target.name, namespace),
            TargetState::Status(expected.to_string()),
            self.config.status_timing,
        );
        let client = &self.client;

        match ctx
            .poller
            .poll(&spec, || {
                client.workload_status(&probe.kind, &target.name, namespace, &probe.jsonpath)
            })
            .await
        {
            Ok(status) => Ok((status, None)),
            Err(PollError::Timeout { last, last_error, .. }) => {
                step_warn!(
                    TestStep::AwaitStatus,
                    "⏰ {} never reported {} (last error: {})",
                    target.name,
                    expected,
                    last_error.as_deref().unwrap_or("none")
                );
                Ok((last.unwrap_or_else(|| WorkloadStatus(String::new())), last_error))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start the pod's log capture. A capture that cannot start is a
    /// warning, not a failed run.
    async fn attach_pod_capture(
        &self,
        ctx: &RunContext<'_, E>,
        target: &WorkloadTarget,
        pod: &PodRow,
        state: &mut RunState,
    ) -> Option<std::path::PathBuf> {
        let namespace = ctx.record.name.as_str();
        let request = CaptureRequest::new(
            target.name.clone(),
            namespace,
            self.client
                .cluster()
                .follow_logs(namespace, &LogSource::Pod(pod.name.clone())),
            ctx.layout.capture_log(&target.name),
        );

        match ctx.captures.start(request).await {
            Ok(handle) => {
                state.report.target_mut(&target.name).capture_log = Some(handle.output_path.clone());
                Some(handle.output_path)
            }
            Err(e) => {
                step_warn!(TestStep::AttachCapture, "⚠️ No log capture for {}: {}", pod.name, e);
                state.report.warn(&e);
                None
            }
        }
    }

    async fn attach_controller_captures(&self, ctx: &RunContext<'_, E>, state: &mut RunState) {
        for controller in &self.config.controller_captures {
            let request = CaptureRequest::new(
                controller.label.clone(),
                controller.namespace.clone(),
                self.client
                    .cluster()
                    .follow_logs(&controller.namespace, &LogSource::Selector(controller.selector.clone())),
                ctx.layout.capture_log(&controller.label),
            );
            if let Err(e) = ctx.captures.start(request).await {
                step_warn!(TestStep::AttachCapture, "⚠️ No {} log capture: {}", controller.label, e);
                state.report.warn(&e);
            }
        }
    }

    /// Release everything the run holds. Every failure here is recorded as a
    /// warning and never changes the verdict.
    async fn cleanup(&self, ctx: &RunContext<'_, E>, state: &mut RunState) {
        let namespace = ctx.record.name.as_str();

        if state.owned {
            state.enter(TestStep::DumpResources);
            for dump in &self.config.dumps {
                let path = ctx.layout.resource_dump(&dump.file_stem());
                if let Err(e) = self
                    .client
                    .dump_resources(&dump.kind, dump.name.as_deref(), dump.namespace_or(namespace), &path)
                    .await
                {
                    step_warn!(TestStep::DumpResources, "⚠️ Could not dump {}: {}", dump, e);
                    state.report.warn(&TesterError::cleanup(format!("{dump} dump"), e.to_string()));
                }
            }
        }

        state.enter(TestStep::StopCaptures);
        let handles = ctx.captures.handles().await;
        for e in ctx.captures.stop_all().await {
            state.report.warn(&e);
        }
        for handle in &handles {
            let bytes = captured_bytes(&handle.output_path).await;
            step_debug!(TestStep::StopCaptures, "📼 {} captured {} bytes", handle.artifact_id, bytes);
        }

        if state.owned {
            state.enter(TestStep::Teardown);
            if let Err(e) = ctx.namespaces.teardown(ctx.record, self.config.teardown_grace).await {
                step_warn!(TestStep::Teardown, "⚠️ {}", e);
                state.report.warn(&e);
            }
        } else {
            step_info!(TestStep::Teardown, "⏭️ Namespace {} was not created by this run", namespace);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
