//! Suite Configuration Builder
//!
//! Fluent construction of [`SuiteConfig`], starting from the defaults

use super::{ControllerCapture, PreflightAction, ResourceDump, StatusProbe, SuiteConfig, WorkloadTarget};
use crate::runtime::poller::PollTiming;
use shared::KeyValuePair;
use std::path::PathBuf;
use std::time::Duration;

pub struct SuiteConfigBuilder {
    config: SuiteConfig,
}

impl SuiteConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SuiteConfig::default(),
        }
    }

    /// Cluster CLI binary (`oc`, `kubectl`, or a path)
    pub fn cli<S: Into<String>>(mut self, cli: S) -> Self {
        self.config.cli = cli.into();
        self
    }

    pub fn artifacts_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.artifacts_root = root.into();
        self
    }

    pub fn manifest_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.manifest_dir = dir.into();
        self
    }

    /// Append one target
    pub fn target(mut self, target: WorkloadTarget) -> Self {
        self.config.targets.push(target);
        self
    }

    pub fn targets<I: IntoIterator<Item = WorkloadTarget>>(mut self, targets: I) -> Self {
        self.config.targets.extend(targets);
        self
    }

    /// Environment passed to every spawned command
    pub fn envs(mut self, envs: Vec<KeyValuePair>) -> Self {
        self.config.envs = envs;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    pub fn pod_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.pod_timing = PollTiming::new(interval, timeout);
        self
    }

    pub fn status_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.status_timing = PollTiming::new(interval, timeout);
        self
    }

    pub fn namespace_removal(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.namespace_removal = PollTiming::new(interval, timeout);
        self
    }

    pub fn teardown_grace(mut self, grace: Duration) -> Self {
        self.config.teardown_grace = grace;
        self
    }

    pub fn capture_stop_grace(mut self, grace: Duration) -> Self {
        self.config.capture_stop_grace = grace;
        self
    }

    /// Outer bound for one test run, cleanup excluded
    pub fn test_timeout(mut self, timeout: Duration) -> Self {
        self.config.test_timeout = timeout;
        self
    }

    pub fn status_probe(mut self, probe: StatusProbe) -> Self {
        self.config.status_probe = probe;
        self
    }

    pub fn controller_captures(mut self, captures: Vec<ControllerCapture>) -> Self {
        self.config.controller_captures = captures;
        self
    }

    /// Skip the controller log captures
    pub fn without_controller_captures(mut self) -> Self {
        self.config.controller_captures.clear();
        self
    }

    pub fn dump_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.dumps = kinds.into_iter().map(ResourceDump::kind).collect();
        self
    }

    pub fn dumps<I: IntoIterator<Item = ResourceDump>>(mut self, dumps: I) -> Self {
        self.config.dumps = dumps.into_iter().collect();
        self
    }

    pub fn preflight(mut self, action: PreflightAction) -> Self {
        self.config.preflight.push(action);
        self
    }

    pub fn keep_namespaces(mut self, keep: bool) -> Self {
        self.config.keep_namespaces = keep;
        self
    }

    pub fn build(self) -> SuiteConfig {
        self.config
    }
}

impl Default for SuiteConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
