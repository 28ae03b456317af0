//! Ephemeral namespace lifecycle
//!
//! Every run gets its own namespace. `ensure_absent` clears leftovers from
//! an earlier run, `create` refuses to reuse a name, and `teardown` deletes
//! what the run created within a grace period long enough for finalizers.

use std::time::Duration;

use shared::NamespaceRecord;

use crate::error::{TesterError, TesterResult};
use crate::runtime::cluster::{ClusterClient, Presence};
use crate::runtime::poller::{PollError, PollSpec, PollTiming, ResourcePoller, TargetState};
use crate::traits::CommandExecutor;

/// Default wait for a pre-existing namespace to disappear
pub const DEFAULT_REMOVAL_TIMING: PollTiming = PollTiming {
    interval: Duration::from_secs(2),
    timeout: Duration::from_secs(300),
};

pub struct NamespaceLifecycleController<E: CommandExecutor> {
    client: ClusterClient<E>,
    poller: ResourcePoller,
    removal: PollTiming,
}

impl<E: CommandExecutor> NamespaceLifecycleController<E> {
    pub fn new(client: ClusterClient<E>) -> Self {
        Self {
            client,
            poller: ResourcePoller::new(),
            removal: DEFAULT_REMOVAL_TIMING,
        }
    }

    /// Poller used by setup waits; cancelling it interrupts `ensure_absent`
    pub fn with_poller(mut self, poller: ResourcePoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_removal_timing(mut self, removal: PollTiming) -> Self {
        self.removal = removal;
        self
    }

    pub async fn exists(&self, name: &str) -> TesterResult<bool> {
        Ok(self.client.namespace_presence(name).await? == Presence::Present)
    }

    /// Make sure `name` does not exist, deleting it and waiting for removal
    /// when it does. Safe to call any number of times.
    pub async fn ensure_absent(&self, name: &str) -> TesterResult<()> {
        if !self.exists(name).await? {
            tracing::debug!("Namespace {} is already absent", name);
            return Ok(());
        }

        tracing::info!("🧹 Namespace {} left over from an earlier run, deleting", name);
        self.client.run(&self.client.cluster().delete_namespace(name)).await?;
        self.wait_absent(&self.poller, name, self.removal).await?;
        Ok(())
    }

    /// Create `name` and label it with the fixture's display name and
    /// description. An existing namespace is a `NamespaceExists` error.
    pub async fn create(&self, name: &str, display_name: &str, description: &str) -> TesterResult<()> {
        self.verify_unused(name).await?;
        self.provision(name, display_name, description).await
    }

    /// `NamespaceExists` when `name` is already taken
    pub async fn verify_unused(&self, name: &str) -> TesterResult<()> {
        if self.exists(name).await? {
            return Err(TesterError::NamespaceExists { name: name.to_string() });
        }
        Ok(())
    }

    /// Issue the create and annotate commands without checking for an
    /// existing namespace first
    pub async fn provision(&self, name: &str, display_name: &str, description: &str) -> TesterResult<()> {
        let cluster = self.client.cluster();
        self.client.run(&cluster.create_namespace(name)).await?;
        self.client
            .run(&cluster.annotate_namespace(name, display_name, description))
            .await?;

        tracing::info!("🏗️ Created namespace {} ({})", name, display_name);
        Ok(())
    }

    /// Delete the run's namespace and wait up to `grace` for it to go.
    ///
    /// Records that are not marked for deletion are left alone. The wait
    /// cannot be cancelled; it is bounded by `grace` only.
    pub async fn teardown(&self, record: &NamespaceRecord, grace: Duration) -> TesterResult<()> {
        if !record.delete_on_teardown {
            tracing::info!("⏭️ Namespace {} is not ours to delete, leaving it", record.name);
            return Ok(());
        }

        let name = record.name.as_str();
        tracing::info!("🗑️ Tearing down namespace {} (grace {:?})", name, grace);

        if let Err(e) = self.client.run(&self.client.cluster().delete_namespace(name)).await {
            return Err(TesterError::cleanup(format!("namespace/{name}"), e.to_string()));
        }

        let timing = PollTiming::new(self.removal.interval, grace);
        match self.wait_absent(&ResourcePoller::new(), name, timing).await {
            Ok(()) => {
                tracing::info!("✅ Namespace {} removed", name);
                Ok(())
            }
            Err(PollError::Timeout { .. }) => Err(TesterError::TeardownTimeout {
                name: name.to_string(),
                grace,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_absent(
        &self,
        poller: &ResourcePoller,
        name: &str,
        timing: PollTiming,
    ) -> Result<(), PollError<Presence>> {
        let spec = PollSpec::new(format!("namespace/{name}"), TargetState::Absent, timing);
        let client = &self.client;
        poller
            .poll(&spec, || client.namespace_presence(name))
            .await
            .map(|_| ())
    }
}
