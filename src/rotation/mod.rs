//! # Rotation Orchestrator
//!
//! Drives the rotation protocol on a recurring timer: drain the pending
//! task queue, create a new secret generation per task, wait for the
//! cluster to converge, repoint affected service mounts, wait again, then
//! retire the superseded objects. Each task in a batch is processed
//! best-effort; a failure in one task's pipeline never blocks its siblings,
//! and nothing is retried within a cycle — a file whose content still
//! differs is simply re-detected later.

pub mod patcher;
pub mod plan;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusterApi, SecretSpec};
use crate::errors::Result;
use crate::queue::{UpdateQueue, UpdateTask};

pub use patcher::patch_services;
pub use plan::{resolve_rotation, RotationPlan, RotationRecord};

/// Timing and versioning parameters for the rotation pipeline.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Minimum dwell time from first detection before a batch is acted on
    pub update_interval: Duration,
    /// Timer tick period (shared with the detectors' poll cadence)
    pub update_detection_interval: Duration,
    /// Convergence delay between secret creation and service patching
    pub secret_wait_time: Duration,
    /// Convergence delay between service patching and secret retirement
    pub service_wait_time: Duration,
    /// Version suffix ceiling; versions wrap modulo this value
    pub max_versions: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(60),
            update_detection_interval: Duration::from_secs(5),
            secret_wait_time: Duration::from_secs(5),
            service_wait_time: Duration::from_secs(10),
            max_versions: 10,
        }
    }
}

/// Orchestrates rotation cycles against the Cluster Control API.
pub struct RotationOrchestrator {
    api: Arc<dyn ClusterApi>,
    queue: UpdateQueue,
    config: RotationConfig,
}

impl RotationOrchestrator {
    pub fn new(api: Arc<dyn ClusterApi>, queue: UpdateQueue, config: RotationConfig) -> Self {
        Self { api, queue, config }
    }

    /// Run the rotation timer until the shutdown future resolves.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.config.update_detection_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping rotation timer");
                    return;
                }
            }
        }
    }

    /// One timer tick: a no-op while the queue is empty or the batch is
    /// still younger than the dwell threshold, a full rotation cycle
    /// otherwise.
    pub async fn tick(&self) {
        let Some(first_detected) = self.queue.first_detected_at() else {
            debug!("No updates detected");
            return;
        };

        let batch_age = (Utc::now() - first_detected)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if batch_age < self.config.update_interval {
            debug!(
                batch_age_ms = batch_age.as_millis() as u64,
                dwell_ms = self.config.update_interval.as_millis() as u64,
                "Update detected but still inside the dwell window"
            );
            return;
        }

        let batch = self.queue.drain();
        info!(tasks = batch.len(), "Starting rotation cycle");
        self.rotate_batch(batch).await;
    }

    /// Run the create / converge / patch / converge / retire pipeline for
    /// one drained batch.
    pub async fn rotate_batch(&self, batch: Vec<UpdateTask>) {
        let mut rotations = Vec::with_capacity(batch.len());
        for task in batch {
            let canonical_name = task.canonical_name.clone();
            match self.create_new_generation(task).await {
                Ok(Some(rotation)) => rotations.push(rotation),
                Ok(None) => {}
                Err(e) => {
                    error!(secret = %canonical_name, error = %e, "Skipping rotation for this cycle");
                }
            }
        }

        if rotations.is_empty() {
            debug!("No secrets rotated this cycle");
            return;
        }

        info!(
            wait_ms = self.config.secret_wait_time.as_millis() as u64,
            "Created new secrets, waiting for the cluster to converge"
        );
        tokio::time::sleep(self.config.secret_wait_time).await;

        info!("Updating services");
        if let Err(e) = patch_services(self.api.as_ref(), &rotations).await {
            error!(error = %e, "Service patching failed, outdated secrets will still be retired");
        }

        info!(
            wait_ms = self.config.service_wait_time.as_millis() as u64,
            "Updated services, waiting for the cluster to converge"
        );
        tokio::time::sleep(self.config.service_wait_time).await;

        info!("Removing outdated secrets");
        for rotation in &rotations {
            for outdated in &rotation.outdated {
                info!(secret = %outdated.name, id = %outdated.id, "Removing outdated secret");
                if let Err(e) = self.api.remove_secret(&outdated.id).await {
                    error!(secret = %outdated.name, error = %e, "Could not remove outdated secret");
                }
            }
        }
    }

    /// Resolve one task against the live secret objects and create its new
    /// generation. Returns `None` when creation has to be skipped (name
    /// collision after wraparound).
    async fn create_new_generation(&self, task: UpdateTask) -> Result<Option<RotationRecord>> {
        let existing = self.api.list_secrets().await?;
        let plan = resolve_rotation(task, &existing, self.config.max_versions);

        if plan.name_collision() {
            warn!(
                secret = %plan.new_name,
                "Target name already exists on the cluster, skipping this rotation"
            );
            return Ok(None);
        }

        info!(
            secret = %plan.task.canonical_name,
            version = plan.new_version,
            outdated = plan.outdated.len(),
            "Creating new secret generation"
        );

        let labels = [
            ("secretspin.namespace".to_string(), plan.task.namespace.clone()),
            ("secretspin.canonical-name".to_string(), plan.task.canonical_name.clone()),
            ("secretspin.version".to_string(), plan.new_version.to_string()),
        ]
        .into_iter()
        .collect();

        let new_id = self
            .api
            .create_secret(SecretSpec {
                name: plan.new_name.clone(),
                data: plan.task.content.clone(),
                labels,
            })
            .await?;

        Ok(Some(RotationRecord {
            canonical_name: plan.task.canonical_name,
            new_id,
            new_name: plan.new_name,
            new_version: plan.new_version,
            outdated: plan.outdated,
        }))
    }
}
