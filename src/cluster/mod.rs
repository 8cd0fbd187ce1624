//! # Cluster Control API
//!
//! Abstraction over the container platform's control plane. The rotation
//! pipeline only ever talks to the cluster through the [`ClusterApi`] trait:
//! listing and creating secret objects, removing retired ones, and listing
//! and updating services with optimistic concurrency. The production
//! implementation is [`docker::DockerClusterApi`]; tests substitute an
//! in-memory mock.

pub mod docker;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub use docker::DockerClusterApi;

/// A secret object as listed from the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretObject {
    /// Platform identifier
    pub id: String,
    /// Object name (`<canonical_name>` or `<canonical_name>.<version>`)
    pub name: String,
    /// Object labels
    pub labels: BTreeMap<String, String>,
}

/// Request to create a new secret object.
#[derive(Debug, Clone)]
pub struct SecretSpec {
    /// Versioned object name
    pub name: String,
    /// Base64-encoded payload
    pub data: String,
    /// Labels applied to the new object
    pub labels: BTreeMap<String, String>,
}

/// One secret mount inside a service's container spec.
///
/// Wire-faithful to the Docker Engine API (PascalCase fields); the `file`
/// target is preserved verbatim when a mount is repointed at a new secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretReference {
    #[serde(rename = "File")]
    pub file: serde_json::Value,
    #[serde(rename = "SecretID")]
    pub secret_id: String,
    #[serde(rename = "SecretName")]
    pub secret_name: String,
}

/// Container spec subset: the secret mounts we rewrite, every other field
/// carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(rename = "Secrets", default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<SecretReference>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Task template subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    #[serde(rename = "ContainerSpec", default)]
    pub container_spec: ContainerSpec,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Full service spec, round-tripped on update. Unknown fields are retained
/// so an update carries the complete spec back to the cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "TaskTemplate", default)]
    pub task_template: TaskTemplate,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A service as listed from the cluster, with the version index needed for
/// optimistic-concurrency updates.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceObject {
    pub id: String,
    pub version_index: u64,
    pub spec: ServiceSpec,
}

/// Control-plane operations required by the rotation pipeline.
///
/// Implementations classify optimistic-concurrency rejections of
/// `update_service` as [`crate::Error::Conflict`]; every other failure maps
/// to [`crate::Error::ControlApi`].
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List all secret objects on the cluster.
    async fn list_secrets(&self) -> Result<Vec<SecretObject>>;

    /// Create a new secret object, returning its platform identifier.
    async fn create_secret(&self, spec: SecretSpec) -> Result<String>;

    /// Remove a secret object by identifier.
    async fn remove_secret(&self, id: &str) -> Result<()>;

    /// List all services with their current version indexes.
    async fn list_services(&self) -> Result<Vec<ServiceObject>>;

    /// Update a service's spec at the given version index.
    async fn update_service(&self, id: &str, version_index: u64, spec: &ServiceSpec) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_spec_round_trips_unknown_fields() {
        let wire = serde_json::json!({
            "Name": "web",
            "Labels": {"tier": "frontend"},
            "TaskTemplate": {
                "ContainerSpec": {
                    "Image": "nginx:1.27",
                    "Secrets": [{
                        "File": {"Name": "db_password", "UID": "0", "GID": "0", "Mode": 292},
                        "SecretID": "abc123",
                        "SecretName": "prod_run_secrets_db_password_txt"
                    }]
                },
                "Placement": {"Constraints": ["node.role==worker"]}
            },
            "Mode": {"Replicated": {"Replicas": 3}}
        });

        let spec: ServiceSpec = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(spec.name, "web");
        let secrets = spec.task_template.container_spec.secrets.as_ref().unwrap();
        assert_eq!(secrets[0].secret_id, "abc123");

        // fields we do not model survive the round trip
        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["Mode"], wire["Mode"]);
        assert_eq!(back["TaskTemplate"]["Placement"], wire["TaskTemplate"]["Placement"]);
        assert_eq!(back["TaskTemplate"]["ContainerSpec"]["Image"], "nginx:1.27");
    }

    #[test]
    fn test_container_spec_without_secrets() {
        let spec: ContainerSpec = serde_json::from_value(serde_json::json!({
            "Image": "redis:7"
        }))
        .unwrap();
        assert!(spec.secrets.is_none());

        let back = serde_json::to_value(&spec).unwrap();
        assert!(back.get("Secrets").is_none(), "absent mounts stay absent");
    }
}
