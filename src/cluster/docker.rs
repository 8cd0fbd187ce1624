//! Docker Engine REST implementation of the Cluster Control API.
//!
//! Talks to a Swarm manager's Engine API over HTTP (`/secrets`, `/services`
//! and friends). Service updates use the Engine's optimistic concurrency:
//! the update call carries the version index read when the service was
//! listed, and a stale index is reported back as a conflict.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{Error, Result};

use super::{ClusterApi, SecretObject, SecretSpec, ServiceObject, ServiceSpec};

/// Docker Engine API client configuration.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Engine API base URL, e.g. `http://localhost:2375`
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self { endpoint: "http://localhost:2375".to_string(), timeout: Duration::from_secs(30) }
    }
}

/// Cluster Control API backed by the Docker Engine REST API.
#[derive(Debug, Clone)]
pub struct DockerClusterApi {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SecretListItem {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Spec")]
    spec: SecretListSpec,
}

#[derive(Debug, Deserialize)]
struct SecretListSpec {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Labels", default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(rename = "ID", alias = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ServiceListItem {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Version")]
    version: ObjectVersion,
    #[serde(rename = "Spec")]
    spec: ServiceSpec,
}

#[derive(Debug, Deserialize)]
struct ObjectVersion {
    #[serde(rename = "Index")]
    index: u64,
}

impl DockerClusterApi {
    /// Create a new Engine API client.
    pub fn new(config: &DockerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::control_api(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint: config.endpoint.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("status {}: {}", status, body)
    }
}

#[async_trait]
impl ClusterApi for DockerClusterApi {
    async fn list_secrets(&self) -> Result<Vec<SecretObject>> {
        let url = self.url("/secrets");
        debug!(%url, "Listing secrets");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::control_api(format!("List secrets failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::control_api(format!(
                "List secrets rejected, {}",
                Self::error_body(response).await
            )));
        }
        let items: Vec<SecretListItem> = response
            .json()
            .await
            .map_err(|e| Error::control_api(format!("Malformed secret list: {}", e)))?;
        Ok(items
            .into_iter()
            .map(|s| SecretObject { id: s.id, name: s.spec.name, labels: s.spec.labels })
            .collect())
    }

    async fn create_secret(&self, spec: SecretSpec) -> Result<String> {
        let url = self.url("/secrets/create");
        debug!(%url, secret = %spec.name, "Creating secret");
        let body = serde_json::json!({
            "Name": spec.name,
            "Data": spec.data,
            "Labels": spec.labels,
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::control_api(format!("Create secret failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::control_api(format!(
                "Create secret {} rejected, {}",
                spec.name,
                Self::error_body(response).await
            )));
        }
        let created: IdResponse = response
            .json()
            .await
            .map_err(|e| Error::control_api(format!("Malformed create response: {}", e)))?;
        Ok(created.id)
    }

    async fn remove_secret(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/secrets/{}", id));
        debug!(%url, "Removing secret");
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| Error::control_api(format!("Remove secret failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::control_api(format!(
                "Remove secret {} rejected, {}",
                id,
                Self::error_body(response).await
            )));
        }
        Ok(())
    }

    async fn list_services(&self) -> Result<Vec<ServiceObject>> {
        let url = self.url("/services");
        debug!(%url, "Listing services");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::control_api(format!("List services failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::control_api(format!(
                "List services rejected, {}",
                Self::error_body(response).await
            )));
        }
        let items: Vec<ServiceListItem> = response
            .json()
            .await
            .map_err(|e| Error::control_api(format!("Malformed service list: {}", e)))?;
        Ok(items
            .into_iter()
            .map(|s| ServiceObject { id: s.id, version_index: s.version.index, spec: s.spec })
            .collect())
    }

    async fn update_service(&self, id: &str, version_index: u64, spec: &ServiceSpec) -> Result<()> {
        let url = self.url(&format!("/services/{}/update?version={}", id, version_index));
        debug!(%url, service = %spec.name, version_index, "Updating service");
        let response = self
            .client
            .post(&url)
            .json(spec)
            .send()
            .await
            .map_err(|e| Error::control_api(format!("Update service failed: {}", e)))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        // The Engine reports a stale version index either as 409 or as an
        // "update out of sequence" rpc error.
        if status == reqwest::StatusCode::CONFLICT || body.contains("out of sequence") {
            return Err(Error::conflict(format!(
                "Service {} update at version {} rejected: {}",
                id, version_index, body
            )));
        }
        Err(Error::control_api(format!(
            "Update service {} rejected, status {}: {}",
            id, status, body
        )))
    }
}
