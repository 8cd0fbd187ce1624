//! Service patching.
//!
//! Repoints every service mount that references a superseded secret onto the
//! newly created generation. Services are listed once per invocation; each
//! affected service receives exactly one update call, carrying the version
//! index read in that same listing pass (optimistic concurrency). A rejected
//! update leaves the service on the old secret; the next cycle recomputes
//! outdated objects from scratch, so conflicts self-heal.

use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::cluster::{ClusterApi, SecretReference, ServiceObject};
use crate::errors::Result;

use super::plan::RotationRecord;

/// Patch every service referencing an outdated secret onto its replacement.
///
/// Errors from individual service updates are logged and swallowed; only a
/// failure to list services propagates.
pub async fn patch_services(api: &dyn ClusterApi, rotations: &[RotationRecord]) -> Result<()> {
    // outdated secret id -> replacement
    let replacements: HashMap<&str, &RotationRecord> = rotations
        .iter()
        .flat_map(|r| r.outdated.iter().map(move |s| (s.id.as_str(), r)))
        .collect();

    if replacements.is_empty() {
        debug!("No outdated secrets, nothing to patch");
        return Ok(());
    }

    let services = api.list_services().await?;
    for service in services {
        patch_one_service(api, &replacements, service).await;
    }
    Ok(())
}

async fn patch_one_service(
    api: &dyn ClusterApi,
    replacements: &HashMap<&str, &RotationRecord>,
    mut service: ServiceObject,
) {
    let Some(mounts) = service.spec.task_template.container_spec.secrets.as_mut() else {
        debug!(service = %service.spec.name, "No secret mounts, skipping");
        return;
    };

    let mut patched = Vec::new();
    for mount in mounts.iter_mut() {
        if let Some(rotation) = replacements.get(mount.secret_id.as_str()) {
            patched.push((mount.secret_name.clone(), rotation.new_name.clone()));
            *mount = SecretReference {
                file: mount.file.clone(),
                secret_id: rotation.new_id.clone(),
                secret_name: rotation.new_name.clone(),
            };
        }
    }

    if patched.is_empty() {
        debug!(service = %service.spec.name, "No outdated mounts, skipping");
        return;
    }

    info!(
        service = %service.spec.name,
        version_index = service.version_index,
        mounts = ?patched,
        "Updating service to replace outdated secret mounts"
    );
    if let Err(e) = api.update_service(&service.id, service.version_index, &service.spec).await {
        if e.is_conflict() {
            error!(
                service = %service.spec.name,
                error = %e,
                "Service update conflicted, leaving it on the old secret until the next cycle"
            );
        } else {
            error!(service = %service.spec.name, error = %e, "Could not update service");
        }
    }
}
