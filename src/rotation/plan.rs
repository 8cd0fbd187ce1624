//! Rotation planning.
//!
//! Pure resolution of a pending task against the secret objects currently
//! listed on the cluster: which objects share the task's canonical name,
//! what version the replacement gets, and which objects become outdated.

use crate::cluster::SecretObject;
use crate::naming::{parse_versioned_name, versioned_name};
use crate::queue::UpdateTask;

/// Resolved rotation for one task: the name and version of the secret to
/// create, and every existing object it supersedes.
#[derive(Debug, Clone)]
pub struct RotationPlan {
    pub task: UpdateTask,
    /// Versioned object name for the new secret
    pub new_name: String,
    pub new_version: u64,
    /// Existing objects sharing the canonical name, all superseded
    pub outdated: Vec<SecretObject>,
}

impl RotationPlan {
    /// Whether an object with the replacement's name already exists on the
    /// cluster. Creation would be rejected (names are unique), so the
    /// orchestrator skips such a task and lets a later cycle re-resolve it.
    pub fn name_collision(&self) -> bool {
        self.outdated.iter().any(|s| s.name == self.new_name)
    }
}

/// Resolve one task against the listed secret objects.
///
/// Versions increment by 1 modulo `max_versions` over the highest existing
/// version for the canonical name. A secret with no existing objects at all
/// starts at the implicit version 0 (bare canonical name); an absent or
/// non-numeric suffix on an existing object also counts as version 0.
pub fn resolve_rotation(
    task: UpdateTask,
    existing: &[SecretObject],
    max_versions: u64,
) -> RotationPlan {
    let outdated: Vec<SecretObject> = existing
        .iter()
        .filter(|s| parse_versioned_name(&s.name).0 == task.canonical_name)
        .cloned()
        .collect();

    // wrapping_add: a foreign object with a huge numeric suffix must not
    // panic the planner, the modulo keeps the result in range either way
    let new_version = match outdated.iter().map(|s| parse_versioned_name(&s.name).1).max() {
        Some(current_max) => current_max.wrapping_add(1) % max_versions,
        None => 0,
    };

    let new_name = versioned_name(&task.canonical_name, new_version);
    RotationPlan { task, new_name, new_version, outdated }
}

/// A rotation carried through secret creation: the plan plus the platform
/// identifier of the newly created object. Input unit for the service
/// patcher and the retiring step.
#[derive(Debug, Clone)]
pub struct RotationRecord {
    pub canonical_name: String,
    pub new_id: String,
    pub new_name: String,
    pub new_version: u64,
    pub outdated: Vec<SecretObject>,
}
