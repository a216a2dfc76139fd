//! Hierarchy nodes.

use census_upstream::{RawResource, ResourceKind};
use serde::{Deserialize, Serialize};

/// Lifecycle states treated as "active".
///
/// Compartments and MySQL db systems report `ACTIVE`; db homes and databases
/// report `AVAILABLE`.
pub const ACTIVE_STATES: &[&str] = &["ACTIVE", "AVAILABLE"];

/// Whether a lifecycle state counts as active (case-insensitive).
pub fn is_active_state(state: &str) -> bool {
    ACTIVE_STATES.iter().any(|s| s.eq_ignore_ascii_case(state))
}

/// Exadata states that still take maintenance runs besides the active ones.
pub const EXADATA_BUSY_STATES: &[&str] = &["UPDATING", "MAINTENANCE_IN_PROGRESS"];

/// A node discovered while walking the hierarchy. Never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub parent_id: String,
    /// Compartment that owns this node (itself, for compartments)
    pub compartment_id: String,
    pub lifecycle_state: String,
}

impl ResourceNode {
    /// The root of a run (usually the tenancy), treated as a compartment.
    pub fn root(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ResourceKind::Compartment,
            parent_id: String::new(),
            compartment_id: id.to_string(),
            lifecycle_state: "ACTIVE".to_string(),
        }
    }

    /// Compartments own themselves; the upstream's `compartmentId` on a
    /// compartment names its parent, which is already `parent_id`.
    pub fn from_raw(kind: ResourceKind, parent_id: &str, raw: RawResource) -> Self {
        let compartment_id = match kind {
            ResourceKind::Compartment => raw.id.clone(),
            _ => raw.compartment_id,
        };
        Self {
            id: raw.id,
            name: raw.name,
            kind,
            parent_id: parent_id.to_string(),
            compartment_id,
            lifecycle_state: raw.lifecycle_state,
        }
    }

    pub fn is_active(&self) -> bool {
        if is_active_state(&self.lifecycle_state) {
            return true;
        }
        self.kind == ResourceKind::ExadataInfrastructure
            && EXADATA_BUSY_STATES
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&self.lifecycle_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states_cover_both_vocabularies() {
        assert!(is_active_state("ACTIVE"));
        assert!(is_active_state("AVAILABLE"));
        assert!(is_active_state("available"));
        assert!(!is_active_state("DELETED"));
        assert!(!is_active_state("TERMINATED"));
        assert!(!is_active_state(""));
    }

    #[test]
    fn test_from_raw_keeps_parent_and_compartment() {
        let raw = RawResource::new("d1", "ORCL", "c1", "AVAILABLE");
        let node = ResourceNode::from_raw(ResourceKind::Database, "h1", raw);
        assert_eq!(node.parent_id, "h1");
        assert_eq!(node.compartment_id, "c1");
        assert_eq!(node.kind, ResourceKind::Database);
        assert!(node.is_active());
    }

    #[test]
    fn test_compartment_owns_itself() {
        let raw = RawResource::new("c7", "finance", "tenancy", "ACTIVE");
        let node = ResourceNode::from_raw(ResourceKind::Compartment, "tenancy", raw);
        assert_eq!(node.compartment_id, "c7");
        assert_eq!(node.parent_id, "tenancy");
    }

    #[test]
    fn test_exadata_under_maintenance_stays_active() {
        let busy = RawResource::new("exa1", "exa-prod", "c1", "MAINTENANCE_IN_PROGRESS");
        let node = ResourceNode::from_raw(ResourceKind::ExadataInfrastructure, "c1", busy.clone());
        assert!(node.is_active());

        let db = ResourceNode::from_raw(ResourceKind::Database, "h1", busy);
        assert!(!db.is_active());
    }

    #[test]
    fn test_root_is_its_own_compartment() {
        let root = ResourceNode::root("ocid1.tenancy.oc1..x", "acme");
        assert_eq!(root.compartment_id, root.id);
        assert_eq!(root.kind, ResourceKind::Compartment);
    }
}
