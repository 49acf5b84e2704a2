//! In-memory policy store

use crate::fault::FaultSwitch;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use triad_core::effects::PolicyStoreEffects;
use triad_core::{ConsoleResult, DomainId, PolicyVersion, StoredPolicy};

/// One accepted write, kept for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Domain whose authority performed the write
    pub committed_by: DomainId,
    /// Domain whose slot was written
    pub domain_id: DomainId,
    /// Resulting version
    pub version: PolicyVersion,
}

/// Local policy slots backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryPolicyStore {
    slots: Arc<RwLock<HashMap<DomainId, StoredPolicy>>>,
    commits: Arc<RwLock<Vec<CommitRecord>>>,
    fault: FaultSwitch,
}

impl MemoryPolicyStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a reachability switch with other handlers
    pub fn with_fault(mut self, fault: FaultSwitch) -> Self {
        self.fault = fault;
        self
    }

    /// The store's reachability switch
    pub fn fault(&self) -> &FaultSwitch {
        &self.fault
    }

    /// Seed a slot at revision 1 without recording a commit
    pub fn seed(&self, domain_id: impl Into<DomainId>, text: impl Into<String>) {
        let text = text.into();
        let version = PolicyVersion::new(1, &text);
        self.slots
            .write()
            .insert(domain_id.into(), StoredPolicy { text, version });
    }

    /// Accepted writes in order
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.commits.read().clone()
    }
}

#[async_trait]
impl PolicyStoreEffects for MemoryPolicyStore {
    async fn read_local(&self, domain_id: &DomainId) -> ConsoleResult<Option<StoredPolicy>> {
        self.fault.check("policy store")?;
        Ok(self.slots.read().get(domain_id).cloned())
    }

    async fn commit_local(
        &self,
        committed_by: &DomainId,
        domain_id: &DomainId,
        text: String,
    ) -> ConsoleResult<PolicyVersion> {
        self.fault.check("policy store")?;
        let version = {
            let mut slots = self.slots.write();
            let revision = slots
                .get(domain_id)
                .map(|slot| slot.version.revision + 1)
                .unwrap_or(1);
            let version = PolicyVersion::new(revision, &text);
            slots.insert(domain_id.clone(), StoredPolicy { text, version });
            version
        };
        self.commits.write().push(CommitRecord {
            committed_by: committed_by.clone(),
            domain_id: domain_id.clone(),
            version,
        });
        tracing::debug!(domain = %domain_id, by = %committed_by, revision = version.revision, "policy slot committed");
        Ok(version)
    }
}
