//! In-memory domain tree and membership seats

use crate::fault::FaultSwitch;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use triad_core::effects::{DomainDirectoryEffects, DomainSeatStoreEffects};
use triad_core::{
    ConsoleError, ConsoleResult, Domain, DomainId, DomainSeat, DomainSeatId, DomainSeatStatus,
};

/// Domain tree backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDomainDirectory {
    domains: Arc<RwLock<BTreeMap<DomainId, Domain>>>,
    fault: FaultSwitch,
}

impl MemoryDomainDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a reachability switch with other handlers
    pub fn with_fault(mut self, fault: FaultSwitch) -> Self {
        self.fault = fault;
        self
    }

    /// The directory's reachability switch
    pub fn fault(&self) -> &FaultSwitch {
        &self.fault
    }

    /// Add or replace a domain
    ///
    /// Parents are not checked here; dangling parents surface as `NotFound`
    /// when the chain is walked.
    pub fn insert(&self, domain: Domain) {
        self.domains.write().insert(domain.id.clone(), domain);
    }

    /// All known domains, ordered by id
    pub fn all(&self) -> Vec<Domain> {
        self.domains.read().values().cloned().collect()
    }
}

#[async_trait]
impl DomainDirectoryEffects for MemoryDomainDirectory {
    async fn get_domain(&self, domain_id: &DomainId) -> ConsoleResult<Domain> {
        self.fault.check("domain directory")?;
        self.domains
            .read()
            .get(domain_id)
            .cloned()
            .ok_or_else(|| ConsoleError::not_found(format!("domain {domain_id} not found")))
    }

    async fn children(&self, domain_id: &DomainId) -> ConsoleResult<Vec<Domain>> {
        self.fault.check("domain directory")?;
        Ok(self
            .domains
            .read()
            .values()
            .filter(|d| d.parent_id.as_ref() == Some(domain_id))
            .cloned()
            .collect())
    }
}

/// Domain membership seats backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDomainSeatStore {
    seats: Arc<RwLock<HashMap<DomainSeatId, DomainSeat>>>,
    fault: FaultSwitch,
}

impl MemoryDomainSeatStore {
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
}

#[async_trait]
impl DomainSeatStoreEffects for MemoryDomainSeatStore {
    async fn insert(&self, seat: DomainSeat) -> ConsoleResult<()> {
        self.fault.check("domain seat store")?;
        let mut seats = self.seats.write();
        if seats.contains_key(&seat.id) {
            return Err(ConsoleError::invalid(format!(
                "domain seat {} already exists",
                seat.id
            )));
        }
        seats.insert(seat.id, seat);
        Ok(())
    }

    async fn load(&self, id: DomainSeatId) -> ConsoleResult<DomainSeat> {
        self.fault.check("domain seat store")?;
        self.seats
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| ConsoleError::not_found(format!("domain seat {id} not found")))
    }

    async fn list_for_domain(&self, domain_id: &DomainId) -> ConsoleResult<Vec<DomainSeat>> {
        self.fault.check("domain seat store")?;
        let mut seats: Vec<DomainSeat> = self
            .seats
            .read()
            .values()
            .filter(|s| &s.domain_id == domain_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.id);
        Ok(seats)
    }

    async fn transition(
        &self,
        id: DomainSeatId,
        expected: DomainSeatStatus,
        next: DomainSeatStatus,
    ) -> ConsoleResult<DomainSeat> {
        self.fault.check("domain seat store")?;
        let mut seats = self.seats.write();
        let seat = seats
            .get_mut(&id)
            .ok_or_else(|| ConsoleError::not_found(format!("domain seat {id} not found")))?;
        if seat.status != expected {
            return Err(ConsoleError::conflict(format!(
                "domain seat {id} is {}, expected {expected}",
                seat.status
            )));
        }
        seat.status = next;
        Ok(seat.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn children_are_direct_only() {
        let dir = MemoryDomainDirectory::new();
        dir.insert(Domain::root("acme", "Acme"));
        dir.insert(Domain::child("ops", "acme", "Ops"));
        dir.insert(Domain::child("ops.ci", "ops", "CI"));
        let kids = dir.children(&DomainId::new("acme")).await.unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].id.as_str(), "ops");
        assert_matches!(
            dir.get_domain(&DomainId::new("nope")).await,
            Err(ConsoleError::NotFound { .. })
        );
    }
}
