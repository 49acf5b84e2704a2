//! In-memory receipt log

use crate::fault::FaultSwitch;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use triad_core::effects::ReceiptLogEffects;
use triad_core::{ConsoleError, ConsoleResult, Receipt, ReceiptId};

/// Append-only receipt log backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryReceiptLog {
    entries: Arc<RwLock<Vec<Receipt>>>,
    fault: FaultSwitch,
}

impl MemoryReceiptLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a reachability switch with other handlers
    pub fn with_fault(mut self, fault: FaultSwitch) -> Self {
        self.fault = fault;
        self
    }

    /// The log's reachability switch
    pub fn fault(&self) -> &FaultSwitch {
        &self.fault
    }

    /// Number of receipts
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing was appended yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every receipt in append order
    pub fn snapshot(&self) -> Vec<Receipt> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl ReceiptLogEffects for MemoryReceiptLog {
    async fn append(&self, receipt: Receipt) -> ConsoleResult<()> {
        self.fault.check("receipt log")?;
        let mut entries = self.entries.write();
        if entries.iter().any(|r| r.id == receipt.id) {
            return Err(ConsoleError::invalid(format!(
                "receipt {} already recorded",
                receipt.id
            )));
        }
        entries.push(receipt);
        Ok(())
    }

    async fn get(&self, id: ReceiptId) -> ConsoleResult<Receipt> {
        self.fault.check("receipt log")?;
        self.entries
            .read()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ConsoleError::not_found(format!("receipt {id} not found")))
    }

    async fn list(&self) -> ConsoleResult<Vec<Receipt>> {
        self.fault.check("receipt log")?;
        Ok(self.snapshot())
    }
}
