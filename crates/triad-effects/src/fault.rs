//! Reachability switch shared by the in-memory handlers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use triad_core::{ConsoleError, ConsoleResult};

/// Simulates the collaborator being unreachable
///
/// Clones share the same switch, so one handle can take several handlers
/// offline at once.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch {
    down: Arc<AtomicBool>,
}

impl FaultSwitch {
    /// Switch starting in the reachable state
    pub fn new() -> Self {
        Self::default()
    }

    /// Make calls fail with `Transient`
    pub fn take_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    /// Make calls succeed again
    pub fn restore(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    /// Whether calls currently fail
    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    /// `Err(Transient)` naming `what` when down
    pub fn check(&self, what: &str) -> ConsoleResult<()> {
        if self.is_down() {
            Err(ConsoleError::transient(format!("{what} unreachable")))
        } else {
            Ok(())
        }
    }
}
