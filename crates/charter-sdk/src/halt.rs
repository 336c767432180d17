use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// System-wide halt signal.
///
/// Consulted before every write. Reads, proofs, exports, and verification
/// keep working while halted so the record can still be audited.
pub trait HaltChecker: Send + Sync {
    fn is_halted(&self) -> bool;

    fn halt_reason(&self) -> Option<String>;
}

/// Never halts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverHalted;

impl HaltChecker for NeverHalted {
    fn is_halted(&self) -> bool {
        false
    }

    fn halt_reason(&self) -> Option<String> {
        None
    }
}

/// Process-local halt switch, flipped by an operator or a breach handler.
#[derive(Debug, Default)]
pub struct HaltSwitch {
    halted: AtomicBool,
    reason: RwLock<Option<String>>,
}

impl HaltSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.reason.write() {
            *slot = Some(reason.into());
        }
        self.halted.store(true, Ordering::SeqCst);
        tracing::warn!("ledger writes halted");
    }

    pub fn resume(&self) {
        self.halted.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.reason.write() {
            *slot = None;
        }
        tracing::info!("ledger writes resumed");
    }
}

impl HaltChecker for HaltSwitch {
    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn halt_reason(&self) -> Option<String> {
        self.reason.read().ok().and_then(|r| r.clone())
    }
}
