// ============================================================
// Layer 3 — Run Control
// ============================================================
// Mode is passed explicitly into every forward pass; there is
// no global "training" flag anywhere in the crate.
//
// StopSignal is the one piece of shared state: a flag another
// thread (a Ctrl-C handler, a UI, a test) can raise while the
// trainer is running. The trainer polls it between batches.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Forward-pass mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Dropout layers zero units at random and rescale survivors
    Train,
    /// Dropout layers are the identity
    Eval,
}

impl Mode {
    pub fn is_train(self) -> bool {
        self == Mode::Train
    }
}

/// Cloneable handle used to ask a running training loop to stop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_stopped());

        handle.stop();
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_mode() {
        assert!(Mode::Train.is_train());
        assert!(!Mode::Eval.is_train());
    }
}
