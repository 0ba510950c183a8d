//! Exporter registration state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of an optional exporter registration.
///
/// `Registered` and `GaveUp` are terminal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterState {
    Unregistered = 0,
    Registered = 1,
    GaveUp = 2,
}

impl ExporterState {
    pub fn is_terminal(self) -> bool {
        self != ExporterState::Unregistered
    }
}

impl From<u8> for ExporterState {
    fn from(val: u8) -> Self {
        match val {
            1 => ExporterState::Registered,
            2 => ExporterState::GaveUp,
            _ => ExporterState::Unregistered,
        }
    }
}

/// Shared, lock-free view of an [`ExporterState`].
#[derive(Debug, Clone, Default)]
pub struct ExporterStatus {
    state: Arc<AtomicU8>,
}

impl ExporterStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ExporterState {
        ExporterState::from(self.state.load(Ordering::Acquire))
    }

    /// Move out of `Unregistered`. Returns false if a terminal state was
    /// already reached, in which case nothing changes.
    pub fn finish(&self, outcome: ExporterState) -> bool {
        debug_assert!(outcome.is_terminal());
        self.state
            .compare_exchange(
                ExporterState::Unregistered as u8,
                outcome as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_sticky() {
        let status = ExporterStatus::new();
        assert_eq!(status.get(), ExporterState::Unregistered);

        assert!(status.finish(ExporterState::GaveUp));
        assert!(!status.finish(ExporterState::Registered));
        assert_eq!(status.get(), ExporterState::GaveUp);
    }

    #[test]
    fn test_clones_observe_same_state() {
        let status = ExporterStatus::new();
        let observer = status.clone();
        status.finish(ExporterState::Registered);
        assert_eq!(observer.get(), ExporterState::Registered);
    }
}
