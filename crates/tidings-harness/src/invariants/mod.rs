//! Invariant checking for simulated sessions.
//!
//! A [`SessionTrace`] records the snapshots a session published over time.
//! Registered [`Invariant`]s are checked against the whole trace, so they can
//! express properties of a single snapshot (message IDs are unique) as well as
//! properties of its history (statuses never regress).
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! session.observe();
//! registry.assert_all(session.trace(), "after reconnect");
//! ```

mod checks;
mod trace;

pub use checks::{
    ConnectionAttemptsBounded, MessagesNeverVanish, StatusProgression, UniqueMessageIds,
};
pub use trace::SessionTrace;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property that must hold for every recorded session history.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a trace.
    fn check(&self, trace: &SessionTrace) -> InvariantResult;

    /// Violation attributed to this invariant.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with the standard session invariants.
    ///
    /// Includes:
    /// - [`UniqueMessageIds`]: a message ID appears once across all logs
    /// - [`MessagesNeverVanish`]: logs only grow
    /// - [`StatusProgression`]: statuses only move forward, except retry
    /// - [`ConnectionAttemptsBounded`]: attempt never exceeds the limit
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(UniqueMessageIds);
        registry.add(MessagesNeverVanish);
        registry.add(StatusProgression);
        registry.add(ConnectionAttemptsBounded);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants. Returns every violation found.
    pub fn check_all(&self, trace: &SessionTrace) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(trace).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, trace: &SessionTrace, context: &str) {
        if let Err(violations) = self.check_all(trace) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn empty_trace_passes() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&SessionTrace::new(5)).is_ok());
    }
}
