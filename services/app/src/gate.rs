//! services/app/src/gate.rs
//!
//! The anonymous usage gate. Tracks how many analyses a guest has run,
//! persisted across restarts, and decides whether the next attempt may
//! proceed without an account. The stored count is advisory client-side
//! state, not a security boundary.

use std::sync::Arc;

use newscheck_core::ports::StateStore;
use parking_lot::Mutex;
use tracing::warn;

/// How many analyses a guest may run before being asked to register.
pub const GUEST_ANALYSIS_LIMIT: u32 = 3;

/// The gate over anonymous analysis attempts.
///
/// The counter is mutated here and nowhere else, except for the reset that
/// [`crate::session::SessionManager`] performs on successful authentication;
/// keeping the reset there keeps the reset-on-auth rule in one place.
pub struct UsageGate {
    store: Arc<dyn StateStore>,
    count: Mutex<u32>,
}

impl UsageGate {
    /// Creates the gate, seeding the in-memory count from the store.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        let count = store.load_usage_count();
        Self {
            store,
            count: Mutex::new(count),
        }
    }

    /// True iff the caller is unauthenticated and the guest allowance is
    /// used up. Callers check this and record the attempt within the same
    /// sequential step; nothing slips through between the two.
    pub fn should_block(&self, authenticated: bool) -> bool {
        !authenticated && *self.count.lock() >= GUEST_ANALYSIS_LIMIT
    }

    /// Records one allowed anonymous attempt. Persistence is best-effort:
    /// the in-memory count is authoritative for this process either way.
    pub fn record_attempt(&self) {
        let mut count = self.count.lock();
        *count += 1;
        if let Err(e) = self.store.save_usage_count(*count) {
            warn!("failed to persist usage count: {e}");
        }
    }

    /// Current attempt count, for display.
    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    /// Resets the allowance. Only the session manager calls this, on
    /// successful login or signup — never on logout.
    pub(crate) fn reset(&self) {
        let mut count = self.count.lock();
        *count = 0;
        if let Err(e) = self.store.save_usage_count(0) {
            warn!("failed to persist usage count reset: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newscheck_core::domain::UserRecord;
    use newscheck_core::ports::PortResult;

    #[derive(Default)]
    struct MemoryStore {
        count: Mutex<u32>,
    }

    impl StateStore for MemoryStore {
        fn load_session(&self) -> Option<(String, UserRecord)> {
            None
        }
        fn save_session(&self, _token: &str, _user: &UserRecord) -> PortResult<()> {
            Ok(())
        }
        fn save_token(&self, _token: &str) -> PortResult<()> {
            Ok(())
        }
        fn clear_session(&self) -> PortResult<()> {
            Ok(())
        }
        fn load_usage_count(&self) -> u32 {
            *self.count.lock()
        }
        fn save_usage_count(&self, count: u32) -> PortResult<()> {
            *self.count.lock() = count;
            Ok(())
        }
    }

    #[test]
    fn blocks_at_the_limit_but_not_below() {
        let gate = UsageGate::new(Arc::new(MemoryStore::default()));
        for _ in 0..GUEST_ANALYSIS_LIMIT {
            assert!(!gate.should_block(false));
            gate.record_attempt();
        }
        assert!(gate.should_block(false));
    }

    #[test]
    fn never_blocks_an_authenticated_caller() {
        let gate = UsageGate::new(Arc::new(MemoryStore::default()));
        for _ in 0..GUEST_ANALYSIS_LIMIT + 2 {
            gate.record_attempt();
        }
        assert!(gate.should_block(false));
        assert!(!gate.should_block(true));
    }

    #[test]
    fn seeds_the_count_from_the_store() {
        let store = Arc::new(MemoryStore::default());
        store.save_usage_count(GUEST_ANALYSIS_LIMIT).unwrap();
        let gate = UsageGate::new(store);
        assert!(gate.should_block(false));
    }

    #[test]
    fn reset_clears_memory_and_store() {
        let store = Arc::new(MemoryStore::default());
        let gate = UsageGate::new(store.clone());
        gate.record_attempt();
        gate.record_attempt();
        gate.reset();
        assert_eq!(gate.count(), 0);
        assert_eq!(store.load_usage_count(), 0);
    }
}
