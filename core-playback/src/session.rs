//! Session identity.
//!
//! Each playback session gets a token from a monotonic counter. At most one
//! token is live at a time. Release invalidates the live token without issuing
//! a new one; reset replaces it. Anything still in flight for an older token is
//! discarded wherever it is checked.

use bridge_traits::engine::SessionToken;
use std::sync::atomic::{AtomicU64, Ordering};

const NO_SESSION: u64 = 0;

#[derive(Debug)]
pub struct SessionRegistry {
    last_issued: AtomicU64,
    live: AtomicU64,
}

impl SessionRegistry {
    /// A registry with no live session.
    pub fn new() -> Self {
        Self {
            last_issued: AtomicU64::new(NO_SESSION),
            live: AtomicU64::new(NO_SESSION),
        }
    }

    fn issue(&self) -> SessionToken {
        SessionToken::from_raw(self.last_issued.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Issue a fresh token and make it the live one.
    pub fn begin(&self) -> SessionToken {
        let token = self.issue();
        self.live.store(token.as_raw(), Ordering::Release);
        token
    }

    /// Replace the live session with a fresh one. Returns `None` if no session
    /// is live, in which case nothing changes.
    pub fn rotate(&self) -> Option<SessionToken> {
        let current = self.live.load(Ordering::Acquire);
        if current == NO_SESSION {
            return None;
        }

        let next = self.issue();
        match self.live.compare_exchange(
            current,
            next.as_raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Some(next),
            // Released concurrently; the fresh token is simply never used.
            Err(_) => None,
        }
    }

    /// End the live session. Returns the token that was invalidated, or `None`
    /// when nothing was live.
    pub fn invalidate(&self) -> Option<SessionToken> {
        match self.live.swap(NO_SESSION, Ordering::AcqRel) {
            NO_SESSION => None,
            raw => Some(SessionToken::from_raw(raw)),
        }
    }

    pub fn current(&self) -> Option<SessionToken> {
        match self.live.load(Ordering::Acquire) {
            NO_SESSION => None,
            raw => Some(SessionToken::from_raw(raw)),
        }
    }

    pub fn is_live(&self, token: SessionToken) -> bool {
        token.as_raw() != NO_SESSION && self.live.load(Ordering::Acquire) == token.as_raw()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn begin_issues_monotonic_tokens() {
        let registry = SessionRegistry::new();
        assert!(registry.current().is_none());

        let first = registry.begin();
        let second = registry.begin();
        assert!(second > first);
        assert_eq!(registry.current(), Some(second));
        assert!(!registry.is_live(first));
        assert!(registry.is_live(second));
    }

    #[test]
    fn invalidate_is_idempotent() {
        let registry = SessionRegistry::new();
        let token = registry.begin();

        assert_eq!(registry.invalidate(), Some(token));
        assert_eq!(registry.invalidate(), None);
        assert!(!registry.is_live(token));
        assert!(registry.current().is_none());
    }

    #[test]
    fn rotate_never_reuses_tokens() {
        let registry = SessionRegistry::new();
        let first = registry.begin();
        let second = registry.rotate().unwrap();
        let third = registry.rotate().unwrap();

        assert!(first < second && second < third);
        assert!(registry.is_live(third));
        assert!(!registry.is_live(first));
    }

    #[test]
    fn rotate_after_release_does_nothing() {
        let registry = SessionRegistry::new();
        registry.begin();
        registry.invalidate();
        assert!(registry.rotate().is_none());
        assert!(registry.current().is_none());
    }

    #[test]
    fn concurrent_issue_is_unique() {
        let registry = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || (0..100).map(|_| registry.begin().as_raw()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
    }
}
