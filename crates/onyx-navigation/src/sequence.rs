//! Latest-only sequencing for loader fetches.
//!
//! Rapid navigation can start several fetches of the same route's loader.
//! Each fetch takes a [`Ticket`]; only the newest ticket's result is kept.

use onyx_router::loader_path::encode_loader_path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct LatestOnly {
    latest: Arc<AtomicU64>,
}

impl LatestOnly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request, superseding every earlier ticket.
    pub fn begin(&self) -> Ticket {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            seq,
            latest: self.latest.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ticket {
    seq: u64,
    latest: Arc<AtomicU64>,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.seq
    }

    /// `Some(value)` only if no newer request has started.
    pub fn accept<T>(&self, value: T) -> Option<T> {
        if self.is_current() {
            Some(value)
        } else {
            debug!(seq = self.seq, "Dropping stale result");
            None
        }
    }

    /// Loader URL for `href`, cache-keyed by this ticket.
    pub fn loader_path(&self, href: &str) -> String {
        encode_loader_path(href, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onyx_router::loader_path::decode_loader_path;

    #[test]
    fn stale_results_are_dropped() {
        let fetches = LatestOnly::new();
        let first = fetches.begin();
        let second = fetches.begin();

        assert_eq!(first.accept("old"), None);
        assert_eq!(second.accept("new"), Some("new"));
    }

    #[test]
    fn each_ticket_gets_its_own_loader_url() {
        let fetches = LatestOnly::new();
        let a = fetches.begin().loader_path("/posts/1?tab=2");
        let b = fetches.begin().loader_path("/posts/1?tab=2");

        assert_ne!(a, b);
        assert_eq!(decode_loader_path(&a).as_deref(), Some("/posts/1"));
        assert_eq!(decode_loader_path(&b).as_deref(), Some("/posts/1"));
    }
}
