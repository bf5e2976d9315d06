//! Confirm-before-leaving navigation blocking.
//!
//! The controller sits between the application and the history API. Every
//! `push_state`, `replace_state` and popstate is checked against the
//! registered blocker predicates in registration order; the first predicate
//! that returns true blocks the navigation and holds it as pending until its
//! [`BlockerHandle`] proceeds or resets.
//!
//! ```text
//! Unblocked -> Blocked -> Proceeding -> Unblocked
//!                 \-------- reset -------^
//! ```

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::observer::NavigationObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Push,
    Pop,
    Replace,
}

/// A navigation held back by a blocker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNavigation {
    pub previous_location: String,
    pub next_location: String,
    pub history_action: HistoryAction,
}

/// What a blocker predicate sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockerArgs<'a> {
    pub current_location: &'a str,
    /// Empty when the page is unloading.
    pub next_location: &'a str,
    pub history_action: HistoryAction,
}

pub type BlockerFn = Arc<dyn Fn(&BlockerArgs<'_>) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockerState {
    Unblocked,
    /// Waiting for `proceed` or `reset`.
    Blocked { location: String },
    /// The held navigation is being replayed.
    Proceeding { location: String },
}

impl BlockerState {
    pub fn location(&self) -> Option<&str> {
        match self {
            BlockerState::Unblocked => None,
            BlockerState::Blocked { location } | BlockerState::Proceeding { location } => {
                Some(location)
            }
        }
    }
}

struct Registration {
    id: u64,
    predicate: BlockerFn,
    state: BlockerState,
}

struct State {
    current_location: String,
    is_blocking: bool,
    is_proceeding: bool,
    /// Location the counter-navigation of a blocked pop returns to, while
    /// its popstate is still outstanding.
    restoring: Option<String>,
    pending: Option<PendingNavigation>,
    blockers: Vec<Registration>,
    next_id: u64,
}

struct Inner {
    observer: Arc<dyn NavigationObserver>,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_blocker_state(&self, id: u64, next: BlockerState) {
        if let Some(registration) = self.lock().blockers.iter_mut().find(|r| r.id == id) {
            registration.state = next;
        }
    }
}

/// Navigation controller for one running client.
#[derive(Clone)]
pub struct NavigationController {
    inner: Arc<Inner>,
}

impl NavigationController {
    pub fn new(observer: Arc<dyn NavigationObserver>) -> Self {
        let current_location = observer.location();
        Self {
            inner: Arc::new(Inner {
                observer,
                state: Mutex::new(State {
                    current_location,
                    is_blocking: false,
                    is_proceeding: false,
                    restoring: None,
                    pending: None,
                    blockers: Vec::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Location as the application sees it. Blocked navigations leave it
    /// unchanged.
    pub fn location(&self) -> String {
        self.inner.lock().current_location.clone()
    }

    pub fn is_blocking(&self) -> bool {
        self.inner.lock().is_blocking
    }

    pub fn is_proceeding(&self) -> bool {
        self.inner.lock().is_proceeding
    }

    pub fn pending(&self) -> Option<PendingNavigation> {
        self.inner.lock().pending.clone()
    }

    pub fn blocker_count(&self) -> usize {
        self.inner.lock().blockers.len()
    }

    /// Registers a blocker. It stays active until the handle is dropped.
    pub fn register<F>(&self, predicate: F) -> BlockerHandle
    where
        F: Fn(&BlockerArgs<'_>) -> bool + Send + Sync + 'static,
    {
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.blockers.push(Registration {
            id,
            predicate: Arc::new(predicate),
            state: BlockerState::Unblocked,
        });
        debug!(id, blockers = state.blockers.len(), "Blocker registered");

        BlockerHandle {
            id,
            inner: self.inner.clone(),
        }
    }

    /// Registers a blocker that blocks whenever `when` is true.
    pub fn register_when(&self, when: bool) -> BlockerHandle {
        self.register(move |_| when)
    }

    /// First registered blocker whose predicate fires. Predicates run
    /// without the state lock held.
    fn first_blocker(&self, current: &str, next: &str, action: HistoryAction) -> Option<u64> {
        let predicates: Vec<(u64, BlockerFn)> = self
            .inner
            .lock()
            .blockers
            .iter()
            .map(|r| (r.id, r.predicate.clone()))
            .collect();

        let args = BlockerArgs {
            current_location: current,
            next_location: next,
            history_action: action,
        };
        predicates
            .into_iter()
            .find(|(_, predicate)| predicate(&args))
            .map(|(id, _)| id)
    }

    fn block(&self, id: u64, pending: PendingNavigation) {
        info!(
            id,
            from = %pending.previous_location,
            to = %pending.next_location,
            action = ?pending.history_action,
            "Navigation blocked"
        );
        let location = pending.next_location.clone();
        let mut state = self.inner.lock();
        state.is_blocking = true;
        state.pending = Some(pending);
        for registration in state.blockers.iter_mut() {
            registration.state = if registration.id == id {
                BlockerState::Blocked {
                    location: location.clone(),
                }
            } else {
                BlockerState::Unblocked
            };
        }
    }

    /// Shared path for push and replace. Returns whether the history entry
    /// was written.
    fn intercept(&self, action: HistoryAction, url: &str) -> bool {
        let current = {
            let state = self.inner.lock();
            if state.is_proceeding || url.is_empty() {
                None
            } else {
                Some(state.current_location.clone())
            }
        };

        let Some(current) = current else {
            self.write(action, url);
            return true;
        };

        if let Some(id) = self.first_blocker(&current, url, action) {
            self.block(
                id,
                PendingNavigation {
                    previous_location: current,
                    next_location: url.to_string(),
                    history_action: action,
                },
            );
            return false;
        }

        self.inner.lock().current_location = url.to_string();
        self.write(action, url);
        true
    }

    fn write(&self, action: HistoryAction, url: &str) {
        match action {
            HistoryAction::Push => self.inner.observer.push_state(url),
            HistoryAction::Replace => self.inner.observer.replace_state(url),
            HistoryAction::Pop => {}
        }
    }

    /// Wrapped `history.pushState`.
    pub fn push_state(&self, url: &str) -> bool {
        self.intercept(HistoryAction::Push, url)
    }

    /// Wrapped `history.replaceState`.
    pub fn replace_state(&self, url: &str) -> bool {
        self.intercept(HistoryAction::Replace, url)
    }

    /// Handles a popstate. The history has already moved, so a blocked pop
    /// goes forward again to undo it; the popstate that undo produces is
    /// swallowed. When there is no entry to go forward to, nothing is
    /// swallowed.
    pub fn on_pop_state(&self) {
        let next = self.inner.observer.location();
        let current = {
            let mut state = self.inner.lock();
            if state.is_proceeding {
                return;
            }
            if let Some(expected) = state.restoring.take() {
                if expected == next {
                    debug!("Ignoring popstate from counter-navigation");
                    return;
                }
            }
            state.current_location.clone()
        };

        match self.first_blocker(&current, &next, HistoryAction::Pop) {
            Some(id) => {
                self.block(
                    id,
                    PendingNavigation {
                        previous_location: current.clone(),
                        next_location: next,
                        history_action: HistoryAction::Pop,
                    },
                );
                self.inner.lock().restoring = Some(current);
                if !self.inner.observer.go(1) {
                    debug!("No entry to restore after blocked popstate");
                    self.inner.lock().restoring = None;
                }
            }
            None => self.inner.lock().current_location = next,
        }
    }

    /// `beforeunload`: true when any blocker objects to leaving the page.
    pub fn should_prevent_unload(&self) -> bool {
        let current = self.location();
        self.first_blocker(&current, "", HistoryAction::Push).is_some()
    }

    /// Whether `id` is the registration holding the pending navigation.
    fn holds_pending(state: &State, id: u64) -> bool {
        state
            .blockers
            .iter()
            .any(|r| r.id == id && matches!(r.state, BlockerState::Blocked { .. }))
    }

    fn proceed(&self, id: u64) {
        let pending = {
            let mut state = self.inner.lock();
            if !Self::holds_pending(&state, id) {
                return;
            }
            let Some(pending) = state.pending.take() else {
                return;
            };
            state.is_proceeding = true;
            state.is_blocking = false;
            pending
        };
        info!(id, to = %pending.next_location, "Proceeding with blocked navigation");
        self.inner.set_blocker_state(
            id,
            BlockerState::Proceeding {
                location: pending.next_location.clone(),
            },
        );

        let inner = self.inner.clone();
        self.inner.observer.request_frame(Box::new(move || {
            match pending.history_action {
                HistoryAction::Pop => {
                    inner.observer.go(-1);
                }
                HistoryAction::Push => inner.observer.push_state(&pending.next_location),
                HistoryAction::Replace => inner.observer.replace_state(&pending.next_location),
            }
            inner.lock().current_location = pending.next_location;

            let settle = inner.clone();
            inner.observer.request_frame(Box::new(move || {
                settle.lock().is_proceeding = false;
                settle.set_blocker_state(id, BlockerState::Unblocked);
                debug!(id, "Navigation settled");
            }));
        }));
    }

    fn reset(&self, id: u64) {
        {
            let mut state = self.inner.lock();
            if !Self::holds_pending(&state, id) {
                return;
            }
            state.is_blocking = false;
            state.pending = None;
        }
        self.inner.set_blocker_state(id, BlockerState::Unblocked);
        debug!(id, "Blocked navigation discarded");
    }
}

/// A registered blocker. Dropping it unregisters the predicate.
pub struct BlockerHandle {
    id: u64,
    inner: Arc<Inner>,
}

impl BlockerHandle {
    pub fn state(&self) -> BlockerState {
        self.inner
            .lock()
            .blockers
            .iter()
            .find(|r| r.id == self.id)
            .map(|r| r.state.clone())
            .unwrap_or(BlockerState::Unblocked)
    }

    /// Replays the held navigation. A no-op unless this blocker is the one
    /// holding it.
    pub fn proceed(&self) {
        self.controller().proceed(self.id);
    }

    /// Drops the held navigation and stays put. A no-op unless this blocker
    /// is the one holding it.
    pub fn reset(&self) {
        self.controller().reset(self.id);
    }

    fn controller(&self) -> NavigationController {
        NavigationController {
            inner: self.inner.clone(),
        }
    }
}

impl Drop for BlockerHandle {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.blockers.retain(|r| r.id != self.id);
        debug!(id = self.id, "Blocker unregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use pretty_assertions::assert_eq;

    fn controller() -> NavigationController {
        NavigationController::new(Arc::new(NoopObserver::new("/start")))
    }

    #[test]
    fn unblocked_navigation_updates_location() {
        let nav = controller();
        assert!(nav.push_state("/next"));
        assert_eq!(nav.location(), "/next");
        assert!(nav.replace_state("/other"));
        assert_eq!(nav.location(), "/other");
    }

    #[test]
    fn empty_url_bypasses_blockers() {
        let nav = controller();
        let _blocker = nav.register_when(true);
        assert!(nav.push_state(""));
        assert!(!nav.is_blocking());
        assert_eq!(nav.location(), "/start");
    }

    #[test]
    fn dropping_handle_unregisters() {
        let nav = controller();
        let blocker = nav.register_when(true);
        assert_eq!(nav.blocker_count(), 1);
        drop(blocker);
        assert_eq!(nav.blocker_count(), 0);
        assert!(nav.push_state("/free"));
    }

    #[test]
    fn proceed_with_inline_frames_settles_at_once() {
        let nav = controller();
        let blocker = nav.register_when(true);
        assert!(!nav.push_state("/next"));
        assert_eq!(
            blocker.state(),
            BlockerState::Blocked {
                location: "/next".into()
            }
        );

        blocker.proceed();
        assert_eq!(nav.location(), "/next");
        assert_eq!(blocker.state(), BlockerState::Unblocked);
        assert!(!nav.is_proceeding());
    }

    #[test]
    fn only_the_holding_blocker_can_release() {
        let nav = controller();
        let idle = nav.register_when(false);
        let holder = nav.register_when(true);
        assert!(!nav.push_state("/next"));

        idle.reset();
        idle.proceed();
        assert!(nav.is_blocking());
        assert_eq!(nav.location(), "/start");
        assert!(matches!(holder.state(), BlockerState::Blocked { .. }));

        holder.reset();
        assert_eq!(holder.state(), BlockerState::Unblocked);
        assert!(!nav.is_blocking());
    }
}
