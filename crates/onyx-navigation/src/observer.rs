//! The platform side of navigation: the browser history API, or a stand-in.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::controller::NavigationController;

/// Callback run on the next animation frame.
pub type Frame = Box<dyn FnOnce() + Send>;

/// History operations the controller drives. The controller calls these
/// directly when a navigation is allowed, so implementations must not route
/// them back through the controller.
pub trait NavigationObserver: Send + Sync {
    /// Pathname plus search of the current entry.
    fn location(&self) -> String;

    fn push_state(&self, url: &str);

    fn replace_state(&self, url: &str);

    /// Moves through history. Completion is reported later through
    /// [`NavigationController::on_pop_state`]. Returns false when there is no
    /// entry at `delta`, in which case no popstate follows.
    fn go(&self, delta: i32) -> bool;

    fn request_frame(&self, frame: Frame);
}

/// Observer for targets without a history stack. Writes are dropped and
/// frames run immediately.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver {
    location: String,
}

impl NoopObserver {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl NavigationObserver for NoopObserver {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn push_state(&self, _url: &str) {}

    fn replace_state(&self, _url: &str) {}

    fn go(&self, _delta: i32) -> bool {
        false
    }

    fn request_frame(&self, frame: Frame) {
        frame()
    }
}

#[derive(Default)]
struct HistoryState {
    entries: Vec<String>,
    index: usize,
    pending_pops: usize,
    frames: VecDeque<Frame>,
}

/// In-memory history stack with browser event ordering: `go` queues a
/// popstate, and queued popstates are delivered before the next frame runs.
#[derive(Clone)]
pub struct MemoryHistory {
    state: Arc<Mutex<HistoryState>>,
}

impl MemoryHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HistoryState {
                entries: vec![initial.into()],
                ..HistoryState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().entries.clone()
    }

    pub fn index(&self) -> usize {
        self.lock().index
    }

    /// Browser back button.
    pub fn back(&self) {
        self.go(-1);
    }

    /// Browser forward button.
    pub fn forward(&self) {
        self.go(1);
    }

    pub fn pending_frames(&self) -> usize {
        self.lock().frames.len()
    }

    /// Delivers queued popstates and runs frames until both queues are
    /// empty. Returns the number of frames run.
    pub fn settle(&self, controller: &NavigationController) -> usize {
        let mut ran = 0;
        loop {
            while self.take_pop() {
                controller.on_pop_state();
            }

            let frame = self.lock().frames.pop_front();
            match frame {
                Some(frame) => {
                    frame();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    fn take_pop(&self) -> bool {
        let mut state = self.lock();
        if state.pending_pops == 0 {
            return false;
        }
        state.pending_pops -= 1;
        true
    }
}

impl NavigationObserver for MemoryHistory {
    fn location(&self) -> String {
        let state = self.lock();
        state.entries[state.index].clone()
    }

    fn push_state(&self, url: &str) {
        let mut state = self.lock();
        let keep = state.index + 1;
        state.entries.truncate(keep);
        state.entries.push(url.to_string());
        state.index = keep;
    }

    fn replace_state(&self, url: &str) {
        let mut state = self.lock();
        let index = state.index;
        state.entries[index] = url.to_string();
    }

    fn go(&self, delta: i32) -> bool {
        let mut state = self.lock();
        let target = state.index as i64 + i64::from(delta);
        if delta == 0 || target < 0 || target >= state.entries.len() as i64 {
            return false;
        }
        state.index = target as usize;
        state.pending_pops += 1;
        true
    }

    fn request_frame(&self, frame: Frame) {
        self.lock().frames.push_back(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_truncates_forward_entries() {
        let history = MemoryHistory::new("/");
        history.push_state("/a");
        history.push_state("/b");
        history.go(-2);
        history.push_state("/c");

        assert_eq!(history.entries(), vec!["/", "/c"]);
        assert_eq!(history.location(), "/c");
    }

    #[test]
    fn go_out_of_range_is_ignored() {
        let history = MemoryHistory::new("/");
        assert!(!history.go(-1));
        assert!(!history.go(3));
        assert_eq!(history.index(), 0);
        assert_eq!(history.lock().pending_pops, 0);
    }

    #[test]
    fn noop_runs_frames_inline() {
        let observer = NoopObserver::new("/here");
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        observer.request_frame(Box::new(move || *flag.lock().unwrap() = true));
        observer.push_state("/elsewhere");

        assert!(*ran.lock().unwrap());
        assert_eq!(observer.location(), "/here");
    }
}
