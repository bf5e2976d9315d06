//! # Onyx Navigation
//!
//! Client-side navigation state for Onyx applications:
//! - **NavigationController**: blocks push, replace and back/forward
//!   navigations until the user confirms
//! - **NavigationObserver**: the history API behind the controller, with
//!   in-memory and no-op implementations
//! - **LatestOnly**: ignores loader results from superseded navigations
//!
//! ## Example
//!
//! ```rust
//! use onyx_navigation::{BlockerState, MemoryHistory, NavigationController};
//! use std::sync::Arc;
//!
//! let history = MemoryHistory::new("/edit");
//! let nav = NavigationController::new(Arc::new(history.clone()));
//! let blocker = nav.register(|args| args.next_location != "/edit/preview");
//!
//! assert!(!nav.push_state("/home"));
//! assert_eq!(nav.location(), "/edit");
//! assert!(matches!(blocker.state(), BlockerState::Blocked { .. }));
//!
//! blocker.proceed();
//! history.settle(&nav);
//! assert_eq!(nav.location(), "/home");
//! ```

pub mod controller;
pub mod observer;
pub mod sequence;

pub use controller::{
    BlockerArgs, BlockerFn, BlockerHandle, BlockerState, HistoryAction, NavigationController,
    PendingNavigation,
};
pub use observer::{Frame, MemoryHistory, NavigationObserver, NoopObserver};
pub use sequence::{LatestOnly, Ticket};
