//! Integration tests for navigation blocking.

use onyx_navigation::{
    BlockerState, HistoryAction, MemoryHistory, NavigationController, NavigationObserver,
    PendingNavigation,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::{Arc, Mutex};

fn setup() -> (MemoryHistory, NavigationController) {
    let history = MemoryHistory::new("/");
    let nav = NavigationController::new(Arc::new(history.clone()));
    assert!(nav.push_state("/form"));
    (history, nav)
}

#[derive(Clone, Copy, Debug)]
enum Attempt {
    Push,
    Replace,
    Back,
}

fn attempt(kind: Attempt, history: &MemoryHistory, nav: &NavigationController) {
    match kind {
        Attempt::Push => {
            nav.push_state("/away");
        }
        Attempt::Replace => {
            nav.replace_state("/away");
        }
        Attempt::Back => history.back(),
    }
    history.settle(nav);
}

#[rstest]
#[case(Attempt::Push, "/away")]
#[case(Attempt::Replace, "/away")]
#[case(Attempt::Back, "/")]
fn always_blocking_holds_location_until_proceed(#[case] kind: Attempt, #[case] target: &str) {
    let (history, nav) = setup();
    let blocker = nav.register_when(true);

    attempt(kind, &history, &nav);
    assert_eq!(nav.location(), "/form");
    assert_eq!(history.location(), "/form");
    assert!(nav.is_blocking());
    assert_eq!(blocker.state().location(), Some(target));

    blocker.proceed();
    assert!(matches!(blocker.state(), BlockerState::Proceeding { .. }));
    assert_eq!(history.settle(&nav), 2);

    assert_eq!(nav.location(), target);
    assert_eq!(history.location(), target);
    assert_eq!(blocker.state(), BlockerState::Unblocked);
    assert!(!nav.is_blocking());
    assert!(!nav.is_proceeding());
}

#[test]
fn location_changes_exactly_once_after_proceed() {
    let (history, nav) = setup();
    let blocker = nav.register_when(true);

    for kind in [Attempt::Push, Attempt::Replace, Attempt::Back, Attempt::Push] {
        attempt(kind, &history, &nav);
        assert_eq!(nav.location(), "/form");
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    blocker.proceed();
    while history.pending_frames() > 0 {
        history.settle(&nav);
        seen.lock().unwrap().push(nav.location());
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), ["/away"]);
    assert_eq!(history.entries(), vec!["/", "/form", "/away"]);
}

#[test]
fn blocked_pop_is_undone_without_refiring() {
    let (history, nav) = setup();
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let blocker = nav.register(move |_| {
        *counter.lock().unwrap() += 1;
        true
    });

    history.back();
    history.settle(&nav);

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(history.index(), 1);
    assert_eq!(
        nav.pending(),
        Some(PendingNavigation {
            previous_location: "/form".into(),
            next_location: "/".into(),
            history_action: HistoryAction::Pop,
        })
    );
    drop(blocker);
}

#[test]
fn blocked_forward_pop_at_end_of_history_does_not_swallow_later_pops() {
    let history = MemoryHistory::new("/a");
    history.push_state("/b");
    history.back();
    let nav = NavigationController::new(Arc::new(history.clone()));
    history.settle(&nav);
    assert_eq!(nav.location(), "/a");

    let blocker = nav.register(|args| args.history_action == HistoryAction::Pop);

    history.forward();
    history.settle(&nav);
    assert!(nav.is_blocking());
    assert_eq!(nav.location(), "/a");
    blocker.reset();

    assert!(nav.push_state("/c"));
    assert_eq!(history.entries(), vec!["/a", "/b", "/c"]);

    history.back();
    history.settle(&nav);
    assert!(nav.is_blocking());
    assert_eq!(nav.location(), "/c");
    assert_eq!(history.location(), "/c");
    assert_eq!(
        nav.pending().map(|p| p.next_location),
        Some("/b".to_string())
    );
}

#[test]
fn reset_discards_pending_navigation() {
    let (history, nav) = setup();
    let blocker = nav.register_when(true);

    nav.push_state("/away");
    blocker.reset();

    assert_eq!(blocker.state(), BlockerState::Unblocked);
    assert_eq!(nav.pending(), None);
    assert!(!nav.is_blocking());

    blocker.proceed();
    assert_eq!(history.settle(&nav), 0);
    assert_eq!(nav.location(), "/form");
}

#[test]
fn predicate_sees_current_and_next_location() {
    let (history, nav) = setup();
    let _blocker = nav.register(|args| {
        args.current_location.starts_with("/form") && !args.next_location.starts_with("/form")
    });

    assert!(nav.push_state("/form/step-2"));
    assert!(!nav.push_state("/elsewhere"));
    assert_eq!(nav.location(), "/form/step-2");
    assert_eq!(history.location(), "/form/step-2");
}

#[test]
fn first_registered_blocker_wins() {
    let (_history, nav) = setup();
    let quiet = nav.register_when(false);
    let first = nav.register_when(true);
    let second = nav.register_when(true);

    nav.push_state("/away");

    assert_eq!(quiet.state(), BlockerState::Unblocked);
    assert!(matches!(first.state(), BlockerState::Blocked { .. }));
    assert_eq!(second.state(), BlockerState::Unblocked);
}

#[test]
fn unload_is_prevented_while_any_blocker_fires() {
    let (_history, nav) = setup();
    let seen = Arc::new(Mutex::new(None));
    let record = seen.clone();
    let blocker = nav.register(move |args| {
        *record.lock().unwrap() = Some((args.next_location.to_string(), args.history_action));
        true
    });

    assert!(nav.should_prevent_unload());
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some((String::new(), HistoryAction::Push))
    );

    drop(blocker);
    assert!(!nav.should_prevent_unload());
}

#[test]
fn controllers_are_independent() {
    let (_a_history, a) = setup();
    let (_b_history, b) = setup();
    let _blocker = a.register_when(true);

    assert!(!a.push_state("/x"));
    assert!(b.push_state("/x"));
}
