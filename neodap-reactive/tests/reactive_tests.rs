//! Integration tests for signals, collections and lifecycles

use neodap_reactive::{Collection, Disposable, Lifecycle, Signal};
use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

#[test]
fn test_collected_derived_signal_never_fires() {
    let source = Signal::new(0u32);
    let fired = Rc::new(Cell::new(0));

    {
        let derived = source.map(|v| v * 2);
        let counter = fired.clone();
        derived.watch(move |_| counter.set(counter.get() + 1)).detach();
        source.set(1);
        assert_eq!(fired.get(), 1);
    }

    source.set(2);
    source.set(3);
    assert_eq!(fired.get(), 1);
    assert_eq!(source.listener_count(), 0);
}

#[test]
fn test_collected_aggregate_never_fires() {
    let member_flag = Signal::new(false);
    let members = Collection::new();
    members.insert("t1");

    let fired = Rc::new(Cell::new(0));
    {
        let flag = member_flag.clone();
        let any = members.some(move |_| flag.clone().into());
        let counter = fired.clone();
        any.watch(move |_| counter.set(counter.get() + 1)).detach();
    }

    member_flag.set(true);
    members.insert("t2");
    members.remove(&"t1");
    assert_eq!(fired.get(), 0);
    assert_eq!(member_flag.listener_count(), 0);
}

#[test]
fn test_aggregate_without_resubscription() {
    let states = vec![Signal::new(false), Signal::new(false), Signal::new(false)];
    let members = Collection::new();
    for i in 0..2usize {
        members.insert(i);
    }

    let lookup = states.clone();
    let all_stopped = members.every(move |i| lookup[*i].clone().into());
    let history = Rc::new(RefCell::new(Vec::new()));
    let sink = history.clone();
    let _sub = all_stopped.watch(move |v| sink.borrow_mut().push(*v));

    states[0].set(true);
    states[1].set(true);
    members.insert(2);
    states[2].set(true);

    assert_eq!(*history.borrow(), vec![true, false, true]);
}

#[test]
fn test_lifecycle_owns_derived_chain() {
    let lifecycle = Lifecycle::new("dap:session:1/thread:1");
    let state = lifecycle.signal_named("state", "running".to_string());
    let stopped = state.map(|s| s == "stopped");
    lifecycle.own(stopped.clone());

    state.set("stopped".into());
    assert!(stopped.get());

    lifecycle.dispose();
    assert!(stopped.is_disposed());
    assert_eq!(state.listener_count(), 0);
}

proptest! {
    #[test]
    fn prop_count_matches_distinct_members(ops in proptest::collection::vec((any::<bool>(), 0u8..16), 0..64)) {
        let members = Collection::new();
        let count = members.count();
        let mut model = HashSet::new();

        for (insert, value) in ops {
            if insert {
                members.insert(value);
                model.insert(value);
            } else {
                members.remove(&value);
                model.remove(&value);
            }
            prop_assert_eq!(count.get(), model.len());
        }
    }

    #[test]
    fn prop_some_tracks_member_signals(flags in proptest::collection::vec(any::<bool>(), 1..12), flips in proptest::collection::vec(0usize..12, 0..24)) {
        let signals: Vec<Signal<bool>> = flags.iter().map(|f| Signal::new(*f)).collect();
        let members = Collection::new();
        for i in 0..signals.len() {
            members.insert(i);
        }
        let lookup = signals.clone();
        let any = members.some(move |i| lookup[*i].clone().into());

        for flip in flips {
            let target = &signals[flip % signals.len()];
            target.update(|v| !*v);
            let expected = signals.iter().any(|s| s.get());
            prop_assert_eq!(any.get(), expected);
        }
    }
}
