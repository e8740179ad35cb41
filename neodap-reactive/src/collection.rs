//! Observable ordered sets with derived aggregates
//!
//! A [`Collection`] announces membership changes and can derive signals
//! over its members. An aggregate subscribes to the collection and to every
//! member-level signal returned by its extractor, and holds those
//! subscriptions only while the derived signal is reachable:
//!
//! ```text
//!   Collection ──weak──▶ membership listener ──weak──▶ Aggregate state
//!   member Signal ──weak──▶ member listener ───┘            ▲
//!                                                           │ owns
//!                                            derived Signal ┘
//! ```
//!
//! Dropping the derived signal drops the state, which drops every
//! subscription it holds.

use crate::signal::{MaybeSignal, Signal, WeakSignal};
use crate::subscription::{ListenerTable, Subscription};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

/// Membership change of a [`Collection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent<T> {
    Added(T),
    Removed(T),
}

struct CollectionInner<T> {
    members: RefCell<IndexSet<T>>,
    listeners: ListenerTable<CollectionEvent<T>>,
}

/// An ordered, observable set
///
/// Iteration follows insertion order. Cloning yields another handle to the
/// same set.
pub struct Collection<T> {
    inner: Rc<CollectionInner<T>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Eq + Hash + 'static> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash + 'static> Collection<T> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                members: RefCell::new(IndexSet::new()),
                listeners: ListenerTable::new(),
            }),
        }
    }

    /// Add a member, returning false if it was already present
    pub fn insert(&self, item: T) -> bool {
        let added = self.inner.members.borrow_mut().insert(item.clone());
        if added {
            self.inner.listeners.emit(&CollectionEvent::Added(item));
        }
        added
    }

    /// Remove a member, returning false if it was absent
    pub fn remove(&self, item: &T) -> bool {
        let removed = self.inner.members.borrow_mut().shift_remove(item);
        if removed {
            self.inner
                .listeners
                .emit(&CollectionEvent::Removed(item.clone()));
        }
        removed
    }

    /// Remove every member, announcing each removal
    pub fn clear(&self) {
        let members = std::mem::take(&mut *self.inner.members.borrow_mut());
        for item in members {
            self.inner.listeners.emit(&CollectionEvent::Removed(item));
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.inner.members.borrow().contains(item)
    }

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First member in insertion order
    pub fn first(&self) -> Option<T> {
        self.inner.members.borrow().first().cloned()
    }

    /// Snapshot of the members in insertion order
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.members.borrow().iter().cloned().collect()
    }

    /// Listen for membership changes
    pub fn watch(&self, listener: impl Fn(&CollectionEvent<T>) + 'static) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }

    /// Derive a signal combining one value per member
    ///
    /// `extract` runs once per member when it joins. If it returns a
    /// signal, the aggregate recomputes whenever that signal changes.
    /// `combine` receives the values in member order.
    pub fn aggregate<V, R>(
        &self,
        extract: impl Fn(&T) -> MaybeSignal<V> + 'static,
        combine: impl Fn(&[V]) -> R + 'static,
    ) -> Signal<R>
    where
        V: Clone + 'static,
        R: Clone + PartialEq + 'static,
    {
        let state = Rc::new(Aggregate {
            output: RefCell::new(None),
            tracked: RefCell::new(IndexMap::new()),
            extract: Box::new(extract),
            combine: Box::new(combine),
        });

        for member in self.to_vec() {
            state.track(member);
        }
        let output = Signal::new(state.compute());
        *state.output.borrow_mut() = Some(output.downgrade());

        let weak_state = Rc::downgrade(&state);
        let membership = self.watch(move |event| {
            let Some(state) = weak_state.upgrade() else {
                return;
            };
            match event {
                CollectionEvent::Added(item) => state.track(item.clone()),
                CollectionEvent::Removed(item) => state.untrack(item),
            }
            state.recompute();
        });

        output.attach(membership);
        output.attach(state);
        output.attach(self.clone());
        output
    }

    /// Derive a signal that is true while any member satisfies `predicate`
    pub fn some(&self, predicate: impl Fn(&T) -> MaybeSignal<bool> + 'static) -> Signal<bool> {
        self.aggregate(predicate, |values: &[bool]| values.iter().any(|v| *v))
    }

    /// Derive a signal that is true while every member satisfies `predicate`
    ///
    /// An empty collection satisfies it vacuously.
    pub fn every(&self, predicate: impl Fn(&T) -> MaybeSignal<bool> + 'static) -> Signal<bool> {
        self.aggregate(predicate, |values: &[bool]| values.iter().all(|v| *v))
    }

    /// Derive a signal holding the member count
    pub fn count(&self) -> Signal<usize> {
        self.aggregate(|_| MaybeSignal::Value(()), |values: &[()]| values.len())
    }
}

impl<T: fmt::Debug> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.inner.members.borrow().iter())
            .finish()
    }
}

struct Tracked<V> {
    source: MaybeSignal<V>,
    _subscription: Option<Subscription>,
}

struct Aggregate<T, V, R> {
    output: RefCell<Option<WeakSignal<R>>>,
    tracked: RefCell<IndexMap<T, Tracked<V>>>,
    extract: Box<dyn Fn(&T) -> MaybeSignal<V>>,
    combine: Box<dyn Fn(&[V]) -> R>,
}

impl<T, V, R> Aggregate<T, V, R>
where
    T: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
    R: Clone + PartialEq + 'static,
{
    fn track(self: &Rc<Self>, item: T) {
        if self.tracked.borrow().contains_key(&item) {
            return;
        }
        let source = (self.extract)(&item);
        let weak = Rc::downgrade(self);
        let subscription = source.watch(move |_| {
            if let Some(state) = Weak::upgrade(&weak) {
                state.recompute();
            }
        });
        self.tracked.borrow_mut().insert(
            item,
            Tracked {
                source,
                _subscription: subscription,
            },
        );
    }

    fn untrack(&self, item: &T) {
        let removed = self.tracked.borrow_mut().shift_remove(item);
        drop(removed);
    }

    fn compute(&self) -> R {
        let values: Vec<V> = self
            .tracked
            .borrow()
            .values()
            .map(|tracked| tracked.source.get())
            .collect();
        (self.combine)(&values)
    }

    fn recompute(&self) {
        let output = self.output.borrow().as_ref().and_then(WeakSignal::upgrade);
        if let Some(output) = output {
            output.set(self.compute());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_insert_and_remove_announce() {
        let collection = Collection::new();
        let events = Rc::new(RefCell::new(Vec::new()));

        let sink = events.clone();
        let _sub = collection.watch(move |e: &CollectionEvent<u32>| sink.borrow_mut().push(e.clone()));

        assert!(collection.insert(1));
        assert!(!collection.insert(1));
        assert!(collection.remove(&1));
        assert!(!collection.remove(&1));

        assert_eq!(
            *events.borrow(),
            vec![CollectionEvent::Added(1), CollectionEvent::Removed(1)]
        );
    }

    #[test]
    fn test_count_follows_membership() {
        let collection = Collection::new();
        let count = collection.count();
        assert_eq!(count.get(), 0);

        collection.insert("a");
        collection.insert("b");
        assert_eq!(count.get(), 2);

        collection.remove(&"a");
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_some_reacts_to_member_signal() {
        let stopped_a = Signal::new(false);
        let stopped_b = Signal::new(false);
        let collection = Collection::new();
        collection.insert(1u32);
        collection.insert(2u32);

        let (a, b) = (stopped_a.clone(), stopped_b.clone());
        let any_stopped = collection.some(move |id| {
            if *id == 1 {
                a.clone().into()
            } else {
                b.clone().into()
            }
        });
        assert!(!any_stopped.get());

        stopped_b.set(true);
        assert!(any_stopped.get());

        collection.remove(&2);
        assert!(!any_stopped.get());

        stopped_b.set(false);
        stopped_b.set(true);
        assert!(!any_stopped.get());
    }

    #[test]
    fn test_every_is_vacuous_on_empty() {
        let collection: Collection<u32> = Collection::new();
        let all = collection.every(|v| MaybeSignal::Value(*v > 10));
        assert!(all.get());

        collection.insert(3);
        assert!(!all.get());
    }

    #[test]
    fn test_dropped_aggregate_releases_member_subscriptions() {
        let flag = Signal::new(true);
        let collection = Collection::new();
        collection.insert(0u8);

        let source = flag.clone();
        let every = collection.every(move |_| source.clone().into());
        assert_eq!(flag.listener_count(), 1);

        drop(every);
        assert_eq!(flag.listener_count(), 0);

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let _watch = flag.watch(move |_| counter.set(counter.get() + 1));
        flag.set(false);
        collection.insert(1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_aggregate_combines_in_member_order() {
        let collection = Collection::new();
        for name in ["c", "a", "b"] {
            collection.insert(name.to_string());
        }
        let joined = collection.aggregate(
            |name| MaybeSignal::Value(name.clone()),
            |names: &[String]| names.join(","),
        );
        assert_eq!(joined.get(), "c,a,b");

        collection.remove(&"a".to_string());
        collection.insert("a".to_string());
        assert_eq!(joined.get(), "c,b,a");
    }
}
