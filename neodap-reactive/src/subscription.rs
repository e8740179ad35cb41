//! Listener tables and subscription handles
//!
//! Every reactive source in this crate (signals, collections, and the
//! store topics built on top of them) dispatches through a
//! [`ListenerTable`]. A listener is registered either:
//!
//! - **strongly**, via [`ListenerTable::subscribe`]: the table owns the
//!   callback and the returned [`Subscription`] removes it on drop, or
//! - **weakly**, via [`ListenerTable::subscribe_weak`]: the table only holds
//!   a `Weak` reference, and dead entries are pruned lazily the next time the
//!   table notifies or is counted.

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Callback shape shared by every listener table
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Identifier of a registration inside one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener:{}", self.0)
    }
}

enum Entry<E> {
    Strong(Listener<E>),
    Weak(Weak<dyn Fn(&E)>),
}

impl<E> Entry<E> {
    fn upgrade(&self) -> Option<Listener<E>> {
        match self {
            Entry::Strong(listener) => Some(listener.clone()),
            Entry::Weak(listener) => listener.upgrade(),
        }
    }

    fn is_live(&self) -> bool {
        match self {
            Entry::Strong(_) => true,
            Entry::Weak(listener) => listener.strong_count() > 0,
        }
    }
}

struct TableInner<E> {
    entries: RefCell<IndexMap<ListenerId, Entry<E>>>,
    next_id: Cell<u64>,
}

/// An ordered table of listeners for events of type `E`
///
/// Listeners are notified in registration order. Dispatch works on a
/// snapshot, so a listener may freely subscribe, unsubscribe or trigger
/// further emissions while it runs. A listener removed by an earlier
/// listener of the same dispatch is skipped.
///
/// Cloning a table yields another handle to the same listeners.
pub struct ListenerTable<E> {
    inner: Rc<TableInner<E>>,
}

impl<E> Clone for ListenerTable<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: 'static> Default for ListenerTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> ListenerTable<E> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TableInner {
                entries: RefCell::new(IndexMap::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    fn insert(&self, entry: Entry<E>) -> ListenerId {
        let id = ListenerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.entries.borrow_mut().insert(id, entry);
        id
    }

    /// Register a listener owned by the table
    ///
    /// The listener stays registered until the returned subscription is
    /// dropped, or forever if the subscription is detached.
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let id = self.insert(Entry::Strong(Rc::new(listener)));
        let table = Rc::downgrade(&self.inner);
        Subscription::from_fn(move || {
            if let Some(inner) = table.upgrade() {
                let removed = inner.entries.borrow_mut().shift_remove(&id);
                drop(removed);
            }
        })
    }

    /// Register a listener the table only references weakly
    ///
    /// The caller keeps the listener alive; once every strong reference is
    /// gone the entry is discarded on the next dispatch.
    pub fn subscribe_weak(&self, listener: &Listener<E>) -> ListenerId {
        self.insert(Entry::Weak(Rc::downgrade(listener)))
    }

    /// Remove a registration by id
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.inner.entries.borrow_mut().shift_remove(&id);
        removed.is_some()
    }

    /// Check whether a registration is still present
    pub fn contains(&self, id: ListenerId) -> bool {
        self.inner.entries.borrow().contains_key(&id)
    }

    /// Notify every live listener, returning how many were called
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<(ListenerId, Listener<E>)> = {
            let mut entries = self.inner.entries.borrow_mut();
            entries.retain(|_, entry| entry.is_live());
            entries
                .iter()
                .filter_map(|(id, entry)| entry.upgrade().map(|listener| (*id, listener)))
                .collect()
        };

        let mut delivered = 0;
        for (id, listener) in snapshot {
            if !self.contains(id) {
                continue;
            }
            listener(event);
            delivered += 1;
        }
        delivered
    }

    /// Number of live registrations (prunes dead weak entries)
    pub fn len(&self) -> usize {
        let mut entries = self.inner.entries.borrow_mut();
        entries.retain(|_, entry| entry.is_live());
        entries.len()
    }

    /// Check if no live listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration
    pub fn clear(&self) {
        let old = std::mem::take(&mut *self.inner.entries.borrow_mut());
        drop(old);
    }
}

impl<E> fmt::Debug for ListenerTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable")
            .field("entries", &self.inner.entries.borrow().len())
            .finish()
    }
}

/// RAII handle for a registration
///
/// Dropping the subscription unregisters the listener from its source. A
/// subscription whose source is already gone is a no-op on drop.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// A subscription that is not attached to anything
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Build a subscription from a cancellation callback
    pub fn from_fn(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Bundle several subscriptions into one handle
    pub fn merge(subscriptions: Vec<Subscription>) -> Self {
        if subscriptions.is_empty() {
            return Self::empty();
        }
        Self::from_fn(move || drop(subscriptions))
    }

    /// Whether dropping this handle would unregister something
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Keep the listener registered for the lifetime of its source
    pub fn detach(mut self) {
        self.cancel.take();
    }

    /// Unregister now
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_subscription_receives_until_dropped() {
        let table = ListenerTable::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let sub = table.subscribe(move |v| sink.borrow_mut().push(*v));

        table.emit(&1);
        drop(sub);
        table.emit(&2);

        assert_eq!(*seen.borrow(), vec![1]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_detached_subscription_persists() {
        let table = ListenerTable::<u32>::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        table.subscribe(move |_| counter.set(counter.get() + 1)).detach();

        table.emit(&1);
        table.emit(&2);
        assert_eq!(count.get(), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_weak_listener_pruned_after_drop() {
        let table = ListenerTable::<u32>::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        let listener: Listener<u32> = Rc::new(move |_| counter.set(counter.get() + 1));
        table.subscribe_weak(&listener);

        assert_eq!(table.emit(&1), 1);
        drop(listener);
        assert_eq!(table.emit(&2), 0);
        assert_eq!(count.get(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let table = ListenerTable::<u32>::new();
        let second_called = Rc::new(Cell::new(false));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let slot = victim.clone();
        let _first = table.subscribe(move |_| {
            slot.borrow_mut().take();
        });

        let flag = second_called.clone();
        *victim.borrow_mut() = Some(table.subscribe(move |_| flag.set(true)));

        table.emit(&1);
        assert!(!second_called.get());
    }

    #[test]
    fn test_notification_order_is_registration_order() {
        let table = ListenerTable::<()>::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let subs: Vec<Subscription> = (0..4)
            .map(|i| {
                let order = order.clone();
                table.subscribe(move |_| order.borrow_mut().push(i))
            })
            .collect();

        table.emit(&());
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
        drop(subs);
    }

    #[test]
    fn test_merged_subscription_cancels_all() {
        let table = ListenerTable::<u32>::new();
        let a = table.subscribe(|_| {});
        let b = table.subscribe(|_| {});
        assert_eq!(table.len(), 2);

        let merged = Subscription::merge(vec![a, b]);
        merged.cancel();
        assert!(table.is_empty());
    }
}
