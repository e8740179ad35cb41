//! Reactive value cells
//!
//! A [`Signal`] stores a value, a monotonic version and a table of
//! listeners. Propagation is synchronous: `set()` notifies every listener
//! depth-first before it returns.
//!
//! Derived signals ([`Signal::map`], and the aggregates built by
//! [`Collection`](crate::Collection)) own their upstream subscriptions.
//! Sources only reach a derived signal through a `Weak`, so dropping the
//! last handle of a derived signal unregisters it from every source at once.

use crate::lifecycle::Disposable;
use crate::subscription::{Listener, ListenerId, ListenerTable, Subscription};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

struct SignalInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    listeners: ListenerTable<T>,
    disposed: Cell<bool>,
    traced: Cell<bool>,
    label: Option<String>,
    attachments: RefCell<Vec<Box<dyn Any>>>,
}

/// A reactive value cell with change notification
///
/// Cloning a signal yields another handle to the same cell.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Create a new signal holding `value`
    pub fn new(value: T) -> Self {
        Self::build(value, None)
    }

    /// Create a signal with a label used in trace output
    pub fn labeled(label: impl Into<String>, value: T) -> Self {
        Self::build(value, Some(label.into()))
    }

    fn build(value: T, label: Option<String>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                listeners: ListenerTable::new(),
                disposed: Cell::new(false),
                traced: Cell::new(false),
                label,
                attachments: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Get a clone of the current value
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of changes applied so far
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// The label given at construction, if any
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Store a new value unconditionally and notify
    ///
    /// Returns the previous value. A disposed signal keeps its value.
    pub fn replace(&self, value: T) -> T {
        if self.inner.disposed.get() {
            return value;
        }
        let previous = std::mem::replace(&mut *self.inner.value.borrow_mut(), value);
        self.bump_and_emit();
        previous
    }

    /// Re-emit the current value without changing it
    ///
    /// This is the one documented way to notify listeners when the value is
    /// equal to what they last saw.
    pub fn notify(&self) {
        if self.inner.disposed.get() {
            return;
        }
        self.bump_and_emit();
    }

    fn bump_and_emit(&self) {
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);
        if self.inner.traced.get() {
            trace!(
                signal = self.inner.label.as_deref().unwrap_or("<anonymous>"),
                version,
                listeners = self.inner.listeners.len(),
                "signal changed"
            );
        }
        let value = self.get();
        self.inner.listeners.emit(&value);
    }

    /// Listen for future changes
    ///
    /// The listener is not called with the current value. Watching a
    /// disposed signal returns an inactive subscription.
    pub fn watch(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        if self.inner.disposed.get() {
            return Subscription::empty();
        }
        self.inner.listeners.subscribe(listener)
    }

    /// Listen without the signal keeping the listener alive
    pub fn watch_weak(&self, listener: &Listener<T>) -> Option<ListenerId> {
        if self.inner.disposed.get() {
            return None;
        }
        Some(self.inner.listeners.subscribe_weak(listener))
    }

    /// Remove a weak registration early
    pub fn unwatch(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Call `listener` with the current value now, then on every change
    pub fn observe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let value = self.get();
        listener(&value);
        self.watch(listener)
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Tie the lifetime of `value` to this signal
    ///
    /// Used by derived signals to own their upstream subscriptions and
    /// state. Attachments are dropped on dispose or when the last handle
    /// goes away.
    pub fn attach(&self, value: impl Any) {
        if self.inner.disposed.get() {
            return;
        }
        self.inner.attachments.borrow_mut().push(Box::new(value));
    }

    /// Enable or disable per-change trace logging
    pub fn set_traced(&self, traced: bool) {
        self.inner.traced.set(traced);
    }

    /// Get a weak handle that does not keep the signal alive
    pub fn downgrade(&self) -> WeakSignal<T> {
        WeakSignal {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Check whether two handles point at the same cell
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Derive a signal that tracks `f(self)`
    ///
    /// The derived signal keeps `self` alive and is only weakly referenced
    /// by it.
    pub fn map<U>(&self, f: impl Fn(&T) -> U + 'static) -> Signal<U>
    where
        U: Clone + PartialEq + 'static,
    {
        let output = Signal::new(self.with(|value| f(value)));
        let weak = output.downgrade();
        let subscription = self.watch(move |value| {
            if let Some(output) = weak.upgrade() {
                output.set(f(value));
            }
        });
        output.attach(subscription);
        output.attach(self.clone());
        output
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Set a new value, notifying listeners if it differs
    ///
    /// Returns whether anything changed. Setting an equal value, or setting
    /// a disposed signal, is a no-op.
    pub fn set(&self, value: T) -> bool {
        if self.inner.disposed.get() {
            return false;
        }
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.bump_and_emit();
        true
    }

    /// Set the value computed from the current one
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = self.with(f);
        self.set(next)
    }
}

impl<T: 'static> Disposable for Signal<T> {
    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.listeners.clear();
        let attachments = std::mem::take(&mut *self.inner.attachments.borrow_mut());
        drop(attachments);
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("label", &self.inner.label)
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

/// Weak handle to a [`Signal`]
pub struct WeakSignal<T> {
    inner: Weak<SignalInner<T>>,
}

impl<T> Clone for WeakSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WeakSignal<T> {
    /// Upgrade to a strong handle if the signal is still alive
    pub fn upgrade(&self) -> Option<Signal<T>> {
        self.inner.upgrade().map(|inner| Signal { inner })
    }

    /// Whether the signal has been reclaimed
    pub fn is_dead(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl<T> fmt::Debug for WeakSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSignal")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Either a plain value or a signal producing one
///
/// Index extractors, collection predicates and tree filters return this so
/// callers can opt into reactivity per entity.
#[derive(Clone)]
pub enum MaybeSignal<T> {
    /// A value that never changes
    Value(T),
    /// A value that is re-read whenever the signal changes
    Signal(Signal<T>),
}

impl<T: Clone + 'static> MaybeSignal<T> {
    /// Current value
    pub fn get(&self) -> T {
        match self {
            MaybeSignal::Value(value) => value.clone(),
            MaybeSignal::Signal(signal) => signal.get(),
        }
    }

    /// The underlying signal, if reactive
    pub fn as_signal(&self) -> Option<&Signal<T>> {
        match self {
            MaybeSignal::Value(_) => None,
            MaybeSignal::Signal(signal) => Some(signal),
        }
    }

    /// Whether the value can change
    pub fn is_reactive(&self) -> bool {
        matches!(self, MaybeSignal::Signal(_))
    }

    /// Watch the value; plain values produce no subscription
    pub fn watch(&self, listener: impl Fn(&T) + 'static) -> Option<Subscription> {
        self.as_signal().map(|signal| signal.watch(listener))
    }

    /// Transform the value, deriving a signal when reactive
    pub fn map<U>(self, f: impl Fn(&T) -> U + 'static) -> MaybeSignal<U>
    where
        U: Clone + PartialEq + 'static,
    {
        match self {
            MaybeSignal::Value(value) => MaybeSignal::Value(f(&value)),
            MaybeSignal::Signal(signal) => MaybeSignal::Signal(signal.map(f)),
        }
    }
}

impl<T> From<T> for MaybeSignal<T> {
    fn from(value: T) -> Self {
        MaybeSignal::Value(value)
    }
}

impl<T> From<Signal<T>> for MaybeSignal<T> {
    fn from(signal: Signal<T>) -> Self {
        MaybeSignal::Signal(signal)
    }
}

impl<T: fmt::Debug> fmt::Debug for MaybeSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeSignal::Value(value) => f.debug_tuple("Value").field(value).finish(),
            MaybeSignal::Signal(signal) => f.debug_tuple("Signal").field(signal).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_get_and_set() {
        let signal = Signal::new(1);
        assert_eq!(signal.get(), 1);
        assert!(signal.set(2));
        assert_eq!(signal.get(), 2);
        assert_eq!(signal.version(), 1);
    }

    #[test]
    fn test_equal_set_is_noop() {
        let signal = Signal::new("a".to_string());
        let calls = Rc::new(Cell::new(0));

        let counter = calls.clone();
        let _sub = signal.watch(move |_| counter.set(counter.get() + 1));

        assert!(!signal.set("a".to_string()));
        assert_eq!(calls.get(), 0);
        assert_eq!(signal.version(), 0);
    }

    #[test]
    fn test_notify_reemits_equal_value() {
        let signal = Signal::new(5);
        let calls = Rc::new(Cell::new(0));

        let counter = calls.clone();
        let _sub = signal.watch(move |_| counter.set(counter.get() + 1));

        signal.notify();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_observe_fires_immediately() {
        let signal = Signal::new(10);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let _sub = signal.observe(move |v| sink.borrow_mut().push(*v));
        signal.set(11);

        assert_eq!(*seen.borrow(), vec![10, 11]);
    }

    #[test]
    fn test_watch_only_future_changes() {
        let signal = Signal::new(10);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let _sub = signal.watch(move |v| sink.borrow_mut().push(*v));
        signal.set(12);

        assert_eq!(*seen.borrow(), vec![12]);
    }

    #[test]
    fn test_disposed_signal_never_notifies() {
        let signal = Signal::new(0);
        let calls = Rc::new(Cell::new(0));

        let counter = calls.clone();
        signal.watch(move |_| counter.set(counter.get() + 1)).detach();

        signal.dispose();
        assert!(!signal.set(1));
        signal.notify();
        assert_eq!(calls.get(), 0);
        assert!(!signal.watch(|_| {}).is_active());
    }

    #[test]
    fn test_map_tracks_source() {
        let source = Signal::new(2);
        let doubled = source.map(|v| v * 2);

        source.set(5);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn test_dropped_derived_unregisters_from_source() {
        let source = Signal::new(1);
        let derived = source.map(|v| v + 1);
        assert_eq!(source.listener_count(), 1);

        drop(derived);
        assert_eq!(source.listener_count(), 0);
        assert!(source.set(3));
    }

    #[test]
    fn test_derived_chain_survives_intermediate_drop() {
        let source = Signal::new(1);
        let plus_one = source.map(|v| v + 1);
        let times_ten = plus_one.map(|v| v * 10);
        drop(plus_one);

        source.set(4);
        assert_eq!(times_ten.get(), 50);
    }

    #[test]
    fn test_reentrant_set_from_listener() {
        let a = Signal::new(0);
        let b = Signal::new(0);

        let target = b.clone();
        let _sub = a.watch(move |v| {
            target.set(*v * 3);
        });

        let source = a.clone();
        let _loopback = b.watch(move |v| {
            if *v > 100 {
                source.set(0);
            }
        });

        a.set(7);
        assert_eq!(b.get(), 21);
    }

    #[test]
    fn test_maybe_signal_reads_through() {
        let signal = Signal::new(true);
        let reactive: MaybeSignal<bool> = signal.clone().into();
        let plain: MaybeSignal<bool> = false.into();

        assert!(reactive.get());
        signal.set(false);
        assert!(!reactive.get());
        assert!(!plain.is_reactive());
        assert!(plain.watch(|_| {}).is_none());
    }
}
