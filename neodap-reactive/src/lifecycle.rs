//! Disposable base for addressable objects
//!
//! A [`Lifecycle`] carries a stable URI and owns everything that should go
//! away with it: child signals, nested disposables, subscriptions and
//! dispose hooks. Teardown runs once, in reverse order of registration.

use crate::error::{ReactiveError, Result};
use crate::signal::Signal;
use crate::subscription::Subscription;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Anything that can be torn down deterministically
pub trait Disposable {
    /// Release owned resources and stop notifying; idempotent
    fn dispose(&self);

    /// Whether `dispose` has run
    fn is_disposed(&self) -> bool;
}

impl<D: Disposable + ?Sized> Disposable for Rc<D> {
    fn dispose(&self) {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

enum Owned {
    Child(Box<dyn Disposable>),
    Subscription(Subscription),
    Hook(Box<dyn FnOnce()>),
}

/// Lifecycle state shared by every entity
pub struct Lifecycle {
    uri: String,
    disposed: Cell<bool>,
    owned: RefCell<Vec<Owned>>,
}

impl Lifecycle {
    /// Create a live lifecycle for `uri`
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            disposed: Cell::new(false),
            owned: RefCell::new(Vec::new()),
        }
    }

    /// The stable address of the owner
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Create a signal disposed together with this lifecycle
    pub fn signal<T: Clone + 'static>(&self, value: T) -> Signal<T> {
        let signal = Signal::new(value);
        self.own(signal.clone());
        signal
    }

    /// Like [`Lifecycle::signal`], labeling the signal for trace output
    pub fn signal_named<T: Clone + 'static>(&self, name: &str, value: T) -> Signal<T> {
        let signal = Signal::labeled(format!("{}#{}", self.uri, name), value);
        self.own(signal.clone());
        signal
    }

    /// Take ownership of a disposable
    ///
    /// Owning something after disposal disposes it immediately.
    pub fn own(&self, child: impl Disposable + 'static) {
        if self.disposed.get() {
            child.dispose();
            return;
        }
        self.owned.borrow_mut().push(Owned::Child(Box::new(child)));
    }

    /// Keep a subscription alive until disposal
    pub fn hold(&self, subscription: Subscription) {
        if self.disposed.get() {
            drop(subscription);
            return;
        }
        self.owned
            .borrow_mut()
            .push(Owned::Subscription(subscription));
    }

    /// Run `hook` on disposal
    pub fn on_dispose(&self, hook: impl FnOnce() + 'static) {
        if self.disposed.get() {
            hook();
            return;
        }
        self.owned.borrow_mut().push(Owned::Hook(Box::new(hook)));
    }

    /// Fail with [`ReactiveError::Disposed`] once disposed
    pub fn ensure_live(&self) -> Result<()> {
        if self.disposed.get() {
            return Err(ReactiveError::Disposed {
                uri: self.uri.clone(),
            });
        }
        Ok(())
    }
}

impl Disposable for Lifecycle {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        trace!(uri = %self.uri, "disposing");
        let owned = std::mem::take(&mut *self.owned.borrow_mut());
        for item in owned.into_iter().rev() {
            match item {
                Owned::Child(child) => child.dispose(),
                Owned::Subscription(subscription) => drop(subscription),
                Owned::Hook(hook) => hook(),
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("uri", &self.uri)
            .field("disposed", &self.disposed.get())
            .field("owned", &self.owned.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispose_cascades_to_signals() {
        let lifecycle = Lifecycle::new("dap:session:1");
        let state = lifecycle.signal("running");

        lifecycle.dispose();
        assert!(state.is_disposed());
        assert!(!state.set("stopped"));
        assert_eq!(state.get(), "running");
    }

    #[test]
    fn test_dispose_runs_in_reverse_order() {
        let lifecycle = Lifecycle::new("dap:breakpoint:1");
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            lifecycle.on_dispose(move || order.borrow_mut().push(i));
        }

        lifecycle.dispose();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let lifecycle = Lifecycle::new("dap:source:a");
        let calls = Rc::new(Cell::new(0));

        let counter = calls.clone();
        lifecycle.on_dispose(move || counter.set(counter.get() + 1));

        lifecycle.dispose();
        lifecycle.dispose();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_never_resurrected() {
        let lifecycle = Lifecycle::new("dap:session:2");
        lifecycle.dispose();

        let late = Signal::new(1);
        lifecycle.own(late.clone());
        assert!(late.is_disposed());

        let hooked = Rc::new(Cell::new(false));
        let flag = hooked.clone();
        lifecycle.on_dispose(move || flag.set(true));
        assert!(hooked.get());

        assert_eq!(
            lifecycle.ensure_live(),
            Err(ReactiveError::Disposed {
                uri: "dap:session:2".into()
            })
        );
    }

    #[test]
    fn test_held_subscription_released_on_dispose() {
        let lifecycle = Lifecycle::new("dap:session:3");
        let source = Signal::new(0);
        lifecycle.hold(source.watch(|_| {}));
        assert_eq!(source.listener_count(), 1);

        lifecycle.dispose();
        assert_eq!(source.listener_count(), 0);
    }
}
