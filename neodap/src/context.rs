//! Focus contexts
//!
//! A context holds the URI of the frame (or any other entity) the user is
//! looking at. Child contexts inherit their parent's value until they are
//! pinned, and go back to inheriting on `unpin`.

use neodap_reactive::{Signal, Subscription};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

struct ContextInner {
    parent: Option<Context>,
    value: Signal<Option<String>>,
    pinned: Cell<bool>,
    parent_subscription: RefCell<Option<Subscription>>,
}

#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// An unparented context with no focus
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent: None,
                value: Signal::labeled("context.frame_uri", None),
                pinned: Cell::new(false),
                parent_subscription: RefCell::new(None),
            }),
        }
    }

    /// A context that mirrors this one until pinned
    pub fn child(&self) -> Context {
        let inner = Rc::new(ContextInner {
            parent: Some(self.clone()),
            value: Signal::labeled("context.frame_uri", self.frame_uri()),
            pinned: Cell::new(false),
            parent_subscription: RefCell::new(None),
        });
        let weak: Weak<ContextInner> = Rc::downgrade(&inner);
        let subscription = self.signal().watch(move |uri| {
            if let Some(inner) = weak.upgrade() {
                if !inner.pinned.get() {
                    inner.value.set(uri.clone());
                }
            }
        });
        inner.parent_subscription.replace(Some(subscription));
        Context { inner }
    }

    /// Focus `uri`, detaching from the parent
    pub fn pin(&self, uri: impl Into<String>) {
        let uri = uri.into();
        trace!(uri = %uri, "context pinned");
        self.inner.pinned.set(true);
        self.inner.value.set(Some(uri));
    }

    /// Drop the local focus and follow the parent again
    pub fn unpin(&self) {
        self.inner.pinned.set(false);
        let inherited = self.inner.parent.as_ref().and_then(Context::frame_uri);
        self.inner.value.set(inherited);
    }

    pub fn frame_uri(&self) -> Option<String> {
        self.inner.value.get()
    }

    pub fn signal(&self) -> Signal<Option<String>> {
        self.inner.value.clone()
    }

    pub fn is_pinned(&self) -> bool {
        self.inner.pinned.get()
    }

    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("frame_uri", &self.frame_uri())
            .field("pinned", &self.is_pinned())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparented_defaults_to_none() {
        let context = Context::new();
        assert_eq!(context.frame_uri(), None);
        context.unpin();
        assert_eq!(context.frame_uri(), None);
    }

    #[test]
    fn test_child_inherits_until_pinned() {
        let root = Context::new();
        let child = root.child();
        root.pin("dap:session:a");
        assert_eq!(child.frame_uri().as_deref(), Some("dap:session:a"));

        child.pin("dap:session:b");
        root.pin("dap:session:c");
        assert_eq!(child.frame_uri().as_deref(), Some("dap:session:b"));

        child.unpin();
        assert_eq!(child.frame_uri().as_deref(), Some("dap:session:c"));
        root.pin("dap:session:d");
        assert_eq!(child.frame_uri().as_deref(), Some("dap:session:d"));
    }

    #[test]
    fn test_grandchild_follows_chain() {
        let root = Context::new();
        let grandchild = root.child().child();
        root.pin("dap:session:x");
        assert_eq!(grandchild.frame_uri().as_deref(), Some("dap:session:x"));
    }
}
