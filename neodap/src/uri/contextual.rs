//! Context-relative URIs
//!
//! A pattern such as `dap:@frame+1/scope:Locals` is expanded against the
//! entity a [`Context`](crate::Context) is pinned to. Offsets move along the
//! derived stack and frame indexes, so `@stack+1` is the stack fetched
//! before the pinned one and `@frame+1` is the caller of the pinned frame.

use super::{resolve, Level, Segment, SegmentKind, Uri};
use crate::domain::{edges, parent_over, Frame, Session, Stack, Thread};
use neodap_graph::{EdgeType, EntityRef, EntityStore, View};
use neodap_reactive::{Disposable, Signal, Subscription};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// A pinned stack or frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelPin {
    /// Stack sequence or adapter frame id
    pub id: String,
    /// Current derived index
    pub index: Option<usize>,
}

/// Ancestry of a pinned entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextMap {
    pub session: Option<String>,
    pub thread: Option<i64>,
    pub stack: Option<LevelPin>,
    pub frame: Option<LevelPin>,
}

impl ContextMap {
    /// Walk from `entity` up to its session
    pub fn from_entity(store: &EntityStore, entity: &EntityRef) -> Self {
        collect(store, entity).0
    }

    /// Context of the entity at `uri`, empty when it is not in the store
    pub fn from_uri(store: &EntityStore, uri: &str) -> Self {
        store
            .get_by_uri(uri)
            .map(|entity| Self::from_entity(store, &entity))
            .unwrap_or_default()
    }
}

/// Build the map plus the index signals it was read from
fn collect(store: &EntityStore, entity: &EntityRef) -> (ContextMap, Vec<Signal<Option<usize>>>) {
    let mut map = ContextMap::default();
    let mut signals = Vec::new();
    let mut cursor = Some(entity.clone());

    while let Some(entity) = cursor.take() {
        if let Some(session) = entity.downcast::<Session>() {
            map.session = Some(session.id.clone());
            break;
        }
        let parent_edges: &[EdgeType] = if let Some(thread) = entity.downcast::<Thread>() {
            map.thread = Some(thread.id);
            &[edges::THREADS]
        } else if let Some(stack) = entity.downcast::<Stack>() {
            map.stack = Some(LevelPin {
                id: stack.seq.to_string(),
                index: stack.index.get(),
            });
            signals.push(stack.index.clone());
            &[edges::STACKS]
        } else if let Some(frame) = entity.downcast::<Frame>() {
            map.frame = Some(LevelPin {
                id: frame.id.to_string(),
                index: frame.index.get(),
            });
            signals.push(frame.index.clone());
            &[edges::FRAMES]
        } else {
            &[edges::VARIABLES, edges::SCOPES]
        };
        cursor = parent_over(store, entity.id(), parent_edges);
    }
    (map, signals)
}

fn offset_index(index: Option<usize>, offset: i64) -> Option<usize> {
    let shifted = i64::try_from(index?).ok()?.checked_add(offset)?;
    usize::try_from(shifted).ok()
}

/// Expand the marker of `pattern` against `context`
///
/// Returns `None` when the pattern does not parse, when the level is not
/// part of the context, or when an offset leaves the index range.
/// Patterns without a marker come back unchanged.
pub fn expand(pattern: &str, context: &ContextMap) -> Option<String> {
    let uri: Uri = pattern.parse().ok()?;
    let Some(marker) = uri.marker else {
        return Some(uri.to_string());
    };

    let mut prefix = vec![Segment::id(SegmentKind::Session, context.session.clone()?)];
    if marker.level == Level::Session {
        if marker.offset != 0 {
            return None;
        }
    } else {
        prefix.push(Segment::id(SegmentKind::Thread, context.thread?.to_string()));
        match marker.level {
            Level::Thread if marker.offset != 0 => return None,
            Level::Stack => {
                let stack = context.stack.as_ref()?;
                prefix.push(match marker.offset {
                    0 => Segment::id(SegmentKind::Stack, stack.id.clone()),
                    n => Segment::index(SegmentKind::Stack, offset_index(stack.index, n)?),
                });
            }
            Level::Frame => {
                let stack = context.stack.as_ref()?;
                let frame = context.frame.as_ref()?;
                prefix.push(Segment::id(SegmentKind::Stack, stack.id.clone()));
                prefix.push(match marker.offset {
                    0 => Segment::id(SegmentKind::Frame, frame.id.clone()),
                    n => Segment::index(SegmentKind::Frame, offset_index(frame.index, n)?),
                });
            }
            _ => {}
        }
    }

    prefix.extend(uri.segments);
    Some(Uri::new(prefix).to_string())
}

struct QueryInner {
    store: EntityStore,
    pattern: String,
    context: Signal<Option<String>>,
    uri: Signal<Option<String>>,
    value: Signal<Vec<EntityRef>>,
    view: RefCell<Option<View>>,
    view_subscription: RefCell<Option<Subscription>>,
    level_subscriptions: RefCell<Vec<Subscription>>,
    context_subscription: RefCell<Option<Subscription>>,
    disposed: Cell<bool>,
}

impl QueryInner {
    fn reexpand(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        let (map, signals) = match self.context.get() {
            Some(uri) => match self.store.get_by_uri(&uri) {
                Some(entity) => collect(&self.store, &entity),
                None => (ContextMap::default(), Vec::new()),
            },
            None => (ContextMap::default(), Vec::new()),
        };

        let level_subscriptions = signals
            .iter()
            .map(|signal| {
                let weak = Rc::downgrade(self);
                signal.watch(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.reexpand();
                    }
                })
            })
            .collect();
        let stale = self.level_subscriptions.replace(level_subscriptions);
        drop(stale);

        let expanded = expand(&self.pattern, &map);
        if expanded == self.uri.get() && self.view.borrow().is_some() {
            return;
        }
        trace!(pattern = %self.pattern, uri = ?expanded, "contextual query re-expanded");

        let view = match &expanded {
            Some(uri) => resolve(&self.store, uri),
            None => {
                debug!(pattern = %self.pattern, "contextual marker has no match");
                self.store.empty_view()
            }
        };
        let weak: Weak<Self> = Rc::downgrade(self);
        let subscription = view.watch(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.refresh();
            }
        });
        let previous = self.view.replace(Some(view));
        self.view_subscription.replace(Some(subscription));
        drop(previous);

        self.uri.set(expanded);
        self.refresh();
    }

    fn refresh(&self) {
        if self.disposed.get() {
            return;
        }
        let members = self
            .view
            .borrow()
            .as_ref()
            .map(View::to_vec)
            .unwrap_or_default();
        self.value.set(members);
    }
}

/// A live query over a context-relative pattern
///
/// The value follows the context's pinned entity, the derived indexes of its
/// stack and frame, and the membership of the expanded view.
#[derive(Clone)]
pub struct ContextualQuery {
    inner: Rc<QueryInner>,
}

impl ContextualQuery {
    pub fn new(store: &EntityStore, pattern: impl Into<String>, context: Signal<Option<String>>) -> Self {
        let inner = Rc::new(QueryInner {
            store: store.clone(),
            pattern: pattern.into(),
            context: context.clone(),
            uri: Signal::labeled("contextual.uri", None),
            value: Signal::labeled("contextual.value", Vec::new()),
            view: RefCell::new(None),
            view_subscription: RefCell::new(None),
            level_subscriptions: RefCell::new(Vec::new()),
            context_subscription: RefCell::new(None),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        let subscription = context.watch(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.reexpand();
            }
        });
        inner.context_subscription.replace(Some(subscription));
        inner.reexpand();
        Self { inner }
    }

    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    /// The concrete URI the pattern currently expands to
    pub fn uri(&self) -> Option<String> {
        self.inner.uri.get()
    }

    pub fn uri_signal(&self) -> Signal<Option<String>> {
        self.inner.uri.clone()
    }

    pub fn value(&self) -> Signal<Vec<EntityRef>> {
        self.inner.value.clone()
    }

    pub fn get(&self) -> Vec<EntityRef> {
        self.inner.value.get()
    }

    pub fn first(&self) -> Option<EntityRef> {
        self.inner.value.with(|members| members.first().cloned())
    }

    /// A handle to the current expanded view
    pub fn view(&self) -> View {
        self.inner
            .view
            .borrow()
            .clone()
            .unwrap_or_else(|| self.inner.store.empty_view())
    }

    /// Re-expand against the current context
    ///
    /// Needed when the pinned entity is added after the context was set.
    pub fn refresh(&self) {
        self.inner.view.replace(None);
        self.inner.reexpand();
    }
}

impl Disposable for ContextualQuery {
    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.context_subscription.replace(None);
        self.inner.level_subscriptions.replace(Vec::new());
        self.inner.view_subscription.replace(None);
        if let Some(view) = self.inner.view.replace(None) {
            view.dispose();
        }
        self.inner.value.dispose();
        self.inner.uri.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for ContextualQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualQuery")
            .field("pattern", &self.inner.pattern)
            .field("uri", &self.inner.uri.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinned() -> ContextMap {
        ContextMap {
            session: Some("s".into()),
            thread: Some(1),
            stack: Some(LevelPin {
                id: "4".into(),
                index: Some(1),
            }),
            frame: Some(LevelPin {
                id: "40".into(),
                index: Some(0),
            }),
        }
    }

    #[test]
    fn test_expand_levels() {
        let map = pinned();
        assert_eq!(expand("dap:@session", &map).as_deref(), Some("dap:session:s"));
        assert_eq!(
            expand("dap:@thread/stack", &map).as_deref(),
            Some("dap:session:s/thread:1/stack")
        );
        assert_eq!(
            expand("dap:@frame/scope:Locals", &map).as_deref(),
            Some("dap:session:s/thread:1/stack:4/frame:40/scope:Locals")
        );
        assert_eq!(
            expand("dap:@frame+2", &map).as_deref(),
            Some("dap:session:s/thread:1/stack:4/frame[2]")
        );
        assert_eq!(
            expand("dap:@stack-1/frame", &map).as_deref(),
            Some("dap:session:s/thread:1/stack[0]/frame")
        );
    }

    #[test]
    fn test_expand_out_of_range() {
        let map = pinned();
        assert_eq!(expand("dap:@frame-1", &map), None);
        assert_eq!(expand("dap:@stack-2", &map), None);
        assert_eq!(expand("dap:@thread+1", &map), None);
        assert_eq!(expand("dap:@frame", &ContextMap::default()), None);
        assert_eq!(expand("dap:@nowhere", &map), None);
    }

    #[test]
    fn test_plain_pattern_passes_through() {
        assert_eq!(
            expand("dap:session:x/thread", &ContextMap::default()).as_deref(),
            Some("dap:session:x/thread")
        );
    }
}
