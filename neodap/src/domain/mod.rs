//! Debug-session entities
//!
//! ```text
//! Session ─threads─▶ Thread ─stacks─▶ Stack ─frames─▶ Frame ─scopes─▶ Scope ─variables─▶ Variable
//!    │                        (newest first)            │                                   │
//!    ├─children─▶ Session                               ├─source─▶ Source          variables─┘
//!    ├─bindings─▶ Binding ◀─bindings─ Breakpoint        └─evals──▶ EvalResult
//!    ├─outputs──▶ Output ─variables─▶ Variable
//!    ├─evals────▶ EvalResult ─variables─▶ Variable
//!    ├─exceptions─▶ ExceptionFilter
//!    └─sources──▶ Source (virtual)
//! ```
//!
//! Stack and frame indexes are positions on the `stacks` and `frames`
//! edges maintained by the store. Fetched state is never renumbered or
//! discarded when a thread resumes: it is flagged stale through the
//! `current` signals and stays readable until the thread or session goes.

mod breakpoint;
mod exception;
mod output;
mod session;
mod source;
mod stack;
mod variable;

pub use breakpoint::{Binding, Breakpoint, BreakpointOptions};
pub use exception::ExceptionFilter;
pub use output::{EvalResult, Output};
pub use session::{Session, SessionSpec, SessionState, Thread, ThreadState};
pub use source::Source;
pub use stack::{Frame, Stack};
pub use variable::{Scope, Variable};

pub(crate) use variable::Expandable;

use neodap_graph::{EdgeType, EntityId, EntityRef, EntityStore, IndexName, IndexValue};
use neodap_reactive::{MaybeSignal, Signal};
use tracing::trace;

/// Edge names
pub mod edges {
    use neodap_graph::EdgeType;

    pub const CHILDREN: EdgeType = "children";
    pub const THREADS: EdgeType = "threads";
    pub const STACKS: EdgeType = "stacks";
    pub const FRAMES: EdgeType = "frames";
    pub const SCOPES: EdgeType = "scopes";
    pub const VARIABLES: EdgeType = "variables";
    pub const BINDINGS: EdgeType = "bindings";
    pub const OUTPUTS: EdgeType = "outputs";
    pub const EVALS: EdgeType = "evals";
    pub const SOURCES: EdgeType = "sources";
    pub const SOURCE: EdgeType = "source";
    pub const EXCEPTIONS: EdgeType = "exceptions";
}

/// Index names
pub mod indexes {
    use neodap_graph::IndexName;

    pub const ID: IndexName = "id";
    pub const SEQ: IndexName = "seq";
    pub const INDEX: IndexName = "index";
    pub const CURRENT: IndexName = "current";
    pub const STATE: IndexName = "state";
    pub const NAME: IndexName = "name";
    pub const KEY: IndexName = "key";
    pub const BREAKPOINT: IndexName = "breakpoint";
    pub const VERIFIED: IndexName = "verified";
    pub const HIT: IndexName = "hit";
    pub const ENABLED: IndexName = "enabled";
}

/// Edges walked when removing a session and everything it owns
pub const SESSION_CASCADE: &[EdgeType] = &[
    edges::THREADS,
    edges::STACKS,
    edges::FRAMES,
    edges::SCOPES,
    edges::VARIABLES,
    edges::BINDINGS,
    edges::OUTPUTS,
    edges::EVALS,
    edges::SOURCES,
    edges::EXCEPTIONS,
];

/// Edges shown by a session tree window
pub const TREE_EDGES: &[EdgeType] = &[
    edges::CHILDREN,
    edges::THREADS,
    edges::STACKS,
    edges::FRAMES,
    edges::SCOPES,
    edges::VARIABLES,
];

fn signal_value<T, F>(signal: &Signal<T>, f: F) -> MaybeSignal<IndexValue>
where
    T: Clone + 'static,
    F: Fn(&T) -> IndexValue + 'static,
{
    MaybeSignal::Signal(signal.map(f))
}

/// Register every index the URI resolver and consumers rely on
pub fn register_indexes(store: &EntityStore) {
    use indexes::*;

    store.add_typed_index::<Session>(ID, |s| MaybeSignal::Value(s.id.as_str().into()));
    store.add_typed_index::<Session>(STATE, |s| signal_value(&s.state, |v| v.as_str().into()));

    store.add_typed_index::<Thread>(ID, |t| MaybeSignal::Value(t.id.into()));
    store.add_typed_index::<Thread>(STATE, |t| signal_value(&t.state, |v| v.as_str().into()));

    store.add_typed_index::<Stack>(SEQ, |s| MaybeSignal::Value(s.seq.into()));
    store.add_typed_index::<Stack>(INDEX, |s| signal_value(&s.index, |i| (*i).into()));
    store.add_typed_index::<Stack>(CURRENT, |s| signal_value(&s.current, |c| (*c).into()));

    store.add_typed_index::<Frame>(ID, |f| MaybeSignal::Value(f.id.into()));
    store.add_typed_index::<Frame>(INDEX, |f| signal_value(&f.index, |i| (*i).into()));
    store.add_typed_index::<Frame>(CURRENT, |f| signal_value(&f.current, |c| (*c).into()));

    store.add_typed_index::<Scope>(NAME, |s| MaybeSignal::Value(s.name.as_str().into()));
    store.add_typed_index::<Variable>(NAME, |v| MaybeSignal::Value(v.name.as_str().into()));
    store.add_typed_index::<Variable>(CURRENT, |v| signal_value(&v.current, |c| (*c).into()));

    store.add_typed_index::<Breakpoint>(ID, |b| MaybeSignal::Value(b.id.into()));
    store.add_typed_index::<Binding>(BREAKPOINT, |b| MaybeSignal::Value(b.breakpoint.into()));
    store.add_typed_index::<Binding>(VERIFIED, |b| signal_value(&b.verified, |v| (*v).into()));
    store.add_typed_index::<Binding>(HIT, |b| signal_value(&b.hit, |h| (*h).into()));

    store.add_typed_index::<ExceptionFilter>(ID, |e| MaybeSignal::Value(e.filter.as_str().into()));
    store.add_typed_index::<ExceptionFilter>(ENABLED, |e| signal_value(&e.enabled, |v| (*v).into()));

    store.add_typed_index::<Output>(SEQ, |o| MaybeSignal::Value(o.seq.into()));
    store.add_typed_index::<EvalResult>(SEQ, |e| MaybeSignal::Value(e.seq.into()));
    store.add_typed_index::<Source>(KEY, |s| MaybeSignal::Value(s.key_value().into()));
}

fn current_signal(entity: &EntityRef) -> Option<Signal<bool>> {
    if let Some(stack) = entity.downcast::<Stack>() {
        return Some(stack.current.clone());
    }
    if let Some(frame) = entity.downcast::<Frame>() {
        return Some(frame.current.clone());
    }
    if let Some(scope) = entity.downcast::<Scope>() {
        return Some(scope.current.clone());
    }
    if let Some(variable) = entity.downcast::<Variable>() {
        return Some(variable.current.clone());
    }
    entity.downcast::<EvalResult>().map(|eval| eval.current.clone())
}

/// Flag the current stack of a thread and everything below it as stale
///
/// Older stacks are already stale, so only current entities are walked.
/// Returns the number of flipped flags.
pub fn mark_stale(store: &EntityStore, thread: EntityId) -> usize {
    let mut flipped = 0;
    let mut pending: Vec<EntityRef> = store.edges_from(thread, edges::STACKS);
    while let Some(entity) = pending.pop() {
        let Some(current) = current_signal(&entity) else {
            continue;
        };
        if !current.get() {
            continue;
        }
        current.set(false);
        flipped += 1;
        for edge in [edges::FRAMES, edges::SCOPES, edges::VARIABLES, edges::EVALS] {
            pending.extend(store.edges_from(entity.id(), edge));
        }
    }
    trace!(%thread, flipped, "marked stale");
    flipped
}

/// Whether a fetched entity still reflects the live execution point
///
/// Entities without a staleness flag are always current.
pub fn is_current(entity: &EntityRef) -> bool {
    current_signal(entity).map_or(true, |current| current.get())
}

/// The nearest ancestor of `entity` over any of `edges`
pub(crate) fn parent_over(
    store: &EntityStore,
    entity: EntityId,
    edges: &[EdgeType],
) -> Option<EntityRef> {
    edges.iter().find_map(|edge| store.parent(entity, *edge))
}

/// Index name and value type for `:<id>` selectors of each kind
pub(crate) fn id_index(kind: crate::uri::SegmentKind) -> (IndexName, bool) {
    use crate::uri::SegmentKind as K;
    match kind {
        K::Session => (indexes::ID, false),
        K::Thread | K::Frame | K::Breakpoint => (indexes::ID, true),
        K::Stack | K::Output | K::Eval => (indexes::SEQ, true),
        K::Scope | K::Variable => (indexes::NAME, false),
        K::Binding => (indexes::BREAKPOINT, true),
        K::Source => (indexes::KEY, false),
        K::Exception => (indexes::ID, false),
    }
}
