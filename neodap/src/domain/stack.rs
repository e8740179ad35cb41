//! Call stacks and frames

use crate::uri::{child_uri, SegmentKind};
use neodap_graph::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// One fetched call stack of a stopped thread
///
/// `index` is the stack's position among its thread's stacks, newest
/// first. The store rewrites it whenever a newer stack is prepended.
pub struct Stack {
    lifecycle: Lifecycle,
    /// Creation sequence within the thread
    pub seq: u64,
    pub index: Signal<Option<usize>>,
    pub current: Signal<bool>,
}

impl Stack {
    pub fn new(thread_uri: &str, seq: u64) -> Rc<Self> {
        let lifecycle = Lifecycle::new(child_uri(
            Some(thread_uri),
            SegmentKind::Stack,
            &seq.to_string(),
        ));
        Rc::new(Self {
            index: lifecycle.signal_named("index", None),
            current: lifecycle.signal_named("current", true),
            seq,
            lifecycle,
        })
    }

    pub fn is_current(&self) -> bool {
        self.current.get()
    }
}

impl Entity for Stack {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(format!("stack {}", self.seq))
    }
}

impl EntityKind for Stack {
    const TYPE: EntityType = "Stack";
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("seq", &self.seq)
            .field("index", &self.index.get())
            .field("current", &self.current.get())
            .finish()
    }
}

/// A stack frame; index 0 is the innermost (top) frame
pub struct Frame {
    lifecycle: Lifecycle,
    /// Adapter frame id
    pub id: i64,
    pub name: String,
    pub line: i64,
    pub column: i64,
    pub index: Signal<Option<usize>>,
    pub current: Signal<bool>,
    scopes_loaded: Cell<bool>,
}

impl Frame {
    pub fn new(stack_uri: &str, id: i64, name: impl Into<String>, line: i64, column: i64) -> Rc<Self> {
        let lifecycle = Lifecycle::new(child_uri(
            Some(stack_uri),
            SegmentKind::Frame,
            &id.to_string(),
        ));
        Rc::new(Self {
            index: lifecycle.signal_named("index", None),
            current: lifecycle.signal_named("current", true),
            id,
            name: name.into(),
            line,
            column,
            scopes_loaded: Cell::new(false),
            lifecycle,
        })
    }

    pub fn is_current(&self) -> bool {
        self.current.get()
    }

    pub(crate) fn scopes_loaded(&self) -> bool {
        self.scopes_loaded.get()
    }

    pub(crate) fn mark_scopes_loaded(&self) {
        self.scopes_loaded.set(true);
    }
}

impl Entity for Frame {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(format!("{}:{}", self.name, self.line))
    }
}

impl EntityKind for Frame {
    const TYPE: EntityType = "Frame";
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("line", &self.line)
            .field("index", &self.index.get())
            .field("current", &self.current.get())
            .finish()
    }
}
