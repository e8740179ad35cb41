//! Scopes and variables

use crate::uri::{child_uri, SegmentKind};
use neodap_graph::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

pub struct Scope {
    lifecycle: Lifecycle,
    pub name: String,
    pub variables_reference: i64,
    /// Fetching this scope is costly for the adapter
    pub expensive: bool,
    pub current: Signal<bool>,
    loaded: Cell<bool>,
}

impl Scope {
    pub fn new(frame_uri: &str, name: impl Into<String>, variables_reference: i64, expensive: bool) -> Rc<Self> {
        let name = name.into();
        let lifecycle = Lifecycle::new(child_uri(Some(frame_uri), SegmentKind::Scope, &name));
        Rc::new(Self {
            current: lifecycle.signal_named("current", true),
            name,
            variables_reference,
            expensive,
            loaded: Cell::new(false),
            lifecycle,
        })
    }

    pub fn is_current(&self) -> bool {
        self.current.get()
    }
}

impl Entity for Scope {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(self.name.clone())
    }
}

impl EntityKind for Scope {
    const TYPE: EntityType = "Scope";
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("reference", &self.variables_reference)
            .finish()
    }
}

/// A named value; children are fetched on demand when
/// `variables_reference` is positive
pub struct Variable {
    lifecycle: Lifecycle,
    pub name: String,
    pub value: Signal<String>,
    pub type_name: Option<String>,
    pub variables_reference: i64,
    pub current: Signal<bool>,
    loaded: Cell<bool>,
}

impl Variable {
    pub fn new(
        parent_uri: &str,
        name: impl Into<String>,
        value: impl Into<String>,
        type_name: Option<String>,
        variables_reference: i64,
        current: bool,
    ) -> Rc<Self> {
        let name = name.into();
        let lifecycle = Lifecycle::new(child_uri(Some(parent_uri), SegmentKind::Variable, &name));
        Rc::new(Self {
            value: lifecycle.signal_named("value", value.into()),
            current: lifecycle.signal_named("current", current),
            name,
            type_name,
            variables_reference,
            loaded: Cell::new(false),
            lifecycle,
        })
    }

    pub fn is_current(&self) -> bool {
        self.current.get()
    }

    pub fn is_expandable(&self) -> bool {
        self.variables_reference > 0
    }
}

impl Entity for Variable {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(format!("{} = {}", self.name, self.value.get()))
    }
}

impl EntityKind for Variable {
    const TYPE: EntityType = "Variable";
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("value", &self.value.get())
            .field("current", &self.current.get())
            .finish()
    }
}

/// Anything whose children are fetched through a variables reference
pub(crate) trait Expandable {
    fn variables_reference(&self) -> i64;
    fn loaded(&self) -> &Cell<bool>;
    /// Children inherit this staleness
    fn is_current(&self) -> bool {
        true
    }
}

impl Expandable for Scope {
    fn variables_reference(&self) -> i64 {
        self.variables_reference
    }

    fn loaded(&self) -> &Cell<bool> {
        &self.loaded
    }

    fn is_current(&self) -> bool {
        self.current.get()
    }
}

impl Expandable for Variable {
    fn variables_reference(&self) -> i64 {
        self.variables_reference
    }

    fn loaded(&self) -> &Cell<bool> {
        &self.loaded
    }

    fn is_current(&self) -> bool {
        self.current.get()
    }
}
