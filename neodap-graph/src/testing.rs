//! Minimal entity for tests and doc examples

use crate::entity::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::rc::Rc;

/// A labeled node
pub struct Node {
    lifecycle: Lifecycle,
    pub label: Signal<String>,
}

impl Node {
    pub fn new(uri: impl Into<String>, label: impl Into<String>) -> Rc<Self> {
        let lifecycle = Lifecycle::new(uri);
        let label = lifecycle.signal_named("label", label.into());
        Rc::new(Self { lifecycle, label })
    }
}

impl Entity for Node {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(self.label.get())
    }
}

impl EntityKind for Node {
    const TYPE: EntityType = "Node";
}
