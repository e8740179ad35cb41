//! Console output and evaluation results

use super::variable::Expandable;
use crate::uri::{child_uri, SegmentKind};
use neodap_graph::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// One console entry; structured entries carry a variables reference
pub struct Output {
    lifecycle: Lifecycle,
    pub seq: u64,
    pub category: String,
    pub text: String,
    pub variables_reference: i64,
    loaded: Cell<bool>,
}

impl Output {
    pub fn new(
        session_uri: &str,
        seq: u64,
        category: impl Into<String>,
        text: impl Into<String>,
        variables_reference: i64,
    ) -> Rc<Self> {
        Rc::new(Self {
            lifecycle: Lifecycle::new(child_uri(
                Some(session_uri),
                SegmentKind::Output,
                &seq.to_string(),
            )),
            seq,
            category: category.into(),
            text: text.into(),
            variables_reference,
            loaded: Cell::new(false),
        })
    }

    pub fn is_expandable(&self) -> bool {
        self.variables_reference > 0
    }
}

impl Entity for Output {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(self.text.trim_end().to_string())
    }
}

impl EntityKind for Output {
    const TYPE: EntityType = "Output";
}

impl Expandable for Output {
    fn variables_reference(&self) -> i64 {
        self.variables_reference
    }

    fn loaded(&self) -> &Cell<bool> {
        &self.loaded
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("seq", &self.seq)
            .field("category", &self.category)
            .field("text", &self.text)
            .finish()
    }
}

/// Result tree of an evaluated expression
pub struct EvalResult {
    lifecycle: Lifecycle,
    pub seq: u64,
    pub expression: String,
    pub value: String,
    pub type_name: Option<String>,
    pub variables_reference: i64,
    /// Stale once the frame it was evaluated in is stale
    pub current: Signal<bool>,
    loaded: Cell<bool>,
}

impl EvalResult {
    pub fn new(
        session_uri: &str,
        seq: u64,
        expression: impl Into<String>,
        value: impl Into<String>,
        type_name: Option<String>,
        variables_reference: i64,
    ) -> Rc<Self> {
        let lifecycle = Lifecycle::new(child_uri(
            Some(session_uri),
            SegmentKind::Eval,
            &seq.to_string(),
        ));
        Rc::new(Self {
            current: lifecycle.signal_named("current", true),
            seq,
            expression: expression.into(),
            value: value.into(),
            type_name,
            variables_reference,
            loaded: Cell::new(false),
            lifecycle,
        })
    }

    pub fn is_current(&self) -> bool {
        self.current.get()
    }
}

impl Entity for EvalResult {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(format!("{} = {}", self.expression, self.value))
    }
}

impl EntityKind for EvalResult {
    const TYPE: EntityType = "EvalResult";
}

impl Expandable for EvalResult {
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

impl fmt::Debug for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalResult")
            .field("seq", &self.seq)
            .field("expression", &self.expression)
            .field("value", &self.value)
            .finish()
    }
}
