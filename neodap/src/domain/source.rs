//! Source files and virtual sources

use crate::uri::{child_uri, session_uri, source_uri, SegmentKind};
use neodap_graph::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::fmt;
use std::rc::Rc;

/// A source document
///
/// Sources with a path are shared by every session. Virtual sources only
/// exist inside the adapter, are addressed by reference number and belong
/// to one session; their text is loaded into `content` on request.
pub struct Source {
    lifecycle: Lifecycle,
    pub name: String,
    pub path: Option<String>,
    pub reference: Option<i64>,
    pub content: Signal<Option<String>>,
}

impl Source {
    pub fn from_path(path: impl Into<String>, name: Option<String>) -> Rc<Self> {
        let path = path.into();
        let lifecycle = Lifecycle::new(source_uri(&path));
        Rc::new(Self {
            content: lifecycle.signal_named("content", None),
            name: name.unwrap_or_else(|| file_name(&path).to_string()),
            path: Some(path),
            reference: None,
            lifecycle,
        })
    }

    pub fn virtual_source(session_id: &str, reference: i64, name: Option<String>) -> Rc<Self> {
        let lifecycle = Lifecycle::new(child_uri(
            Some(&session_uri(session_id)),
            SegmentKind::Source,
            &reference.to_string(),
        ));
        Rc::new(Self {
            content: lifecycle.signal_named("content", None),
            name: name.unwrap_or_else(|| format!("<source {reference}>")),
            path: None,
            reference: Some(reference),
            lifecycle,
        })
    }

    pub fn is_virtual(&self) -> bool {
        self.reference.is_some()
    }

    /// The value matched by `source:<id>` selectors
    pub fn key_value(&self) -> String {
        match (&self.path, self.reference) {
            (Some(path), _) => path.clone(),
            (None, Some(reference)) => reference.to_string(),
            (None, None) => self.name.clone(),
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

impl Entity for Source {
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

impl EntityKind for Source {
    const TYPE: EntityType = "Source";
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("reference", &self.reference)
            .finish()
    }
}
