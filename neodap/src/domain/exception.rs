//! Exception breakpoint filters

use crate::transport::ExceptionFilterInfo;
use crate::uri::{exception_uri, session_uri};
use neodap_graph::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::fmt;
use std::rc::Rc;

/// One exception filter a session's adapter supports
///
/// The enabled filters of a session are sent together in a single
/// `setExceptionBreakpoints` request.
pub struct ExceptionFilter {
    lifecycle: Lifecycle,
    pub session_id: String,
    /// Adapter filter id, matched by `exception:<id>`
    pub filter: String,
    pub label: String,
    pub description: Option<String>,
    pub enabled: Signal<bool>,
}

impl ExceptionFilter {
    pub fn new(session_id: &str, info: &ExceptionFilterInfo) -> Rc<Self> {
        let lifecycle = Lifecycle::new(exception_uri(&session_uri(session_id), &info.filter));
        Rc::new(Self {
            enabled: lifecycle.signal_named("enabled", info.default),
            session_id: session_id.to_string(),
            filter: info.filter.clone(),
            label: info.label.clone(),
            description: info.description.clone(),
            lifecycle,
        })
    }
}

impl Entity for ExceptionFilter {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        let mark = if self.enabled.get() { "x" } else { " " };
        Some(format!("[{mark}] {}", self.label))
    }
}

impl EntityKind for ExceptionFilter {
    const TYPE: EntityType = "ExceptionFilter";
}

impl fmt::Debug for ExceptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionFilter")
            .field("session", &self.session_id)
            .field("filter", &self.filter)
            .field("enabled", &self.enabled.get())
            .finish()
    }
}
