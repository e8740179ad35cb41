//! Breakpoints and their per-session bindings

use crate::uri::{binding_uri, breakpoint_uri, session_uri};
use neodap_graph::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointOptions {
    pub condition: Option<String>,
    /// Logpoint message; the adapter logs instead of stopping
    pub log_message: Option<String>,
    pub enabled: bool,
}

impl Default for BreakpointOptions {
    fn default() -> Self {
        Self {
            condition: None,
            log_message: None,
            enabled: true,
        }
    }
}

/// A user breakpoint, independent of any session
pub struct Breakpoint {
    lifecycle: Lifecycle,
    pub id: u64,
    pub path: String,
    pub line: i64,
    pub condition: Signal<Option<String>>,
    pub log_message: Signal<Option<String>>,
    pub enabled: Signal<bool>,
}

impl Breakpoint {
    pub fn new(id: u64, path: impl Into<String>, line: i64, options: BreakpointOptions) -> Rc<Self> {
        let lifecycle = Lifecycle::new(breakpoint_uri(id));
        Rc::new(Self {
            condition: lifecycle.signal_named("condition", options.condition),
            log_message: lifecycle.signal_named("log_message", options.log_message),
            enabled: lifecycle.signal_named("enabled", options.enabled),
            id,
            path: path.into(),
            line,
            lifecycle,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

impl Entity for Breakpoint {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(format!("{}:{}", self.path, self.line))
    }
}

impl EntityKind for Breakpoint {
    const TYPE: EntityType = "Breakpoint";
}

impl fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breakpoint")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("line", &self.line)
            .field("enabled", &self.enabled.get())
            .finish()
    }
}

/// How one session realized a breakpoint
pub struct Binding {
    lifecycle: Lifecycle,
    pub session_id: String,
    pub breakpoint: u64,
    pub verified: Signal<bool>,
    /// Set while the session is stopped at this breakpoint
    pub hit: Signal<bool>,
    pub hit_thread: Signal<Option<i64>>,
    /// URI of the top frame of the hit, once its stack is fetched
    pub active_frame: Signal<Option<String>>,
    pub adapter_id: Signal<Option<i64>>,
    pub actual_line: Signal<Option<i64>>,
    pub message: Signal<Option<String>>,
}

impl Binding {
    pub fn new(session_id: &str, breakpoint: u64) -> Rc<Self> {
        let lifecycle = Lifecycle::new(binding_uri(&session_uri(session_id), breakpoint));
        Rc::new(Self {
            verified: lifecycle.signal_named("verified", false),
            hit: lifecycle.signal_named("hit", false),
            hit_thread: lifecycle.signal_named("hit_thread", None),
            active_frame: lifecycle.signal_named("active_frame", None),
            adapter_id: lifecycle.signal_named("adapter_id", None),
            actual_line: lifecycle.signal_named("actual_line", None),
            message: lifecycle.signal_named("message", None),
            session_id: session_id.to_string(),
            breakpoint,
            lifecycle,
        })
    }

    pub(crate) fn clear_hit(&self) {
        self.hit.set(false);
        self.hit_thread.set(None);
        self.active_frame.set(None);
    }
}

impl Entity for Binding {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

impl EntityKind for Binding {
    const TYPE: EntityType = "Binding";
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("session", &self.session_id)
            .field("breakpoint", &self.breakpoint)
            .field("verified", &self.verified.get())
            .field("hit", &self.hit.get())
            .finish()
    }
}
