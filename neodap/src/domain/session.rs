//! Sessions and threads

use crate::transport::{ExceptionFilterInfo, ExceptionInfo};
use crate::uri::{session_uri, thread_uri};
use neodap_graph::{Entity, EntityKind, EntityType};
use neodap_reactive::{Lifecycle, Signal};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// How a session is registered with the debugger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    pub id: String,
    pub name: String,
    /// Parent session for adapters that spawn child sessions
    pub parent: Option<String>,
    /// Exception filters from the adapter capabilities
    pub exception_filters: Vec<ExceptionFilterInfo>,
}

impl SessionSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
            exception_filters: Vec::new(),
        }
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_exception_filters(mut self, filters: Vec<ExceptionFilterInfo>) -> Self {
        self.exception_filters = filters;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Terminated,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Running => "running",
            SessionState::Terminated => "terminated",
        }
    }
}

/// One debug adapter connection
pub struct Session {
    lifecycle: Lifecycle,
    pub id: String,
    pub name: Signal<String>,
    pub state: Signal<SessionState>,
    pub exit_code: Signal<Option<i64>>,
    /// Last adapter error, set when the session ended abnormally
    pub error: Signal<Option<String>>,
    output_seq: Cell<u64>,
    eval_seq: Cell<u64>,
}

impl Session {
    pub fn new(spec: &SessionSpec) -> Rc<Self> {
        let lifecycle = Lifecycle::new(session_uri(&spec.id));
        Rc::new(Self {
            name: lifecycle.signal_named("name", spec.name.clone()),
            state: lifecycle.signal_named("state", SessionState::Running),
            exit_code: lifecycle.signal_named("exit_code", None),
            error: lifecycle.signal_named("error", None),
            id: spec.id.clone(),
            output_seq: Cell::new(0),
            eval_seq: Cell::new(0),
            lifecycle,
        })
    }

    pub fn is_terminated(&self) -> bool {
        self.state.get() == SessionState::Terminated
    }

    pub(crate) fn next_output_seq(&self) -> u64 {
        let seq = self.output_seq.get() + 1;
        self.output_seq.set(seq);
        seq
    }

    pub(crate) fn next_eval_seq(&self) -> u64 {
        let seq = self.eval_seq.get() + 1;
        self.eval_seq.set(seq);
        seq
    }
}

impl Entity for Session {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(self.name.get())
    }
}

impl EntityKind for Session {
    const TYPE: EntityType = "Session";
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Running,
    Stopped,
    Exited,
}

impl ThreadState {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadState::Running => "running",
            ThreadState::Stopped => "stopped",
            ThreadState::Exited => "exited",
        }
    }
}

pub struct Thread {
    lifecycle: Lifecycle,
    pub session_id: String,
    /// Adapter thread id
    pub id: i64,
    pub name: Signal<String>,
    pub state: Signal<ThreadState>,
    pub stop_reason: Signal<Option<String>>,
    /// Details of the exception the thread stopped on, once fetched
    pub exception: Signal<Option<ExceptionInfo>>,
    stack_seq: Cell<u64>,
}

impl Thread {
    pub fn new(session_id: &str, id: i64, name: impl Into<String>) -> Rc<Self> {
        let lifecycle = Lifecycle::new(thread_uri(&session_uri(session_id), id));
        Rc::new(Self {
            name: lifecycle.signal_named("name", name.into()),
            state: lifecycle.signal_named("state", ThreadState::Running),
            stop_reason: lifecycle.signal_named("stop_reason", None),
            exception: lifecycle.signal_named("exception", None),
            session_id: session_id.to_string(),
            id,
            stack_seq: Cell::new(0),
            lifecycle,
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.state.get() == ThreadState::Stopped
    }

    /// Sequence number for the next fetched stack, starting at 1
    pub(crate) fn next_stack_seq(&self) -> u64 {
        let seq = self.stack_seq.get() + 1;
        self.stack_seq.set(seq);
        seq
    }
}

impl Entity for Thread {
    fn entity_type(&self) -> EntityType {
        Self::TYPE
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn display_name(&self) -> Option<String> {
        Some(format!("{} ({})", self.name.get(), self.state.get().as_str()))
    }
}

impl EntityKind for Thread {
    const TYPE: EntityType = "Thread";
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("session", &self.session_id)
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}
