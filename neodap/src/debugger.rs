//! The debugger facade
//!
//! [`Debugger`] owns the entity store, the root focus context and one slot
//! per connected session. Adapter events are applied synchronously through
//! [`Debugger::handle_event`]; commands are async, send one request through
//! the session's [`Transport`] and write the answer into the graph.
//!
//! No `RefCell` borrow is held across an `.await`: slots are cloned out
//! before a request and looked up again afterwards.

use crate::config::DebuggerConfig;
use crate::context::Context;
use crate::domain::{
    edges, is_current, mark_stale, parent_over, register_indexes, Binding, Breakpoint,
    BreakpointOptions, EvalResult, ExceptionFilter, Expandable, Frame, Output, Scope, Session, SessionSpec,
    SessionState, Source, Stack, Thread, ThreadState, Variable, SESSION_CASCADE, TREE_EDGES,
};
use crate::error::{DebugError, Result};
use crate::transport::{
    AdapterEvent, BreakpointStatus, Command, ExceptionInfo, Response, SourceBreakpoint,
    SourceInfo, StepKind, Transport,
};
use crate::uri::{
    self, binding_uri, breakpoint_uri, exception_uri, session_uri, thread_uri, ContextualQuery,
};
use indexmap::IndexMap;
use neodap_graph::{EdgeType, Entity, EntityKind, EntityRef, EntityStore, Link, TreeWindow, View};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::rc::Rc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Edges removed together with a thread
const THREAD_CASCADE: &[EdgeType] = &[
    edges::STACKS,
    edges::FRAMES,
    edges::SCOPES,
    edges::VARIABLES,
    edges::EVALS,
];

/// Edges walked from a fetched entity up to its session
const UPWARD: &[EdgeType] = &[
    edges::THREADS,
    edges::STACKS,
    edges::FRAMES,
    edges::SCOPES,
    edges::VARIABLES,
    edges::OUTPUTS,
    edges::EVALS,
    edges::SOURCES,
];

struct SessionSlot {
    entity: EntityRef,
    session: Rc<Session>,
    transport: Rc<dyn Transport>,
    /// Paths that currently have breakpoints in the adapter
    sent_paths: HashSet<String>,
}

struct DebuggerInner {
    config: DebuggerConfig,
    store: EntityStore,
    context: Context,
    sessions: RefCell<IndexMap<String, SessionSlot>>,
    next_breakpoint: Cell<u64>,
}

/// Shared handle to the debug model
#[derive(Clone)]
pub struct Debugger {
    inner: Rc<DebuggerInner>,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(DebuggerConfig::default())
    }
}

impl Debugger {
    pub fn new(config: DebuggerConfig) -> Self {
        let store = EntityStore::with_config(config.store_config());
        register_indexes(&store);
        Self {
            inner: Rc::new(DebuggerInner {
                config,
                store,
                context: Context::new(),
                sessions: RefCell::new(IndexMap::new()),
                next_breakpoint: Cell::new(1),
            }),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.inner.config
    }

    /// The root focus context
    pub fn context(&self) -> Context {
        self.inner.context.clone()
    }

    /// A context that follows the root focus until pinned
    pub fn new_context(&self) -> Context {
        self.inner.context.child()
    }

    // ---- sessions ----

    /// Register a connected adapter
    ///
    /// The new session gets a binding for every existing breakpoint; call
    /// [`sync_breakpoints`](Self::sync_breakpoints) to send them.
    pub fn add_session(&self, spec: SessionSpec, transport: Rc<dyn Transport>) -> Result<Rc<Session>> {
        if self.inner.sessions.borrow().contains_key(&spec.id) {
            return Err(DebugError::DuplicateSession(spec.id));
        }
        let mut links = Vec::new();
        if let Some(parent) = &spec.parent {
            let parent = self
                .slot_entity(parent)
                .ok_or_else(|| DebugError::UnknownSession(parent.clone()))?;
            links.push(Link::From(parent.id(), edges::CHILDREN));
        }

        let session = Session::new(&spec);
        let entity = self.store().add(session.clone(), &links)?;
        for info in &spec.exception_filters {
            self.store().add(
                ExceptionFilter::new(&spec.id, info),
                &[Link::From(entity.id(), edges::EXCEPTIONS)],
            )?;
        }
        for breakpoint in self.store().of_type(Breakpoint::TYPE) {
            if let Some(typed) = breakpoint.downcast::<Breakpoint>() {
                self.create_binding(&entity, &spec.id, &breakpoint, typed.id)?;
            }
        }

        self.inner.sessions.borrow_mut().insert(
            spec.id.clone(),
            SessionSlot {
                entity,
                session: session.clone(),
                transport,
                sent_paths: HashSet::new(),
            },
        );
        info!(session = %spec.id, parent = ?spec.parent, "session added");
        Ok(session)
    }

    pub fn session(&self, id: &str) -> Option<Rc<Session>> {
        self.inner
            .sessions
            .borrow()
            .get(id)
            .map(|slot| slot.session.clone())
    }

    /// Live sessions in registration order
    pub fn sessions(&self) -> Vec<Rc<Session>> {
        self.inner
            .sessions
            .borrow()
            .values()
            .map(|slot| slot.session.clone())
            .collect()
    }

    pub fn thread(&self, session_id: &str, thread_id: i64) -> Option<Rc<Thread>> {
        self.store()
            .get_as::<Thread>(&thread_uri(&session_uri(session_id), thread_id))
    }

    fn slot_entity(&self, id: &str) -> Option<EntityRef> {
        self.inner
            .sessions
            .borrow()
            .get(id)
            .map(|slot| slot.entity.clone())
    }

    fn session_entity(&self, id: &str) -> Result<EntityRef> {
        self.slot_entity(id)
            .ok_or_else(|| DebugError::UnknownSession(id.to_string()))
    }

    fn transport(&self, id: &str) -> Result<Rc<dyn Transport>> {
        self.inner
            .sessions
            .borrow()
            .get(id)
            .map(|slot| slot.transport.clone())
            .ok_or_else(|| DebugError::UnknownSession(id.to_string()))
    }

    async fn request(&self, session_id: &str, command: Command) -> Result<Response> {
        let transport = self.transport(session_id)?;
        let name = command.name();
        trace!(session = session_id, command = name, "request");
        match transport.request(command).await {
            Ok(response) => Ok(response),
            Err(err) => {
                debug!(session = session_id, command = name, error = %err, "request failed");
                Err(err.into())
            }
        }
    }

    /// Session id owning a fetched entity
    fn session_of(&self, entity: &EntityRef) -> Option<String> {
        let mut cursor = Some(entity.clone());
        while let Some(current) = cursor {
            if let Some(session) = current.downcast::<Session>() {
                return Some(session.id.clone());
            }
            cursor = parent_over(self.store(), current.id(), UPWARD);
        }
        None
    }

    fn ensure_thread(&self, session: &EntityRef, session_id: &str, thread_id: i64, name: Option<&str>) -> Result<Rc<Thread>> {
        if let Some(thread) = self.thread(session_id, thread_id) {
            if let Some(name) = name {
                thread.name.set(name.to_string());
            }
            return Ok(thread);
        }
        let name = name.map_or_else(|| format!("thread {thread_id}"), str::to_string);
        let thread = Thread::new(session_id, thread_id, name);
        self.store()
            .add(thread.clone(), &[Link::From(session.id(), edges::THREADS)])?;
        debug!(session = session_id, thread = thread_id, "thread added");
        Ok(thread)
    }

    fn threads_of(&self, session: &EntityRef) -> Vec<Rc<Thread>> {
        self.store()
            .edges_from(session.id(), edges::THREADS)
            .iter()
            .filter_map(EntityRef::downcast::<Thread>)
            .collect()
    }

    fn bindings_of(&self, session: &EntityRef) -> Vec<Rc<Binding>> {
        self.store()
            .edges_from(session.id(), edges::BINDINGS)
            .iter()
            .filter_map(EntityRef::downcast::<Binding>)
            .collect()
    }

    fn mark_thread_stale(&self, thread: &Thread) {
        if let Some(entity) = self.store().get_by_uri(thread.uri()) {
            mark_stale(self.store(), entity.id());
        }
    }

    // ---- events ----

    /// Apply one adapter event to the graph
    pub fn handle_event(&self, session_id: &str, event: AdapterEvent) -> Result<()> {
        let session = self.session_entity(session_id)?;
        trace!(session = session_id, ?event, "adapter event");
        match event {
            AdapterEvent::ThreadStarted { thread_id, name } => {
                self.ensure_thread(&session, session_id, thread_id, name.as_deref())?;
            }
            AdapterEvent::ThreadExited { thread_id } => {
                if let Some(thread) = self.thread(session_id, thread_id) {
                    thread.state.set(ThreadState::Exited);
                    self.release_focus_within(thread.uri());
                    for binding in self.bindings_of(&session) {
                        if binding.hit_thread.get() == Some(thread_id) {
                            binding.clear_hit();
                        }
                    }
                    if let Some(entity) = self.store().get_by_uri(thread.uri()) {
                        let removed = self.store().remove_cascade(entity.id(), THREAD_CASCADE);
                        debug!(session = session_id, thread = thread_id, removed, "thread exited");
                    }
                }
            }
            AdapterEvent::Stopped {
                thread_id,
                reason,
                all_threads_stopped,
                hit_breakpoint_ids,
            } => {
                self.apply_stopped(
                    &session,
                    session_id,
                    thread_id,
                    &reason,
                    all_threads_stopped,
                    &hit_breakpoint_ids,
                )?;
            }
            AdapterEvent::Continued {
                thread_id,
                all_threads_continued,
            } => self.apply_continued(&session, session_id, thread_id, all_threads_continued),
            AdapterEvent::BreakpointChanged { breakpoint } => {
                let binding = self
                    .bindings_of(&session)
                    .into_iter()
                    .find(|binding| breakpoint.id.is_some() && binding.adapter_id.get() == breakpoint.id);
                match binding {
                    Some(binding) => apply_status(&binding, &breakpoint),
                    None => debug!(session = session_id, id = ?breakpoint.id, "change for an unknown breakpoint"),
                }
            }
            AdapterEvent::Output {
                category,
                output,
                variables_reference,
            } => self.push_output(&session, session_id, category, output, variables_reference)?,
            AdapterEvent::Exited { exit_code } => {
                if let Some(typed) = session.downcast::<Session>() {
                    typed.exit_code.set(Some(exit_code));
                }
                info!(session = session_id, exit_code, "debuggee exited");
            }
            AdapterEvent::Terminated => self.terminate(session_id, None),
            AdapterEvent::Error { message } => {
                warn!(session = session_id, error = %message, "adapter error");
                self.terminate(session_id, Some(message));
            }
        }
        Ok(())
    }

    fn apply_stopped(
        &self,
        session: &EntityRef,
        session_id: &str,
        thread_id: Option<i64>,
        reason: &str,
        all_threads: bool,
        hits: &[i64],
    ) -> Result<()> {
        let mut threads = Vec::new();
        if let Some(id) = thread_id {
            threads.push(self.ensure_thread(session, session_id, id, None)?);
        }
        if all_threads || thread_id.is_none() {
            for thread in self.threads_of(session) {
                if !threads.iter().any(|t| t.id == thread.id) {
                    threads.push(thread);
                }
            }
        }

        let stopped: Vec<i64> = threads.iter().map(|t| t.id).collect();
        for thread in &threads {
            self.mark_thread_stale(thread);
            thread.stop_reason.set(Some(reason.to_string()));
            thread.exception.set(None);
            thread.state.set(ThreadState::Stopped);
        }

        for binding in self.bindings_of(session) {
            if binding.hit_thread.get().is_some_and(|t| stopped.contains(&t)) {
                binding.clear_hit();
            }
            if binding.adapter_id.get().is_some_and(|id| hits.contains(&id)) {
                binding.hit_thread.set(thread_id);
                binding.hit.set(true);
            }
        }
        debug!(session = session_id, threads = ?stopped, reason, "stopped");
        Ok(())
    }

    fn apply_continued(&self, session: &EntityRef, session_id: &str, thread_id: Option<i64>, all_threads: bool) {
        let threads: Vec<Rc<Thread>> = match thread_id {
            Some(id) if !all_threads => self.thread(session_id, id).into_iter().collect(),
            _ => self.threads_of(session),
        };
        let resumed: Vec<i64> = threads.iter().map(|t| t.id).collect();
        for thread in &threads {
            self.mark_thread_stale(thread);
            thread.stop_reason.set(None);
            thread.exception.set(None);
            thread.state.set(ThreadState::Running);
        }
        for binding in self.bindings_of(session) {
            if binding.hit_thread.get().is_some_and(|t| resumed.contains(&t)) || (binding.hit.get() && binding.hit_thread.get().is_none()) {
                binding.clear_hit();
            }
        }
        debug!(session = session_id, threads = ?resumed, "continued");
    }

    fn push_output(
        &self,
        session: &EntityRef,
        session_id: &str,
        category: String,
        text: String,
        variables_reference: i64,
    ) -> Result<()> {
        let Some(typed) = session.downcast::<Session>() else {
            return Ok(());
        };
        let output = Output::new(session.uri(), typed.next_output_seq(), category, text, variables_reference);
        self.store()
            .add(output, &[Link::From(session.id(), edges::OUTPUTS)])?;

        let max = self.inner.config.max_outputs_per_session;
        while self.store().edge_len(session.id(), edges::OUTPUTS) > max {
            let Some(oldest) = self.store().edge_at(session.id(), edges::OUTPUTS, 0) else {
                break;
            };
            self.store().remove_cascade(oldest, &[edges::VARIABLES]);
            trace!(session = session_id, "oldest output dropped");
        }
        Ok(())
    }

    /// Mark a session terminated and remove it with everything it owns
    ///
    /// Child sessions go first. Path sources and breakpoints are shared and
    /// stay.
    fn terminate(&self, session_id: &str, error: Option<String>) {
        let slot = self.inner.sessions.borrow_mut().shift_remove(session_id);
        let Some(slot) = slot else {
            return;
        };

        let children: Vec<String> = self
            .store()
            .edges_from(slot.entity.id(), edges::CHILDREN)
            .iter()
            .filter_map(EntityRef::downcast::<Session>)
            .map(|child| child.id.clone())
            .collect();
        for child in children {
            self.terminate(&child, None);
        }

        if error.is_some() {
            slot.session.error.set(error);
        }
        slot.session.state.set(SessionState::Terminated);

        self.release_focus_within(slot.entity.uri());

        let removed = self.store().remove_cascade(slot.entity.id(), SESSION_CASCADE);
        info!(session = session_id, removed, "session terminated");
    }

    /// Unpin the root context if it points at `uri` or below it
    fn release_focus_within(&self, uri: &str) {
        let Some(focus) = self.inner.context.frame_uri() else {
            return;
        };
        let inside = focus
            .strip_prefix(uri)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if inside {
            trace!(focus = %focus, "focus released");
            self.inner.context.unpin();
        }
    }

    // ---- fetching ----

    /// Refresh the thread list of a session
    pub async fn fetch_threads(&self, session_id: &str) -> Result<Vec<Rc<Thread>>> {
        let Response::Threads(infos) = self.request(session_id, Command::Threads).await? else {
            return Err(DebugError::UnexpectedResponse { command: "threads" });
        };
        let session = self.session_entity(session_id)?;
        infos
            .iter()
            .map(|info| self.ensure_thread(&session, session_id, info.id, Some(&info.name)))
            .collect()
    }

    /// Fetch a new stack for a stopped thread
    ///
    /// The stack is prepended to the thread's stacks, so it becomes
    /// `stack[0]` and every older stack moves down one index. Earlier
    /// stacks are flagged stale but kept.
    pub async fn fetch_stack(&self, session_id: &str, thread_id: i64) -> Result<Rc<Stack>> {
        let thread = self
            .thread(session_id, thread_id)
            .ok_or_else(|| DebugError::UnknownThread {
                session: session_id.to_string(),
                thread: thread_id,
            })?;
        if !thread.is_stopped() {
            return Err(DebugError::NotStopped(thread_id));
        }

        let Response::StackTrace(infos) = self
            .request(session_id, Command::StackTrace { thread_id })
            .await?
        else {
            return Err(DebugError::UnexpectedResponse { command: "stackTrace" });
        };

        thread.lifecycle().ensure_live()?;
        if !thread.is_stopped() {
            return Err(DebugError::NotStopped(thread_id));
        }
        let session = self.session_entity(session_id)?;
        let thread_entity = self
            .store()
            .get_by_uri(thread.uri())
            .ok_or_else(|| DebugError::Disposed {
                uri: thread.uri().to_string(),
            })?;

        mark_stale(self.store(), thread_entity.id());
        let stack = Stack::new(thread.uri(), thread.next_stack_seq());
        let stack_entity = self
            .store()
            .add(stack.clone(), &[Link::PrependFrom(thread_entity.id(), edges::STACKS)])?;
        self.store()
            .bind_position(stack_entity.id(), edges::STACKS, stack.index.clone());

        let mut top = None;
        for info in &infos {
            let frame = Frame::new(stack.uri(), info.id, info.name.clone(), info.line, info.column);
            let frame_entity = self
                .store()
                .add(frame.clone(), &[Link::From(stack_entity.id(), edges::FRAMES)])?;
            self.store()
                .bind_position(frame_entity.id(), edges::FRAMES, frame.index.clone());
            if let Some(source) = &info.source {
                let source = self.ensure_source(&session, session_id, source)?;
                self.store()
                    .add_edge(frame_entity.id(), edges::SOURCE, source.id())?;
            }
            if top.is_none() {
                top = Some(frame.uri().to_string());
            }
        }

        for binding in self.bindings_of(&session) {
            if binding.hit.get() && binding.hit_thread.get() == Some(thread_id) {
                binding.active_frame.set(top.clone());
            }
        }
        if self.inner.config.auto_focus {
            if let Some(top) = &top {
                self.inner.context.pin(top.clone());
            }
        }
        debug!(
            session = session_id,
            thread = thread_id,
            seq = stack.seq,
            frames = infos.len(),
            "stack fetched"
        );
        Ok(stack)
    }

    fn ensure_source(
        &self,
        session: &EntityRef,
        session_id: &str,
        info: &SourceInfo,
    ) -> Result<EntityRef> {
        let (source, links) = match (info.virtual_reference(), &info.path) {
            (Some(reference), _) => (
                Source::virtual_source(session_id, reference, info.name.clone()),
                vec![Link::From(session.id(), edges::SOURCES)],
            ),
            (None, Some(path)) => (Source::from_path(path.clone(), info.name.clone()), Vec::new()),
            (None, None) => (
                Source::virtual_source(session_id, 0, info.name.clone()),
                vec![Link::From(session.id(), edges::SOURCES)],
            ),
        };
        if let Some(existing) = self.store().get_by_uri(source.uri()) {
            return Ok(existing);
        }
        Ok(self.store().add(source, &links)?)
    }

    /// Load the scopes of a frame, once
    pub async fn fetch_scopes(&self, frame_uri: &str) -> Result<Vec<Rc<Scope>>> {
        let (frame_entity, frame) = self.lookup::<Frame>(frame_uri)?;
        if frame.scopes_loaded() {
            return Ok(self.children_as::<Scope>(&frame_entity, edges::SCOPES));
        }
        let session_id = self.owning_session(&frame_entity)?;

        let Response::Scopes(infos) = self
            .request(&session_id, Command::Scopes { frame_id: frame.id })
            .await?
        else {
            return Err(DebugError::UnexpectedResponse { command: "scopes" });
        };

        frame.lifecycle().ensure_live()?;
        if !frame.scopes_loaded() {
            for info in &infos {
                let scope = Scope::new(frame.uri(), info.name.clone(), info.variables_reference, info.expensive);
                if !frame.is_current() {
                    scope.current.set(false);
                }
                self.store()
                    .add(scope, &[Link::From(frame_entity.id(), edges::SCOPES)])?;
            }
            frame.mark_scopes_loaded();
        }
        Ok(self.children_as::<Scope>(&frame_entity, edges::SCOPES))
    }

    /// Load the children of a scope, variable, output or evaluation result
    pub async fn fetch_variables(&self, parent_uri: &str) -> Result<Vec<Rc<Variable>>> {
        let parent = self.store().get_by_uri(parent_uri).ok_or_else(|| DebugError::Disposed {
            uri: parent_uri.to_string(),
        })?;
        let expandable = expandable(&parent).ok_or_else(|| DebugError::NotExpandable(parent_uri.to_string()))?;
        if expandable.variables_reference() <= 0 {
            return Err(DebugError::NotExpandable(parent_uri.to_string()));
        }
        if expandable.loaded().get() {
            return Ok(self.children_as::<Variable>(&parent, edges::VARIABLES));
        }
        let session_id = self.owning_session(&parent)?;

        let Response::Variables(infos) = self
            .request(
                &session_id,
                Command::Variables {
                    variables_reference: expandable.variables_reference(),
                },
            )
            .await?
        else {
            return Err(DebugError::UnexpectedResponse { command: "variables" });
        };

        parent.entity().lifecycle().ensure_live()?;
        if !expandable.loaded().get() {
            let current = expandable.is_current();
            for info in &infos {
                let variable = Variable::new(
                    parent.uri(),
                    info.name.clone(),
                    info.value.clone(),
                    info.type_name.clone(),
                    info.variables_reference,
                    current,
                );
                if self.store().get_by_uri(variable.uri()).is_some() {
                    debug!(uri = variable.uri(), "duplicate variable name skipped");
                    continue;
                }
                self.store()
                    .add(variable, &[Link::From(parent.id(), edges::VARIABLES)])?;
            }
            expandable.loaded().set(true);
        }
        Ok(self.children_as::<Variable>(&parent, edges::VARIABLES))
    }

    /// Expand a structured console entry
    pub async fn expand_output(&self, output_uri: &str) -> Result<Vec<Rc<Variable>>> {
        self.lookup::<Output>(output_uri)?;
        self.fetch_variables(output_uri).await
    }

    /// Evaluate an expression, optionally in a frame
    ///
    /// The result is linked from the session and, when given, the frame.
    pub async fn evaluate(&self, session_id: &str, expression: &str, frame_uri: Option<&str>) -> Result<Rc<EvalResult>> {
        let frame = frame_uri.map(|uri| self.lookup::<Frame>(uri)).transpose()?;
        let command = Command::Evaluate {
            expression: expression.to_string(),
            frame_id: frame.as_ref().map(|(_, frame)| frame.id),
        };
        let Response::Evaluate(info) = self.request(session_id, command).await? else {
            return Err(DebugError::UnexpectedResponse { command: "evaluate" });
        };

        let session = self.session_entity(session_id)?;
        let Some(typed) = session.downcast::<Session>() else {
            return Err(DebugError::UnknownSession(session_id.to_string()));
        };
        let result = EvalResult::new(
            session.uri(),
            typed.next_eval_seq(),
            expression,
            info.result,
            info.type_name,
            info.variables_reference,
        );
        let mut links = vec![Link::From(session.id(), edges::EVALS)];
        if let Some((frame_entity, frame)) = &frame {
            if !frame_entity.is_disposed() {
                links.push(Link::From(frame_entity.id(), edges::EVALS));
                if !frame.is_current() {
                    result.current.set(false);
                }
            }
        }
        self.store().add(result.clone(), &links)?;
        Ok(result)
    }

    /// Load the text of a source
    ///
    /// Virtual sources are requested from the adapter; path sources are
    /// read from disk. The text is cached in `Source::content`.
    pub async fn fetch_source(&self, source_uri: &str) -> Result<String> {
        let (entity, source) = self.lookup::<Source>(source_uri)?;
        if let Some(content) = source.content.get() {
            return Ok(content);
        }

        let content = match (source.reference, &source.path) {
            (Some(reference), _) if reference > 0 => {
                let session_id = self.owning_session(&entity)?;
                let Response::Source { content } = self
                    .request(&session_id, Command::Source { source_reference: reference })
                    .await?
                else {
                    return Err(DebugError::UnexpectedResponse { command: "source" });
                };
                content
            }
            (_, Some(path)) => tokio::fs::read_to_string(path)
                .await
                .map_err(|err| DebugError::SourceUnavailable {
                    path: path.clone(),
                    message: err.to_string(),
                })?,
            _ => return Err(DebugError::NoSourceReference(source_uri.to_string())),
        };

        source.lifecycle().ensure_live()?;
        source.content.set(Some(content.clone()));
        Ok(content)
    }

    fn lookup<E: EntityKind>(&self, uri: &str) -> Result<(EntityRef, Rc<E>)> {
        let disposed = || DebugError::Disposed { uri: uri.to_string() };
        let entity = self.store().get_by_uri(uri).ok_or_else(disposed)?;
        let typed = entity.downcast::<E>().ok_or_else(disposed)?;
        Ok((entity, typed))
    }

    fn owning_session(&self, entity: &EntityRef) -> Result<String> {
        self.session_of(entity)
            .ok_or_else(|| DebugError::Disposed {
                uri: entity.uri().to_string(),
            })
    }

    fn children_as<E: EntityKind>(&self, parent: &EntityRef, edge: EdgeType) -> Vec<Rc<E>> {
        self.store()
            .edges_from(parent.id(), edge)
            .iter()
            .filter_map(EntityRef::downcast::<E>)
            .collect()
    }

    // ---- breakpoints ----

    fn create_binding(&self, session: &EntityRef, session_id: &str, breakpoint: &EntityRef, id: u64) -> Result<()> {
        if self
            .store()
            .get_by_uri(&binding_uri(&session_uri(session_id), id))
            .is_some()
        {
            return Ok(());
        }
        self.store().add(
            Binding::new(session_id, id),
            &[
                Link::From(session.id(), edges::BINDINGS),
                Link::From(breakpoint.id(), edges::BINDINGS),
            ],
        )?;
        Ok(())
    }

    /// Create a breakpoint and send it to every session
    pub async fn add_breakpoint(&self, path: &str, line: i64, options: BreakpointOptions) -> Result<Rc<Breakpoint>> {
        let id = self.inner.next_breakpoint.get();
        self.inner.next_breakpoint.set(id + 1);
        let breakpoint = Breakpoint::new(id, path, line, options);
        let entity = self.store().add(breakpoint.clone(), &[])?;

        let sessions: Vec<(String, EntityRef)> = self
            .inner
            .sessions
            .borrow()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.entity.clone()))
            .collect();
        for (session_id, session) in &sessions {
            self.create_binding(session, session_id, &entity, id)?;
        }
        info!(id, path, line, "breakpoint added");

        self.sync_everywhere(path).await?;
        Ok(breakpoint)
    }

    /// Remove a breakpoint and its bindings
    pub async fn remove_breakpoint(&self, id: u64) -> Result<()> {
        let (entity, breakpoint) = self
            .lookup::<Breakpoint>(&breakpoint_uri(id))
            .map_err(|_| DebugError::UnknownBreakpoint(id))?;
        self.store().remove_cascade(entity.id(), &[edges::BINDINGS]);
        info!(id, "breakpoint removed");
        self.sync_everywhere(&breakpoint.path).await
    }

    /// Enable or disable a breakpoint; disabled ones are not sent
    pub async fn set_breakpoint_enabled(&self, id: u64, enabled: bool) -> Result<()> {
        let (_, breakpoint) = self
            .lookup::<Breakpoint>(&breakpoint_uri(id))
            .map_err(|_| DebugError::UnknownBreakpoint(id))?;
        if !breakpoint.enabled.set(enabled) {
            return Ok(());
        }
        self.sync_everywhere(&breakpoint.path).await
    }

    /// Send every breakpoint path to one session
    pub async fn sync_breakpoints(&self, session_id: &str) -> Result<()> {
        let mut paths: BTreeSet<String> = self
            .store()
            .view(Breakpoint::TYPE)
            .iter_as::<Breakpoint>()
            .iter()
            .map(|breakpoint| breakpoint.path.clone())
            .collect();
        {
            let sessions = self.inner.sessions.borrow();
            let slot = sessions
                .get(session_id)
                .ok_or_else(|| DebugError::UnknownSession(session_id.to_string()))?;
            paths.extend(slot.sent_paths.iter().cloned());
        }
        for path in paths {
            self.sync_path(session_id, &path).await?;
        }
        if !self.exception_filters(session_id)?.is_empty() {
            self.sync_exception_filters(session_id).await?;
        }
        Ok(())
    }

    async fn sync_everywhere(&self, path: &str) -> Result<()> {
        let sessions: Vec<String> = self.inner.sessions.borrow().keys().cloned().collect();
        let mut first_error = None;
        for session_id in sessions {
            if let Err(err) = self.sync_path(&session_id, path).await {
                warn!(session = %session_id, path, error = %err, "breakpoint sync failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn sync_path(&self, session_id: &str, path: &str) -> Result<()> {
        let all: Vec<Rc<Breakpoint>> = self
            .store()
            .view(Breakpoint::TYPE)
            .iter_as::<Breakpoint>()
            .into_iter()
            .filter(|breakpoint| breakpoint.path == path)
            .collect();
        let (enabled, disabled): (Vec<_>, Vec<_>) = all.into_iter().partition(|b| b.is_enabled());
        let session = session_uri(session_id);

        for breakpoint in &disabled {
            if let Some(binding) = self.store().get_as::<Binding>(&binding_uri(&session, breakpoint.id)) {
                binding.verified.set(false);
                binding.adapter_id.set(None);
                binding.clear_hit();
            }
        }

        let was_sent = {
            let sessions = self.inner.sessions.borrow();
            let slot = sessions
                .get(session_id)
                .ok_or_else(|| DebugError::UnknownSession(session_id.to_string()))?;
            slot.sent_paths.contains(path)
        };
        if enabled.is_empty() && !was_sent {
            return Ok(());
        }

        let requested = enabled
            .iter()
            .map(|breakpoint| SourceBreakpoint {
                line: breakpoint.line,
                condition: breakpoint.condition.get(),
                log_message: breakpoint.log_message.get(),
            })
            .collect();
        let command = Command::SetBreakpoints {
            path: path.to_string(),
            breakpoints: requested,
        };
        let Response::Breakpoints(statuses) = self.request(session_id, command).await? else {
            return Err(DebugError::UnexpectedResponse { command: "setBreakpoints" });
        };

        for (breakpoint, status) in enabled.iter().zip(&statuses) {
            if let Some(binding) = self.store().get_as::<Binding>(&binding_uri(&session, breakpoint.id)) {
                binding.adapter_id.set(status.id);
                apply_status(&binding, status);
            }
        }
        if let Some(slot) = self.inner.sessions.borrow_mut().get_mut(session_id) {
            if enabled.is_empty() {
                slot.sent_paths.remove(path);
            } else {
                slot.sent_paths.insert(path.to_string());
            }
        }
        debug!(session = session_id, path, sent = enabled.len(), "breakpoints synced");
        Ok(())
    }

    // ---- exceptions ----

    /// Exception filters of a session in capability order
    pub fn exception_filters(&self, session_id: &str) -> Result<Vec<Rc<ExceptionFilter>>> {
        let session = self.session_entity(session_id)?;
        Ok(self.children_as(&session, edges::EXCEPTIONS))
    }

    /// Enable or disable one exception filter and resend the session's set
    pub async fn set_exception_filter(&self, session_id: &str, filter: &str, enabled: bool) -> Result<()> {
        self.session_entity(session_id)?;
        let (_, exception) = self
            .lookup::<ExceptionFilter>(&exception_uri(&session_uri(session_id), filter))
            .map_err(|_| DebugError::UnknownExceptionFilter {
                session: session_id.to_string(),
                filter: filter.to_string(),
            })?;
        if !exception.enabled.set(enabled) {
            return Ok(());
        }
        self.sync_exception_filters(session_id).await
    }

    /// Send the enabled exception filters of a session
    pub async fn sync_exception_filters(&self, session_id: &str) -> Result<()> {
        let filters: Vec<String> = self
            .exception_filters(session_id)?
            .iter()
            .filter(|exception| exception.enabled.get())
            .map(|exception| exception.filter.clone())
            .collect();
        let sent = filters.len();
        self.request(session_id, Command::SetExceptionBreakpoints { filters })
            .await?;
        debug!(session = session_id, sent, "exception filters synced");
        Ok(())
    }

    /// Fetch what a stopped thread raised and keep it in `Thread::exception`
    pub async fn fetch_exception_info(&self, session_id: &str, thread_id: i64) -> Result<ExceptionInfo> {
        let thread = self
            .thread(session_id, thread_id)
            .ok_or_else(|| DebugError::UnknownThread {
                session: session_id.to_string(),
                thread: thread_id,
            })?;
        if !thread.is_stopped() {
            return Err(DebugError::NotStopped(thread_id));
        }

        let Response::ExceptionInfo(info) = self
            .request(session_id, Command::ExceptionInfo { thread_id })
            .await?
        else {
            return Err(DebugError::UnexpectedResponse { command: "exceptionInfo" });
        };

        thread.lifecycle().ensure_live()?;
        if !thread.is_stopped() {
            return Err(DebugError::NotStopped(thread_id));
        }
        thread.exception.set(Some(info.clone()));
        Ok(info)
    }

    // ---- execution ----

    pub async fn continue_thread(&self, session_id: &str, thread_id: i64) -> Result<()> {
        self.request(session_id, Command::Continue { thread_id }).await?;
        self.resumed(session_id, thread_id)
    }

    pub async fn step(&self, session_id: &str, thread_id: i64, kind: StepKind) -> Result<()> {
        self.request(session_id, Command::Step { thread_id, kind }).await?;
        self.resumed(session_id, thread_id)
    }

    /// Ask the adapter to pause; the stop arrives as an event
    pub async fn pause(&self, session_id: &str, thread_id: i64) -> Result<()> {
        self.request(session_id, Command::Pause { thread_id }).await?;
        Ok(())
    }

    /// Disconnect and remove the session
    pub async fn disconnect(&self, session_id: &str, terminate_debuggee: bool) -> Result<()> {
        let result = self
            .request(session_id, Command::Disconnect { terminate_debuggee })
            .await;
        self.terminate(session_id, None);
        result.map(|_| ())
    }

    fn resumed(&self, session_id: &str, thread_id: i64) -> Result<()> {
        let session = self.session_entity(session_id)?;
        self.apply_continued(&session, session_id, Some(thread_id), false);
        Ok(())
    }

    // ---- queries ----

    /// Live view of a `dap:` URI; malformed URIs give an empty view
    pub fn resolve(&self, uri: &str) -> View {
        uri::resolve(self.store(), uri)
    }

    pub fn resolve_one(&self, uri: &str) -> Option<EntityRef> {
        uri::resolve_one(self.store(), uri)
    }

    /// Live query over a context-relative pattern such as `dap:@frame/scope`
    pub fn resolve_contextual(&self, pattern: &str, context: &Context) -> ContextualQuery {
        ContextualQuery::new(self.store(), pattern, context.signal())
    }

    /// A tree window over sessions, threads, stacks, frames, scopes and
    /// variables below `root_uri`
    pub fn tree_window(&self, root_uri: &str) -> TreeWindow {
        let options = self.inner.config.tree_options(TREE_EDGES.iter().copied());
        TreeWindow::new(self.store(), root_uri, options)
    }

    /// Whether a fetched entity still reflects the live execution point
    pub fn is_current(&self, uri: &str) -> bool {
        self.store().get_by_uri(uri).is_some_and(|entity| is_current(&entity))
    }

    /// Start the task that runs debounced work, such as tree window
    /// rebuilds, as it comes due
    ///
    /// Call once from inside a `tokio::task::LocalSet`. The task ends when
    /// the debugger and its store are dropped.
    pub fn spawn_driver(&self) -> JoinHandle<()> {
        self.store().scheduler().spawn_local()
    }

    /// Yield to the runtime, then run every pending debounced task
    pub async fn settle(&self) -> usize {
        self.store().scheduler().settle().await
    }
}

fn apply_status(binding: &Binding, status: &BreakpointStatus) {
    binding.verified.set(status.verified);
    binding.actual_line.set(status.line);
    binding.message.set(status.message.clone());
}

fn expandable(entity: &EntityRef) -> Option<Rc<dyn Expandable>> {
    if let Some(scope) = entity.downcast::<Scope>() {
        return Some(scope as Rc<dyn Expandable>);
    }
    if let Some(variable) = entity.downcast::<Variable>() {
        return Some(variable as Rc<dyn Expandable>);
    }
    if let Some(output) = entity.downcast::<Output>() {
        return Some(output as Rc<dyn Expandable>);
    }
    entity
        .downcast::<EvalResult>()
        .map(|result| result as Rc<dyn Expandable>)
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger")
            .field("sessions", &self.inner.sessions.borrow().keys().collect::<Vec<_>>())
            .field("entities", &self.store().len())
            .field("focus", &self.inner.context.frame_uri())
            .finish()
    }
}
