//! # neodap
//!
//! Live debug-session model addressed by `dap:` URIs.
//!
//! ## Architecture
//!
//! ```text
//!  adapter events                      commands
//!       │                                  ▲
//! ┌─────▼──────────────────────────────────┴─────┐
//! │ Debugger  handle_event / fetch_* / step ...   │── Transport (per session)
//! └─────┬─────────────────────────────────────────┘
//!       │ entities, edges
//! ┌─────▼──────┐   resolve("dap:...")   ┌──────────────────┐
//! │ EntityStore│ ◀───────────────────── │ uri / Context     │
//! └─────┬──────┘                        │ ContextualQuery   │
//!       │ live views                    └──────────────────┘
//!       ▼
//!  consumers (views, tree windows, signals)
//! ```
//!
//! - **Debugger**: sessions, threads, stacks, frames, scopes, variables,
//!   breakpoints and their per-session bindings.
//! - **uri**: the `dap:` grammar, planning to views, and `@frame`-style
//!   markers expanded against a [`Context`].
//! - **transport**: the typed command/response/event boundary.
//!
//! ## Example
//!
//! ```
//! use neodap::testing::{frame, ScriptedAdapter};
//! use neodap::{AdapterEvent, Debugger, SessionSpec};
//! use std::rc::Rc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let debugger = Debugger::default();
//! let adapter = ScriptedAdapter::new();
//! adapter.thread(1, "main").frames(1, vec![frame(10, "main", "/src/app.py", 3)]);
//! debugger.add_session(SessionSpec::new("app", "app.py"), Rc::new(adapter)).unwrap();
//!
//! debugger
//!     .handle_event("app", AdapterEvent::Stopped {
//!         thread_id: Some(1),
//!         reason: "pause".into(),
//!         all_threads_stopped: false,
//!         hit_breakpoint_ids: vec![],
//!     })
//!     .unwrap();
//! debugger.fetch_stack("app", 1).await.unwrap();
//!
//! let top = debugger.resolve("dap:session:app/frame[0]");
//! assert_eq!(top.count(), 1);
//! # });
//! ```

pub mod config;
pub mod context;
pub mod debugger;
pub mod domain;
pub mod error;
pub mod testing;
pub mod transport;
pub mod uri;

pub use config::{ConfigError, DebuggerConfig};
pub use context::Context;
pub use debugger::Debugger;
pub use domain::{
    Binding, Breakpoint, BreakpointOptions, EvalResult, ExceptionFilter, Frame, Output, Scope,
    Session, SessionSpec, SessionState, Source, Stack, Thread, ThreadState, Variable,
};
pub use error::{DebugError, Result, TransportError, UriError};
pub use transport::{
    AdapterEvent, Command, ExceptionFilterInfo, ExceptionInfo, Response, StepKind, Transport,
};
pub use uri::{ContextMap, ContextualQuery, Uri};

pub use neodap_graph::{EntityRef, EntityStore, TreeWindow, View};
pub use neodap_reactive::{Disposable, Signal, Subscription};
