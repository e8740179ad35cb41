//! In-process adapter double for tests and demos
//!
//! [`ScriptedAdapter`] answers commands from a script that tests fill in
//! (and may change between requests) and records every command it sees.

use crate::error::TransportError;
use crate::transport::{
    BreakpointStatus, Command, EvalInfo, ExceptionInfo, FrameInfo, Response, ScopeInfo,
    SourceInfo, ThreadInfo, Transport, VariableInfo,
};
use futures_util::future::{FutureExt, LocalBoxFuture};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Script {
    threads: Vec<ThreadInfo>,
    frames: HashMap<i64, Vec<FrameInfo>>,
    scopes: HashMap<i64, Vec<ScopeInfo>>,
    variables: HashMap<i64, Vec<VariableInfo>>,
    evals: HashMap<String, EvalInfo>,
    sources: HashMap<i64, String>,
    exceptions: HashMap<i64, ExceptionInfo>,
    unverified: bool,
    next_breakpoint_id: i64,
    log: Vec<Command>,
    fail_next: Option<String>,
}

impl Script {
    fn answer(&mut self, command: &Command) -> Result<Response, TransportError> {
        if let Some(message) = self.fail_next.take() {
            return Err(TransportError::Failed {
                command: command.name().to_string(),
                message,
            });
        }
        Ok(match command {
            Command::Threads => Response::Threads(self.threads.clone()),
            Command::StackTrace { thread_id } => {
                Response::StackTrace(self.frames.get(thread_id).cloned().unwrap_or_default())
            }
            Command::Scopes { frame_id } => {
                Response::Scopes(self.scopes.get(frame_id).cloned().unwrap_or_default())
            }
            Command::Variables {
                variables_reference,
            } => Response::Variables(
                self.variables
                    .get(variables_reference)
                    .cloned()
                    .unwrap_or_default(),
            ),
            Command::Evaluate { expression, .. } => match self.evals.get(expression) {
                Some(info) => Response::Evaluate(info.clone()),
                None => {
                    return Err(TransportError::Failed {
                        command: command.name().to_string(),
                        message: format!("cannot evaluate {expression:?}"),
                    })
                }
            },
            Command::Source { source_reference } => match self.sources.get(source_reference) {
                Some(content) => Response::Source {
                    content: content.clone(),
                },
                None => {
                    return Err(TransportError::Failed {
                        command: command.name().to_string(),
                        message: format!("no source {source_reference}"),
                    })
                }
            },
            Command::SetBreakpoints { breakpoints, .. } => Response::Breakpoints(
                breakpoints
                    .iter()
                    .map(|requested| {
                        self.next_breakpoint_id += 1;
                        BreakpointStatus {
                            id: Some(self.next_breakpoint_id),
                            verified: !self.unverified,
                            line: Some(requested.line),
                            message: None,
                        }
                    })
                    .collect(),
            ),
            Command::ExceptionInfo { thread_id } => match self.exceptions.get(thread_id) {
                Some(info) => Response::ExceptionInfo(info.clone()),
                None => {
                    return Err(TransportError::Failed {
                        command: command.name().to_string(),
                        message: format!("thread {thread_id} did not raise"),
                    })
                }
            },
            _ => Response::Ack,
        })
    }
}

/// Scripted stand-in for a debug adapter
#[derive(Clone, Default)]
pub struct ScriptedAdapter {
    script: Arc<Mutex<Script>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread(&self, id: i64, name: &str) -> &Self {
        self.script.lock().threads.push(ThreadInfo {
            id,
            name: name.to_string(),
        });
        self
    }

    /// Replace the stack trace returned for `thread_id`
    pub fn frames(&self, thread_id: i64, frames: Vec<FrameInfo>) -> &Self {
        self.script.lock().frames.insert(thread_id, frames);
        self
    }

    pub fn scopes(&self, frame_id: i64, scopes: Vec<ScopeInfo>) -> &Self {
        self.script.lock().scopes.insert(frame_id, scopes);
        self
    }

    pub fn variables(&self, reference: i64, variables: Vec<VariableInfo>) -> &Self {
        self.script.lock().variables.insert(reference, variables);
        self
    }

    pub fn eval(&self, expression: &str, info: EvalInfo) -> &Self {
        self.script.lock().evals.insert(expression.to_string(), info);
        self
    }

    pub fn source(&self, reference: i64, content: &str) -> &Self {
        self.script.lock().sources.insert(reference, content.to_string());
        self
    }

    /// Exception reported for `thread_id` by `exceptionInfo`
    pub fn exception(&self, thread_id: i64, info: ExceptionInfo) -> &Self {
        self.script.lock().exceptions.insert(thread_id, info);
        self
    }

    /// Report every breakpoint as unverified
    pub fn reject_breakpoints(&self) -> &Self {
        self.script.lock().unverified = true;
        self
    }

    /// Fail the next request with `message`
    pub fn fail_next(&self, message: &str) -> &Self {
        self.script.lock().fail_next = Some(message.to_string());
        self
    }

    /// Every command received so far
    pub fn commands(&self) -> Vec<Command> {
        self.script.lock().log.clone()
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.script.lock().log.iter().map(Command::name).collect()
    }
}

impl Transport for ScriptedAdapter {
    fn request(&self, command: Command) -> LocalBoxFuture<'_, Result<Response, TransportError>> {
        let result = {
            let mut script = self.script.lock();
            script.log.push(command.clone());
            script.answer(&command)
        };
        async move {
            tokio::task::yield_now().await;
            result
        }
        .boxed_local()
    }
}

/// A frame with a path source
pub fn frame(id: i64, name: &str, path: &str, line: i64) -> FrameInfo {
    FrameInfo {
        id,
        name: name.to_string(),
        line,
        column: 1,
        source: Some(SourceInfo {
            name: None,
            path: Some(path.to_string()),
            source_reference: None,
        }),
    }
}

/// A frame whose source only exists inside the adapter
pub fn virtual_frame(id: i64, name: &str, reference: i64, line: i64) -> FrameInfo {
    FrameInfo {
        id,
        name: name.to_string(),
        line,
        column: 1,
        source: Some(SourceInfo {
            name: Some(format!("{name}.generated")),
            path: None,
            source_reference: Some(reference),
        }),
    }
}

pub fn exception(id: &str, description: &str) -> ExceptionInfo {
    ExceptionInfo {
        exception_id: id.to_string(),
        description: Some(description.to_string()),
        break_mode: "unhandled".to_string(),
    }
}

pub fn scope(name: &str, reference: i64) -> ScopeInfo {
    ScopeInfo {
        name: name.to_string(),
        variables_reference: reference,
        expensive: false,
    }
}

pub fn variable(name: &str, value: &str, reference: i64) -> VariableInfo {
    VariableInfo {
        name: name.to_string(),
        value: value.to_string(),
        type_name: None,
        variables_reference: reference,
    }
}
