//! Debug adapter boundary
//!
//! The wire protocol itself lives outside this crate. A [`Transport`]
//! answers [`Command`]s with [`Response`]s, and the host feeds adapter
//! events to [`Debugger::handle_event`](crate::Debugger::handle_event).
//! The protocol payload types mirror the Debug Adapter Protocol bodies so
//! transports can decode them with `serde_json` directly.

use crate::error::TransportError;
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub source_reference: Option<i64>,
}

impl SourceInfo {
    /// Whether the source only exists inside the adapter
    pub fn virtual_reference(&self) -> Option<i64> {
        self.source_reference.filter(|reference| *reference > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub line: i64,
    #[serde(default)]
    pub column: i64,
    #[serde(default)]
    pub source: Option<SourceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeInfo {
    pub name: String,
    pub variables_reference: i64,
    #[serde(default)]
    pub expensive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableInfo {
    pub name: String,
    pub value: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalInfo {
    pub result: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    pub line: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

/// Adapter view of one requested breakpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointStatus {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Exception filter advertised in the adapter capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionFilterInfo {
    pub filter: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Enabled until the user says otherwise
    #[serde(default)]
    pub default: bool,
}

impl ExceptionFilterInfo {
    pub fn new(filter: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            label: label.into(),
            description: None,
            default: false,
        }
    }

    pub fn enabled_by_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// Body of an `exceptionInfo` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    pub exception_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_break_mode")]
    pub break_mode: String,
}

fn default_break_mode() -> String {
    "always".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Over,
    In,
    Out,
}

/// Outbound requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Threads,
    StackTrace { thread_id: i64 },
    Scopes { frame_id: i64 },
    Variables { variables_reference: i64 },
    Evaluate { expression: String, frame_id: Option<i64> },
    Source { source_reference: i64 },
    SetBreakpoints { path: String, breakpoints: Vec<SourceBreakpoint> },
    /// Replaces the enabled exception filters of a session
    SetExceptionBreakpoints { filters: Vec<String> },
    ExceptionInfo { thread_id: i64 },
    Continue { thread_id: i64 },
    Step { thread_id: i64, kind: StepKind },
    Pause { thread_id: i64 },
    Disconnect { terminate_debuggee: bool },
}

impl Command {
    /// Protocol command name
    pub fn name(&self) -> &'static str {
        match self {
            Command::Threads => "threads",
            Command::StackTrace { .. } => "stackTrace",
            Command::Scopes { .. } => "scopes",
            Command::Variables { .. } => "variables",
            Command::Evaluate { .. } => "evaluate",
            Command::Source { .. } => "source",
            Command::SetBreakpoints { .. } => "setBreakpoints",
            Command::SetExceptionBreakpoints { .. } => "setExceptionBreakpoints",
            Command::ExceptionInfo { .. } => "exceptionInfo",
            Command::Continue { .. } => "continue",
            Command::Step { kind: StepKind::Over, .. } => "next",
            Command::Step { kind: StepKind::In, .. } => "stepIn",
            Command::Step { kind: StepKind::Out, .. } => "stepOut",
            Command::Pause { .. } => "pause",
            Command::Disconnect { .. } => "disconnect",
        }
    }

    /// Protocol `arguments` object
    pub fn arguments(&self) -> Value {
        match self {
            Command::Threads => json!({}),
            Command::StackTrace { thread_id } => json!({ "threadId": thread_id }),
            Command::Scopes { frame_id } => json!({ "frameId": frame_id }),
            Command::Variables { variables_reference } => {
                json!({ "variablesReference": variables_reference })
            }
            Command::Evaluate {
                expression,
                frame_id,
            } => json!({ "expression": expression, "frameId": frame_id, "context": "repl" }),
            Command::Source { source_reference } => json!({ "sourceReference": source_reference }),
            Command::SetBreakpoints { path, breakpoints } => {
                json!({ "source": { "path": path }, "breakpoints": breakpoints })
            }
            Command::SetExceptionBreakpoints { filters } => json!({ "filters": filters }),
            Command::ExceptionInfo { thread_id }
            | Command::Continue { thread_id }
            | Command::Step { thread_id, .. }
            | Command::Pause { thread_id } => json!({ "threadId": thread_id }),
            Command::Disconnect { terminate_debuggee } => {
                json!({ "terminateDebuggee": terminate_debuggee })
            }
        }
    }
}

/// Answers to [`Command`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Threads(Vec<ThreadInfo>),
    StackTrace(Vec<FrameInfo>),
    Scopes(Vec<ScopeInfo>),
    Variables(Vec<VariableInfo>),
    Evaluate(EvalInfo),
    Source { content: String },
    Breakpoints(Vec<BreakpointStatus>),
    ExceptionInfo(ExceptionInfo),
    /// Commands without a body
    Ack,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadsBody {
    threads: Vec<ThreadInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackTraceBody {
    stack_frames: Vec<FrameInfo>,
}

#[derive(Deserialize)]
struct ScopesBody {
    scopes: Vec<ScopeInfo>,
}

#[derive(Deserialize)]
struct VariablesBody {
    variables: Vec<VariableInfo>,
}

#[derive(Deserialize)]
struct SourceBody {
    content: String,
}

#[derive(Deserialize)]
struct BreakpointsBody {
    breakpoints: Vec<BreakpointStatus>,
}

impl Response {
    /// Decode a successful response body for `command`
    pub fn from_body(command: &Command, body: Value) -> Result<Self, TransportError> {
        Ok(match command {
            Command::Threads => Response::Threads(serde_json::from_value::<ThreadsBody>(body)?.threads),
            Command::StackTrace { .. } => {
                Response::StackTrace(serde_json::from_value::<StackTraceBody>(body)?.stack_frames)
            }
            Command::Scopes { .. } => Response::Scopes(serde_json::from_value::<ScopesBody>(body)?.scopes),
            Command::Variables { .. } => {
                Response::Variables(serde_json::from_value::<VariablesBody>(body)?.variables)
            }
            Command::Evaluate { .. } => Response::Evaluate(serde_json::from_value(body)?),
            Command::Source { .. } => Response::Source {
                content: serde_json::from_value::<SourceBody>(body)?.content,
            },
            Command::SetBreakpoints { .. } => {
                Response::Breakpoints(serde_json::from_value::<BreakpointsBody>(body)?.breakpoints)
            }
            Command::ExceptionInfo { .. } => Response::ExceptionInfo(serde_json::from_value(body)?),
            _ => Response::Ack,
        })
    }
}

/// Inbound adapter events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    ThreadStarted {
        thread_id: i64,
        name: Option<String>,
    },
    ThreadExited {
        thread_id: i64,
    },
    Stopped {
        thread_id: Option<i64>,
        reason: String,
        all_threads_stopped: bool,
        hit_breakpoint_ids: Vec<i64>,
    },
    Continued {
        thread_id: Option<i64>,
        all_threads_continued: bool,
    },
    BreakpointChanged {
        breakpoint: BreakpointStatus,
    },
    Output {
        category: String,
        output: String,
        variables_reference: i64,
    },
    Exited {
        exit_code: i64,
    },
    Terminated,
    /// The transport failed; the session cannot continue
    Error {
        message: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    body: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadBody {
    reason: String,
    thread_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoppedBody {
    reason: String,
    #[serde(default)]
    thread_id: Option<i64>,
    #[serde(default)]
    all_threads_stopped: bool,
    #[serde(default)]
    hit_breakpoint_ids: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContinuedBody {
    #[serde(default)]
    thread_id: Option<i64>,
    #[serde(default)]
    all_threads_continued: bool,
}

#[derive(Deserialize)]
struct BreakpointBody {
    breakpoint: BreakpointStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputBody {
    #[serde(default = "default_category")]
    category: String,
    output: String,
    #[serde(default)]
    variables_reference: i64,
}

fn default_category() -> String {
    "console".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExitedBody {
    exit_code: i64,
}

impl AdapterEvent {
    /// Decode a protocol event message
    pub fn from_message(message: &Value) -> Result<Self, TransportError> {
        let envelope: Envelope = serde_json::from_value(message.clone())?;
        if envelope.kind != "event" {
            return Err(TransportError::Malformed(format!(
                "expected an event, got {}",
                envelope.kind
            )));
        }
        let name = envelope
            .event
            .ok_or_else(|| TransportError::Malformed("event without a name".to_string()))?;
        let body = envelope.body;

        Ok(match name.as_str() {
            "thread" => {
                let body: ThreadBody = serde_json::from_value(body)?;
                match body.reason.as_str() {
                    "started" => AdapterEvent::ThreadStarted {
                        thread_id: body.thread_id,
                        name: None,
                    },
                    "exited" => AdapterEvent::ThreadExited {
                        thread_id: body.thread_id,
                    },
                    other => {
                        return Err(TransportError::Malformed(format!(
                            "unknown thread reason {other:?}"
                        )))
                    }
                }
            }
            "stopped" => {
                let body: StoppedBody = serde_json::from_value(body)?;
                AdapterEvent::Stopped {
                    thread_id: body.thread_id,
                    reason: body.reason,
                    all_threads_stopped: body.all_threads_stopped,
                    hit_breakpoint_ids: body.hit_breakpoint_ids,
                }
            }
            "continued" => {
                let body: ContinuedBody = serde_json::from_value(body)?;
                AdapterEvent::Continued {
                    thread_id: body.thread_id,
                    all_threads_continued: body.all_threads_continued,
                }
            }
            "breakpoint" => {
                let body: BreakpointBody = serde_json::from_value(body)?;
                AdapterEvent::BreakpointChanged {
                    breakpoint: body.breakpoint,
                }
            }
            "output" => {
                let body: OutputBody = serde_json::from_value(body)?;
                AdapterEvent::Output {
                    category: body.category,
                    output: body.output,
                    variables_reference: body.variables_reference,
                }
            }
            "exited" => {
                let body: ExitedBody = serde_json::from_value(body)?;
                AdapterEvent::Exited {
                    exit_code: body.exit_code,
                }
            }
            "terminated" => AdapterEvent::Terminated,
            _ => return Err(TransportError::UnknownEvent(name)),
        })
    }
}

/// Request/response channel to one adapter
///
/// Futures are polled on the thread that owns the debugger, so they need
/// not be `Send`.
pub trait Transport {
    fn request(&self, command: Command) -> LocalBoxFuture<'_, Result<Response, TransportError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_stopped_event() {
        let message = json!({
            "seq": 9,
            "type": "event",
            "event": "stopped",
            "body": { "reason": "breakpoint", "threadId": 1, "hitBreakpointIds": [4] }
        });
        assert_eq!(
            AdapterEvent::from_message(&message).unwrap(),
            AdapterEvent::Stopped {
                thread_id: Some(1),
                reason: "breakpoint".into(),
                all_threads_stopped: false,
                hit_breakpoint_ids: vec![4],
            }
        );
    }

    #[test]
    fn test_exception_commands() {
        let set = Command::SetExceptionBreakpoints {
            filters: vec!["raised".into(), "uncaught".into()],
        };
        assert_eq!(set.name(), "setExceptionBreakpoints");
        assert_eq!(set.arguments(), json!({ "filters": ["raised", "uncaught"] }));
        assert_eq!(Response::from_body(&set, json!({})).unwrap(), Response::Ack);

        let info = Command::ExceptionInfo { thread_id: 3 };
        assert_eq!(info.name(), "exceptionInfo");
        assert_eq!(info.arguments(), json!({ "threadId": 3 }));
        let body = json!({ "exceptionId": "ValueError", "description": "bad value", "breakMode": "unhandled" });
        assert_eq!(
            Response::from_body(&info, body).unwrap(),
            Response::ExceptionInfo(ExceptionInfo {
                exception_id: "ValueError".into(),
                description: Some("bad value".into()),
                break_mode: "unhandled".into(),
            })
        );

        let filter: ExceptionFilterInfo =
            serde_json::from_value(json!({ "filter": "uncaught", "label": "Uncaught", "default": true })).unwrap();
        assert_eq!(filter, ExceptionFilterInfo::new("uncaught", "Uncaught").enabled_by_default());
    }

    #[test]
    fn test_decodes_output_and_terminated() {
        let output = json!({
            "type": "event",
            "event": "output",
            "body": { "output": "hello\n", "variablesReference": 12 }
        });
        assert_eq!(
            AdapterEvent::from_message(&output).unwrap(),
            AdapterEvent::Output {
                category: "console".into(),
                output: "hello\n".into(),
                variables_reference: 12,
            }
        );

        let terminated = json!({ "type": "event", "event": "terminated" });
        assert_eq!(
            AdapterEvent::from_message(&terminated).unwrap(),
            AdapterEvent::Terminated
        );
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        let unknown = json!({ "type": "event", "event": "capabilities", "body": {} });
        assert_eq!(
            AdapterEvent::from_message(&unknown),
            Err(TransportError::UnknownEvent("capabilities".into()))
        );

        let response = json!({ "type": "response", "command": "threads" });
        assert!(matches!(
            AdapterEvent::from_message(&response),
            Err(TransportError::Malformed(_))
        ));

        let broken = json!({ "type": "event", "event": "exited", "body": {} });
        assert!(matches!(
            AdapterEvent::from_message(&broken),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_response_bodies() {
        let frames = json!({
            "stackFrames": [
                { "id": 1, "name": "inner", "line": 3, "column": 1,
                  "source": { "path": "/a.py" } },
                { "id": 2, "name": "<module>", "line": 9, "column": 1 }
            ],
            "totalFrames": 2
        });
        let Response::StackTrace(frames) =
            Response::from_body(&Command::StackTrace { thread_id: 1 }, frames).unwrap()
        else {
            panic!("expected a stack trace");
        };
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].source.as_ref().and_then(|s| s.path.as_deref()), Some("/a.py"));

        let step = Command::Step {
            thread_id: 1,
            kind: StepKind::In,
        };
        assert_eq!(step.name(), "stepIn");
        assert_eq!(step.arguments(), json!({ "threadId": 1 }));
        assert_eq!(Response::from_body(&step, Value::Null).unwrap(), Response::Ack);
    }
}
