//! The `dap:` addressing scheme
//!
//! A URI is `dap:` followed by `/`-separated segments. Each segment is
//! `name`, `name:<id>` or `name[<n>]`:
//!
//! ```text
//! dap:session:1/thread:7/stack[0]/frame[0]/scope:Locals/variable:x
//! dap:frame[0]                       top frame of every session
//! dap:breakpoint:3
//! dap:session:1/binding:3
//! dap:session:1/exception:uncaught
//! dap:@frame+1/scope:Locals          relative to a Context
//! ```
//!
//! Entity URIs use the same grammar with `:<id>` selectors only, so every
//! entity URI is also a query that resolves to that entity.

mod contextual;
mod parse;
mod resolve;

pub use contextual::{expand, ContextMap, ContextualQuery, LevelPin};
pub use resolve::{plan, resolve, resolve_one};

use std::fmt;
use std::str::FromStr;

use crate::error::UriError;

/// The scheme prefix of every URI
pub const SCHEME: &str = "dap:";

/// Segment names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    Session,
    Thread,
    Stack,
    Frame,
    Scope,
    Variable,
    Breakpoint,
    Binding,
    Output,
    Eval,
    Source,
    Exception,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Session => "session",
            SegmentKind::Thread => "thread",
            SegmentKind::Stack => "stack",
            SegmentKind::Frame => "frame",
            SegmentKind::Scope => "scope",
            SegmentKind::Variable => "variable",
            SegmentKind::Breakpoint => "breakpoint",
            SegmentKind::Binding => "binding",
            SegmentKind::Output => "output",
            SegmentKind::Eval => "eval",
            SegmentKind::Source => "source",
            SegmentKind::Exception => "exception",
        }
    }

    /// Look up a segment name; `var` is accepted for `variable`
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "session" => SegmentKind::Session,
            "thread" => SegmentKind::Thread,
            "stack" => SegmentKind::Stack,
            "frame" => SegmentKind::Frame,
            "scope" => SegmentKind::Scope,
            "variable" | "var" => SegmentKind::Variable,
            "breakpoint" => SegmentKind::Breakpoint,
            "binding" => SegmentKind::Binding,
            "output" => SegmentKind::Output,
            "eval" => SegmentKind::Eval,
            "source" => SegmentKind::Source,
            "exception" => SegmentKind::Exception,
            _ => return None,
        })
    }

    /// Position in the session hierarchy
    pub(crate) fn depth(self) -> Option<usize> {
        match self {
            SegmentKind::Session => Some(0),
            SegmentKind::Thread => Some(1),
            SegmentKind::Stack => Some(2),
            SegmentKind::Frame => Some(3),
            SegmentKind::Scope => Some(4),
            SegmentKind::Variable => Some(5),
            _ => None,
        }
    }

    pub(crate) fn at_depth(depth: usize) -> Option<Self> {
        [
            SegmentKind::Session,
            SegmentKind::Thread,
            SegmentKind::Stack,
            SegmentKind::Frame,
            SegmentKind::Scope,
            SegmentKind::Variable,
        ]
        .get(depth)
        .copied()
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which members of a level a segment selects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    All,
    /// `name:<id>`, decoded
    Id(String),
    /// `name[<n>]`
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub kind: SegmentKind,
    pub selector: Selector,
}

impl Segment {
    pub fn all(kind: SegmentKind) -> Self {
        Self {
            kind,
            selector: Selector::All,
        }
    }

    pub fn id(kind: SegmentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            selector: Selector::Id(id.into()),
        }
    }

    pub fn index(kind: SegmentKind, index: usize) -> Self {
        Self {
            kind,
            selector: Selector::Index(index),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Selector::All => write!(f, "{}", self.kind),
            Selector::Id(id) => write!(f, "{}:{}", self.kind, encode(id)),
            Selector::Index(n) => write!(f, "{}[{}]", self.kind, n),
        }
    }
}

/// Context levels a marker can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Session,
    Thread,
    Stack,
    Frame,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Session => "session",
            Level::Thread => "thread",
            Level::Stack => "stack",
            Level::Frame => "frame",
        }
    }
}

/// `@level`, `@level+N` or `@level-N`
///
/// Positive offsets move toward older stacks and outer frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker {
    pub level: Level,
    pub offset: i64,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.level.as_str())?;
        match self.offset {
            0 => Ok(()),
            n if n > 0 => write!(f, "+{n}"),
            n => write!(f, "{n}"),
        }
    }
}

/// A parsed `dap:` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    pub marker: Option<Marker>,
    pub segments: Vec<Segment>,
}

impl Uri {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            marker: None,
            segments,
        }
    }

    /// Append a segment
    pub fn push(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn is_contextual(&self) -> bool {
        self.marker.is_some()
    }
}

impl FromStr for Uri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SCHEME)?;
        let mut first = true;
        if let Some(marker) = &self.marker {
            write!(f, "{marker}")?;
            first = false;
        }
        for segment in &self.segments {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

// ---- entity addresses ----

/// `parent/kind:id`, or `dap:kind:id` without a parent
pub fn child_uri(parent: Option<&str>, kind: SegmentKind, id: &str) -> String {
    let segment = Segment::id(kind, id);
    match parent {
        Some(parent) => format!("{parent}/{segment}"),
        None => format!("{SCHEME}{segment}"),
    }
}

pub fn session_uri(id: &str) -> String {
    child_uri(None, SegmentKind::Session, id)
}

pub fn thread_uri(session: &str, thread_id: i64) -> String {
    child_uri(Some(session), SegmentKind::Thread, &thread_id.to_string())
}

pub fn breakpoint_uri(id: u64) -> String {
    child_uri(None, SegmentKind::Breakpoint, &id.to_string())
}

pub fn binding_uri(session: &str, breakpoint: u64) -> String {
    child_uri(Some(session), SegmentKind::Binding, &breakpoint.to_string())
}

pub fn exception_uri(session: &str, filter: &str) -> String {
    child_uri(Some(session), SegmentKind::Exception, filter)
}

/// Address of a source on disk, shared by every session
pub fn source_uri(path: &str) -> String {
    child_uri(None, SegmentKind::Source, path)
}

// ---- percent encoding ----

fn is_reserved(c: char) -> bool {
    matches!(c, '%' | '/' | ':' | '[' | ']' | '@') || c.is_whitespace()
}

/// Escape reserved characters in an identifier
pub fn encode(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        if is_reserved(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Undo [`encode`]; any `%XX` escape is accepted
pub fn decode(id: &str) -> Result<String, UriError> {
    let bytes = id.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes
                .get(i + 1..i + 3)
                .filter(|digits| digits.iter().all(u8::is_ascii_hexdigit))
                .and_then(|digits| std::str::from_utf8(digits).ok())
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| UriError::InvalidEscape(id.to_string()))?;
            out.push(escape);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| UriError::InvalidEscape(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_reserved() {
        assert_eq!(encode("a/b:c"), "a%2Fb%3Ac");
        assert_eq!(encode("x[0] @y"), "x%5B0%5D%20%40y");
        assert_eq!(encode("100%"), "100%25");
        assert_eq!(decode(&encode("/src/main.rs:10")).unwrap(), "/src/main.rs:10");
        assert_eq!(decode("caf%C3%A9").unwrap(), "café");
    }

    #[test]
    fn test_bad_escape() {
        assert!(matches!(decode("%G1"), Err(UriError::InvalidEscape(_))));
        assert!(matches!(decode("abc%2"), Err(UriError::InvalidEscape(_))));
        assert!(matches!(decode("%+5"), Err(UriError::InvalidEscape(_))));
        assert!(matches!(decode("a%-1b"), Err(UriError::InvalidEscape(_))));
    }

    #[test]
    fn test_entity_uris() {
        let session = session_uri("main");
        assert_eq!(session, "dap:session:main");
        assert_eq!(thread_uri(&session, 7), "dap:session:main/thread:7");
        assert_eq!(binding_uri(&session, 3), "dap:session:main/binding:3");
        assert_eq!(source_uri("/tmp/a.py"), "dap:source:%2Ftmp%2Fa.py");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let uri: Uri = "dap:@frame-2/scope:Local%20vars".parse().unwrap();
        assert_eq!(
            uri.marker,
            Some(Marker {
                level: Level::Frame,
                offset: -2
            })
        );
        assert_eq!(uri.to_string(), "dap:@frame-2/scope:Local%20vars");
    }
}
