//! Turning `dap:` URIs into live views
//!
//! A URI is planned into a [`ViewSpec`] first and only then handed to the
//! store, so equal URIs (and URIs that differ only in skipped levels)
//! share one cached view.

use super::{Segment, SegmentKind, Selector, Uri};
use crate::domain::{
    edges, id_index, indexes, Binding, Breakpoint, EvalResult, ExceptionFilter, Frame, Output,
    Scope, Session, Source, Stack, Thread, Variable,
};
use crate::error::UriError;
use neodap_graph::{EdgeType, EntityKind, EntityRef, EntityStore, EntityType, IndexValue, View, ViewSpec};
use tracing::debug;

fn entity_type(kind: SegmentKind) -> EntityType {
    match kind {
        SegmentKind::Session => Session::TYPE,
        SegmentKind::Thread => Thread::TYPE,
        SegmentKind::Stack => Stack::TYPE,
        SegmentKind::Frame => Frame::TYPE,
        SegmentKind::Scope => Scope::TYPE,
        SegmentKind::Variable => Variable::TYPE,
        SegmentKind::Breakpoint => Breakpoint::TYPE,
        SegmentKind::Binding => Binding::TYPE,
        SegmentKind::Output => Output::TYPE,
        SegmentKind::Eval => EvalResult::TYPE,
        SegmentKind::Source => Source::TYPE,
        SegmentKind::Exception => ExceptionFilter::TYPE,
    }
}

/// Edge leading into a hierarchy level
fn level_edge(kind: SegmentKind) -> Option<EdgeType> {
    Some(match kind {
        SegmentKind::Thread => edges::THREADS,
        SegmentKind::Stack => edges::STACKS,
        SegmentKind::Frame => edges::FRAMES,
        SegmentKind::Scope => edges::SCOPES,
        SegmentKind::Variable => edges::VARIABLES,
        _ => return None,
    })
}

/// Segment used for a level the URI skips
fn default_segment(kind: SegmentKind) -> Segment {
    match kind {
        SegmentKind::Stack | SegmentKind::Frame => Segment::index(kind, 0),
        _ => Segment::all(kind),
    }
}

/// Edge from `from` to a non-hierarchical `to`
fn side_edge(from: SegmentKind, to: SegmentKind) -> Option<EdgeType> {
    use SegmentKind as K;
    Some(match (from, to) {
        (K::Session, K::Session) => edges::CHILDREN,
        (K::Session, K::Binding) => edges::BINDINGS,
        (K::Session, K::Output) => edges::OUTPUTS,
        (K::Session, K::Eval) => edges::EVALS,
        (K::Session, K::Source) => edges::SOURCES,
        (K::Session, K::Exception) => edges::EXCEPTIONS,
        (K::Frame, K::Eval) => edges::EVALS,
        (K::Frame, K::Source) => edges::SOURCE,
        (K::Output | K::Eval, K::Variable) => edges::VARIABLES,
        (K::Variable, K::Variable) => edges::VARIABLES,
        (K::Breakpoint, K::Binding) => edges::BINDINGS,
        _ => return None,
    })
}

fn apply_selector(spec: ViewSpec, segment: &Segment) -> Result<ViewSpec, UriError> {
    match &segment.selector {
        Selector::All => Ok(spec),
        Selector::Id(id) => {
            let (index, is_int) = id_index(segment.kind);
            let value = if is_int {
                let parsed = id.parse::<i64>().map_err(|_| UriError::InvalidId {
                    segment: segment.kind.as_str(),
                    id: id.clone(),
                })?;
                IndexValue::Int(parsed)
            } else {
                IndexValue::Str(id.clone())
            };
            Ok(spec.filter(index, value))
        }
        Selector::Index(n) => match segment.kind {
            SegmentKind::Stack | SegmentKind::Frame => {
                Ok(spec.filter(indexes::INDEX, IndexValue::from(*n)))
            }
            kind => Err(UriError::IndexUnsupported {
                segment: kind.as_str(),
            }),
        },
    }
}

fn follow(spec: ViewSpec, edge: EdgeType, segment: &Segment) -> Result<ViewSpec, UriError> {
    apply_selector(spec.follow(edge, Some(entity_type(segment.kind))), segment)
}

/// Plan a concrete URI into a view spec
///
/// Levels skipped between two hierarchical segments are filled with all
/// threads, the newest stack, the top frame and all scopes. URIs that do
/// not start at a session, breakpoint or path source span every session.
pub fn plan(uri: &Uri) -> Result<ViewSpec, UriError> {
    if uri.is_contextual() {
        return Err(UriError::UnexpandedMarker);
    }
    let (first, rest) = uri.segments.split_first().ok_or(UriError::Empty)?;

    let (mut spec, mut current, pending) = match first.kind {
        SegmentKind::Session | SegmentKind::Breakpoint | SegmentKind::Source => (
            apply_selector(ViewSpec::of_type(entity_type(first.kind)), first)?,
            first.kind,
            rest,
        ),
        _ => (ViewSpec::of_type(Session::TYPE), SegmentKind::Session, &uri.segments[..]),
    };

    for segment in pending {
        let target = segment.kind;
        let descends = match (current.depth(), target.depth()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        };
        if descends {
            let (from, to) = (current.depth().unwrap_or(0), target.depth().unwrap_or(0));
            for depth in from + 1..to {
                let Some(kind) = SegmentKind::at_depth(depth) else {
                    continue;
                };
                let filler = default_segment(kind);
                let edge = level_edge(kind).ok_or(UriError::InvalidOrder {
                    from: current.as_str(),
                    to: kind.as_str(),
                })?;
                spec = follow(spec, edge, &filler)?;
            }
            let edge = level_edge(target).ok_or(UriError::InvalidOrder {
                from: current.as_str(),
                to: target.as_str(),
            })?;
            spec = follow(spec, edge, segment)?;
        } else {
            let edge = side_edge(current, target).ok_or(UriError::InvalidOrder {
                from: current.as_str(),
                to: target.as_str(),
            })?;
            spec = follow(spec, edge, segment)?;
        }
        current = target;
    }
    Ok(spec)
}

/// Resolve a URI to a live view
///
/// Malformed or unplannable URIs resolve to the empty view.
pub fn resolve(store: &EntityStore, uri: &str) -> View {
    let planned = uri.parse::<Uri>().and_then(|parsed| plan(&parsed));
    match planned {
        Ok(spec) => store.view_of(&spec),
        Err(err) => {
            debug!(uri, error = %err, "uri resolves to nothing");
            store.empty_view()
        }
    }
}

/// First entity a URI resolves to
pub fn resolve_one(store: &EntityStore, uri: &str) -> Option<EntityRef> {
    resolve(store, uri).first()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(uri: &str) -> Result<ViewSpec, UriError> {
        plan(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_skipped_levels_are_filled() {
        let expected = ViewSpec::of_type(Session::TYPE)
            .follow(edges::THREADS, Some(Thread::TYPE))
            .follow(edges::STACKS, Some(Stack::TYPE))
            .filter(indexes::INDEX, IndexValue::Int(0))
            .follow(edges::FRAMES, Some(Frame::TYPE))
            .filter(indexes::INDEX, IndexValue::Int(0));
        assert_eq!(planned("dap:frame[0]").unwrap(), expected);
        assert_eq!(
            planned("dap:thread/stack[0]/frame").unwrap(),
            planned("dap:frame").unwrap()
        );
    }

    #[test]
    fn test_session_scope_and_ids() {
        let scoped = planned("dap:session:a/thread:3/frame:12").unwrap();
        let expected = ViewSpec::of_type(Session::TYPE)
            .filter(indexes::ID, IndexValue::Str("a".into()))
            .follow(edges::THREADS, Some(Thread::TYPE))
            .filter(indexes::ID, IndexValue::Int(3))
            .follow(edges::STACKS, Some(Stack::TYPE))
            .filter(indexes::INDEX, IndexValue::Int(0))
            .follow(edges::FRAMES, Some(Frame::TYPE))
            .filter(indexes::ID, IndexValue::Int(12));
        assert_eq!(scoped, expected);
    }

    #[test]
    fn test_side_edges() {
        assert_eq!(
            planned("dap:breakpoint:4/binding").unwrap(),
            ViewSpec::of_type(Breakpoint::TYPE)
                .filter(indexes::ID, IndexValue::Int(4))
                .follow(edges::BINDINGS, Some(Binding::TYPE))
        );
        assert!(planned("dap:session:a/output:2/variable:x/variable:y").is_ok());
        assert!(planned("dap:session:a/session:b/thread").is_ok());
        assert_eq!(
            planned("dap:source:%2Ftmp%2Fa.py").unwrap(),
            ViewSpec::of_type(Source::TYPE).filter(indexes::KEY, IndexValue::Str("/tmp/a.py".into()))
        );
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            planned("dap:thread:x"),
            Err(UriError::InvalidId {
                segment: "thread",
                id: "x".into()
            })
        );
        assert_eq!(
            planned("dap:thread[1]"),
            Err(UriError::IndexUnsupported { segment: "thread" })
        );
        assert_eq!(
            planned("dap:frame/thread"),
            Err(UriError::InvalidOrder {
                from: "frame",
                to: "thread"
            })
        );
        assert_eq!(planned("dap:@frame"), Err(UriError::UnexpandedMarker));
        assert_eq!(planned("dap:@frame/scope"), Err(UriError::UnexpandedMarker));
    }
}
