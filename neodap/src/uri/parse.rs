//! `dap:` URI parser

use super::{decode, Level, Marker, Segment, SegmentKind, Selector, Uri, SCHEME};
use crate::error::UriError;

pub(super) fn parse(input: &str) -> Result<Uri, UriError> {
    let body = input
        .strip_prefix(SCHEME)
        .ok_or_else(|| UriError::MissingScheme(input.to_string()))?;
    if body.is_empty() {
        return Err(UriError::Empty);
    }

    let mut marker = None;
    let mut segments = Vec::new();
    for (i, raw) in body.split('/').enumerate() {
        if raw.is_empty() {
            return Err(UriError::EmptySegment(input.to_string()));
        }
        if let Some(rest) = raw.strip_prefix('@') {
            if i > 0 {
                return Err(UriError::MarkerNotFirst);
            }
            marker = Some(parse_marker(rest, raw)?);
            continue;
        }
        segments.push(parse_segment(raw)?);
    }
    Ok(Uri { marker, segments })
}

fn parse_marker(rest: &str, raw: &str) -> Result<Marker, UriError> {
    let split = rest.find(['+', '-']).unwrap_or(rest.len());
    let (name, offset) = rest.split_at(split);
    let level = match name {
        "session" => Level::Session,
        "thread" => Level::Thread,
        "stack" => Level::Stack,
        "frame" => Level::Frame,
        _ => return Err(UriError::InvalidMarker(raw.to_string())),
    };
    let offset = match offset {
        "" => 0,
        signed => {
            let magnitude = &signed[1..];
            if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
                return Err(UriError::InvalidMarker(raw.to_string()));
            }
            signed
                .parse::<i64>()
                .map_err(|_| UriError::InvalidMarker(raw.to_string()))?
        }
    };
    Ok(Marker { level, offset })
}

fn parse_segment(raw: &str) -> Result<Segment, UriError> {
    if let Some(open) = raw.find('[') {
        let name = &raw[..open];
        let index = raw[open + 1..]
            .strip_suffix(']')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<usize>().ok())
            .ok_or_else(|| UriError::InvalidIndex(raw.to_string()))?;
        return Ok(Segment {
            kind: kind(name)?,
            selector: Selector::Index(index),
        });
    }

    match raw.split_once(':') {
        Some((name, id)) => {
            if id.is_empty() {
                return Err(UriError::EmptySegment(raw.to_string()));
            }
            Ok(Segment {
                kind: kind(name)?,
                selector: Selector::Id(decode(id)?),
            })
        }
        None => Ok(Segment {
            kind: kind(raw)?,
            selector: Selector::All,
        }),
    }
}

fn kind(name: &str) -> Result<SegmentKind, UriError> {
    SegmentKind::from_name(name).ok_or_else(|| UriError::UnknownSegment(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path() {
        let uri = parse("dap:session:a/thread:1/stack[0]/frame:12/scope:Locals/var:x").unwrap();
        assert_eq!(uri.marker, None);
        assert_eq!(
            uri.segments,
            vec![
                Segment::id(SegmentKind::Session, "a"),
                Segment::id(SegmentKind::Thread, "1"),
                Segment::index(SegmentKind::Stack, 0),
                Segment::id(SegmentKind::Frame, "12"),
                Segment::id(SegmentKind::Scope, "Locals"),
                Segment::id(SegmentKind::Variable, "x"),
            ]
        );
    }

    #[test]
    fn test_markers() {
        let uri = parse("dap:@frame+1").unwrap();
        assert_eq!(
            uri.marker,
            Some(Marker {
                level: Level::Frame,
                offset: 1
            })
        );
        assert!(uri.segments.is_empty());

        let uri = parse("dap:@session/thread").unwrap();
        assert_eq!(uri.marker.map(|m| m.level), Some(Level::Session));
        assert_eq!(uri.segments, vec![Segment::all(SegmentKind::Thread)]);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse("session:1"), Err(UriError::MissingScheme("session:1".into())));
        assert_eq!(parse("dap:"), Err(UriError::Empty));
        assert!(matches!(parse("dap:session//thread"), Err(UriError::EmptySegment(_))));
        assert!(matches!(parse("dap:planet:1"), Err(UriError::UnknownSegment(_))));
        assert!(matches!(parse("dap:frame[x]"), Err(UriError::InvalidIndex(_))));
        assert!(matches!(parse("dap:frame[-1]"), Err(UriError::InvalidIndex(_))));
        assert!(matches!(parse("dap:@frame+"), Err(UriError::InvalidMarker(_))));
        assert!(matches!(parse("dap:@scope"), Err(UriError::InvalidMarker(_))));
        assert_eq!(parse("dap:thread/@frame"), Err(UriError::MarkerNotFirst));
    }

    #[test]
    fn test_ids_are_decoded() {
        let uri = parse("dap:source:%2Fsrc%2Fmain.py").unwrap();
        assert_eq!(uri.segments, vec![Segment::id(SegmentKind::Source, "/src/main.py")]);
    }
}
