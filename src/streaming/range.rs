//! HTTP `Range` header parsing.
//!
//! Only single `bytes=` ranges are served. Suffix ranges (`bytes=-500`) and
//! multi-range requests are refused as malformed; `bytes=-` carries no bounds
//! at all and is treated like a missing header.

use seekgate_common::{Error, Result};

/// Inclusive byte span of a single transfer.
///
/// Always satisfies `start <= end < size` for the resource it was parsed
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub start: u64,
    pub end: u64,
}

impl ByteSpan {
    /// The span covering a whole resource, or `None` for an empty one.
    pub fn whole(size: u64) -> Option<Self> {
        size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    /// Number of bytes in the span (`end - start + 1`), or 0 when `start > end`.
    pub fn len(&self) -> u64 {
        self.end
            .checked_sub(self.start)
            .map_or(0, |d| d.saturating_add(1))
    }

    /// Only a hand-built span with `start > end` is empty.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// `Content-Range` value for a 206 response.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a `Range` header value against a resource of `size` bytes.
///
/// Returns `Ok(None)` when the header names no bounds (`bytes=-`), so the
/// caller serves the whole file. Every other failure is
/// [`Error::RangeNotSatisfiable`] carrying `size`.
///
/// Supported forms:
/// - `bytes=0-499`
/// - `bytes=500-` (through the last byte)
pub fn parse_range_header(value: &str, size: u64) -> Result<Option<ByteSpan>> {
    let unsatisfiable = || Error::range_not_satisfiable(size);

    let spec = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(unsatisfiable)?;

    if spec.contains(',') {
        return Err(unsatisfiable());
    }

    let (start, end) = spec.split_once('-').ok_or_else(unsatisfiable)?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        // bytes=-
        (true, true) => Ok(None),
        // bytes=-500: suffix ranges are not served.
        (true, false) => Err(unsatisfiable()),
        // bytes=500-
        (false, true) => {
            let start = parse_offset(start).ok_or_else(unsatisfiable)?;
            let last = size.checked_sub(1).ok_or_else(unsatisfiable)?;
            if start > last {
                return Err(unsatisfiable());
            }
            Ok(Some(ByteSpan { start, end: last }))
        }
        // bytes=0-499
        (false, false) => {
            let start = parse_offset(start).ok_or_else(unsatisfiable)?;
            let end = parse_offset(end).ok_or_else(unsatisfiable)?;
            if start > end || end >= size {
                return Err(unsatisfiable());
            }
            Ok(Some(ByteSpan { start, end }))
        }
    }
}

/// Decimal digits only: rejects signs, whitespace and anything `u64::from_str`
/// would otherwise be lenient about.
fn parse_offset(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn span(start: u64, end: u64) -> Option<ByteSpan> {
        Some(ByteSpan { start, end })
    }

    #[test]
    fn test_parse_closed_range() {
        assert_eq!(parse_range_header("bytes=0-99", 1000).unwrap(), span(0, 99));
        assert_eq!(
            parse_range_header("bytes=999-999", 1000).unwrap(),
            span(999, 999)
        );
    }

    #[test]
    fn test_parse_open_end() {
        assert_eq!(
            parse_range_header("bytes=500-", 1000).unwrap(),
            span(500, 999)
        );
    }

    #[test]
    fn test_no_bounds_means_no_range() {
        assert_eq!(parse_range_header("bytes=-", 1000).unwrap(), None);
    }

    #[test]
    fn test_chunk_size() {
        let s = parse_range_header("bytes=0-99", 1000).unwrap().unwrap();
        assert_eq!(s.len(), 100);
        assert_eq!(s.content_range(1000), "bytes 0-99/1000");
    }

    #[test]
    fn test_inverted_span_is_empty() {
        let inverted = ByteSpan { start: 10, end: 5 };
        assert_eq!(inverted.len(), 0);
        assert!(inverted.is_empty());

        let full = ByteSpan { start: 0, end: u64::MAX };
        assert_eq!(full.len(), u64::MAX);
        assert!(!full.is_empty());
    }

    #[test]
    fn test_start_after_end_rejected() {
        assert_matches!(
            parse_range_header("bytes=200-100", 1000),
            Err(Error::RangeNotSatisfiable { size: 1000 })
        );
    }

    #[test]
    fn test_end_past_size_rejected() {
        assert_matches!(
            parse_range_header("bytes=0-1000", 1000),
            Err(Error::RangeNotSatisfiable { size: 1000 })
        );
        assert_matches!(
            parse_range_header("bytes=1000-", 1000),
            Err(Error::RangeNotSatisfiable { size: 1000 })
        );
    }

    #[test]
    fn test_negative_and_garbage_rejected() {
        for header in [
            "bytes=-5-10",
            "bytes=abc-def",
            "bytes=+1-5",
            "bytes=1-5x",
            "items=0-5",
            "0-5",
            "bytes=0-1,4-5",
            "bytes=10",
        ] {
            assert_matches!(
                parse_range_header(header, 1000),
                Err(Error::RangeNotSatisfiable { size: 1000 }),
                "{header} should be rejected"
            );
        }
    }

    #[test]
    fn test_suffix_range_unsupported() {
        assert_matches!(
            parse_range_header("bytes=-200", 1000),
            Err(Error::RangeNotSatisfiable { size: 1000 })
        );
    }

    #[test]
    fn test_empty_resource_never_satisfiable() {
        assert_matches!(
            parse_range_header("bytes=0-0", 0),
            Err(Error::RangeNotSatisfiable { size: 0 })
        );
        assert_matches!(
            parse_range_header("bytes=0-", 0),
            Err(Error::RangeNotSatisfiable { size: 0 })
        );
    }

    #[test]
    fn test_whitespace_tolerated() {
        assert_eq!(
            parse_range_header("  bytes= 10 - 20 ", 1000).unwrap(),
            span(10, 20)
        );
    }

    #[test]
    fn test_whole_span() {
        assert_eq!(ByteSpan::whole(1000), span(0, 999));
        assert_eq!(ByteSpan::whole(0), None);
    }
}
