//! HTTP Range request parsing module
//!
//! Single `bytes=` ranges only (RFC 7233). Multi-range and malformed headers
//! fall back to the full body.

/// Inclusive byte range already clamped to the file size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub const fn len(self) -> usize {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header
    pub fn content_range(self, total: usize) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// What to send for a request's Range header
#[derive(Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable Range header, send the whole body
    Full,
    /// Send `206 Partial Content` with this slice
    Partial(ByteRange),
    /// Send `416 Range Not Satisfiable`
    Unsatisfiable,
}

/// Resolve a Range header against a body of `size` bytes
///
/// ```
/// use coi_serve::http::range::{resolve_range, ByteRange, RangeOutcome};
///
/// assert_eq!(
///     resolve_range(Some("bytes=0-99"), 1000),
///     RangeOutcome::Partial(ByteRange { start: 0, end: 99 })
/// );
/// assert_eq!(resolve_range(None, 1000), RangeOutcome::Full);
/// ```
pub fn resolve_range(header: Option<&str>, size: usize) -> RangeOutcome {
    let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if spec.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // "-N": the final N bytes
        let Ok(suffix) = last.parse::<usize>() else {
            return RangeOutcome::Full;
        };
        if suffix == 0 || size == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        return RangeOutcome::Partial(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        });
    }

    let Ok(start) = first.parse::<usize>() else {
        return RangeOutcome::Full;
    };
    let end = if last.is_empty() {
        usize::MAX
    } else {
        match last.parse::<usize>() {
            Ok(end) => end,
            Err(_) => return RangeOutcome::Full,
        }
    };
    if end < start {
        return RangeOutcome::Full;
    }
    if start >= size {
        return RangeOutcome::Unsatisfiable;
    }

    RangeOutcome::Partial(ByteRange {
        start,
        end: end.min(size - 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_header() {
        assert_eq!(resolve_range(None, 100), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("items=0-1"), 100), RangeOutcome::Full);
    }

    #[test]
    fn test_bounded_range() {
        let outcome = resolve_range(Some("bytes=10-19"), 100);
        assert_eq!(outcome, RangeOutcome::Partial(ByteRange { start: 10, end: 19 }));
        if let RangeOutcome::Partial(range) = outcome {
            assert_eq!(range.len(), 10);
            assert_eq!(range.content_range(100), "bytes 10-19/100");
        }
    }

    #[test]
    fn test_open_and_clamped_ranges() {
        assert_eq!(
            resolve_range(Some("bytes=90-"), 100),
            RangeOutcome::Partial(ByteRange { start: 90, end: 99 })
        );
        assert_eq!(
            resolve_range(Some("bytes=90-500"), 100),
            RangeOutcome::Partial(ByteRange { start: 90, end: 99 })
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            resolve_range(Some("bytes=-5"), 100),
            RangeOutcome::Partial(ByteRange { start: 95, end: 99 })
        );
        assert_eq!(
            resolve_range(Some("bytes=-500"), 100),
            RangeOutcome::Partial(ByteRange { start: 0, end: 99 })
        );
        assert_eq!(resolve_range(Some("bytes=-0"), 100), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(resolve_range(Some("bytes=100-"), 100), RangeOutcome::Unsatisfiable);
        assert_eq!(resolve_range(Some("bytes=0-"), 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_ignored_forms() {
        assert_eq!(resolve_range(Some("bytes=a-b"), 100), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("bytes=0-9,20-29"), 100), RangeOutcome::Full);
        assert_eq!(resolve_range(Some("bytes=20-10"), 100), RangeOutcome::Full);
    }
}
