//! Request-side parsing: the headers that drive delivery and the `Range` grammar.

use crate::{RangeError, RangeResult};
use http::{header, HeaderMap, HeaderName};

/// An inclusive byte span `start..=end` within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a parsed span covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for this span of a `length`-byte resource.
    pub fn content_range(&self, length: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, length)
    }

    pub(crate) fn is_full(&self, length: u64) -> bool {
        self.start == 0 && self.end + 1 == length
    }
}

/// Headers relevant to delivering one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeRequest {
    pub range: Option<String>,
    pub if_range: Option<String>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
    pub accept: Option<String>,
    pub accept_encoding: Option<String>,
    /// Headers only, no body (HTTP `HEAD`).
    pub head_only: bool,
}

impl RangeRequest {
    /// Picks the relevant headers out of `headers`. Values that are not visible ASCII are
    /// treated as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };

        Self {
            range: get(header::RANGE),
            if_range: get(header::IF_RANGE),
            if_match: get(header::IF_MATCH),
            if_none_match: get(header::IF_NONE_MATCH),
            if_modified_since: get(header::IF_MODIFIED_SINCE),
            if_unmodified_since: get(header::IF_UNMODIFIED_SINCE),
            accept: get(header::ACCEPT),
            accept_encoding: get(header::ACCEPT_ENCODING),
            head_only: false,
        }
    }

    pub fn head_only(mut self, head_only: bool) -> Self {
        self.head_only = head_only;
        self
    }
}

/// Whether `value` matches `bytes=\d*-\d*(,\d*-\d*)*`.
pub(crate) fn is_well_formed(value: &str) -> bool {
    let Some(specs) = value.strip_prefix("bytes=") else {
        return false;
    };

    specs.split(',').all(|spec| {
        spec.split_once('-').is_some_and(|(start, end)| {
            start.bytes().all(|b| b.is_ascii_digit()) && end.bytes().all(|b| b.is_ascii_digit())
        })
    })
}

fn parse_bound(digits: &str) -> Option<u64> {
    if digits.is_empty() {
        return None;
    }
    // Digits only at this point, so failure means overflow.
    Some(digits.parse().unwrap_or(u64::MAX))
}

/// Parses a `Range` header value against a resource of `length` bytes.
///
/// - `a-b` is clamped to the end of the resource.
/// - `a-` runs to the end of the resource.
/// - `-n` is the last `n` bytes, clamped to the whole resource.
///
/// # Errors
///
/// Returns [`RangeError::NotSatisfiable`] if the value is malformed or any span starts after
/// it ends (including spans starting beyond the resource).
pub fn parse_ranges(value: &str, length: u64) -> RangeResult<Vec<ByteRange>> {
    let unsatisfiable = RangeError::NotSatisfiable { length };

    if !is_well_formed(value) {
        return Err(unsatisfiable);
    }
    let Some(last) = length.checked_sub(1) else {
        return Err(unsatisfiable);
    };

    let specs = value.trim_start_matches("bytes=");
    let mut ranges = Vec::new();
    for spec in specs.split(',') {
        let (start, end) = spec.split_once('-').ok_or_else(|| unsatisfiable.clone())?;

        let range = match (parse_bound(start), parse_bound(end)) {
            (None, None) => return Err(unsatisfiable),
            (None, Some(suffix)) => {
                if suffix == 0 {
                    return Err(unsatisfiable);
                }
                ByteRange {
                    start: length.saturating_sub(suffix),
                    end: last,
                }
            }
            (Some(start), end) => ByteRange {
                start,
                end: end.map_or(last, |end| end.min(last)),
            },
        };

        if range.start > range.end {
            return Err(unsatisfiable);
        }
        ranges.push(range);
    }

    Ok(ranges)
}
