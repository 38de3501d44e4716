//! Byte-range delivery
//!
//! Serves a seekable binary source over HTTP semantics: conditional requests
//! (`If-None-Match`, `If-Modified-Since`, `If-Match`, `If-Unmodified-Since`), single and
//! multiple byte ranges, stale-range protection through `If-Range` and gzip for full-body text.
//!
//! The crate is transport-agnostic. [`RangeResponder::respond`] takes request headers and a
//! `Read + Seek` source and returns a status, response headers and a lazy [`RangeBody`]. The
//! body pulls from the source only as it is read, so large media is never buffered whole.
//!
//! ## Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use http::{header, HeaderMap, StatusCode};
//! use std::io::{Cursor, Read};
//! use vault_range::{RangeRequest, RangeResponder, ResourceInfo};
//!
//! let data: Vec<u8> = (0..1000).map(|i| (i % 256) as u8).collect();
//! let info = ResourceInfo::new(
//!     "clip.mp4",
//!     "video/mp4",
//!     1000,
//!     Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
//! );
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(header::RANGE, "bytes=100-199".parse().unwrap());
//!
//! let response = RangeResponder::default().respond(
//!     &RangeRequest::from_headers(&headers),
//!     &info,
//!     Cursor::new(data),
//! );
//! assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
//! assert_eq!(response.headers[header::CONTENT_RANGE], "bytes 100-199/1000");
//!
//! let mut body = response.body;
//! let mut bytes = Vec::new();
//! body.read_to_end(&mut bytes).unwrap();
//! assert_eq!(bytes.len(), 100);
//! ```

mod body;
mod request;
mod resource;
mod responder;

pub use body::RangeBody;
pub use request::{parse_ranges, ByteRange, RangeRequest};
pub use resource::{format_http_date, parse_http_date, ResourceInfo};
pub use responder::{RangeResponder, RangeResponse};

/// Default read buffer for streaming bodies.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// How long clients may cache a delivered resource.
pub const DEFAULT_CACHE_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

/// Boundary separating parts of a `multipart/byteranges` body.
pub const MULTIPART_BOUNDARY: &str = "MULTIPART_BYTERANGES";

/// Errors that can occur while interpreting a range request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// Malformed `Range` header, or a range outside the resource
    #[error("Range not satisfiable for resource of {length} bytes")]
    NotSatisfiable { length: u64 },
}

pub type RangeResult<T> = Result<T, RangeError>;
