//! The delivery algorithm.

use crate::body::{RangeBody, Segments};
use crate::request::{is_well_formed, parse_ranges, ByteRange, RangeRequest};
use crate::resource::{
    accepts, etag_matches, format_http_date, parse_http_date, same_etag, ResourceInfo,
};
use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_CACHE_LIFETIME_SECS, MULTIPART_BOUNDARY};
use chrono::{DateTime, Duration, Utc};
use http::header::{self, HeaderValue};
use http::{HeaderMap, StatusCode};
use std::io::{Read, Seek};
use tracing::debug;

/// Status, headers and a lazy body, ready to hand to an HTTP layer.
#[derive(Debug)]
pub struct RangeResponse<R> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: RangeBody<R>,
}

/// Serves seekable sources with conditional and byte-range support.
#[derive(Debug, Clone)]
pub struct RangeResponder {
    buffer_size: usize,
    cache_lifetime: Duration,
    boundary: String,
}

impl Default for RangeResponder {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

fn insert(headers: &mut HeaderMap, name: header::HeaderName, value: impl AsRef<str>) {
    // Values that cannot be carried in a header (e.g. control characters in a filename) are
    // dropped rather than failing the whole response.
    match HeaderValue::from_str(value.as_ref()) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => debug!(header = %name, "dropping unrepresentable header value"),
    }
}

impl RangeResponder {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            cache_lifetime: Duration::seconds(DEFAULT_CACHE_LIFETIME_SECS),
            boundary: MULTIPART_BOUNDARY.to_owned(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Builds the response for `request` against `source`.
    pub fn respond<R: Read + Seek>(
        &self,
        request: &RangeRequest,
        info: &ResourceInfo,
        source: R,
    ) -> RangeResponse<R> {
        self.respond_at(request, info, source, Utc::now())
    }

    /// Same as [`Self::respond`] with an explicit "now" for the `Expires` header.
    pub fn respond_at<R: Read + Seek>(
        &self,
        request: &RangeRequest,
        info: &ResourceInfo,
        source: R,
        now: DateTime<Utc>,
    ) -> RangeResponse<R> {
        let length = info.length;
        let etag = info.etag();
        let last_modified = info.last_modified_secs();
        let expires = format_http_date(now + self.cache_lifetime);

        // Conditional requests.
        if let Some(if_none_match) = &request.if_none_match {
            if etag_matches(if_none_match, &etag) {
                return self.bare(StatusCode::NOT_MODIFIED, &etag, Some(&expires));
            }
        } else if let Some(since) = request.if_modified_since.as_deref().and_then(parse_http_date)
        {
            if since + Duration::seconds(1) > last_modified {
                return self.bare(StatusCode::NOT_MODIFIED, &etag, Some(&expires));
            }
        }

        if let Some(if_match) = &request.if_match {
            if !etag_matches(if_match, &etag) {
                return self.bare(StatusCode::PRECONDITION_FAILED, &etag, None);
            }
        }
        if let Some(since) = request
            .if_unmodified_since
            .as_deref()
            .and_then(parse_http_date)
        {
            if since + Duration::seconds(1) <= last_modified {
                return self.bare(StatusCode::PRECONDITION_FAILED, &etag, None);
            }
        }

        // Range selection. An empty list means "full body".
        let mut ranges = Vec::new();
        if let Some(range) = &request.range {
            if !is_well_formed(range) {
                debug!(range = %range, length, "malformed range");
                return self.unsatisfiable(length);
            }
            if self.if_range_holds(request.if_range.as_deref(), &etag, last_modified) {
                match parse_ranges(range, length) {
                    Ok(parsed) => ranges = parsed,
                    Err(_) => {
                        debug!(range = %range, length, "unsatisfiable range");
                        return self.unsatisfiable(length);
                    }
                }
            } else {
                debug!(range = %range, "stale If-Range, serving full body");
            }
        }
        if ranges.len() == 1 && ranges[0].is_full(length) {
            ranges.clear();
        }

        // Representation headers.
        let mut content_type = if info.content_type.trim().is_empty() {
            "application/octet-stream".to_owned()
        } else {
            info.content_type.clone()
        };
        let mut disposition = "inline";
        let mut gzip = false;
        if content_type.starts_with("text") {
            gzip = request
                .accept_encoding
                .as_deref()
                .is_some_and(|value| accepts(value, "gzip"));
            if !content_type.contains("charset") {
                content_type.push_str(";charset=UTF-8");
            }
        } else if !content_type.starts_with("image") {
            let accepted = request
                .accept
                .as_deref()
                .is_some_and(|value| accepts(value, &content_type));
            if !accepted {
                disposition = "attachment";
            }
        }

        let mut headers = HeaderMap::new();
        insert(
            &mut headers,
            header::CONTENT_DISPOSITION,
            format!("{};filename=\"{}\"", disposition, info.filename.replace('"', "")),
        );
        insert(&mut headers, header::ACCEPT_RANGES, "bytes");
        insert(&mut headers, header::ETAG, &etag);
        insert(&mut headers, header::LAST_MODIFIED, format_http_date(last_modified));
        insert(&mut headers, header::EXPIRES, &expires);

        let mut segments = Segments::new(source);
        let (status, body) = match ranges.as_slice() {
            [] => {
                insert(&mut headers, header::CONTENT_TYPE, &content_type);
                if length > 0 {
                    segments.span(ByteRange {
                        start: 0,
                        end: length - 1,
                    });
                }
                if gzip && !request.head_only {
                    insert(&mut headers, header::CONTENT_ENCODING, "gzip");
                    insert(&mut headers, header::VARY, "Accept-Encoding");
                    (StatusCode::OK, RangeBody::gzip(segments, self.buffer_size))
                } else {
                    insert(&mut headers, header::CONTENT_LENGTH, length.to_string());
                    (StatusCode::OK, RangeBody::plain(segments, self.buffer_size))
                }
            }
            [single] => {
                insert(&mut headers, header::CONTENT_TYPE, &content_type);
                insert(&mut headers, header::CONTENT_RANGE, single.content_range(length));
                insert(&mut headers, header::CONTENT_LENGTH, single.len().to_string());
                segments.span(*single);
                (
                    StatusCode::PARTIAL_CONTENT,
                    RangeBody::plain(segments, self.buffer_size),
                )
            }
            many => {
                insert(
                    &mut headers,
                    header::CONTENT_TYPE,
                    format!("multipart/byteranges; boundary={}", self.boundary),
                );
                let mut total = 0u64;
                for range in many {
                    let part_header = format!(
                        "\r\n--{}\r\nContent-Type: {}\r\nContent-Range: {}\r\n\r\n",
                        self.boundary,
                        content_type,
                        range.content_range(length)
                    );
                    total += part_header.len() as u64 + range.len();
                    segments.literal(part_header);
                    segments.span(*range);
                }
                let closing = format!("\r\n--{}--\r\n", self.boundary);
                total += closing.len() as u64;
                segments.literal(closing);
                insert(&mut headers, header::CONTENT_LENGTH, total.to_string());
                (
                    StatusCode::PARTIAL_CONTENT,
                    RangeBody::plain(segments, self.buffer_size),
                )
            }
        };

        let body = if request.head_only {
            RangeBody::empty(self.buffer_size)
        } else {
            body
        };
        RangeResponse {
            status,
            headers,
            body,
        }
    }

    /// Whether the requested ranges may be honoured given `If-Range`.
    fn if_range_holds(
        &self,
        if_range: Option<&str>,
        etag: &str,
        last_modified: DateTime<Utc>,
    ) -> bool {
        let Some(value) = if_range else {
            return true;
        };
        if same_etag(value, etag) {
            return true;
        }
        parse_http_date(value).is_some_and(|date| date + Duration::seconds(1) >= last_modified)
    }

    fn bare<R: Read + Seek>(
        &self,
        status: StatusCode,
        etag: &str,
        expires: Option<&str>,
    ) -> RangeResponse<R> {
        let mut headers = HeaderMap::new();
        insert(&mut headers, header::ETAG, etag);
        if let Some(expires) = expires {
            insert(&mut headers, header::EXPIRES, expires);
        }
        RangeResponse {
            status,
            headers,
            body: RangeBody::empty(self.buffer_size),
        }
    }

    fn unsatisfiable<R: Read + Seek>(&self, length: u64) -> RangeResponse<R> {
        let mut headers = HeaderMap::new();
        insert(&mut headers, header::CONTENT_RANGE, format!("bytes */{}", length));
        RangeResponse {
            status: StatusCode::RANGE_NOT_SATISFIABLE,
            headers,
            body: RangeBody::empty(self.buffer_size),
        }
    }
}
