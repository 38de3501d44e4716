//! Validators and dates describing the resource being served.

use chrono::{DateTime, SubsecRound, Utc};

/// What the responder needs to know about a resource besides its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub filename: String,
    pub content_type: String,
    pub length: u64,
    pub last_modified: DateTime<Utc>,
}

impl ResourceInfo {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        length: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            length,
            last_modified,
        }
    }

    /// Strong validator derived from filename, length and modification time.
    ///
    /// Double quotes are dropped from the filename so the tag stays one quoted string.
    ///
    /// Two resources with the same name and size but different bytes share an ETag if they
    /// were also modified in the same millisecond.
    pub fn etag(&self) -> String {
        format!(
            "\"{}_{}_{}\"",
            self.filename.replace('"', ""),
            self.length,
            self.last_modified.timestamp_millis()
        )
    }

    /// Modification time at the one-second resolution of HTTP dates.
    pub(crate) fn last_modified_secs(&self) -> DateTime<Utc> {
        self.last_modified.trunc_subsecs(0)
    }
}

/// Formats an HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses an HTTP-date. Returns `None` for anything that is not one.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Whether a comma-separated list of entity tags names `etag` (or is `*`).
///
/// Weak prefixes and quoting are ignored, so `W/"a"`, `"a"` and `a` all match `"a"`. Commas
/// inside a quoted tag do not split it.
pub(crate) fn etag_matches(header: &str, etag: &str) -> bool {
    let wanted = normalise_etag(etag);
    entity_tags(header)
        .into_iter()
        .any(|candidate| candidate == "*" || normalise_etag(candidate) == wanted)
}

/// Whether a single validator (as sent in `If-Range`) is exactly `etag`, ignoring a weak
/// prefix.
pub(crate) fn same_etag(value: &str, etag: &str) -> bool {
    let value = value.trim();
    value != "*" && normalise_etag(value) == normalise_etag(etag)
}

/// Splits an entity-tag list on the commas that sit outside quoted strings.
fn entity_tags(header: &str) -> Vec<&str> {
    let mut tags = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in header.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                tags.push(header[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    tags.push(header[start..].trim());
    tags.retain(|tag| !tag.is_empty());
    tags
}

fn normalise_etag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}

/// Whether an `Accept`-style header covers `value`, directly or through a `type/*` or `*/*`
/// wildcard.
pub(crate) fn accepts(header: &str, value: &str) -> bool {
    let wildcard = value
        .split_once('/')
        .map(|(category, _)| format!("{}/*", category));

    header
        .split([',', ';'])
        .map(str::trim)
        .any(|token| {
            token.eq_ignore_ascii_case(value)
                || token == "*/*"
                || wildcard
                    .as_deref()
                    .is_some_and(|w| token.eq_ignore_ascii_case(w))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info() -> ResourceInfo {
        ResourceInfo::new(
            "song.mp3",
            "audio/mpeg",
            1000,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_etag_is_deterministic() {
        assert_eq!(info().etag(), "\"song.mp3_1000_1709294400000\"");
        assert_eq!(info().etag(), info().etag());

        let mut changed = info();
        changed.length = 1001;
        assert_ne!(changed.etag(), info().etag());
    }

    #[test]
    fn test_http_date_round_trip() {
        let date = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(format_http_date(date), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(date));
        assert_eq!(parse_http_date("\"song.mp3_1000_1\""), None);
    }

    #[test]
    fn test_etag_matches() {
        let etag = info().etag();
        assert!(etag_matches(&etag, &etag));
        assert!(etag_matches("*", &etag));
        assert!(etag_matches("\"other\", W/\"song.mp3_1000_1709294400000\"", &etag));
        assert!(etag_matches("song.mp3_1000_1709294400000", &etag));
        assert!(!etag_matches("\"other\"", &etag));
    }

    #[test]
    fn test_etag_with_comma_in_filename_matches_itself() {
        let mut resource = info();
        resource.filename = "Holiday, 2024.mp4".into();
        let etag = resource.etag();

        assert!(etag_matches(&etag, &etag));
        assert!(etag_matches(&format!("\"other\", {}", etag), &etag));
        assert!(!etag_matches("\"Holiday\", \"2024.mp4\"", &etag));
        assert!(same_etag(&etag, &etag));
        assert!(same_etag(&format!("W/{}", etag), &etag));
        assert!(!same_etag("*", &etag));
    }

    #[test]
    fn test_etag_drops_quotes_from_filename() {
        let mut resource = info();
        resource.filename = "say \"hi\".txt".into();
        assert_eq!(resource.etag(), "\"say hi.txt_1000_1709294400000\"");
    }

    #[test]
    fn test_accepts() {
        assert!(accepts("video/*;q=0.8, text/html", "video/mp4"));
        assert!(accepts("*/*", "application/pdf"));
        assert!(accepts("gzip, deflate, br", "gzip"));
        assert!(!accepts("text/html, image/png", "application/pdf"));
        assert!(!accepts("identity", "gzip"));
    }

    #[test]
    fn test_last_modified_truncates_to_seconds() {
        let mut resource = info();
        resource.last_modified = Utc.timestamp_millis_opt(1_709_294_400_750).unwrap();
        assert_eq!(resource.last_modified_secs().timestamp_millis(), 1_709_294_400_000);
    }
}
