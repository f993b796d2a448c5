//! HTTP cache control module
//!
//! Metadata-based `ETag` generation, conditional request evaluation and
//! HTTP date handling. Validators are recomputed from a fresh stat on every
//! request; nothing is cached between requests.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC850_DATE: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_DATE: &str = "%a %b %e %H:%M:%S %Y";

/// Entity tag derived from modification time and size
///
/// Two files with the same size and the same mtime to the second share a
/// tag. This is a heuristic validator, not a content hash; sub-second
/// rewrites that keep the size are not detected.
///
/// # Examples
/// ```
/// use assetbridge::http::cache::compute_tag;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let mtime = UNIX_EPOCH + Duration::from_secs(0x6500_0000);
/// assert_eq!(compute_tag(1000, mtime), "\"65000000-3e8\"");
/// ```
pub fn compute_tag(size: u64, mtime: SystemTime) -> String {
    format!("\"{:x}-{size:x}\"", unix_secs(mtime))
}

/// `If-None-Match` check: exact string equality with the current tag
pub fn matches(if_none_match: Option<&str>, tag: &str) -> bool {
    if_none_match.is_some_and(|client_tag| client_tag.trim() == tag)
}

/// `If-Modified-Since` check
///
/// True iff the header parses as an HTTP date and the file, truncated to
/// whole seconds, is not newer than it. A malformed header never matches, so
/// the request falls through to a fresh response.
pub fn not_modified_since(if_modified_since: Option<&str>, mtime: SystemTime) -> bool {
    let Some(since) = if_modified_since.and_then(parse_http_date) else {
        return false;
    };
    truncate_to_secs(mtime) <= since
}

/// Format a timestamp as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(IMF_FIXDATE).to_string()
}

/// Parse the three date formats HTTP/1.1 recipients must accept
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    let value = value.trim();
    let naive = NaiveDateTime::parse_from_str(value, IMF_FIXDATE)
        .or_else(|_| NaiveDateTime::parse_from_str(value, RFC850_DATE))
        .or_else(|_| NaiveDateTime::parse_from_str(value, ASCTIME_DATE))
        .ok()?;
    Some(SystemTime::from(naive.and_utc()))
}

/// Drop sub-second precision, which HTTP dates cannot carry
pub fn truncate_to_secs(time: SystemTime) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(unix_secs(time))
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64, nanos: u32) -> SystemTime {
        UNIX_EPOCH + Duration::new(secs, nanos)
    }

    #[test]
    fn test_tag_is_pure() {
        let mtime = at(1_700_000_000, 123);
        assert_eq!(compute_tag(42, mtime), compute_tag(42, mtime));
        // Sub-second changes collide
        assert_eq!(compute_tag(42, mtime), compute_tag(42, at(1_700_000_000, 999)));
        assert_ne!(compute_tag(42, mtime), compute_tag(43, mtime));
        assert_ne!(compute_tag(42, mtime), compute_tag(42, at(1_700_000_001, 0)));
    }

    #[test]
    fn test_tag_format() {
        let tag = compute_tag(255, at(16, 0));
        assert_eq!(tag, "\"10-ff\"");
    }

    #[test]
    fn test_matches_exact() {
        let tag = "\"abc-12\"";
        assert!(matches(Some("\"abc-12\""), tag));
        assert!(!matches(Some("\"abc-13\""), tag));
        assert!(!matches(Some("W/\"abc-12\""), tag));
        assert!(!matches(None, tag));
    }

    #[test]
    fn test_http_date_roundtrip_format() {
        let time = at(784_111_777, 0);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(time));
        assert_eq!(parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"), Some(time));
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), Some(time));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn test_not_modified_since_equal_time() {
        let mtime = at(784_111_777, 500_000_000);
        assert!(not_modified_since(
            Some("Sun, 06 Nov 1994 08:49:37 GMT"),
            mtime
        ));
    }

    #[test]
    fn test_modified_after() {
        let mtime = at(784_111_778, 0);
        assert!(!not_modified_since(
            Some("Sun, 06 Nov 1994 08:49:37 GMT"),
            mtime
        ));
    }

    #[test]
    fn test_malformed_date_serves_fresh() {
        assert!(!not_modified_since(Some("not a date"), at(0, 0)));
        assert!(!not_modified_since(None, at(0, 0)));
    }
}
