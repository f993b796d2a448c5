//! HTTP Range request parsing module
//!
//! Resolves a `Range` header against a known resource size. Only a single
//! `bytes=<start>-<end>` window is supported. Suffix ranges (`bytes=-500`)
//! and multi-range requests are rejected as malformed instead of being
//! answered with `multipart/byteranges`; this is a known deviation from
//! RFC 7233.

use crate::error::{Error, Result};

const UNIT_PREFIX: &str = "bytes=";

/// Validated byte window, `start <= end < total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
    total: u64,
}

impl ByteRange {
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Inclusive last byte
    pub const fn end(&self) -> u64 {
        self.end
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Number of bytes in the window
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` header value
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// `Content-Range` value sent along with a 416
pub fn unsatisfied_content_range(total: u64) -> String {
    format!("bytes */{total}")
}

/// Parse a `Range` header value against a resource of `total` bytes
///
/// # Examples
/// ```
/// use assetbridge::http::range::resolve;
///
/// let range = resolve("bytes=100-199", 1000).unwrap();
/// assert_eq!(range.len(), 100);
/// assert_eq!(range.content_range(), "bytes 100-199/1000");
///
/// // Open-ended
/// assert_eq!(resolve("bytes=900-", 1000).unwrap().end(), 999);
///
/// // Suffix ranges are not supported
/// assert!(resolve("bytes=-500", 1000).is_err());
/// ```
pub fn resolve(header: &str, total: u64) -> Result<ByteRange> {
    let malformed = || Error::MalformedRange(header.to_string());

    let range_set = header.trim().strip_prefix(UNIT_PREFIX).ok_or_else(malformed)?;

    // Only a single range
    if range_set.contains(',') {
        return Err(malformed());
    }

    let mut parts = range_set.split('-');
    let (Some(start_str), Some(end_str), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    let start = match (start_str.is_empty(), end_str.is_empty()) {
        // "bytes=-N": suffix form, unsupported
        (true, false) => return Err(malformed()),
        (true, true) => 0,
        (false, _) => parse_position(start_str).ok_or_else(malformed)?,
    };

    let end = if end_str.is_empty() {
        // Open-ended: through the last byte. An empty resource has none.
        if total == 0 {
            return Err(Error::UnsatisfiableRange { total });
        }
        total - 1
    } else {
        parse_position(end_str).ok_or_else(malformed)?
    };

    if start > end || end >= total {
        return Err(Error::UnsatisfiableRange { total });
    }

    Ok(ByteRange { start, end, total })
}

fn parse_position(s: &str) -> Option<u64> {
    // u64::from_str accepts a leading '+', a range position does not
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
