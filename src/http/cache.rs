//! HTTP cache control module
//!
//! Provides `ETag` generation, HTTP-date handling and the `Cache-Control` policy.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blake2::{Blake2b512, Digest};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Read buffer used while hashing file content
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// IMF-fixdate, the preferred HTTP-date format
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// Obsolete RFC 850 HTTP-date format
const RFC850_DATE: &str = "%A, %d-%b-%y %H:%M:%S GMT";
/// Obsolete ANSI C `asctime()` HTTP-date format
const ASCTIME_DATE: &str = "%a %b %e %H:%M:%S %Y";

/// Generate a weak `ETag` from a modification time
///
/// The token is the epoch-millisecond value in base 36, so it changes only
/// when the modification time does.
///
/// # Returns
/// Weak `ETag` string, e.g., `W/"lz1x2c8k"`
pub fn weak_etag(modified: SystemTime) -> String {
    format!("W/\"{}\"", to_base36(epoch_millis(modified)))
}

/// Generate a strong `ETag` by hashing the full file content
///
/// Streams the file through BLAKE2b-512 and base64-encodes the digest.
/// The file handle is closed when this returns, on every path.
///
/// # Returns
/// Quoted `ETag` string, e.g., `"q3Vx...=="`
pub async fn strong_etag(path: &Path) -> io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Blake2b512::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("\"{}\"", STANDARD.encode(hasher.finalize())))
}

/// Format a modification time as an IMF-fixdate `Last-Modified` value
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(IMF_FIXDATE).to_string()
}

/// Parse an HTTP-date in any of the three formats allowed by RFC 7231
///
/// Returns `None` for anything unparseable; callers ignore such headers.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    [RFC850_DATE, ASCTIME_DATE]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Truncate a modification time to whole seconds, the resolution of HTTP-dates
pub fn to_http_precision(time: SystemTime) -> DateTime<Utc> {
    let secs = epoch_millis(time).div_euclid(1000);
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

fn to_base36(value: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = value.unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[usize::try_from(n % 36).unwrap_or_default()]);
        n /= 36;
    }
    if value < 0 {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Cacheable representation
    Public,
    /// Error and precondition responses, never stored
    NoStore,
}

impl CachePolicy {
    /// Convert to Cache-Control header value
    pub const fn to_header_value(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::NoStore => "no-store",
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Public
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_weak_etag_format() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let etag = weak_etag(t);
        assert!(etag.starts_with("W/\""));
        assert!(etag.ends_with('"'));
        assert_eq!(etag, format!("W/\"{}\"", to_base36(1_700_000_000_123)));
    }

    #[test]
    fn test_weak_etag_tracks_mtime_only() {
        let t1 = UNIX_EPOCH + Duration::from_millis(1_000);
        let t2 = UNIX_EPOCH + Duration::from_millis(1_001);
        assert_eq!(weak_etag(t1), weak_etag(t1));
        assert_ne!(weak_etag(t1), weak_etag(t2));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(-71), "-1z");
    }

    #[tokio::test]
    async fn test_strong_etag_consistency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"same content").unwrap();
        let etag1 = strong_etag(file.path()).await.unwrap();
        let etag2 = strong_etag(file.path()).await.unwrap();
        assert_eq!(etag1, etag2);
        assert!(etag1.starts_with('"') && etag1.ends_with('"'));
        assert!(!etag1.starts_with("W/"));
        // 64 digest bytes -> 88 base64 characters, plus quotes
        assert_eq!(etag1.len(), 90);
    }

    #[tokio::test]
    async fn test_strong_etag_difference() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"content a").unwrap();
        b.write_all(b"content b").unwrap();
        let etag_a = strong_etag(a.path()).await.unwrap();
        let etag_b = strong_etag(b.path()).await.unwrap();
        assert_ne!(etag_a, etag_b);
    }

    #[tokio::test]
    async fn test_strong_etag_missing_file() {
        assert!(strong_etag(Path::new("/definitely/not/here")).await.is_err());
    }

    #[test]
    fn test_http_date_round_trip() {
        let t = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(t), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(to_http_precision(t))
        );
    }

    #[test]
    fn test_parse_obsolete_formats() {
        let expected = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(expected.is_some());
        assert_eq!(parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"), expected);
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), expected);
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn test_http_precision_truncates_millis() {
        let t = UNIX_EPOCH + Duration::from_millis(10_999);
        assert_eq!(to_http_precision(t).timestamp(), 10);
    }

    #[test]
    fn test_cache_policy() {
        assert_eq!(CachePolicy::Public.to_header_value(), "public");
        assert_eq!(CachePolicy::NoStore.to_header_value(), "no-store");
        assert_eq!(CachePolicy::default(), CachePolicy::Public);
    }
}
