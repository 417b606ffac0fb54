//! HTTP Range request parsing module
//!
//! Range header parsing for multi-range requests, RFC 7233 style.
//! Any invalid part invalidates the whole header; there is no partial acceptance.

use thiserror::Error;

/// The only range unit this server understands
pub const RANGE_UNIT: &str = "bytes";

/// An inclusive byte interval `[start, end]` of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Start byte position
    pub start: u64,
    /// End byte position (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by this range
    #[inline]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are never empty: zero-width intervals are rejected at parse time
    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Non-empty ordered sequence of ranges in the `bytes` unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<ByteRange>,
}

impl RangeSet {
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// Total number of payload bytes across all ranges
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(ByteRange::len).sum()
    }
}

/// Caps on how much work one Range header may request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLimits {
    pub max_ranges: usize,
    pub max_total_bytes: u64,
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self {
            max_ranges: 16,
            max_total_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Why a Range header could not be satisfied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range header has no unit separator")]
    MissingUnit,
    #[error("unsupported range unit '{0}'")]
    UnsupportedUnit(String),
    #[error("malformed range spec '{0}'")]
    Malformed(String),
    #[error("range {start}-{end} not satisfiable for {size} bytes")]
    Unsatisfiable { start: u64, end: u64, size: u64 },
    #[error("too many ranges: {count} (max {max})")]
    TooManyRanges { count: usize, max: usize },
    #[error("ranges request {requested} bytes (max {max})")]
    TooLarge { requested: u64, max: u64 },
}

/// Parse an HTTP Range header against a resource size
///
/// Supported formats per comma-separated spec:
/// - `start-end` - Specific range, taken verbatim
/// - `start-` - From start to the last byte
/// - `-n` - Suffix, `[size-1-n, size-1]`
///
/// Whitespace anywhere in the header is ignored. Every interval must satisfy
/// `start < end < size`.
///
/// # Examples
/// ```
/// use static_handler::http::range::{parse_range_header, RangeLimits};
///
/// let set = parse_range_header("bytes=0-1,3-4", 5, &RangeLimits::default()).unwrap();
/// assert_eq!(set.ranges().len(), 2);
///
/// assert!(parse_range_header("bytes=0-0", 5, &RangeLimits::default()).is_err());
/// ```
pub fn parse_range_header(
    header: &str,
    size: u64,
    limits: &RangeLimits,
) -> Result<RangeSet, RangeError> {
    let compact: String = header.chars().filter(|c| !c.is_whitespace()).collect();

    let Some((unit, specs)) = compact.split_once('=') else {
        return Err(RangeError::MissingUnit);
    };
    if unit != RANGE_UNIT {
        return Err(RangeError::UnsupportedUnit(unit.to_string()));
    }

    let specs: Vec<&str> = specs.split(',').collect();
    if specs.len() > limits.max_ranges {
        return Err(RangeError::TooManyRanges {
            count: specs.len(),
            max: limits.max_ranges,
        });
    }

    let ranges = specs
        .into_iter()
        .map(|spec| parse_spec(spec, size))
        .collect::<Result<Vec<_>, _>>()?;
    let set = RangeSet { ranges };

    let requested = set.total_bytes();
    if requested > limits.max_total_bytes {
        return Err(RangeError::TooLarge {
            requested,
            max: limits.max_total_bytes,
        });
    }

    Ok(set)
}

/// Parse one `start-end` spec and validate it against the resource size
fn parse_spec(spec: &str, size: u64) -> Result<ByteRange, RangeError> {
    let Some((start_str, end_str)) = spec.split_once('-') else {
        return Err(RangeError::Malformed(spec.to_string()));
    };

    let start = parse_position(start_str, spec)?;
    let end = parse_position(end_str, spec)?;
    let last = size.checked_sub(1);

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (None, Some(suffix)) => {
            // Suffix: last `suffix` bytes
            let last = last.ok_or(RangeError::Unsatisfiable {
                start: 0,
                end: suffix,
                size,
            })?;
            let start = last.checked_sub(suffix).ok_or(RangeError::Unsatisfiable {
                start: 0,
                end: suffix,
                size,
            })?;
            (start, last)
        }
        (Some(start), None) => {
            let last = last.ok_or(RangeError::Unsatisfiable {
                start,
                end: 0,
                size,
            })?;
            (start, last)
        }
        (None, None) => return Err(RangeError::Malformed(spec.to_string())),
    };

    if start >= end || end >= size {
        return Err(RangeError::Unsatisfiable { start, end, size });
    }

    Ok(ByteRange { start, end })
}

/// Parse one side of a spec: absent when empty, digits only otherwise
fn parse_position(value: &str, spec: &str) -> Result<Option<u64>, RangeError> {
    if value.is_empty() {
        return Ok(None);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed(spec.to_string()));
    }
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| RangeError::Malformed(spec.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(header: &str, size: u64) -> Result<RangeSet, RangeError> {
        parse_range_header(header, size, &RangeLimits::default())
    }

    fn single(header: &str, size: u64) -> ByteRange {
        let set = parse(header, size).expect("expected a valid range");
        assert_eq!(set.ranges().len(), 1);
        set.ranges()[0]
    }

    #[test]
    fn test_standard_range() {
        let r = single("bytes=0-9", 100);
        assert_eq!(r, ByteRange { start: 0, end: 9 });
        assert_eq!(r.len(), 10);
    }

    #[test]
    fn test_open_range() {
        let r = single("bytes=50-", 100);
        assert_eq!(r, ByteRange { start: 50, end: 99 });
        assert_eq!(r.len(), 50);
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(single("bytes=-20", 100), ByteRange { start: 79, end: 99 });
    }

    #[test]
    fn test_multiple_ranges_keep_order() {
        let set = parse("bytes=3-4,0-1", 5).unwrap();
        assert_eq!(
            set.ranges(),
            &[ByteRange { start: 3, end: 4 }, ByteRange { start: 0, end: 1 }]
        );
        assert_eq!(set.total_bytes(), 4);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let set = parse(" bytes = 0 - 1 , 3 - 4 ", 5).unwrap();
        assert_eq!(set.ranges().len(), 2);
    }

    #[test]
    fn test_single_byte_range_rejected() {
        assert!(matches!(
            parse("bytes=0-0", 5),
            Err(RangeError::Unsatisfiable { start: 0, end: 0, .. })
        ));
        assert!(parse("bytes=4-", 5).is_err());
    }

    #[test]
    fn test_not_satisfiable() {
        assert!(matches!(
            parse("bytes=200-", 100),
            Err(RangeError::Unsatisfiable { .. })
        ));
        assert!(matches!(
            parse("bytes=0-100", 100),
            Err(RangeError::Unsatisfiable { .. })
        ));
        assert!(matches!(
            parse("bytes=5-2", 100),
            Err(RangeError::Unsatisfiable { .. })
        ));
        assert!(matches!(
            parse("bytes=-100", 100),
            Err(RangeError::Unsatisfiable { .. })
        ));
    }

    #[test]
    fn test_empty_resource() {
        assert!(parse("bytes=0-", 0).is_err());
        assert!(parse("bytes=-1", 0).is_err());
        assert!(parse("bytes=0-1", 0).is_err());
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(parse("0-9", 100), Err(RangeError::MissingUnit));
        assert_eq!(
            parse("items=0-9", 100),
            Err(RangeError::UnsupportedUnit("items".to_string()))
        );
        assert!(matches!(parse("bytes=a-b", 100), Err(RangeError::Malformed(_))));
        assert!(matches!(parse("bytes=5", 100), Err(RangeError::Malformed(_))));
        assert!(matches!(parse("bytes=-", 100), Err(RangeError::Malformed(_))));
        assert!(matches!(parse("bytes=--5", 100), Err(RangeError::Malformed(_))));
        assert!(matches!(parse("bytes=+1-5", 100), Err(RangeError::Malformed(_))));
        assert!(matches!(parse("bytes=", 100), Err(RangeError::Malformed(_))));
    }

    #[test]
    fn test_one_bad_spec_invalidates_all() {
        assert!(parse("bytes=0-9,x-y", 100).is_err());
        assert!(parse("bytes=0-9,95-200", 100).is_err());
        assert!(parse("bytes=0-9,", 100).is_err());
    }

    #[test]
    fn test_overflowing_numbers_rejected() {
        assert!(matches!(
            parse("bytes=0-99999999999999999999999", 100),
            Err(RangeError::Malformed(_))
        ));
    }

    #[test]
    fn test_limits() {
        let limits = RangeLimits {
            max_ranges: 2,
            max_total_bytes: 10,
        };
        assert_eq!(
            parse_range_header("bytes=0-1,2-3,4-5", 100, &limits),
            Err(RangeError::TooManyRanges { count: 3, max: 2 })
        );
        assert_eq!(
            parse_range_header("bytes=0-5,10-15", 100, &limits),
            Err(RangeError::TooLarge {
                requested: 12,
                max: 10
            })
        );
        assert!(parse_range_header("bytes=0-4,10-14", 100, &limits).is_ok());
    }
}
