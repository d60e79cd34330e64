use mockdrop_core::ByteSpan;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("multiple ranges are not supported")]
    MultipleRanges,
    #[error("range {0:?} is not satisfiable")]
    Unsatisfiable(String),
}

/// Parses a single `bytes=` range against a file of `size` bytes.
///
/// Supports `bytes=a-b`, `bytes=a-` and the suffix form `bytes=-n`. An end
/// beyond the file is clamped to the last byte.
pub fn parse_range(header: &str, size: u64) -> Result<ByteSpan, RangeError> {
    let unsatisfiable = || RangeError::Unsatisfiable(header.to_string());
    let ranges = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(unsatisfiable)?;
    if ranges.contains(',') {
        return Err(RangeError::MultipleRanges);
    }
    let (start, end) = ranges.trim().split_once('-').ok_or_else(unsatisfiable)?;
    if size == 0 {
        return Err(unsatisfiable());
    }
    let last = size - 1;

    if start.is_empty() {
        let suffix: u64 = end.parse().map_err(|_| unsatisfiable())?;
        if suffix == 0 {
            return Err(unsatisfiable());
        }
        return Ok(ByteSpan::new(size.saturating_sub(suffix), last));
    }

    let start: u64 = start.parse().map_err(|_| unsatisfiable())?;
    let end = if end.is_empty() {
        last
    } else {
        end.parse::<u64>().map_err(|_| unsatisfiable())?.min(last)
    };
    if start > end {
        return Err(unsatisfiable());
    }
    Ok(ByteSpan::new(start, end))
}
