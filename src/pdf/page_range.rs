//! Page range parsing
//!
//! Accepts `first`, `last`, a single 1-based page (`"3"`) or a range
//! (`"2-5"`, `"-4"`, `"7-"`). Missing range bounds default to the first and
//! last page; the end of a range is clamped to the page count.

use crate::error::{Error, Result};

/// Parse a page specification into zero-based page indices.
///
/// `None` selects every page. A document with no pages always yields an
/// empty list, whatever the specification says.
pub fn parse_page_range(total_pages: usize, spec: Option<&str>) -> Result<Vec<usize>> {
    if total_pages == 0 {
        return Ok(Vec::new());
    }
    let Some(raw) = spec else {
        return Ok((0..total_pages).collect());
    };

    let spec = raw.trim().to_lowercase();
    if spec == "first" {
        return Ok(vec![0]);
    }
    if spec == "last" {
        return Ok(vec![total_pages - 1]);
    }

    let total = total_pages as i64;

    if let Some((start, end)) = spec.split_once('-') {
        let start = parse_bound(raw, start)?.unwrap_or(1);
        let end = parse_bound(raw, end)?.unwrap_or(total);
        if start < 1 || end < 1 || start > total {
            return Err(Error::invalid_range(
                raw,
                format!("pages must be within 1-{}", total_pages),
            ));
        }
        let end = end.min(total);
        return Ok(((start - 1)..end).map(|p| p as usize).collect());
    }

    let page: i64 = spec
        .parse()
        .map_err(|_| Error::invalid_range(raw, "expected first, last, N or S-E"))?;
    if page < 1 || page > total {
        return Err(Error::invalid_range(
            raw,
            format!("page {} out of range (1-{})", page, total_pages),
        ));
    }
    Ok(vec![(page - 1) as usize])
}

/// Parse one side of a range; an empty side means "use the default".
///
/// A number too large for `i64` saturates, so an oversized end is clamped
/// to the page count like any other.
fn parse_bound(raw: &str, bound: &str) -> Result<Option<i64>> {
    let bound = bound.trim();
    if bound.is_empty() {
        return Ok(None);
    }
    match bound.parse() {
        Ok(n) => Ok(Some(n)),
        Err(_) if bound.bytes().all(|b| b.is_ascii_digit()) => Ok(Some(i64::MAX)),
        Err(_) => Err(Error::invalid_range(
            raw,
            format!("'{}' is not a page number", bound),
        )),
    }
}
