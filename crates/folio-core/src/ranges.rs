// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page range syntax used by rule output, e.g. "4, 1-3, 7-".

use std::collections::HashSet;

use tracing::warn;

use crate::error::{FolioError, Result};

/// Parse a page range string into page numbers.
///
/// Accepts single pages (`5`), closed ranges (`1-3`) and open-ended ranges
/// (`7-`, running to `last_page`). Entries may be separated by commas or
/// whitespace, need not be sorted, and may repeat: the result keeps the
/// order of first appearance with duplicates removed.
///
/// Ranges are never expanded past `last_page`. A single page beyond it is
/// kept so the caller can report it.
pub fn parse_ranges(input: &str, last_page: u32) -> Result<Vec<u32>> {
    let mut seen = HashSet::new();
    let mut pages = Vec::new();

    for part in input.split([',', ';']).flat_map(str::split_whitespace) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (start, end) = match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_page(start)?;
                let end = if end.trim().is_empty() {
                    last_page
                } else {
                    parse_page(end)?
                };
                if start > end {
                    return Err(FolioError::InvalidRange(format!(
                        "start {start} > end {end} in '{part}'"
                    )));
                }
                (start, end)
            }
            None => {
                let page = parse_page(part)?;
                if seen.insert(page) {
                    pages.push(page);
                }
                continue;
            }
        };

        if end > last_page {
            warn!(range = part, last_page, "range runs past the last page, truncated");
        }
        for page in start..=end.min(last_page) {
            if seen.insert(page) {
                pages.push(page);
            }
        }
    }

    Ok(pages)
}

fn parse_page(text: &str) -> Result<u32> {
    let page: u32 = text
        .trim()
        .parse()
        .map_err(|_| FolioError::InvalidRange(format!("invalid page: '{}'", text.trim())))?;
    if page == 0 {
        return Err(FolioError::InvalidRange("page numbers start at 1".into()));
    }
    Ok(page)
}
