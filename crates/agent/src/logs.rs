// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paginated reads of command log files.

use cix_core::Page;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Single line returned when a command has no log on this agent.
pub const LOG_NOT_FOUND: &str = "Log does not existed on agent";

fn not_found() -> Page<String> {
    Page { items: vec![LOG_NOT_FOUND.to_string()], page: 0, size: 1, total: 1 }
}

/// Read lines `page * size .. page * size + size` of the log at `path`.
///
/// With `known_total` (the finished command's line count) reading stops after
/// the page; otherwise the whole file is scanned to count its lines.
pub async fn read_page(
    path: &Path,
    page: usize,
    size: usize,
    known_total: Option<u64>,
) -> std::io::Result<Page<String>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(not_found()),
        Err(e) => return Err(e),
    };

    let start = Page::<String>::offset(page, size);
    let end = start.saturating_add(size);
    let mut lines = BufReader::new(file).lines();
    let mut items = Vec::with_capacity(size.min(1024));
    let mut count = 0usize;

    while let Some(line) = lines.next_line().await? {
        if count >= start && count < end {
            items.push(line);
        }
        count += 1;
        if count >= end && known_total.is_some() {
            break;
        }
    }

    Ok(Page { items, page, size, total: known_total.unwrap_or(count as u64) })
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
