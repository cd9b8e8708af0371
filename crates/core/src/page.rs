// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offset/limit pagination.

use serde::{Deserialize, Serialize};

/// One page of a larger listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based page number
    pub page: usize,
    pub size: usize,
    /// Total number of items across all pages
    pub total: u64,
}

impl<T> Page<T> {
    /// Offset of the first item of page `page`.
    pub fn offset(page: usize, size: usize) -> usize {
        page.saturating_mul(size)
    }

    /// Slice `page` out of an already sorted collection.
    pub fn from_sorted(all: Vec<T>, page: usize, size: usize) -> Self {
        let total = all.len() as u64;
        let items = all.into_iter().skip(Self::offset(page, size)).take(size).collect();
        Self { items, page, size, total }
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
