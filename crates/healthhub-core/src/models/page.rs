//! Pagination envelope shared by every list-returning operation.

use serde::{Deserialize, Serialize};

/// Offset window requested by a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl PageRequest {
    /// No pagination: the whole filtered set is one page.
    pub fn unpaged() -> Self {
        Self::default()
    }

    pub fn from_skip_take(skip: Option<u64>, take: Option<u64>) -> Self {
        Self { skip, take }
    }

    /// Page numbers are 1-based. Pagination applies only when both values are
    /// present.
    pub fn from_page(page: Option<u64>, page_size: Option<u64>) -> Self {
        match (page, page_size) {
            (Some(page), Some(page_size)) => Self {
                skip: Some(page.saturating_sub(1).saturating_mul(page_size)),
                take: Some(page_size),
            },
            _ => Self::unpaged(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.skip.unwrap_or(0)
    }
}

/// Navigation flags and cursors for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    /// Stringified offset of the first row
    pub start_cursor: String,
    /// Stringified offset just past the last returned row
    pub end_cursor: String,
    pub current_page: u64,
    pub total_pages: u64,
}

impl PageInfo {
    pub fn compute(total_count: u64, request: PageRequest, returned: usize) -> Self {
        let skip = request.offset();
        let take = request.take.unwrap_or(total_count);

        let total_pages = if take == 0 {
            1
        } else {
            total_count.div_ceil(take)
        };

        let current_page = match (request.skip, request.take) {
            (Some(skip), Some(take)) if take > 0 => skip / take + 1,
            _ => 1,
        };

        let has_next_page = match request.take {
            Some(take) => skip.saturating_add(take) < total_count,
            None => false,
        };

        Self {
            has_next_page,
            has_previous_page: current_page > 1,
            start_cursor: skip.to_string(),
            end_cursor: skip.saturating_add(returned as u64).to_string(),
            current_page,
            total_pages,
        }
    }
}

/// A page of results with the total size of the filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub nodes: Vec<T>,
    pub page_info: PageInfo,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(nodes: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        let page_info = PageInfo::compute(total_count, request, nodes.len());
        Self {
            nodes,
            page_info,
            total_count,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            nodes: self.nodes.into_iter().map(f).collect(),
            page_info: self.page_info,
            total_count: self.total_count,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
