// Fixed-size page slicing for result sets

use serde::Serialize;

/// Current pagination position. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page_size: usize,
    page: usize,
}

impl PageWindow {
    pub fn new(page_size: usize) -> Self {
        PageWindow { page_size: page_size.max(1), page: 1 }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// ceil(total / page_size), never less than one page.
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Same window on `page`, clamped to `[1, total_pages(total)]`.
    pub fn at(self, page: usize, total: usize) -> Self {
        PageWindow { page: page.clamp(1, self.total_pages(total)), ..self }
    }

    pub fn reset(self) -> Self {
        PageWindow { page: 1, ..self }
    }
}

/// Numbers shown above a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    /// 1-based index of the first record on the page (0 when there are none).
    pub start: usize,
    /// 1-based inclusive index of the last record on the page.
    pub end: usize,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

impl PageSummary {
    pub fn has_prev(&self) -> bool {
        self.total > 0 && self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.total > 0 && self.page < self.total_pages
    }
}

/// Slices `records` to the window's page. Out-of-range pages are clamped
/// rather than rejected.
pub fn paginate<T>(records: &[T], window: PageWindow) -> (&[T], PageSummary) {
    let total = records.len();
    let window = window.at(window.page, total);
    let start = ((window.page - 1) * window.page_size).min(total);
    let end = (start + window.page_size).min(total);

    let summary = PageSummary {
        start: if total == 0 { 0 } else { start + 1 },
        end,
        total,
        page: window.page,
        total_pages: window.total_pages(total),
    };
    (&records[start..end], summary)
}
