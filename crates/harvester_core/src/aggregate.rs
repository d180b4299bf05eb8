use std::collections::BTreeSet;
use std::fmt;

use crate::types::{PageNumber, PageResult, FIRST_PAGE};

/// Non-fatal record of a page that did not contribute items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWarning {
    pub page: PageNumber,
    pub message: String,
}

impl fmt::Display for PageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to fetch page {}: {}", self.page, self.message)
    }
}

/// Best-effort result of a harvest run.
///
/// Item order follows result arrival, not page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harvest<T> {
    pub items: Vec<T>,
    pub warnings: Vec<PageWarning>,
    pub total_pages: PageNumber,
    pub workers: usize,
}

impl<T> Harvest<T> {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Folds page results into a single collection.
///
/// Tracks which pages are still owed a result so that a page whose worker
/// vanished is still reported.
#[derive(Debug)]
pub struct Aggregator<T> {
    items: Vec<T>,
    warnings: Vec<PageWarning>,
    pending: BTreeSet<PageNumber>,
    seen: BTreeSet<PageNumber>,
}

impl<T> Aggregator<T> {
    pub fn new(first_page_items: Vec<T>, expected: impl IntoIterator<Item = PageNumber>) -> Self {
        let mut seen = BTreeSet::new();
        seen.insert(FIRST_PAGE);
        Self {
            items: first_page_items,
            warnings: Vec::new(),
            pending: expected.into_iter().collect(),
            seen,
        }
    }

    /// Register one more page that must produce a result.
    pub fn expect(&mut self, page: PageNumber) {
        if !self.seen.contains(&page) {
            self.pending.insert(page);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Fold one result in. Returns the warning recorded for it, if any.
    pub fn absorb(&mut self, result: PageResult<T>) -> Option<&PageWarning> {
        let page = result.page;
        if !self.pending.remove(&page) {
            let message = if self.seen.contains(&page) {
                "duplicate result discarded".to_string()
            } else {
                "unexpected result discarded".to_string()
            };
            return Some(self.warn(page, message));
        }
        self.seen.insert(page);

        match result.outcome {
            Ok(mut items) => {
                self.items.append(&mut items);
                None
            }
            Err(err) => Some(self.warn(page, err.to_string())),
        }
    }

    /// Record that pages after `last_page` exist but could not be addressed.
    pub fn truncate_after(&mut self, last_page: PageNumber, next_link: &str) -> &PageWarning {
        self.warn(
            last_page.saturating_add(1),
            format!("next link {next_link} has no page number; harvest stopped after page {last_page}"),
        )
    }

    /// Close the run. Pages that never reported are turned into warnings.
    pub fn finish(mut self, workers: usize) -> Harvest<T> {
        let total_pages = self.seen.len() + self.pending.len();
        for page in std::mem::take(&mut self.pending) {
            self.warn(page, "no result produced".to_string());
        }
        Harvest {
            items: self.items,
            warnings: self.warnings,
            total_pages: PageNumber::try_from(total_pages).unwrap_or(PageNumber::MAX),
            workers,
        }
    }

    fn warn(&mut self, page: PageNumber, message: String) -> &PageWarning {
        self.warnings.push(PageWarning { page, message });
        &self.warnings[self.warnings.len() - 1]
    }
}
