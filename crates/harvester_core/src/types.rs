use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::failure::PageError;

pub type PageNumber = u32;

/// Pages are 1-based on the remote side.
pub const FIRST_PAGE: PageNumber = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    #[default]
    Closed,
    All,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
            IssueState::All => "all",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the collection being harvested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub owner: String,
    pub repo: String,
    pub state: IssueState,
}

impl ListRequest {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, state: IssueState) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            state,
        }
    }

    pub fn closed(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::new(owner, repo, IssueState::Closed)
    }
}

impl fmt::Display for ListRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.owner, self.repo, self.state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageJob {
    pub page: PageNumber,
}

/// Outcome of one page job, handed from a worker to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult<T> {
    pub page: PageNumber,
    pub outcome: Result<Vec<T>, PageError>,
}

impl<T> PageResult<T> {
    pub fn success(page: PageNumber, items: Vec<T>) -> Self {
        Self {
            page,
            outcome: Ok(items),
        }
    }

    pub fn failure(page: PageNumber, error: PageError) -> Self {
        Self {
            page,
            outcome: Err(error),
        }
    }
}

/// Remaining request quota as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Pagination and quota information attached to a single page response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub page: PageNumber,
    pub next_page: Option<PageNumber>,
    pub last_page: Option<PageNumber>,
    /// Next link that cannot be addressed by page number.
    pub next_cursor: Option<String>,
    pub rate: Option<RateSnapshot>,
}

impl PageMeta {
    /// Metadata for a response that carried no pagination links.
    pub fn single(page: PageNumber) -> Self {
        Self {
            page,
            next_page: None,
            last_page: None,
            next_cursor: None,
            rate: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_page.is_some() || self.next_cursor.is_some()
    }

    /// How the remaining pages after this one should be retrieved.
    pub fn pagination(&self) -> Pagination {
        match (self.last_page, self.next_page) {
            (Some(last), _) if last > self.page => Pagination::Numbered { total_pages: last },
            (_, Some(next_page)) => Pagination::Sequential { next_page },
            _ if self.next_cursor.is_some() => Pagination::Cursor,
            _ => Pagination::Single,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Nothing after the current page.
    Single,
    /// The server announced the last page; pages can be fetched in parallel.
    Numbered { total_pages: PageNumber },
    /// Only a next link is known; pages must be walked one at a time.
    Sequential { next_page: PageNumber },
    /// More pages exist behind an opaque cursor that page numbers cannot reach.
    Cursor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}
