//! Cursor pagination over collections ordered by descending id
//!
//! A page request carries a limit and an optional cursor (the id of the last
//! item of the previous page). Stores fetch `limit + 1` rows with
//! `id < cursor`, newest first; the extra row only signals that another page
//! exists and is never returned.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    #[error("Invalid cursor format.")]
    InvalidCursor,
}

/// Opaque resume token: the decimal id of the last item already delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(i64);

impl Cursor {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> i64 {
        self.0
    }
}

impl FromStr for Cursor {
    type Err = PaginationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Ids are positive; a leading '+' or whitespace is not an id we handed out
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PaginationError::InvalidCursor);
        }
        match s.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(PaginationError::InvalidCursor),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `?limit=&cursor=` as received on the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

/// Normalised page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub before: Option<i64>,
}

impl PageRequest {
    /// Limit is clamped to `1..=MAX_PAGE_SIZE`
    pub fn new(limit: i64, cursor: Option<Cursor>) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            before: cursor.map(|c| c.id()),
        }
    }

    /// Rows to ask the store for: one more than the page size
    pub fn fetch_size(&self) -> i64 {
        self.limit + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, None)
    }
}

impl TryFrom<PageQuery> for PageRequest {
    type Error = PaginationError;

    fn try_from(query: PageQuery) -> Result<Self, Self::Error> {
        let cursor = match query.cursor.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Cursor>()?),
        };
        Ok(Self::new(parse_limit(query.limit.as_deref()), cursor))
    }
}

/// Unparseable, zero or negative limits fall back to the default
fn parse_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// One page of results plus the cursor for the next one (`None` at the end)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page from rows fetched with `PageRequest::fetch_size`.
    ///
    /// `rows` must already be sorted by descending id.
    pub fn from_overfetch(mut rows: Vec<T>, limit: i64, id_of: impl Fn(&T) -> i64) -> Self {
        let limit = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last().map(|last| Cursor::new(id_of(last)).to_string())
        } else {
            None
        };

        Self {
            items: rows,
            next_cursor,
        }
    }
}
