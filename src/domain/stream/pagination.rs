//! Pagination window computation and next/previous link construction.
//!
//! The stock limit/offset scheme never returns a previous page once the
//! start would dip below offset zero, even when items remain. Here the
//! previous page's limit shrinks to the offset instead (offset 7, limit 10
//! pages back to offset 0, limit 7), so paging backward covers every item.

use crate::api::dto::stream_dto::PageMeta;
use crate::domain::stream::query::RawQuery;
use crate::errors::AppError;

const PARAM_LIMIT: &str = "limit";
const PARAM_OFFSET: &str = "offset";

/// What a client-supplied `limit=0` means for the view being paginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroLimit {
    /// List views: pagination disabled, every object returned.
    AllObjects,
    /// Detail views: no datapoints, other stream fields still included.
    NoObjects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Paged,
    AllObjects,
    NoObjects,
}

/// The window to slice with, plus how `limit` is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Effective limit as reported in `meta` (the configured max when
    /// pagination is disabled).
    pub limit: usize,
    pub offset: usize,
    pub mode: WindowMode,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub default_limit: usize,
    pub max_limit: usize,
    pub zero_limit: ZeroLimit,
}

impl Paginator {
    pub fn window(&self, raw: &RawQuery) -> Result<PageWindow, AppError> {
        let limit = match raw.get(PARAM_LIMIT) {
            Some(value) => {
                let limit: i64 = value.parse().map_err(|_| {
                    AppError::BadRequest(format!(
                        "Invalid limit '{value}' provided. Please provide a positive integer."
                    ))
                })?;
                if limit < 0 {
                    return Err(AppError::BadRequest(format!(
                        "Invalid limit '{value}' provided. Please provide a positive integer >= 0."
                    )));
                }
                limit as usize
            }
            None => self.default_limit,
        };

        let offset = match raw.get(PARAM_OFFSET) {
            Some(value) => value.parse::<i64>().ok().filter(|o| *o >= 0).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Invalid offset '{value}' provided. Please provide an integer >= 0."
                ))
            })? as usize,
            None => 0,
        };

        let window = match (limit, self.zero_limit) {
            (0, ZeroLimit::AllObjects) => PageWindow {
                limit: self.max_limit,
                offset,
                mode: WindowMode::AllObjects,
            },
            (0, ZeroLimit::NoObjects) => PageWindow {
                limit: 0,
                offset,
                mode: WindowMode::NoObjects,
            },
            (n, _) => PageWindow {
                limit: n.min(self.max_limit),
                offset,
                mode: WindowMode::Paged,
            },
        };
        Ok(window)
    }

    /// Builds the `meta` block. Links re-encode every original query
    /// parameter with `limit` and `offset` replaced.
    pub fn meta(
        &self,
        window: &PageWindow,
        total_count: usize,
        path: &str,
        raw: &RawQuery,
    ) -> PageMeta {
        // Links follow the zero-limit arithmetic of the original protocol:
        // a disabled or empty window paginates with limit 0.
        let link_limit = match window.mode {
            WindowMode::Paged => window.limit,
            WindowMode::AllObjects | WindowMode::NoObjects => 0,
        };

        PageMeta {
            total_count,
            limit: window.limit,
            offset: window.offset,
            next: self.next_uri(link_limit, window.offset, total_count, path, raw),
            previous: self.previous_uri(link_limit, window.offset, path, raw),
        }
    }

    fn next_uri(
        &self,
        limit: usize,
        offset: usize,
        total_count: usize,
        path: &str,
        raw: &RawQuery,
    ) -> Option<String> {
        if limit == 0 {
            return None;
        }
        if total_count <= offset + limit {
            return None;
        }
        Some(generate_uri(path, raw, limit, offset + limit))
    }

    fn previous_uri(
        &self,
        mut limit: usize,
        offset: usize,
        path: &str,
        raw: &RawQuery,
    ) -> Option<String> {
        if limit == 0 || offset == 0 {
            return None;
        }

        // Shrink the boundary page so the previous offset never goes
        // negative: offset 7, limit 10 pages back to offset 0, limit 7.
        if offset < limit {
            limit = offset;
        }

        Some(generate_uri(path, raw, limit, offset - limit))
    }
}

fn generate_uri(path: &str, raw: &RawQuery, limit: usize, offset: usize) -> String {
    let rest = raw.encode_without(&[PARAM_LIMIT, PARAM_OFFSET]);
    if rest.is_empty() {
        format!("{path}?limit={limit}&offset={offset}")
    } else {
        format!("{path}?{rest}&limit={limit}&offset={offset}")
    }
}
