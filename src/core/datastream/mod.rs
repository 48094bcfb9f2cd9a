//! Seam to the external time-series store.
//!
//! The engine itself (storage, downsampling, granularity management) lives
//! behind [`DatastreamBackend`]; this layer only reads through it. The
//! handle is constructed once at startup and injected into the request
//! path, never reached through a global.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::stream::filter::TagFilter;
use crate::domain::stream::model::{Datapoint, QueryParams, Stream};
use crate::domain::stream::pagination::{PageWindow, WindowMode};

/// A window over a backend result set.
///
/// Iterating the underlying store may perform I/O; the batch-size hint lets
/// the store size its fetches to the page about to be read. It is advisory
/// only and never changes the returned item count.
#[derive(Debug)]
pub struct Cursor<T> {
    items: Vec<T>,
    batch_size: Option<usize>,
}

impl<T> Cursor<T> {
    pub fn new(items: Vec<T>) -> Cursor<T> {
        Cursor {
            items,
            batch_size: None,
        }
    }

    pub fn total_count(&self) -> usize {
        self.items.len()
    }

    /// Advisory fetch-size hint for the underlying store.
    pub fn batch_size(&mut self, size: usize) {
        self.batch_size = Some(size);
    }

    pub fn batch_size_hint(&self) -> Option<usize> {
        self.batch_size
    }

    /// Consumes the cursor, yielding the items inside `window`.
    pub fn window(self, window: &PageWindow) -> Vec<T> {
        let mut items = self.items;
        match window.mode {
            WindowMode::NoObjects => Vec::new(),
            WindowMode::AllObjects => {
                if window.offset >= items.len() {
                    Vec::new()
                } else {
                    items.split_off(window.offset)
                }
            }
            WindowMode::Paged => {
                let start = window.offset.min(items.len());
                let end = window.offset.saturating_add(window.limit).min(items.len());
                items.drain(start..end).collect()
            }
        }
    }
}

/// Read-only collaborator interface of the external datastream library.
#[async_trait]
pub trait DatastreamBackend: Send + Sync {
    /// Streams whose tags match every filter.
    async fn find_streams(&self, filters: &[TagFilter]) -> Result<Cursor<Stream>>;

    /// Tag/metadata for one stream, or `None` for an unknown id.
    async fn get_tags(&self, id: &str) -> Result<Option<Stream>>;

    /// Datapoints of one stream, bounded by the resolved time range,
    /// granularity, downsamplers and order.
    async fn get_data(&self, id: &str, params: &QueryParams) -> Result<Cursor<Datapoint>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paged(limit: usize, offset: usize) -> PageWindow {
        PageWindow {
            limit,
            offset,
            mode: WindowMode::Paged,
        }
    }

    #[test]
    fn paged_window_slices_within_bounds() {
        let cursor = Cursor::new((0..10).collect::<Vec<_>>());
        assert_eq!(cursor.window(&paged(3, 8)), vec![8, 9]);
    }

    #[test]
    fn paged_window_past_the_end_is_empty() {
        let cursor = Cursor::new(vec![1, 2, 3]);
        assert!(cursor.window(&paged(5, 10)).is_empty());
    }

    #[test]
    fn all_objects_ignores_the_limit() {
        let cursor = Cursor::new((0..30).collect::<Vec<_>>());
        let window = PageWindow {
            limit: 1000,
            offset: 5,
            mode: WindowMode::AllObjects,
        };
        assert_eq!(cursor.window(&window).len(), 25);
    }

    #[test]
    fn no_objects_returns_nothing_regardless_of_count() {
        let cursor = Cursor::new(vec![1, 2, 3]);
        let window = PageWindow {
            limit: 0,
            offset: 0,
            mode: WindowMode::NoObjects,
        };
        assert!(cursor.window(&window).is_empty());
    }

    #[test]
    fn batch_size_hint_is_recorded_but_inert() {
        let mut cursor = Cursor::new(vec![1, 2, 3, 4]);
        cursor.batch_size(2);
        assert_eq!(cursor.batch_size_hint(), Some(2));
        assert_eq!(cursor.window(&paged(3, 0)), vec![1, 2, 3]);
    }
}
