use super::{Cursor, Item, ScanSource};
use crate::error::ScanError;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// One page handed to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub items: Vec<Item>,
    pub next_cursor: Option<Cursor>,
}

/// Cursor-driven, restartable traversal of a scan API.
///
/// Pages are fetched lazily, one per `next()` call. Across a full traversal
/// every record is produced exactly once in the store's native order, provided
/// the table is not mutated concurrently; no isolation is guaranteed otherwise
/// and a concurrent write may be missed or seen twice.
///
/// Single-writer: `next()` takes `&mut self`, so a handle cannot be advanced
/// from two places at once. Transport errors are returned as-is and are never
/// retried here; the handle keeps its cursor so the caller may call `next()`
/// again.
pub struct Paginator {
    source: Arc<dyn ScanSource>,
    table: String,
    page_size: u32,
    cursor: Option<Cursor>,
    finished: bool,
}

impl Paginator {
    /// Start at the beginning of `table`
    pub fn open(
        source: Arc<dyn ScanSource>,
        table: &str,
        page_size: u32,
    ) -> Result<Self, ScanError> {
        Self::build(source, table, page_size, None)
    }

    /// Continue a traversal from a previously persisted cursor
    pub fn resume(
        source: Arc<dyn ScanSource>,
        table: &str,
        page_size: u32,
        cursor: Cursor,
    ) -> Result<Self, ScanError> {
        Self::build(source, table, page_size, Some(cursor))
    }

    fn build(
        source: Arc<dyn ScanSource>,
        table: &str,
        page_size: u32,
        cursor: Option<Cursor>,
    ) -> Result<Self, ScanError> {
        if page_size == 0 {
            return Err(ScanError::InvalidPageSize);
        }

        Ok(Self {
            source,
            table: table.to_string(),
            page_size,
            cursor,
            finished: false,
        })
    }

    pub fn has_more(&self) -> bool {
        !self.finished
    }

    /// Position the next `next()` call will read from
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Fetch the next page; `Ok(None)` marks the end of the table.
    ///
    /// A page reporting zero items ends the traversal without yielding. A page
    /// with items but no cursor is yielded and then ends the traversal.
    pub async fn next(&mut self) -> Result<Option<Batch>, ScanError> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .source
            .scan(&self.table, self.page_size, self.cursor.clone())
            .await?;

        if page.count == 0 {
            debug!(table = %self.table, "Scan reached an empty page");
            self.finish();
            return Ok(None);
        }

        match &page.next_cursor {
            Some(next) => self.cursor = Some(next.clone()),
            None => self.finish(),
        }

        debug!(
            table = %self.table,
            items = page.items.len(),
            has_more = self.has_more(),
            "Scanned page"
        );

        Ok(Some(Batch {
            items: page.items,
            next_cursor: page.next_cursor,
        }))
    }

    /// Drain the remaining traversal, deserializing every item into `T`.
    pub async fn collect_all<T: DeserializeOwned>(mut self) -> Result<Vec<T>, ScanError> {
        let mut results = Vec::new();

        while let Some(batch) = self.next().await? {
            for item in batch.items {
                results.push(serde_json::from_value(serde_json::Value::Object(item))?);
            }
        }

        Ok(results)
    }

    fn finish(&mut self) {
        self.finished = true;
        self.cursor = None;
    }
}
