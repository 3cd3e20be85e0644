//! Backing-store collaborators: bulk scan for the vendor table and the
//! list-append upsert used by the dispatcher.

pub mod attribute;
pub mod dynamo;
pub mod paginator;

use crate::error::{ScanError, StoreWriteError};
use crate::models::CanonicalRecord;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub use dynamo::DynamoTable;
pub use paginator::{Batch, Paginator};

/// One scanned row, already converted from the store's wire format
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Opaque resume position returned by a scan.
///
/// Serializable so a traversal can be persisted and resumed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub serde_json::Map<String, serde_json::Value>);

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    /// Number of items the store reports for this page
    pub count: usize,
    pub items: Vec<Item>,
    /// Absent when the store has nothing beyond this page
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub name: String,
    pub item_count: Option<i64>,
    pub status: Option<String>,
}

#[async_trait]
pub trait ScanSource: Send + Sync {
    async fn describe(&self, table: &str) -> Result<TableDescription, ScanError>;

    async fn scan(
        &self,
        table: &str,
        limit: u32,
        cursor: Option<Cursor>,
    ) -> Result<ScanPage, ScanError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append `record` to the list kept under `key`, stamping the update time.
    /// Atomic per call; creates the list when absent.
    async fn update_append(
        &self,
        table: &str,
        key: &str,
        record: &CanonicalRecord,
    ) -> Result<(), StoreWriteError>;
}

/// Confirm `table` exists, then read every row into `T`.
pub async fn fetch_all<T: DeserializeOwned>(
    source: Arc<dyn ScanSource>,
    table: &str,
    page_size: u32,
) -> Result<Vec<T>, ScanError> {
    let description = source.describe(table).await?;
    info!(
        table = %description.name,
        item_count = ?description.item_count,
        status = ?description.status,
        "Table retrieved"
    );

    Paginator::open(source, table, page_size)?.collect_all().await
}
