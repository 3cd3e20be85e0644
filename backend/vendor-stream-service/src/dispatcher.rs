/// Fan-out of one canonical record to the vendor table and the queue
use crate::error::{QueuePublishError, StoreWriteError};
use crate::models::CanonicalRecord;
use crate::queue::QueueSink;
use crate::store::RecordStore;
use std::sync::Arc;
use tracing::{debug, error};

/// Outcome of both sinks for one record. Neither masks the other.
#[derive(Debug)]
pub struct DispatchReport {
    pub store: Result<(), StoreWriteError>,
    pub queue: Result<(), QueuePublishError>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.store.is_ok() && self.queue.is_ok()
    }
}

/// Writes each record to both sinks concurrently.
///
/// The store append is keyed by `subject_id` and does not de-duplicate on
/// `record.id`; a re-delivered tweet is appended again.
pub struct SinkDispatcher {
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn QueueSink>,
    table: String,
    queue_url: String,
}

impl SinkDispatcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn QueueSink>,
        table: impl Into<String>,
        queue_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            table: table.into(),
            queue_url: queue_url.into(),
        }
    }

    pub async fn dispatch(&self, record: &CanonicalRecord) -> DispatchReport {
        let store_write = self
            .store
            .update_append(&self.table, &record.subject_id, record);
        let publish = self.publish(record);

        let (store, queue) = tokio::join!(store_write, publish);

        if let Err(e) = &store {
            error!(tweet_id = %record.id, error = %e, "Store append failed");
        }
        if let Err(e) = &queue {
            error!(tweet_id = %record.id, error = %e, "Queue publish failed");
        }
        debug!(tweet_id = %record.id, store_ok = store.is_ok(), queue_ok = queue.is_ok(), "Record dispatched");

        DispatchReport { store, queue }
    }

    async fn publish(&self, record: &CanonicalRecord) -> Result<(), QueuePublishError> {
        let body = serde_json::to_string(record)?;
        self.queue.send(&self.queue_url, body).await
    }
}
