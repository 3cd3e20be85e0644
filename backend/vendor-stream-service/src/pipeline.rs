//! Glue between the stream session and the sinks.

use crate::dispatcher::SinkDispatcher;
use crate::models::RawStreamEvent;
use crate::normalizer::normalize;
use crate::stream::FrameHandler;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    rejected: AtomicU64,
    dispatched: AtomicU64,
    sink_failures: AtomicU64,
}

impl PipelineStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Events the normalizer could not turn into a record
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Dispatches where at least one sink failed
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }
}

/// Normalizes each event and dispatches the record. Nothing here stops the
/// stream: malformed events and sink failures are logged and counted.
pub struct IngestPipeline {
    dispatcher: SinkDispatcher,
    stats: PipelineStats,
}

impl IngestPipeline {
    pub fn new(dispatcher: SinkDispatcher) -> Self {
        Self {
            dispatcher,
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}

#[async_trait]
impl FrameHandler for IngestPipeline {
    async fn on_event(&self, event: RawStreamEvent) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let record = match normalize(&event) {
            Ok(record) => record,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                let tweet_id = event.data.as_ref().map(|tweet| tweet.id.as_str());
                warn!(tweet_id = ?tweet_id, error = %e, "Dropping event that cannot be normalized");
                return;
            }
        };

        let report = self.dispatcher.dispatch(&record).await;
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        if !report.is_complete() {
            self.stats.sink_failures.fetch_add(1, Ordering::Relaxed);
        }
        debug!(tweet_id = %record.id, subject = %record.subject_id, "Event processed");
    }
}
