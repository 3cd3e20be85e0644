//! Vendor tweet ingestion: installs geo-filtered stream rules for every
//! vendor in the table, holds the filtered stream open, and fans each matched
//! tweet out to the vendor table and a message queue.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod queue;
pub mod rules;
pub mod startup;
pub mod store;
pub mod stream;
pub mod telemetry;

// Lets the shared test fakes name this crate the way integration tests do
#[cfg(test)]
extern crate self as vendor_stream;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod test_utils;

// Re-export common types
pub use config::{BearerToken, Config};
pub use dispatcher::{DispatchReport, SinkDispatcher};
pub use error::{StartupError, StreamError, SyncError};
pub use pipeline::IngestPipeline;
pub use stream::{CancelHandle, SessionConfig, SessionEnd, SessionState, StreamSession};
