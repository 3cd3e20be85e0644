//! Filter-rule management: compile vendor ids into rules and replace the
//! remote rule set with them.

pub mod client;
pub mod compiler;
pub mod sync;

use crate::error::SyncError;
use crate::models::{InstalledRule, Rule};
use async_trait::async_trait;

pub use client::RulesClient;
pub use compiler::RuleCompiler;
pub use sync::{RuleSynchronizer, SyncOutcome};

/// Remote rule set of the filtered stream.
///
/// Each method reports failures as `SyncError::SyncFailed` tagged with its
/// own stage.
#[async_trait]
pub trait RuleEndpoint: Send + Sync {
    async fn list(&self) -> Result<Vec<InstalledRule>, SyncError>;

    async fn add(&self, rules: &[Rule]) -> Result<Vec<InstalledRule>, SyncError>;

    /// Returns the number of rules the endpoint reports as deleted.
    async fn delete(&self, ids: &[String]) -> Result<usize, SyncError>;
}
