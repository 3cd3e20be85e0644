use super::RuleEndpoint;
use crate::error::SyncError;
use crate::models::{InstalledRule, Rule};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub deleted: usize,
    pub installed: Vec<InstalledRule>,
}

/// Replaces whatever rule set is installed remotely with the desired one.
///
/// fetch, delete all, add. Each step aborts the sync on failure; no step is
/// retried here. Running `sync` twice with the same rules leaves the same
/// remote state as running it once.
pub struct RuleSynchronizer {
    endpoint: Arc<dyn RuleEndpoint>,
}

impl RuleSynchronizer {
    pub fn new(endpoint: Arc<dyn RuleEndpoint>) -> Self {
        Self { endpoint }
    }

    pub async fn sync(&self, desired: &[Rule]) -> Result<SyncOutcome, SyncError> {
        let existing = self.endpoint.list().await?;

        let deleted = if existing.is_empty() {
            0
        } else {
            let ids: Vec<String> = existing.into_iter().map(|rule| rule.id).collect();
            self.endpoint.delete(&ids).await?
        };

        let installed = if desired.is_empty() {
            Vec::new()
        } else {
            self.endpoint.add(desired).await?
        };

        info!(
            deleted = deleted,
            installed = installed.len(),
            "Stream rules synchronized"
        );

        Ok(SyncOutcome { deleted, installed })
    }
}
