use crate::error::{StartupError, SyncError};
use crate::models::Vendor;
use crate::rules::{RuleCompiler, RuleSynchronizer, SyncOutcome};
use crate::store::{fetch_all, ScanSource};
use resilience::{with_retry, BackoffConfig, RetryError};
use std::sync::Arc;
use tracing::{info, warn};

/// Read every vendor, compile their ids into rules and replace the remote
/// rule set. Transient sync failures are retried per `retry`.
pub async fn install_vendor_rules(
    source: Arc<dyn ScanSource>,
    table: &str,
    page_size: u32,
    compiler: &RuleCompiler,
    synchronizer: &RuleSynchronizer,
    retry: &BackoffConfig,
) -> Result<SyncOutcome, StartupError> {
    let vendors: Vec<Vendor> = fetch_all(source, table, page_size).await?;
    let ids: Vec<&str> = vendors.iter().map(|v| v.twitter_id.as_str()).collect();

    let rules = compiler.compile(&ids)?;
    if rules.is_empty() {
        warn!(table = %table, "No vendors found, the stream will match nothing");
    }
    info!(vendors = vendors.len(), rules = rules.len(), "Compiled vendor rules");

    let desired = rules.as_slice();
    let outcome = with_retry(retry, SyncError::is_transient, move || synchronizer.sync(desired))
        .await
        .map_err(|e| match e {
            RetryError::MaxRetriesExceeded { last, .. } => last,
            RetryError::OperationFailed(e) => e,
        })?;

    Ok(outcome)
}
