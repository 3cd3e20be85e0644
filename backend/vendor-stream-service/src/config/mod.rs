use crate::rules::compiler::{RuleCompiler, MIN_RULE_LENGTH};
use crate::stream::SessionConfig;
use anyhow::{anyhow, Result};
use resilience::BackoffConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// API bearer credential. Never printed.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Stream API
    pub twitter_api_bearer_token: BearerToken,
    pub twitter_api_url: String,

    // AWS collaborators
    pub aws_vendors_table_name: String,
    pub aws_queue_url: String,
    pub scan_page_size: u32,

    // Rules
    pub rule_tag: String,
    pub rule_max_length: usize,
    pub rule_max_count: Option<usize>,
    pub rule_sync_max_retries: u32,

    // Stream session
    pub stream_read_timeout_secs: u64,
    pub backoff_unit_ms: u64,
    pub backoff_max_ms: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,

    // HTTP server config (health only)
    pub http_host: String,
    pub http_port: u16,

    // Observability
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::load(config::Environment::default().separator("__"))
    }

    /// Same as `from_env`, reading variables from `vars` instead of the process.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, config::ConfigError> {
        Self::load(
            config::Environment::default()
                .separator("__")
                .source(Some(vars)),
        )
    }

    fn load(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("twitter_api_url", "https://api.twitter.com")?
            .set_default("scan_page_size", 25)?
            .set_default("rule_tag", "vendors-geo")?
            .set_default("rule_max_length", 512)?
            .set_default("rule_sync_max_retries", 3)?
            .set_default("stream_read_timeout_secs", 20)?
            .set_default("backoff_unit_ms", 1000)?
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8080)?
            .set_default("log_level", "info")?
            .add_source(environment)
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.twitter_api_bearer_token.is_empty() {
            return Err(anyhow!("TWITTER_API_BEARER_TOKEN is required"));
        }

        if self.aws_vendors_table_name.trim().is_empty() {
            return Err(anyhow!("AWS_VENDORS_TABLE_NAME is required"));
        }

        if self.aws_queue_url.trim().is_empty() {
            return Err(anyhow!("AWS_QUEUE_URL is required"));
        }

        if self.scan_page_size == 0 {
            return Err(anyhow!("Scan page size must be greater than 0"));
        }

        if self.rule_max_length < MIN_RULE_LENGTH {
            return Err(anyhow!(
                "Rule max length must be at least {} characters",
                MIN_RULE_LENGTH
            ));
        }

        if self.rule_max_count == Some(0) {
            return Err(anyhow!("Rule max count must be greater than 0 when set"));
        }

        if self.stream_read_timeout_secs == 0 {
            return Err(anyhow!("Stream read timeout must be greater than 0"));
        }

        if self.backoff_unit_ms == 0 {
            return Err(anyhow!("Backoff unit must be greater than 0"));
        }

        if self.http_port == 0 {
            return Err(anyhow!("HTTP port must be greater than 0"));
        }

        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            read_timeout: Duration::from_secs(self.stream_read_timeout_secs),
            backoff: BackoffConfig {
                unit: Duration::from_millis(self.backoff_unit_ms),
                max_delay: self.backoff_max_ms.map(Duration::from_millis),
                max_attempts: self.max_reconnect_attempts,
            },
        }
    }

    pub fn rule_compiler(&self) -> RuleCompiler {
        let compiler = RuleCompiler::new(&self.rule_tag, self.rule_max_length);
        match self.rule_max_count {
            Some(max) => compiler.with_max_rules(max),
            None => compiler,
        }
    }

    /// Retry policy for the startup rule sync
    pub fn sync_backoff(&self) -> BackoffConfig {
        BackoffConfig {
            unit: Duration::from_millis(self.backoff_unit_ms),
            max_delay: self.backoff_max_ms.map(Duration::from_millis),
            max_attempts: Some(self.rule_sync_max_retries),
        }
    }
}
