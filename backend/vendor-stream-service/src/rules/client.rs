/// Client for the filtered-stream rules endpoint
///
/// `GET {api}/2/tweets/search/stream/rules` lists the installed rules,
/// `POST` with an `add` or `delete` body changes them.
use super::RuleEndpoint;
use crate::config::BearerToken;
use crate::error::{SyncError, SyncStage};
use crate::models::{InstalledRule, Rule, StreamProblem};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const RULES_PATH: &str = "/2/tweets/search/stream/rules";

#[derive(Clone)]
pub struct RulesClient {
    client: Client,
    rules_url: String,
    token: BearerToken,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    add: &'a [Rule],
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    delete: DeleteIds<'a>,
}

#[derive(Debug, Serialize)]
struct DeleteIds<'a> {
    ids: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
struct RulesResponse {
    #[serde(default)]
    data: Vec<InstalledRule>,
    #[serde(default)]
    meta: Option<RulesMeta>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RulesMeta {
    #[serde(default)]
    summary: Option<RulesSummary>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct RulesSummary {
    #[serde(default)]
    created: usize,
    #[serde(default)]
    not_created: usize,
    #[serde(default)]
    invalid: usize,
    #[serde(default)]
    deleted: Option<usize>,
    #[serde(default)]
    not_deleted: usize,
}

impl RulesResponse {
    fn summary(&self) -> RulesSummary {
        self.meta
            .as_ref()
            .and_then(|meta| meta.summary)
            .unwrap_or_default()
    }

    fn first_error(&self) -> String {
        self.errors
            .first()
            .and_then(StreamProblem::from_value)
            .map(|problem| problem.describe())
            .unwrap_or_else(|| "rule rejected by endpoint".to_string())
    }
}

impl RulesClient {
    pub fn new(client: Client, api_base: &str, token: BearerToken) -> Self {
        Self {
            client,
            rules_url: format!("{}{}", api_base.trim_end_matches('/'), RULES_PATH),
            token,
        }
    }

    async fn read(stage: SyncStage, response: Response) -> Result<RulesResponse, SyncError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| StreamProblem::from_value(&value))
                .map(|problem| problem.describe())
                .unwrap_or(body);
            error!(stage = %stage, status = status.as_u16(), message = %message, "Rules endpoint returned error");
            return Err(SyncError::failed(stage, Some(status.as_u16()), message));
        }

        response
            .json::<RulesResponse>()
            .await
            .map_err(|e| SyncError::failed(stage, Some(status.as_u16()), e.to_string()))
    }
}

fn transport(stage: SyncStage) -> impl Fn(reqwest::Error) -> SyncError {
    move |e| {
        error!(stage = %stage, error = %e, "Rules request failed");
        SyncError::failed(stage, None, e.to_string())
    }
}

#[async_trait]
impl RuleEndpoint for RulesClient {
    async fn list(&self) -> Result<Vec<InstalledRule>, SyncError> {
        let response = self
            .client
            .get(&self.rules_url)
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(transport(SyncStage::Fetch))?;

        let body = Self::read(SyncStage::Fetch, response).await?;
        Ok(body.data)
    }

    async fn add(&self, rules: &[Rule]) -> Result<Vec<InstalledRule>, SyncError> {
        let response = self
            .client
            .post(&self.rules_url)
            .bearer_auth(self.token.expose())
            .json(&AddRequest { add: rules })
            .send()
            .await
            .map_err(transport(SyncStage::Add))?;

        let status = response.status().as_u16();
        let body = Self::read(SyncStage::Add, response).await?;
        let summary = body.summary();
        if summary.invalid > 0 || summary.not_created > 0 {
            return Err(SyncError::failed(
                SyncStage::Add,
                Some(status),
                format!(
                    "{} invalid, {} not created: {}",
                    summary.invalid,
                    summary.not_created,
                    body.first_error()
                ),
            ));
        }

        info!(created = summary.created, "Rules set");
        Ok(body.data)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, SyncError> {
        let response = self
            .client
            .post(&self.rules_url)
            .bearer_auth(self.token.expose())
            .json(&DeleteRequest {
                delete: DeleteIds { ids },
            })
            .send()
            .await
            .map_err(transport(SyncStage::Delete))?;

        let status = response.status().as_u16();
        let body = Self::read(SyncStage::Delete, response).await?;
        let summary = body.summary();
        if summary.not_deleted > 0 {
            return Err(SyncError::failed(
                SyncStage::Delete,
                Some(status),
                format!("{} rules not deleted: {}", summary.not_deleted, body.first_error()),
            ));
        }

        Ok(summary.deleted.unwrap_or(ids.len()))
    }
}
