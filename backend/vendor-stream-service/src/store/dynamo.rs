/// DynamoDB-backed vendor table
use super::attribute::{from_json, item_to_json, json_to_item};
use super::{Cursor, RecordStore, ScanPage, ScanSource, TableDescription};
use crate::error::{ScanError, StoreWriteError};
use crate::models::CanonicalRecord;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::Utc;
use tracing::{debug, info};

/// Partition key of the vendors table
const PARTITION_KEY: &str = "twitterId";

const APPEND_EXPRESSION: &str =
    "SET #tweets = list_append(if_not_exists(#tweets, :empty_list), :tweet), #updated = :updated";

#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
}

impl DynamoTable {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScanSource for DynamoTable {
    async fn describe(&self, table: &str) -> Result<TableDescription, ScanError> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception());
                if not_found {
                    ScanError::TableNotFound(table.to_string())
                } else {
                    ScanError::Transport(DisplayErrorContext(&err).to_string())
                }
            })?;

        let description = output
            .table()
            .ok_or_else(|| ScanError::TableNotFound(table.to_string()))?;

        Ok(TableDescription {
            name: description.table_name().unwrap_or(table).to_string(),
            item_count: description.item_count(),
            status: description.table_status().map(|s| s.as_str().to_string()),
        })
    }

    async fn scan(
        &self,
        table: &str,
        limit: u32,
        cursor: Option<Cursor>,
    ) -> Result<ScanPage, ScanError> {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let start_key = cursor.map(|c| json_to_item(&c.0));

        let output = self
            .client
            .scan()
            .table_name(table)
            .limit(limit)
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(|err| ScanError::Transport(DisplayErrorContext(&err).to_string()))?;

        let items: Vec<_> = output.items().iter().map(item_to_json).collect();
        let next_cursor = output
            .last_evaluated_key()
            .map(|key| Cursor(item_to_json(key)));

        debug!(
            table = %table,
            count = output.count(),
            has_cursor = next_cursor.is_some(),
            "DynamoDB scan page"
        );

        Ok(ScanPage {
            count: usize::try_from(output.count()).unwrap_or(0),
            items,
            next_cursor,
        })
    }
}

#[async_trait]
impl RecordStore for DynamoTable {
    async fn update_append(
        &self,
        table: &str,
        key: &str,
        record: &CanonicalRecord,
    ) -> Result<(), StoreWriteError> {
        let record_value = from_json(&serde_json::to_value(record)?);

        self.client
            .update_item()
            .table_name(table)
            .key(PARTITION_KEY, AttributeValue::S(key.to_string()))
            .update_expression(APPEND_EXPRESSION)
            .expression_attribute_names("#tweets", "tweets")
            .expression_attribute_names("#updated", "updated")
            .expression_attribute_values(":tweet", AttributeValue::L(vec![record_value]))
            .expression_attribute_values(
                ":updated",
                AttributeValue::N(Utc::now().timestamp_millis().to_string()),
            )
            .expression_attribute_values(":empty_list", AttributeValue::L(Vec::new()))
            .send()
            .await
            .map_err(|err| StoreWriteError::Write {
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;

        info!(tweet_id = %record.id, key = %key, "Tweet added to record");
        Ok(())
    }
}
