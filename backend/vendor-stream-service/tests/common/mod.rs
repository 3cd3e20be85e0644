//! In-memory collaborators shared by the unit and integration tests.
#![allow(dead_code)]

use vendor_stream::error::{QueuePublishError, ScanError, StoreWriteError, StreamError, SyncError, SyncStage};
use vendor_stream::models::{CanonicalRecord, Coordinates, Geotag, InstalledRule, RawStreamEvent, Rule};
use vendor_stream::queue::QueueSink;
use vendor_stream::rules::RuleEndpoint;
use vendor_stream::store::{Cursor, Item, RecordStore, ScanPage, ScanSource, TableDescription};
use vendor_stream::stream::{ByteStream, StreamTransport};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

const PARTITION_KEY: &str = "twitterId";

/// Vendor table with DynamoDB-like scan paging: a page that fills the limit
/// always carries a cursor, even when nothing follows it.
pub struct InMemoryTable {
    name: String,
    rows: Mutex<Vec<Item>>,
    scan_calls: AtomicUsize,
    fail_next_scan: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for InMemoryTable {
    fn default() -> Self {
        Self::new("vendors")
    }
}

impl InMemoryTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Mutex::new(Vec::new()),
            scan_calls: AtomicUsize::new(0),
            fail_next_scan: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn with_vendors<S: AsRef<str>>(name: &str, ids: &[S]) -> Self {
        let table = Self::new(name);
        {
            let mut rows = table.rows.lock().unwrap();
            for id in ids {
                let mut row = Item::new();
                row.insert(PARTITION_KEY.to_string(), json!(id.as_ref()));
                rows.push(row);
            }
        }
        table
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_scan(&self) {
        self.fail_next_scan.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Records appended under `key`, oldest first
    pub fn appended(&self, key: &str) -> Vec<CanonicalRecord> {
        let rows = self.rows.lock().unwrap();
        rows.iter()
            .find(|row| row.get(PARTITION_KEY).and_then(Value::as_str) == Some(key))
            .and_then(|row| row.get("tweets").cloned())
            .map(|tweets| serde_json::from_value(tweets).unwrap())
            .unwrap_or_default()
    }

    pub fn updated_at(&self, key: &str) -> Option<i64> {
        let rows = self.rows.lock().unwrap();
        rows.iter()
            .find(|row| row.get(PARTITION_KEY).and_then(Value::as_str) == Some(key))
            .and_then(|row| row.get("updated"))
            .and_then(Value::as_i64)
    }

    fn check_table(&self, table: &str) -> Result<(), ScanError> {
        if table == self.name {
            Ok(())
        } else {
            Err(ScanError::TableNotFound(table.to_string()))
        }
    }
}

#[async_trait]
impl ScanSource for InMemoryTable {
    async fn describe(&self, table: &str) -> Result<TableDescription, ScanError> {
        self.check_table(table)?;
        Ok(TableDescription {
            name: self.name.clone(),
            item_count: Some(self.rows.lock().unwrap().len() as i64),
            status: Some("ACTIVE".to_string()),
        })
    }

    async fn scan(
        &self,
        table: &str,
        limit: u32,
        cursor: Option<Cursor>,
    ) -> Result<ScanPage, ScanError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.check_table(table)?;
        if self.fail_next_scan.swap(false, Ordering::SeqCst) {
            return Err(ScanError::Transport("connection reset".to_string()));
        }

        let rows = self.rows.lock().unwrap();
        let start = match cursor {
            None => 0,
            Some(cursor) => {
                let last = cursor.0.get(PARTITION_KEY).cloned();
                let position = rows
                    .iter()
                    .position(|row| row.get(PARTITION_KEY).cloned() == last)
                    .ok_or_else(|| ScanError::Transport(format!("unknown cursor {:?}", cursor.0)))?;
                position + 1
            }
        };

        let items: Vec<Item> = rows.iter().skip(start).take(limit as usize).cloned().collect();
        let next_cursor = if items.len() == limit as usize {
            items.last().map(|last| {
                let mut key = Item::new();
                key.insert(PARTITION_KEY.to_string(), last[PARTITION_KEY].clone());
                Cursor(key)
            })
        } else {
            None
        };

        Ok(ScanPage {
            count: items.len(),
            items,
            next_cursor,
        })
    }
}

#[async_trait]
impl RecordStore for InMemoryTable {
    async fn update_append(
        &self,
        table: &str,
        key: &str,
        record: &CanonicalRecord,
    ) -> Result<(), StoreWriteError> {
        let write_error = |message: &str| StoreWriteError::Write {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(write_error("simulated write failure"));
        }
        if table != self.name {
            return Err(write_error("table not found"));
        }

        let value = serde_json::to_value(record)?;
        let mut rows = self.rows.lock().unwrap();
        let index = match rows
            .iter()
            .position(|row| row.get(PARTITION_KEY).and_then(Value::as_str) == Some(key))
        {
            Some(index) => index,
            None => {
                let mut row = Item::new();
                row.insert(PARTITION_KEY.to_string(), json!(key));
                rows.push(row);
                rows.len() - 1
            }
        };

        let row = &mut rows[index];
        match row.get_mut("tweets").and_then(Value::as_array_mut) {
            Some(tweets) => tweets.push(value),
            None => {
                row.insert("tweets".to_string(), Value::Array(vec![value]));
            }
        }
        row.insert(
            "updated".to_string(),
            json!(chrono::Utc::now().timestamp_millis()),
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryQueue {
    sent: Mutex<Vec<(String, String)>>,
    fail_sends: AtomicBool,
}

impl InMemoryQueue {
    /// `(destination, body)` pairs in send order
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueSink for InMemoryQueue {
    async fn send(&self, destination: &str, body: String) -> Result<(), QueuePublishError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(QueuePublishError::Send {
                destination: destination.to_string(),
                message: "simulated send failure".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), body));
        Ok(())
    }
}

struct Failure {
    stage: SyncStage,
    status: Option<u16>,
    /// `None` fails every time
    remaining: Option<u32>,
}

#[derive(Default)]
struct EndpointState {
    installed: Vec<InstalledRule>,
    next_id: u64,
    failure: Option<Failure>,
    add_calls: usize,
    delete_calls: usize,
}

/// Rule endpoint keeping its rule set in memory. Call counters only count
/// calls that succeeded.
#[derive(Default)]
pub struct FakeRuleEndpoint {
    state: Mutex<EndpointState>,
}

impl FakeRuleEndpoint {
    pub fn with_installed(rules: Vec<Rule>) -> Self {
        let endpoint = Self::default();
        {
            let mut state = endpoint.state.lock().unwrap();
            for rule in rules {
                state.next_id += 1;
                let id = format!("seed-{}", state.next_id);
                state.installed.push(InstalledRule {
                    id,
                    value: rule.value,
                    tag: Some(rule.tag),
                });
            }
        }
        endpoint
    }

    pub fn fail_at(&self, stage: SyncStage, status: Option<u16>) {
        self.state.lock().unwrap().failure = Some(Failure {
            stage,
            status,
            remaining: None,
        });
    }

    pub fn fail_times(&self, stage: SyncStage, status: Option<u16>, times: u32) {
        self.state.lock().unwrap().failure = Some(Failure {
            stage,
            status,
            remaining: Some(times),
        });
    }

    pub fn installed_rules(&self) -> Vec<Rule> {
        self.state
            .lock()
            .unwrap()
            .installed
            .iter()
            .map(|rule| Rule {
                value: rule.value.clone(),
                tag: rule.tag.clone().unwrap_or_default(),
            })
            .collect()
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().unwrap().add_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    fn check(state: &mut EndpointState, stage: SyncStage) -> Result<(), SyncError> {
        let Some(failure) = state.failure.as_mut() else {
            return Ok(());
        };
        if failure.stage != stage {
            return Ok(());
        }

        let status = failure.status;
        match failure.remaining.as_mut() {
            Some(0) => return Ok(()),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        Err(SyncError::failed(stage, status, "simulated endpoint failure"))
    }
}

#[async_trait]
impl RuleEndpoint for FakeRuleEndpoint {
    async fn list(&self) -> Result<Vec<InstalledRule>, SyncError> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state, SyncStage::Fetch)?;
        Ok(state.installed.clone())
    }

    async fn add(&self, rules: &[Rule]) -> Result<Vec<InstalledRule>, SyncError> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state, SyncStage::Add)?;

        let mut added = Vec::with_capacity(rules.len());
        for rule in rules {
            state.next_id += 1;
            let installed = InstalledRule {
                id: format!("rule-{}", state.next_id),
                value: rule.value.clone(),
                tag: Some(rule.tag.clone()),
            };
            state.installed.push(installed.clone());
            added.push(installed);
        }
        state.add_calls += 1;
        Ok(added)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, SyncError> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state, SyncStage::Delete)?;

        let before = state.installed.len();
        state.installed.retain(|rule| !ids.contains(&rule.id));
        state.delete_calls += 1;
        Ok(before - state.installed.len())
    }
}

/// How a served connection ends after its scripted chunks
pub enum StreamEnd {
    /// Server closes the stream
    Close,
    /// Connection stays open and silent
    Hang,
    Fail(StreamError),
}

pub enum ConnectStep {
    Refuse(StreamError),
    Serve { chunks: Vec<String>, end: StreamEnd },
}

/// Transport replaying one scripted step per connect. Once the script is
/// exhausted, connects never complete.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<ConnectStep>>,
    connects: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ConnectStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            connects: Mutex::new(Vec::new()),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    /// Instants of every connect attempt
    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn connect(&self) -> Result<ByteStream, StreamError> {
        self.connects.lock().unwrap().push(Instant::now());
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            None => std::future::pending().await,
            Some(ConnectStep::Refuse(err)) => Err(err),
            Some(ConnectStep::Serve { chunks, end }) => {
                let body = stream::iter(chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))));
                let tail: ByteStream = match end {
                    StreamEnd::Close => stream::empty().boxed(),
                    StreamEnd::Hang => stream::pending().boxed(),
                    StreamEnd::Fail(err) => stream::iter(vec![Err(err)]).boxed(),
                };
                Ok(body.chain(tail).boxed())
            }
        }
    }
}

/// Canonical record with a fixed Washington DC geotag
pub fn sample_record(id: &str, subject_id: &str) -> CanonicalRecord {
    CanonicalRecord {
        id: id.to_string(),
        subject_id: subject_id.to_string(),
        subject_name: format!("{} name", subject_id),
        text: format!("tweet {}", id),
        timestamp: "2023-09-12T16:00:00.000Z".to_string(),
        geo: Some(Geotag {
            id: "dc".to_string(),
            name: "Washington".to_string(),
            full_name: "Washington, DC".to_string(),
            place_type: "city".to_string(),
            country: "United States".to_string(),
            country_code: "US".to_string(),
            coordinates: Coordinates {
                lat: 38.9,
                long: -77.0,
            },
        }),
    }
}

/// Geotagged stream payload authored by `username`
pub fn geo_event_json(tweet_id: &str, username: &str) -> Value {
    json!({
        "data": {
            "id": tweet_id,
            "text": format!("{} is parked downtown", username),
            "author_id": format!("id-{}", username),
            "created_at": "2023-09-12T16:00:00.000Z",
            "geo": {"place_id": "dc"}
        },
        "includes": {
            "users": [{"id": format!("id-{}", username), "name": format!("{} name", username), "username": username}],
            "places": [{
                "id": "dc", "name": "Washington", "full_name": "Washington, DC", "place_type": "city",
                "country": "United States", "country_code": "US",
                "geo": {"type": "Feature", "bbox": [-77.1, 38.8, -76.9, 39.0]}
            }]
        },
        "matching_rules": [{"id": "rule-1", "tag": "vendors-geo"}]
    })
}

pub fn geo_event(tweet_id: &str, username: &str) -> RawStreamEvent {
    serde_json::from_value(geo_event_json(tweet_id, username)).unwrap()
}

/// One wire frame carrying `geo_event_json`
pub fn event_line(tweet_id: &str, username: &str) -> String {
    format!("{}\r\n", geo_event_json(tweet_id, username))
}
