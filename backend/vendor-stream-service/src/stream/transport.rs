use crate::config::BearerToken;
use crate::error::StreamError;
use crate::models::{ProblemCode, StreamProblem};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::io;
use tracing::{info, warn};

const STREAM_PATH: &str = "/2/tweets/search/stream";

/// Fields and expansions the normalizer reads: the tweet, its author and its place.
const STREAM_QUERY: &[(&str, &str)] = &[
    ("tweet.fields", "author_id,created_at,geo,id,lang,text"),
    ("expansions", "author_id,geo.place_id"),
    ("user.fields", "id,name,username,verified"),
    (
        "place.fields",
        "contained_within,country,country_code,full_name,geo,id,name,place_type",
    ),
];

pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// Opens one connection of the long-lived stream.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self) -> Result<ByteStream, StreamError>;
}

#[derive(Clone)]
pub struct HttpStreamTransport {
    client: Client,
    stream_url: String,
    token: BearerToken,
}

impl HttpStreamTransport {
    /// `client` must not carry a total request timeout; reads are bounded by
    /// the session instead.
    pub fn new(client: Client, api_base: &str, token: BearerToken) -> Self {
        Self {
            client,
            stream_url: format!("{}{}", api_base.trim_end_matches('/'), STREAM_PATH),
            token,
        }
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn connect(&self) -> Result<ByteStream, StreamError> {
        info!(url = %self.stream_url, "Connecting to filtered stream");

        let response = self
            .client
            .get(&self.stream_url)
            .query(STREAM_QUERY)
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(|e| classify_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, &body);
            warn!(status = status.as_u16(), error = %err, "Stream connect rejected");
            return Err(err);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| classify_reqwest(&e)))
            .boxed())
    }
}

/// Connect-time classification of a non-2xx response. No status is
/// reset-class: rate limits and server errors close the session like any
/// other rejection.
pub fn classify_status(status: StatusCode, body: &str) -> StreamError {
    let mut problem = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| StreamProblem::from_value(&value))
        .unwrap_or_default();
    problem.status.get_or_insert(status.as_u16());

    let message = format!("{}: {}", status.as_u16(), problem.describe());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return StreamError::Auth(message);
    }
    if problem.code() == ProblemCode::TooManyConnections {
        return StreamError::Capacity(message);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return StreamError::RateLimited(message);
    }

    StreamError::fatal_transport(message)
}

/// Resets, aborts, broken pipes, truncated bodies and timeouts are worth a
/// reconnect; everything else (DNS, TLS, refused connections) is not.
pub fn classify_reqwest(err: &reqwest::Error) -> StreamError {
    let message = err.to_string();

    if has_reset_io_error(err) || err.is_timeout() || err.is_body() {
        return StreamError::resettable(message);
    }

    StreamError::fatal_transport(message)
}

fn has_reset_io_error(err: &(dyn StdError + 'static)) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            if is_reset_kind(io_err.kind()) {
                return true;
            }
        }
        source = current.source();
    }
    false
}

fn is_reset_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
