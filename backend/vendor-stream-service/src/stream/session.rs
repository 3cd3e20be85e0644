//! Long-lived stream session: connect, read, classify, back off, reconnect.
//!
//! ```text
//! Connecting --ok--> Streaming --reset-class drop--> BackingOff --> Connecting
//!      |                 |
//!      +--fatal/cancel---+------------------------------------> Closed
//! ```
//!
//! The loop is iterative; each reconnect is one more turn of `drive`, never a
//! nested call.

use super::frame::{FrameDecoder, StreamFrame};
use super::transport::{ByteStream, StreamTransport};
use super::FrameHandler;
use crate::error::StreamError;
use crate::models::{ProblemCode, StreamProblem};
use futures::StreamExt;
use resilience::{with_timeout, BackoffConfig, RetryState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Longest silence tolerated on an open stream, and the connect bound
    pub read_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    BackingOff,
    Closed,
}

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
}

/// Stops a running session.
///
/// Takes effect at the next suspension point: a pending connect, read,
/// handler call or backoff sleep is abandoned immediately, and no event is
/// handed to the handler afterwards. An abandoned handler call may have
/// completed only part of its work. Dropping every handle without cancelling leaves the
/// session running.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

pub struct StreamSession {
    transport: Arc<dyn StreamTransport>,
    handler: Arc<dyn FrameHandler>,
    config: SessionConfig,
    cancel: watch::Receiver<bool>,
    state: watch::Sender<SessionState>,
}

impl StreamSession {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        handler: Arc<dyn FrameHandler>,
        config: SessionConfig,
    ) -> (Self, CancelHandle) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state, _) = watch::channel(SessionState::Connecting);

        let session = Self {
            transport,
            handler,
            config,
            cancel: cancel_rx,
            state,
        };
        let handle = CancelHandle {
            tx: Arc::new(cancel_tx),
        };
        (session, handle)
    }

    /// Observe state transitions, e.g. for readiness checks
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run until cancelled or a non-retryable failure.
    pub async fn run(mut self) -> Result<SessionEnd, StreamError> {
        let mut retry = RetryState::new();
        let result = self.drive(&mut retry).await;
        self.state.send_replace(SessionState::Closed);

        match &result {
            Ok(end) => info!(end = ?end, "Stream session closed"),
            Err(e) => error!(error = %e, "Stream session failed"),
        }
        result
    }

    async fn drive(&mut self, retry: &mut RetryState) -> Result<SessionEnd, StreamError> {
        loop {
            if self.is_cancelled() {
                return Ok(SessionEnd::Cancelled);
            }
            self.state.send_replace(SessionState::Connecting);

            let read_timeout = self.config.read_timeout;
            let connected = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return Ok(SessionEnd::Cancelled),
                result = with_timeout(read_timeout, self.transport.connect()) => result,
            };

            let dropped = match connected {
                Err(_) => StreamError::resettable(format!("connect timed out after {:?}", read_timeout)),
                Ok(Err(e)) => e,
                Ok(Ok(stream)) => {
                    retry.reset();
                    self.state.send_replace(SessionState::Streaming);
                    info!("Stream connected");

                    match self.consume(stream, retry).await {
                        Ok(end) => return Ok(end),
                        Err(e) => e,
                    }
                }
            };

            if !dropped.is_resettable() {
                return Err(dropped);
            }

            let attempt = retry.attempt();
            let Some(delay) = retry.next_delay(&self.config.backoff) else {
                return Err(StreamError::RetriesExhausted(attempt));
            };

            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %dropped,
                "Stream dropped, reconnecting"
            );

            self.state.send_replace(SessionState::BackingOff);
            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return Ok(SessionEnd::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read frames until the connection drops; `Err` is the drop reason.
    async fn consume(
        &mut self,
        mut stream: ByteStream,
        retry: &mut RetryState,
    ) -> Result<SessionEnd, StreamError> {
        let mut decoder = FrameDecoder::default();
        let read_timeout = self.config.read_timeout;

        loop {
            let read = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return Ok(SessionEnd::Cancelled),
                read = with_timeout(read_timeout, stream.next()) => read,
            };

            let chunk = match read {
                Err(_) => {
                    return Err(StreamError::resettable(format!(
                        "no data received for {:?}",
                        read_timeout
                    )))
                }
                Ok(None) => return Err(StreamError::resettable("stream closed by server")),
                Ok(Some(Err(e))) => return Err(e),
                Ok(Some(Ok(chunk))) => chunk,
            };

            decoder.push(&chunk);
            while let Some(frame) = decoder.next_frame() {
                match frame {
                    Ok(StreamFrame::KeepAlive) => {
                        retry.reset();
                        debug!("Keep-alive received");
                    }
                    Ok(StreamFrame::Data(event)) => {
                        if self.is_cancelled() {
                            return Ok(SessionEnd::Cancelled);
                        }
                        retry.reset();
                        tokio::select! {
                            biased;
                            _ = cancelled(&mut self.cancel) => return Ok(SessionEnd::Cancelled),
                            _ = self.handler.on_event(*event) => {}
                        }
                    }
                    Ok(StreamFrame::ErrorSignal(problem)) => {
                        return Err(classify_signal(&problem));
                    }
                    Err(e) => warn!(error = %e, "Skipping undecodable frame"),
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// In-band error frames: an operational disconnect is a reset-class drop;
/// auth, capacity, rate-limit and unknown problems are fatal.
pub fn classify_signal(problem: &StreamProblem) -> StreamError {
    let message = problem.describe();
    match problem.code() {
        ProblemCode::Unauthorized => StreamError::Auth(message),
        ProblemCode::TooManyConnections => StreamError::Capacity(message),
        ProblemCode::RateLimited => StreamError::RateLimited(message),
        ProblemCode::OperationalDisconnect => StreamError::resettable(message),
        ProblemCode::Other => StreamError::Remote(message),
    }
}

/// Resolves once cancellation is requested; never resolves if every handle
/// was dropped first.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let sender_alive = rx.wait_for(|cancelled| *cancelled).await.is_ok();
    if !sender_alive {
        std::future::pending::<()>().await;
    }
}
