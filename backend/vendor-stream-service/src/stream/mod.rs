pub mod frame;
pub mod session;
pub mod transport;

use crate::models::RawStreamEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

pub use frame::{FrameDecoder, StreamFrame};
pub use session::{
    CancelHandle, SessionConfig, SessionEnd, SessionState, StreamSession, DEFAULT_READ_TIMEOUT,
};
pub use transport::{ByteStream, HttpStreamTransport, StreamTransport};

/// Receives every decoded data event of a session, in arrival order.
///
/// Called from the session loop; the next frame is not read until the call
/// returns. Failures stay inside the handler.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn on_event(&self, event: RawStreamEvent);
}

#[async_trait]
impl FrameHandler for mpsc::Sender<RawStreamEvent> {
    async fn on_event(&self, event: RawStreamEvent) {
        if self.send(event).await.is_err() {
            warn!("Event receiver dropped, discarding stream event");
        }
    }
}
