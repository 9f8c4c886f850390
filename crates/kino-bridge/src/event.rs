//! Per-handle playback event streams

use crate::types::BufferedRange;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Event delivered on a player's event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Source prepared; sizes are display sizes
    Initialized {
        duration: i64,
        width: u32,
        height: u32,
    },

    /// Buffered spans of media time, in milliseconds
    BufferingUpdate {
        values: Vec<BufferedRange>,
    },

    BufferingStart,

    BufferingEnd,

    /// Reached the end of the media without looping
    Completed,

    /// Engine failure; the player is disposed afterwards
    Error {
        code: String,
        message: String,
    },
}

impl PlayerEvent {
    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerEvent::Initialized { .. } => "initialized",
            PlayerEvent::BufferingUpdate { .. } => "bufferingUpdate",
            PlayerEvent::BufferingStart => "bufferingStart",
            PlayerEvent::BufferingEnd => "bufferingEnd",
            PlayerEvent::Completed => "completed",
            PlayerEvent::Error { .. } => "error",
        }
    }
}

/// Receiving end the host listens on
pub type EventStream = mpsc::UnboundedReceiver<PlayerEvent>;

/// Sending end owned by one player.
///
/// Events queue in the stream until the host starts listening. Once closed
/// the sink drops everything, so a disposed player cannot emit.
#[derive(Debug)]
pub struct EventSink {
    channel: String,
    tx: Option<mpsc::UnboundedSender<PlayerEvent>>,
}

impl EventSink {
    pub fn new(channel: impl Into<String>, tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self {
            channel: channel.into(),
            tx: Some(tx),
        }
    }

    /// Create a sink together with the stream it feeds
    pub fn pair(channel: impl Into<String>) -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(channel, tx), rx)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Emit an event; returns false if it was dropped
    pub fn send(&self, event: PlayerEvent) -> bool {
        match &self.tx {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                trace!(channel = %self.channel, kind = event.kind(), "Dropping event on closed sink");
                false
            }
        }
    }

    /// End the stream; the host sees it terminate after draining queued events
    pub fn close(&mut self) {
        self.tx = None;
    }
}
