//! Native media engine seam
//!
//! The engine decodes, renders, and buffers on its own threads. The bridge
//! only drives it through [`MediaEngine`] and hears back through an
//! [`EngineListener`], which marshals every callback onto the plugin's
//! dispatch loop instead of touching player state directly.

use crate::{source::MediaSource, types::{TextureId, VideoSize}, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Controls exposed by one native engine instance
pub trait MediaEngine: Send {
    /// Start playback once ready (`true`) or hold (`false`)
    fn set_play_when_ready(&mut self, play_when_ready: bool);

    /// Repeat the whole media item when it ends
    fn set_looping(&mut self, looping: bool);

    /// Output volume; range handling is the engine's business
    fn set_volume(&mut self, volume: f64);

    fn seek_to(&mut self, position: Duration);

    fn position(&self) -> Duration;

    /// Media time buffered ahead of the start
    fn buffered_position(&self) -> Duration;

    /// Release decoders, network, and surface bindings
    fn release(&mut self) -> Result<()>;
}

/// Constructs engines for new players.
///
/// Stands in for the host application context: an engine can only be built
/// where the host provides one. The returned engine is already preparing
/// `source` and reports progress through `listener`.
pub trait EngineFactory: Send + Sync {
    fn create(&self, source: &MediaSource, listener: EngineListener) -> Result<Box<dyn MediaEngine>>;
}

/// Asynchronous notifications raised by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Source resolved, duration and video size known
    Prepared {
        duration: Duration,
        size: VideoSize,
    },
    BufferingStarted,
    BufferingEnded,
    /// Playback reached the end
    Completed,
    /// Unrecoverable failure
    Error {
        message: String,
    },
}

/// Identifies one engine instance across its whole life.
///
/// Texture ids may be recycled by the host after disposal; the token is not,
/// so callbacks from a released engine never reach a newer player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceToken(pub u64);

/// Engine event tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCallback {
    pub texture_id: TextureId,
    pub token: InstanceToken,
    pub event: EngineEvent,
}

/// Queue feeding engine callbacks into the dispatch loop
pub type CallbackQueue = mpsc::UnboundedReceiver<EngineCallback>;

/// Handed to each engine for reporting events
#[derive(Debug, Clone)]
pub struct EngineListener {
    texture_id: TextureId,
    token: InstanceToken,
    tx: mpsc::UnboundedSender<EngineCallback>,
}

impl EngineListener {
    pub fn new(texture_id: TextureId, token: InstanceToken, tx: mpsc::UnboundedSender<EngineCallback>) -> Self {
        Self { texture_id, token, tx }
    }

    pub fn texture_id(&self) -> TextureId {
        self.texture_id
    }

    pub fn token(&self) -> InstanceToken {
        self.token
    }

    /// Post an event; safe to call from any thread
    pub fn notify(&self, event: EngineEvent) {
        let callback = EngineCallback {
            texture_id: self.texture_id,
            token: self.token,
            event,
        };
        if self.tx.send(callback).is_err() {
            trace!(texture_id = %self.texture_id, "Dispatch loop gone, engine event dropped");
        }
    }

    pub fn prepared(&self, duration: Duration, size: VideoSize) {
        self.notify(EngineEvent::Prepared { duration, size });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(EngineEvent::Error {
            message: message.into(),
        });
    }
}
