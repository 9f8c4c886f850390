//! Core types for Kino Bridge

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque handle identifying one live player, minted by the texture registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub i64);

impl TextureId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TextureId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player handle lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Constructed, engine not yet preparing
    Idle,
    /// Engine resolving the source in the background
    Preparing,
    /// Duration known, playback controls active
    Ready,
    /// Terminal, native resources released
    Disposed,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, target),
            (Idle, Preparing) | (Idle, Disposed) |
            (Preparing, Ready) | (Preparing, Disposed) |
            (Ready, Disposed)
        )
    }

    /// Playback controls reach the engine only in this state
    pub fn is_ready(&self) -> bool {
        matches!(self, PlayerState::Ready)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, PlayerState::Disposed)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Preparing => write!(f, "preparing"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Disposed => write!(f, "disposed"),
        }
    }
}

/// A contiguous span of media time already buffered, in milliseconds.
///
/// Serialized as a `[start, end]` pair, the shape the host expects inside
/// `bufferingUpdate` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i64; 2]", into = "[i64; 2]")]
pub struct BufferedRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl BufferedRange {
    pub fn new(start: Duration, end: Duration) -> Self {
        Self {
            start_ms: duration_to_millis(start),
            end_ms: duration_to_millis(end),
        }
    }

    /// Range from media start up to the buffered position
    pub fn up_to(buffered: Duration) -> Self {
        Self::new(Duration::ZERO, buffered)
    }
}

impl From<[i64; 2]> for BufferedRange {
    fn from([start_ms, end_ms]: [i64; 2]) -> Self {
        Self { start_ms, end_ms }
    }
}

impl From<BufferedRange> for [i64; 2] {
    fn from(range: BufferedRange) -> Self {
        [range.start_ms, range.end_ms]
    }
}

/// Decoded video dimensions as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation the decoder applies when rendering
    pub rotation_degrees: u32,
}

impl VideoSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rotation_degrees: 0,
        }
    }

    pub fn with_rotation(mut self, rotation_degrees: u32) -> Self {
        self.rotation_degrees = rotation_degrees;
        self
    }

    /// Size as displayed, with width and height swapped for quarter turns
    pub fn display_size(&self) -> (u32, u32) {
        match self.rotation_degrees % 360 {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }
}

/// Millisecond count used on the wire, saturating at `i64::MAX`
pub fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
