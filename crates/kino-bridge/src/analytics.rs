//! Third-party playback analytics
//!
//! The `setupMux` call attaches an analytics session to one player:
//! - player metadata (environment key, player name/version, viewer, ...)
//! - video metadata (id, title, series, variant, CDN, ...)
//! - the source URL, always taken from that player's own source
//!
//! Sessions receive every event the player emits and are released with the
//! player. [`TracingAnalytics`] is the default provider; it records sessions
//! through `tracing` instead of a remote beacon.

use crate::{
    channel::MethodCall,
    event::PlayerEvent,
    source::MediaSource,
    types::TextureId,
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Player-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMetadata {
    pub env_key: Option<String>,
    pub player_name: Option<String>,
    pub viewer_user_id: Option<String>,
    pub experiment_name: Option<String>,
    pub player_version: Option<String>,
    pub page_type: Option<String>,
    pub sub_property_id: Option<String>,
    /// Epoch millis when the host created its player widget
    pub player_init_time: Option<i64>,
}

/// Video-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// Filled from the player's source, never from the call arguments
    #[serde(skip_deserializing)]
    pub video_source_url: Option<String>,
    pub video_id: Option<String>,
    pub video_title: Option<String>,
    pub video_series: Option<String>,
    pub video_variant_name: Option<String>,
    pub video_variant_id: Option<String>,
    pub video_language_code: Option<String>,
    pub video_content_type: Option<String>,
    pub video_stream_type: Option<String>,
    pub video_producer: Option<String>,
    pub video_encoding_variant: Option<String>,
    pub video_cdn: Option<String>,
    /// Millis
    pub video_duration: Option<i64>,
}

/// Arguments of a `setupMux` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSetup {
    #[serde(flatten)]
    pub player: PlayerMetadata,
    #[serde(flatten)]
    pub video: VideoMetadata,
}

impl AnalyticsSetup {
    pub fn from_call(call: &MethodCall) -> Result<Self> {
        serde_json::from_value(call.arguments.clone())
            .map_err(|e| Error::invalid_argument("setupMux", e.to_string()))
    }

    /// Tag the setup with the source of the player it is attached to
    pub fn for_source(mut self, source: &MediaSource) -> Self {
        self.video.video_source_url = Some(source.uri.clone());
        self
    }

    pub fn player_name(&self) -> &str {
        self.player.player_name.as_deref().unwrap_or("kino")
    }
}

/// Constructs analytics sessions
pub trait AnalyticsProvider: Send + Sync {
    fn start_session(&self, texture_id: TextureId, setup: &AnalyticsSetup) -> Result<Box<dyn AnalyticsSession>>;
}

/// One live analytics session bound to one player
pub trait AnalyticsSession: Send {
    fn session_id(&self) -> Uuid;

    /// Observe an event the player emitted
    fn record(&mut self, event: &PlayerEvent);

    /// Flush and free the session
    fn release(&mut self);
}

/// Provider that records sessions as tracing events
#[derive(Debug, Clone, Default)]
pub struct TracingAnalytics;

impl TracingAnalytics {
    pub fn new() -> Self {
        Self
    }
}

impl AnalyticsProvider for TracingAnalytics {
    fn start_session(&self, texture_id: TextureId, setup: &AnalyticsSetup) -> Result<Box<dyn AnalyticsSession>> {
        let session = TracingSession {
            id: Uuid::new_v4(),
            texture_id,
            player_name: setup.player_name().to_string(),
            video_id: setup.video.video_id.clone(),
            started_at: Utc::now(),
            sequence: 0,
            released: false,
        };

        info!(
            session_id = %session.id,
            texture_id = %texture_id,
            player_name = %session.player_name,
            source = setup.video.video_source_url.as_deref().unwrap_or_default(),
            "Analytics session started"
        );

        Ok(Box::new(session))
    }
}

struct TracingSession {
    id: Uuid,
    texture_id: TextureId,
    player_name: String,
    video_id: Option<String>,
    started_at: DateTime<Utc>,
    sequence: u64,
    released: bool,
}

impl AnalyticsSession for TracingSession {
    fn session_id(&self) -> Uuid {
        self.id
    }

    fn record(&mut self, event: &PlayerEvent) {
        if self.released {
            return;
        }
        self.sequence += 1;
        debug!(
            session_id = %self.id,
            texture_id = %self.texture_id,
            sequence = self.sequence,
            event = event.kind(),
            "Analytics event"
        );
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let watch_time = Utc::now() - self.started_at;
        info!(
            session_id = %self.id,
            player_name = %self.player_name,
            video_id = self.video_id.as_deref().unwrap_or_default(),
            events = self.sequence,
            watch_time_ms = watch_time.num_milliseconds(),
            "Analytics session released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FormatHint, SourceKind};
    use serde_json::json;

    #[test]
    fn test_setup_from_call() {
        let call = MethodCall::new(
            "setupMux",
            json!({
                "textureId": 0,
                "envKey": "env-123",
                "playerName": "feed",
                "playerInitTime": 1700000000000i64,
                "videoId": "v-42",
                "videoTitle": "Intro",
                "videoDuration": 5000,
                "videoSourceUrl": "https://spoofed.example/other.mp4"
            }),
        );

        let setup = AnalyticsSetup::from_call(&call).unwrap();
        assert_eq!(setup.player.env_key.as_deref(), Some("env-123"));
        assert_eq!(setup.player.player_init_time, Some(1_700_000_000_000));
        assert_eq!(setup.video.video_title.as_deref(), Some("Intro"));
        assert_eq!(setup.video.video_duration, Some(5000));
        assert_eq!(setup.video.video_source_url, None);
        assert_eq!(setup.player_name(), "feed");
    }

    #[test]
    fn test_setup_tagged_with_source() {
        let source = MediaSource {
            uri: "https://example/video.mp4".into(),
            kind: SourceKind::Network,
            format: FormatHint::Other,
        };
        let setup = AnalyticsSetup::default().for_source(&source);
        assert_eq!(
            setup.video.video_source_url.as_deref(),
            Some("https://example/video.mp4")
        );
    }

    #[test]
    fn test_bad_metadata_type() {
        let call = MethodCall::new("setupMux", json!({ "textureId": 0, "videoDuration": "long" }));
        assert!(matches!(
            AnalyticsSetup::from_call(&call),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_tracing_session_lifecycle() {
        let provider = TracingAnalytics::new();
        let mut session = provider
            .start_session(TextureId(1), &AnalyticsSetup::default())
            .unwrap();

        session.record(&PlayerEvent::BufferingStart);
        session.release();
        session.release();
        session.record(&PlayerEvent::Completed);
    }
}
