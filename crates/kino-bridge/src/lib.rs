//! Kino Bridge - Embedding bridge for native video playback
//!
//! This crate connects a host application's script layer to native media
//! engines:
//! - Handle-based registry of concurrent players, one surface each
//! - Typed command protocol over a host method channel
//! - Per-handle playback event streams
//! - Lifecycle binding for eager and late-attaching hosts
//! - Analytics session setup per player
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Kino Bridge                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   host method channel          engine callbacks                 │
//! │          │                            │                         │
//! │   ┌──────┴───────────────────────────┴──────┐                  │
//! │   │          VideoPlayerPlugin               │  attach/detach   │
//! │   │       (single dispatch loop)             │◄──────────────── │
//! │   └──────────────────┬───────────────────────┘                  │
//! │                      │                                          │
//! │               ┌──────┴──────┐                                   │
//! │               │ Dispatcher  │                                   │
//! │               └──────┬──────┘                                   │
//! │                      │                                          │
//! │               ┌──────┴──────┐                                   │
//! │               │  Registry   │  texture id -> VideoPlayer        │
//! │               └──────┬──────┘                                   │
//! │                      │                                          │
//! │  ┌──────────────┐  ┌─┴────────────┐  ┌──────────────┐          │
//! │  │ MediaEngine  │◄─┤ VideoPlayer  ├─►│ Event stream │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod source;
pub mod channel;
pub mod event;
pub mod engine;
pub mod host;
pub mod analytics;
pub mod player;
pub mod registry;
pub mod dispatcher;
pub mod plugin;

pub use error::{Error, Result};
pub use types::*;
pub use config::PluginConfig;
pub use source::{FormatHint, MediaSource, SourceKind, SourceRequest};
pub use channel::{method_channel, ChannelClient, Command, InstanceCommand, MethodCall, MethodChannel, MethodResult, Reply};
pub use event::{EventSink, EventStream, PlayerEvent};
pub use engine::{EngineCallback, EngineEvent, EngineFactory, EngineListener, InstanceToken, MediaEngine};
pub use host::{
    AssetResolver, BinaryMessenger, BundledAssetResolver, HostBinding, InMemoryMessenger,
    SequentialTextureRegistry, SurfaceTexture, TextureRegistry,
};
pub use analytics::{AnalyticsProvider, AnalyticsSession, AnalyticsSetup, TracingAnalytics};
pub use player::{PlaybackSettings, VideoPlayer};
pub use registry::PlayerRegistry;
pub use dispatcher::Dispatcher;
pub use plugin::VideoPlayerPlugin;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the bridge library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Bridge initialized");
}
