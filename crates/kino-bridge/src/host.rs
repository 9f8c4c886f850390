//! Host embedding collaborators
//!
//! What the embedding application supplies when it attaches the plugin:
//! asset lookup, surface allocation, event stream publishing, and the engine
//! factory that needs the application context. [`HostBinding`] bundles them.

use crate::{
    analytics::{AnalyticsProvider, TracingAnalytics},
    engine::EngineFactory,
    event::{EventSink, EventStream},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Maps logical asset names to platform lookup keys
pub trait AssetResolver: Send + Sync {
    fn lookup_key(&self, asset: &str) -> String;

    fn lookup_key_for_package(&self, asset: &str, package: &str) -> String;
}

/// Resolves assets bundled under a fixed directory of the app package
#[derive(Debug, Clone)]
pub struct BundledAssetResolver {
    root: String,
}

impl BundledAssetResolver {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for BundledAssetResolver {
    fn default() -> Self {
        Self::new("flutter_assets")
    }
}

impl AssetResolver for BundledAssetResolver {
    fn lookup_key(&self, asset: &str) -> String {
        format!("{}/{}", self.root, asset)
    }

    fn lookup_key_for_package(&self, asset: &str, package: &str) -> String {
        self.lookup_key(&format!("packages/{package}/{asset}"))
    }
}

/// Renderable target a player draws into
pub trait SurfaceTexture: Send {
    /// Numeric id the host uses to composite this surface
    fn id(&self) -> i64;

    /// Give the surface back to the host
    fn release(&mut self);
}

/// Allocates renderable surfaces
pub trait TextureRegistry: Send + Sync {
    fn create_surface_texture(&self) -> Box<dyn SurfaceTexture>;
}

/// Texture registry minting ids 0, 1, 2, ... that are never reused
#[derive(Debug, Default)]
pub struct SequentialTextureRegistry {
    next_id: AtomicI64,
    released: Arc<Mutex<Vec<i64>>>,
}

impl SequentialTextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids whose surfaces were released, in release order
    pub fn released(&self) -> Vec<i64> {
        match self.released.lock() {
            Ok(released) => released.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TextureRegistry for SequentialTextureRegistry {
    fn create_surface_texture(&self) -> Box<dyn SurfaceTexture> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(texture_id = id, "Surface texture created");
        Box::new(SequentialTexture {
            id,
            released: Arc::clone(&self.released),
            done: false,
        })
    }
}

struct SequentialTexture {
    id: i64,
    released: Arc<Mutex<Vec<i64>>>,
    done: bool,
}

impl SurfaceTexture for SequentialTexture {
    fn id(&self) -> i64 {
        self.id
    }

    fn release(&mut self) {
        if self.done {
            warn!(texture_id = self.id, "Surface texture released twice");
            return;
        }
        self.done = true;
        match self.released.lock() {
            Ok(mut released) => released.push(self.id),
            Err(poisoned) => poisoned.into_inner().push(self.id),
        }
    }
}

/// Publishes named event streams to the host
pub trait BinaryMessenger: Send + Sync {
    fn event_stream(&self, channel: &str) -> EventSink;
}

/// Messenger that keeps every stream in memory until the host takes it.
///
/// Unclaimed streams whose player is gone are discarded the next time a
/// stream is published.
#[derive(Debug, Default)]
pub struct InMemoryMessenger {
    streams: Mutex<HashMap<String, EventStream>>,
}

impl InMemoryMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the receiving end of a stream; each stream can be taken once
    pub fn take_stream(&self, channel: &str) -> Option<EventStream> {
        match self.streams.lock() {
            Ok(mut streams) => streams.remove(channel),
            Err(poisoned) => poisoned.into_inner().remove(channel),
        }
    }

    /// Number of streams published but not yet taken
    pub fn pending(&self) -> usize {
        match self.streams.lock() {
            Ok(streams) => streams.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Take every stream not yet claimed, keyed by channel name
    pub fn take_all(&self) -> Vec<(String, EventStream)> {
        let mut streams = match self.streams.lock() {
            Ok(streams) => streams,
            Err(poisoned) => poisoned.into_inner(),
        };
        streams.drain().collect()
    }
}

impl BinaryMessenger for InMemoryMessenger {
    fn event_stream(&self, channel: &str) -> EventSink {
        let (sink, stream) = EventSink::pair(channel);
        let mut streams = match self.streams.lock() {
            Ok(streams) => streams,
            Err(poisoned) => poisoned.into_inner(),
        };

        let before = streams.len();
        streams.retain(|_, unclaimed| !unclaimed.is_closed());
        if streams.len() < before {
            debug!(discarded = before - streams.len(), "Discarded unclaimed streams of released players");
        }

        if streams.insert(channel.to_string(), stream).is_some() {
            warn!(channel, "Replacing an unclaimed event stream");
        }
        sink
    }
}

/// Everything the host hands over when the plugin attaches
#[derive(Clone)]
pub struct HostBinding {
    pub messenger: Arc<dyn BinaryMessenger>,
    pub textures: Option<Arc<dyn TextureRegistry>>,
    pub assets: Arc<dyn AssetResolver>,
    pub engines: Arc<dyn EngineFactory>,
    pub analytics: Arc<dyn AnalyticsProvider>,
}

impl HostBinding {
    /// Binding without a texture registry; add one with [`HostBinding::with_textures`]
    pub fn new(messenger: Arc<dyn BinaryMessenger>, engines: Arc<dyn EngineFactory>) -> Self {
        Self {
            messenger,
            textures: None,
            assets: Arc::new(BundledAssetResolver::default()),
            engines,
            analytics: Arc::new(TracingAnalytics::new()),
        }
    }

    pub fn with_textures(mut self, textures: Arc<dyn TextureRegistry>) -> Self {
        self.textures = Some(textures);
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetResolver>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsProvider>) -> Self {
        self.analytics = analytics;
        self
    }
}

impl std::fmt::Debug for HostBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBinding")
            .field("has_textures", &self.textures.is_some())
            .finish_non_exhaustive()
    }
}
