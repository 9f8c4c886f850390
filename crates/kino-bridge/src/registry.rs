//! Player registry
//!
//! Owns the texture id -> player map. Keys are unique at all times; an entry
//! leaves the map only through [`PlayerRegistry::dispose`] or
//! [`PlayerRegistry::dispose_all`], and its surface is released with it.

use crate::{
    config::PluginConfig,
    engine::{EngineCallback, EngineListener, InstanceToken},
    host::HostBinding,
    player::VideoPlayer,
    source::MediaSource,
    types::TextureId,
    Error, Result,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Live players keyed by texture id
pub struct PlayerRegistry {
    players: HashMap<TextureId, VideoPlayer>,
    /// Next engine instance token
    next_token: u64,
    /// Where engine listeners post callbacks
    callbacks: mpsc::UnboundedSender<EngineCallback>,
}

impl PlayerRegistry {
    pub fn new(callbacks: mpsc::UnboundedSender<EngineCallback>) -> Self {
        Self {
            players: HashMap::new(),
            next_token: 0,
            callbacks,
        }
    }

    /// Allocate a surface, bind a new player to it, and start preparing.
    ///
    /// Returns as soon as the engine is building; readiness or failure arrives
    /// later on the player's event stream.
    #[instrument(skip(self, host, config), fields(uri = %source.uri))]
    pub fn create(&mut self, host: &HostBinding, config: &PluginConfig, source: MediaSource) -> Result<TextureId> {
        let textures = host.textures.as_ref().ok_or(Error::NoHostContext)?;
        let mut texture = textures.create_surface_texture();
        let texture_id = TextureId(texture.id());

        if self.players.contains_key(&texture_id) {
            texture.release();
            return Err(Error::HandleCollision { texture_id });
        }

        let token = InstanceToken(self.next_token);
        self.next_token += 1;

        let events = host.messenger.event_stream(&config.event_channel(texture_id));
        let mut player = VideoPlayer::new(texture, token, source, events);
        let listener = EngineListener::new(texture_id, token, self.callbacks.clone());

        if let Err(e) = player.prepare(host.engines.as_ref(), listener) {
            warn!(texture_id = %texture_id, error = %e, "Engine construction failed");
            if let Err(release_err) = player.dispose() {
                warn!(texture_id = %texture_id, error = %release_err, "Cleanup after failed construction failed");
            }
            return Err(e);
        }

        self.players.insert(texture_id, player);
        info!(texture_id = %texture_id, live = self.players.len(), "Player created");

        Ok(texture_id)
    }

    pub fn get(&self, texture_id: TextureId) -> Result<&VideoPlayer> {
        self.players
            .get(&texture_id)
            .ok_or(Error::UnknownHandle { texture_id })
    }

    pub fn get_mut(&mut self, texture_id: TextureId) -> Result<&mut VideoPlayer> {
        self.players
            .get_mut(&texture_id)
            .ok_or(Error::UnknownHandle { texture_id })
    }

    pub fn contains(&self, texture_id: TextureId) -> bool {
        self.players.contains_key(&texture_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Live handles in ascending order
    pub fn handles(&self) -> Vec<TextureId> {
        let mut handles: Vec<_> = self.players.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Release a player and remove its entry; absent handles are a no-op
    #[instrument(skip(self))]
    pub fn dispose(&mut self, texture_id: TextureId) -> Result<()> {
        let Some(mut player) = self.players.remove(&texture_id) else {
            debug!("Dispose of absent player ignored");
            return Ok(());
        };

        let released = player.dispose();
        info!(live = self.players.len(), "Player disposed");
        released
    }

    /// Dispose every player, logging and skipping individual failures.
    ///
    /// Returns the number of players that failed to release cleanly.
    #[instrument(skip(self))]
    pub fn dispose_all(&mut self) -> usize {
        let mut failures = 0;
        for (texture_id, mut player) in self.players.drain() {
            if let Err(e) = player.dispose() {
                failures += 1;
                warn!(texture_id = %texture_id, error = %e, "Player disposal failed during sweep");
            }
        }

        if failures > 0 {
            warn!(failures, "Disposed all players with failures");
        } else {
            debug!("Disposed all players");
        }
        failures
    }

    /// Deliver an engine callback to the player that raised it.
    ///
    /// Callbacks for removed players, or from an engine instance that no
    /// longer backs the entry, are dropped. Returns whether it was delivered.
    pub fn route_engine_callback(&mut self, callback: EngineCallback) -> bool {
        match self.players.get_mut(&callback.texture_id) {
            Some(player) if player.token() == callback.token => {
                player.on_engine_event(callback.event);
                true
            }
            Some(_) => {
                debug!(texture_id = %callback.texture_id, "Callback from a replaced engine dropped");
                false
            }
            None => {
                debug!(texture_id = %callback.texture_id, event = ?callback.event, "Callback for a removed player dropped");
                false
            }
        }
    }

    /// Push a buffering update from every ready player
    pub fn send_buffering_updates(&mut self) {
        for player in self.players.values_mut() {
            player.send_buffering_update();
        }
    }
}

impl Drop for PlayerRegistry {
    fn drop(&mut self) {
        if !self.players.is_empty() {
            warn!(live = self.players.len(), "Registry dropped with live players");
            self.dispose_all();
        }
    }
}

impl std::fmt::Debug for PlayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerRegistry")
            .field("handles", &self.handles())
            .field("next_token", &self.next_token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineEvent, EngineFactory, MediaEngine};
    use crate::host::{InMemoryMessenger, SequentialTextureRegistry};
    use crate::source::{FormatHint, SourceKind};
    use crate::types::{PlayerState, VideoSize};
    use std::sync::Arc;
    use std::time::Duration;

    struct NullEngine {
        fail_release: bool,
    }

    impl MediaEngine for NullEngine {
        fn set_play_when_ready(&mut self, _play_when_ready: bool) {}
        fn set_looping(&mut self, _looping: bool) {}
        fn set_volume(&mut self, _volume: f64) {}
        fn seek_to(&mut self, _position: Duration) {}
        fn position(&self) -> Duration {
            Duration::ZERO
        }
        fn buffered_position(&self) -> Duration {
            Duration::ZERO
        }
        fn release(&mut self) -> Result<()> {
            if self.fail_release {
                Err(Error::Engine("release failed".into()))
            } else {
                Ok(())
            }
        }
    }

    /// Engines for URIs containing "broken" fail to release; "reject" fails to build
    struct NullFactory;

    impl EngineFactory for NullFactory {
        fn create(&self, source: &MediaSource, _listener: EngineListener) -> Result<Box<dyn MediaEngine>> {
            if source.uri.contains("reject") {
                return Err(Error::Engine("cannot open source".into()));
            }
            Ok(Box::new(NullEngine {
                fail_release: source.uri.contains("broken"),
            }))
        }
    }

    fn source(uri: &str) -> MediaSource {
        MediaSource {
            uri: uri.to_string(),
            kind: SourceKind::of_uri(uri),
            format: FormatHint::infer(uri),
        }
    }

    fn setup() -> (PlayerRegistry, HostBinding, Arc<SequentialTextureRegistry>, mpsc::UnboundedReceiver<EngineCallback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let textures = Arc::new(SequentialTextureRegistry::new());
        let host = HostBinding::new(Arc::new(InMemoryMessenger::new()), Arc::new(NullFactory))
            .with_textures(textures.clone());
        (PlayerRegistry::new(tx), host, textures, rx)
    }

    #[test]
    fn test_create_distinct_handles() {
        let (mut registry, host, _textures, _rx) = setup();
        let config = PluginConfig::default();

        let a = registry.create(&host, &config, source("https://example/a.mp4")).unwrap();
        let b = registry.create(&host, &config, source("https://example/b.mp4")).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.handles(), vec![TextureId(0), TextureId(1)]);
        assert_eq!(registry.get(a).unwrap().state(), PlayerState::Preparing);
    }

    #[test]
    fn test_failed_construction_releases_surface() {
        let (mut registry, host, textures, _rx) = setup();
        let result = registry.create(&host, &PluginConfig::default(), source("https://example/reject.mp4"));

        assert!(matches!(result, Err(Error::Engine(_))));
        assert!(registry.is_empty());
        assert_eq!(textures.released(), vec![0]);
    }

    #[test]
    fn test_dispose_absent_is_noop() {
        let (mut registry, _host, _textures, _rx) = setup();
        assert!(registry.dispose(TextureId(42)).is_ok());
    }

    #[test]
    fn test_dispose_all_tolerates_failures() {
        let (mut registry, host, textures, _rx) = setup();
        let config = PluginConfig::default();
        registry.create(&host, &config, source("https://example/broken.mp4")).unwrap();
        registry.create(&host, &config, source("https://example/fine.mp4")).unwrap();
        registry.create(&host, &config, source("https://example/broken2.mp4")).unwrap();

        assert_eq!(registry.dispose_all(), 2);
        assert!(registry.is_empty());

        let mut released = textures.released();
        released.sort();
        assert_eq!(released, vec![0, 1, 2]);
    }

    #[test]
    fn test_stale_callback_dropped() {
        let (mut registry, host, _textures, mut rx) = setup();
        let handle = registry.create(&host, &PluginConfig::default(), source("https://example/a.mp4")).unwrap();
        registry.dispose(handle).unwrap();

        let stale = EngineCallback {
            texture_id: handle,
            token: InstanceToken(0),
            event: EngineEvent::Prepared {
                duration: Duration::from_secs(5),
                size: VideoSize::new(640, 360),
            },
        };
        assert!(!registry.route_engine_callback(stale));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_callback_token_mismatch() {
        let (mut registry, host, _textures, _rx) = setup();
        let handle = registry.create(&host, &PluginConfig::default(), source("https://example/a.mp4")).unwrap();

        let foreign = EngineCallback {
            texture_id: handle,
            token: InstanceToken(99),
            event: EngineEvent::Completed,
        };
        assert!(!registry.route_engine_callback(foreign));
    }

    #[test]
    fn test_no_texture_registry() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry = PlayerRegistry::new(tx);
        let host = HostBinding::new(Arc::new(InMemoryMessenger::new()), Arc::new(NullFactory));

        let result = registry.create(&host, &PluginConfig::default(), source("https://example/a.mp4"));
        assert!(matches!(result, Err(Error::NoHostContext)));
    }
}
