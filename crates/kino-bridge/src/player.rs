//! Video Player - one engine instance bound to one surface
//!
//! Coordinates:
//! - The Idle -> Preparing -> Ready -> Disposed lifecycle
//! - Playback settings cached until the engine is ready
//! - Translation of engine callbacks into host events
//! - Release of engine, surface, and analytics resources

use crate::{
    analytics::AnalyticsSession,
    engine::{EngineEvent, EngineFactory, EngineListener, InstanceToken, MediaEngine},
    event::{EventSink, PlayerEvent},
    host::SurfaceTexture,
    source::MediaSource,
    types::{duration_to_millis, BufferedRange, PlayerState, TextureId, VideoSize},
    Error, Result,
};
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Settings the host may change at any time; applied on entering Ready
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub looping: bool,
    pub volume: f64,
    pub play_when_ready: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            looping: false,
            volume: 1.0,
            play_when_ready: false,
        }
    }
}

/// Player handle owning one native engine and its surface
pub struct VideoPlayer {
    /// Handle the host addresses this player by
    texture_id: TextureId,
    /// Identity of the engine instance
    token: InstanceToken,
    /// Resolved source
    source: MediaSource,
    /// Lifecycle state
    state: PlayerState,
    /// Native engine, present from prepare until release
    engine: Option<Box<dyn MediaEngine>>,
    /// Surface, present until the player is disposed
    texture: Option<Box<dyn SurfaceTexture>>,
    /// Event stream to the host
    events: EventSink,
    /// Cached playback settings
    settings: PlaybackSettings,
    /// Media duration, known once ready
    duration: Option<Duration>,
    /// Last reported buffered ranges
    buffered: Vec<BufferedRange>,
    /// Engine is rebuffering
    buffering: bool,
    /// Attached analytics session
    analytics: Option<Box<dyn AnalyticsSession>>,
}

impl VideoPlayer {
    /// Bind a player to its surface and event stream; the engine is not built yet
    pub fn new(texture: Box<dyn SurfaceTexture>, token: InstanceToken, source: MediaSource, events: EventSink) -> Self {
        Self {
            texture_id: TextureId(texture.id()),
            token,
            source,
            state: PlayerState::Idle,
            engine: None,
            texture: Some(texture),
            events,
            settings: PlaybackSettings::default(),
            duration: None,
            buffered: Vec::new(),
            buffering: false,
            analytics: None,
        }
    }

    pub fn texture_id(&self) -> TextureId {
        self.texture_id
    }

    pub fn token(&self) -> InstanceToken {
        self.token
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn settings(&self) -> PlaybackSettings {
        self.settings
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn buffered_ranges(&self) -> &[BufferedRange] {
        &self.buffered
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn has_analytics(&self) -> bool {
        self.analytics.is_some()
    }

    /// Transition to new state
    fn set_state(&mut self, new_state: PlayerState) -> Result<()> {
        let current = self.state;

        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        self.state = new_state;
        info!(texture_id = %self.texture_id, from = %current, to = %new_state, "State transition");

        Ok(())
    }

    /// Build the engine and start resolving the source in the background
    #[instrument(skip(self, engines, listener), fields(texture_id = %self.texture_id))]
    pub fn prepare(&mut self, engines: &dyn EngineFactory, listener: EngineListener) -> Result<()> {
        if self.state != PlayerState::Idle {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: PlayerState::Preparing.to_string(),
            });
        }

        let engine = engines.create(&self.source, listener)?;
        self.engine = Some(engine);
        self.set_state(PlayerState::Preparing)?;

        debug!(uri = %self.source.uri, format = self.source.format.as_str(), "Preparing source");
        Ok(())
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.settings.looping = looping;
        if let Some(engine) = self.ready_engine() {
            engine.set_looping(looping);
        }
    }

    /// Forwarded unchanged; the engine owns range handling
    pub fn set_volume(&mut self, volume: f64) {
        self.settings.volume = volume;
        if let Some(engine) = self.ready_engine() {
            engine.set_volume(volume);
        }
    }

    pub fn play(&mut self) {
        self.set_play_when_ready(true);
    }

    pub fn pause(&mut self) {
        self.set_play_when_ready(false);
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.settings.play_when_ready = play_when_ready;
        if let Some(engine) = self.ready_engine() {
            engine.set_play_when_ready(play_when_ready);
        }
    }

    /// Seek within the media; ignored until ready
    pub fn seek_to(&mut self, location_ms: i64) {
        let target = Duration::from_millis(u64::try_from(location_ms).unwrap_or(0));
        match self.ready_engine() {
            Some(engine) => engine.seek_to(target),
            None => debug!(texture_id = %self.texture_id, state = %self.state, "Seek ignored before ready"),
        }
    }

    /// Playback position in millis; zero until ready
    pub fn position(&mut self) -> i64 {
        self.ready_engine()
            .map(|engine| duration_to_millis(engine.position()))
            .unwrap_or(0)
    }

    /// Report the buffered ranges to the host; only ready players report
    pub fn send_buffering_update(&mut self) {
        let Some(engine) = self.ready_engine() else {
            return;
        };
        let buffered = BufferedRange::up_to(engine.buffered_position());
        self.buffered = vec![buffered];
        self.emit(PlayerEvent::BufferingUpdate {
            values: self.buffered.clone(),
        });
    }

    /// Attach an analytics session, releasing any previous one
    pub fn attach_analytics(&mut self, session: Box<dyn AnalyticsSession>) {
        if let Some(mut previous) = self.analytics.replace(session) {
            debug!(texture_id = %self.texture_id, session_id = %previous.session_id(), "Replacing analytics session");
            previous.release();
        }
    }

    /// Apply an engine callback routed to this player
    pub fn on_engine_event(&mut self, event: EngineEvent) {
        match (self.state, event) {
            (PlayerState::Disposed, event) => {
                trace!(texture_id = %self.texture_id, ?event, "Engine event after dispose dropped");
            }
            (_, EngineEvent::Error { message }) => self.fail(message),
            (PlayerState::Preparing, EngineEvent::Prepared { duration, size }) => {
                self.on_prepared(duration, size);
            }
            (PlayerState::Ready, EngineEvent::Prepared { .. }) => {
                trace!(texture_id = %self.texture_id, "Already initialized");
            }
            (PlayerState::Ready, EngineEvent::BufferingStarted) => {
                self.buffering = true;
                self.emit(PlayerEvent::BufferingStart);
                self.send_buffering_update();
            }
            (PlayerState::Ready, EngineEvent::BufferingEnded) => {
                if self.buffering {
                    self.buffering = false;
                    self.emit(PlayerEvent::BufferingEnd);
                }
            }
            (PlayerState::Ready, EngineEvent::Completed) => {
                self.emit(PlayerEvent::Completed);
            }
            (state, event) => {
                trace!(texture_id = %self.texture_id, %state, ?event, "Engine event ignored before ready");
            }
        }
    }

    fn on_prepared(&mut self, duration: Duration, size: VideoSize) {
        if let Err(e) = self.set_state(PlayerState::Ready) {
            warn!(texture_id = %self.texture_id, error = %e, "Prepared callback rejected");
            return;
        }
        self.duration = Some(duration);

        let settings = self.settings;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_looping(settings.looping);
            engine.set_volume(settings.volume);
            engine.set_play_when_ready(settings.play_when_ready);
        }

        let (width, height) = size.display_size();
        self.emit(PlayerEvent::Initialized {
            duration: duration_to_millis(duration),
            width,
            height,
        });
    }

    /// Report an engine failure and release the engine.
    ///
    /// The surface stays bound until the registry drops this player, so its
    /// texture id cannot be handed to another player in the meantime.
    fn fail(&mut self, message: String) {
        let err = Error::Engine(message);
        warn!(texture_id = %self.texture_id, error = %err, "Engine failed");

        self.emit(PlayerEvent::Error {
            code: err.error_code().to_string(),
            message: err.to_string(),
        });

        if let Err(e) = self.release_engine() {
            warn!(texture_id = %self.texture_id, error = %e, "Engine release after failure failed");
        }
        if let Err(e) = self.set_state(PlayerState::Disposed) {
            warn!(texture_id = %self.texture_id, error = %e, "Failure transition rejected");
        }
        self.events.close();
    }

    /// Release everything this player holds; later calls do nothing
    #[instrument(skip(self), fields(texture_id = %self.texture_id))]
    pub fn dispose(&mut self) -> Result<()> {
        if let Some(mut session) = self.analytics.take() {
            session.release();
        }

        let released = self.release_engine();

        if !self.state.is_disposed() {
            self.set_state(PlayerState::Disposed)?;
        }
        self.events.close();

        if let Some(mut texture) = self.texture.take() {
            texture.release();
            debug!("Surface released");
        }

        released
    }

    fn release_engine(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(mut engine) => engine.release(),
            None => Ok(()),
        }
    }

    fn ready_engine(&mut self) -> Option<&mut Box<dyn MediaEngine>> {
        if self.state.is_ready() {
            self.engine.as_mut()
        } else {
            None
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        if let Some(session) = self.analytics.as_mut() {
            session.record(&event);
        }
        self.events.send(event);
    }
}

impl std::fmt::Debug for VideoPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoPlayer")
            .field("texture_id", &self.texture_id)
            .field("state", &self.state)
            .field("source", &self.source)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventStream;
    use crate::host::{SequentialTextureRegistry, TextureRegistry};
    use crate::source::{FormatHint, SourceKind};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[derive(Debug, Default)]
    struct Calls {
        log: Vec<String>,
        releases: usize,
    }

    struct RecordingEngine {
        calls: Arc<Mutex<Calls>>,
    }

    impl MediaEngine for RecordingEngine {
        fn set_play_when_ready(&mut self, play_when_ready: bool) {
            self.calls.lock().unwrap().log.push(format!("play_when_ready={play_when_ready}"));
        }
        fn set_looping(&mut self, looping: bool) {
            self.calls.lock().unwrap().log.push(format!("looping={looping}"));
        }
        fn set_volume(&mut self, volume: f64) {
            self.calls.lock().unwrap().log.push(format!("volume={volume}"));
        }
        fn seek_to(&mut self, position: Duration) {
            self.calls.lock().unwrap().log.push(format!("seek={}", position.as_millis()));
        }
        fn position(&self) -> Duration {
            Duration::from_millis(1200)
        }
        fn buffered_position(&self) -> Duration {
            Duration::from_millis(3000)
        }
        fn release(&mut self) -> Result<()> {
            self.calls.lock().unwrap().releases += 1;
            Ok(())
        }
    }

    struct RecordingFactory {
        calls: Arc<Mutex<Calls>>,
    }

    impl EngineFactory for RecordingFactory {
        fn create(&self, _source: &MediaSource, _listener: EngineListener) -> Result<Box<dyn MediaEngine>> {
            Ok(Box::new(RecordingEngine {
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    fn preparing_player() -> (VideoPlayer, EventStream, Arc<Mutex<Calls>>, SequentialTextureRegistry) {
        let textures = SequentialTextureRegistry::new();
        let calls = Arc::new(Mutex::new(Calls::default()));
        let (sink, stream) = EventSink::pair("events0");
        let source = MediaSource {
            uri: "https://example/video.mp4".into(),
            kind: SourceKind::Network,
            format: FormatHint::Other,
        };

        let mut player = VideoPlayer::new(textures.create_surface_texture(), InstanceToken(0), source, sink);
        let (tx, _rx) = mpsc::unbounded_channel();
        let listener = EngineListener::new(player.texture_id(), player.token(), tx);
        let factory = RecordingFactory { calls: Arc::clone(&calls) };
        player.prepare(&factory, listener).unwrap();

        (player, stream, calls, textures)
    }

    fn prepared() -> EngineEvent {
        EngineEvent::Prepared {
            duration: Duration::from_millis(5000),
            size: VideoSize::new(1280, 720),
        }
    }

    #[test]
    fn test_player_creation() {
        let (player, _stream, _calls, _textures) = preparing_player();
        assert_eq!(player.state(), PlayerState::Preparing);
        assert_eq!(player.settings(), PlaybackSettings::default());
        assert_eq!(player.texture_id(), TextureId(0));
    }

    #[test]
    fn test_settings_cached_until_ready() {
        let (mut player, mut stream, calls, _textures) = preparing_player();

        player.set_looping(true);
        player.set_volume(0.25);
        player.play();
        player.seek_to(800);
        assert_eq!(player.position(), 0);
        assert!(calls.lock().unwrap().log.is_empty());

        player.on_engine_event(prepared());
        assert_eq!(player.state(), PlayerState::Ready);
        assert_eq!(
            calls.lock().unwrap().log,
            vec!["looping=true", "volume=0.25", "play_when_ready=true"]
        );
        assert_eq!(
            stream.try_recv().unwrap(),
            PlayerEvent::Initialized { duration: 5000, width: 1280, height: 720 }
        );
    }

    #[test]
    fn test_ready_controls_forwarded() {
        let (mut player, _stream, calls, _textures) = preparing_player();
        player.on_engine_event(prepared());
        calls.lock().unwrap().log.clear();

        player.set_volume(7.5);
        player.pause();
        player.seek_to(2500);
        assert_eq!(player.position(), 1200);

        assert_eq!(
            calls.lock().unwrap().log,
            vec!["volume=7.5", "play_when_ready=false", "seek=2500"]
        );
    }

    #[test]
    fn test_buffering_events() {
        let (mut player, mut stream, _calls, _textures) = preparing_player();

        // Buffering before ready is not reported
        player.on_engine_event(EngineEvent::BufferingStarted);
        player.on_engine_event(prepared());
        let _ = stream.try_recv();
        assert!(stream.try_recv().is_err());

        player.on_engine_event(EngineEvent::BufferingStarted);
        player.on_engine_event(EngineEvent::BufferingEnded);
        player.on_engine_event(EngineEvent::BufferingEnded);

        assert_eq!(stream.try_recv().unwrap(), PlayerEvent::BufferingStart);
        assert_eq!(
            stream.try_recv().unwrap(),
            PlayerEvent::BufferingUpdate { values: vec![BufferedRange { start_ms: 0, end_ms: 3000 }] }
        );
        assert_eq!(stream.try_recv().unwrap(), PlayerEvent::BufferingEnd);
        assert!(stream.try_recv().is_err());
        assert_eq!(player.buffered_ranges(), &[BufferedRange { start_ms: 0, end_ms: 3000 }]);
    }

    #[test]
    fn test_duplicate_prepared_ignored() {
        let (mut player, mut stream, _calls, _textures) = preparing_player();
        player.on_engine_event(prepared());
        player.on_engine_event(prepared());

        assert!(matches!(stream.try_recv().unwrap(), PlayerEvent::Initialized { .. }));
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn test_engine_error_disposes() {
        let (mut player, mut stream, calls, textures) = preparing_player();
        player.on_engine_event(EngineEvent::Error { message: "Source error".into() });

        assert_eq!(player.state(), PlayerState::Disposed);
        assert_eq!(calls.lock().unwrap().releases, 1);
        assert!(textures.released().is_empty());

        match stream.try_recv().unwrap() {
            PlayerEvent::Error { code, message } => {
                assert_eq!(code, "VideoError");
                assert_eq!(message, "Video player had error Source error");
            }
            other => panic!("unexpected event {other:?}"),
        }

        player.on_engine_event(prepared());
        assert!(stream.try_recv().is_err());

        player.dispose().unwrap();
        assert_eq!(calls.lock().unwrap().releases, 1);
        assert_eq!(textures.released(), vec![0]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut player, mut stream, calls, textures) = preparing_player();
        player.dispose().unwrap();
        player.dispose().unwrap();

        assert_eq!(calls.lock().unwrap().releases, 1);
        assert_eq!(textures.released(), vec![0]);

        player.on_engine_event(prepared());
        assert_eq!(player.state(), PlayerState::Disposed);
        assert!(matches!(stream.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn test_prepare_twice_rejected() {
        let (mut player, _stream, calls, _textures) = preparing_player();
        let (tx, _rx) = mpsc::unbounded_channel();
        let listener = EngineListener::new(player.texture_id(), player.token(), tx);
        let factory = RecordingFactory { calls };
        assert!(matches!(
            player.prepare(&factory, listener),
            Err(Error::InvalidStateTransition { .. })
        ));
    }
}
