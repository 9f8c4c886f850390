//! Simulated media engine
//!
//! Stands in for a native engine: prepares after a delay, advances the
//! playback clock in real time while playing, and reports completion.

use kino_bridge::{EngineEvent, EngineFactory, EngineListener, Error, MediaEngine, MediaSource, Result, VideoSize};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, info};

/// How often a playing engine checks for the end of the media
const CLOCK_RESOLUTION: Duration = Duration::from_millis(20);

/// Media simulated engines pretend to play
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub prepare_delay_ms: u64,
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub rotation: u32,
    /// Sources that fail to prepare
    pub fail_uris: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            prepare_delay_ms: 50,
            duration_ms: 5000,
            width: 1280,
            height: 720,
            rotation: 0,
            fail_uris: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    fn fails(&self, source: &MediaSource) -> bool {
        self.fail_uris.iter().any(|uri| uri == &source.uri)
    }
}

/// Playback clock shared between an engine and its driver task
#[derive(Debug)]
struct Clock {
    duration: Duration,
    prepared: bool,
    playing: bool,
    looping: bool,
    volume: f64,
    /// Position at the last start, seek, or pause
    anchor: Duration,
    /// When the clock last started running
    running_since: Option<Instant>,
    released: bool,
}

impl Clock {
    fn new(duration: Duration) -> Self {
        Self {
            duration,
            prepared: false,
            playing: false,
            looping: false,
            volume: 1.0,
            anchor: Duration::ZERO,
            running_since: None,
            released: false,
        }
    }

    fn position(&self) -> Duration {
        let elapsed = self.running_since.map(|since| since.elapsed()).unwrap_or_default();
        let position = self.anchor + elapsed;

        if self.looping && !self.duration.is_zero() {
            let wrapped = position.as_millis() % self.duration.as_millis();
            Duration::from_millis(wrapped as u64)
        } else {
            position.min(self.duration)
        }
    }

    fn set_running(&mut self, running: bool) {
        self.anchor = self.position();
        self.running_since = running.then(Instant::now);
    }

    /// Stop at the end of the media; true when playback just completed
    fn check_completed(&mut self) -> bool {
        if self.looping || self.running_since.is_none() || self.position() < self.duration {
            return false;
        }
        self.anchor = self.duration;
        self.running_since = None;
        self.playing = false;
        true
    }
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    match clock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Builds simulated engines on the current runtime
#[derive(Debug)]
pub struct SimulatedFactory {
    config: SimulationConfig,
    runtime: Handle,
}

impl SimulatedFactory {
    pub fn new(config: SimulationConfig, runtime: Handle) -> Self {
        Self { config, runtime }
    }
}

impl EngineFactory for SimulatedFactory {
    fn create(&self, source: &MediaSource, listener: EngineListener) -> Result<Box<dyn MediaEngine>> {
        if source.uri.is_empty() {
            return Err(Error::Engine("empty source uri".into()));
        }

        let clock = Arc::new(Mutex::new(Clock::new(self.config.duration())));
        let size = VideoSize::new(self.config.width, self.config.height).with_rotation(self.config.rotation);
        let fails = self.config.fails(source);
        let delay = Duration::from_millis(self.config.prepare_delay_ms);

        debug!(texture_id = %listener.texture_id(), uri = %source.uri, fails, "Simulated engine created");
        self.runtime
            .spawn(drive(Arc::clone(&clock), listener, delay, size, fails));

        Ok(Box::new(SimulatedEngine { clock }))
    }
}

/// Background half of an engine: preparation, then end-of-media detection
async fn drive(clock: Arc<Mutex<Clock>>, listener: EngineListener, delay: Duration, size: VideoSize, fails: bool) {
    sleep(delay).await;

    let duration = {
        let mut clock = lock(&clock);
        if clock.released {
            return;
        }
        if fails {
            drop(clock);
            listener.error("Source error");
            return;
        }
        clock.prepared = true;
        if clock.playing {
            clock.set_running(true);
        }
        clock.duration
    };
    listener.prepared(duration, size);

    let mut ticker = interval(CLOCK_RESOLUTION);
    loop {
        ticker.tick().await;
        let completed = {
            let mut clock = lock(&clock);
            if clock.released {
                break;
            }
            clock.check_completed()
        };
        if completed {
            info!(texture_id = %listener.texture_id(), "Simulated playback completed");
            listener.notify(EngineEvent::Completed);
        }
    }
}

struct SimulatedEngine {
    clock: Arc<Mutex<Clock>>,
}

impl MediaEngine for SimulatedEngine {
    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        let mut clock = lock(&self.clock);
        clock.playing = play_when_ready;
        if clock.prepared {
            // Playing again after completion restarts from the top
            if play_when_ready && clock.position() >= clock.duration && !clock.looping {
                clock.anchor = Duration::ZERO;
            }
            clock.set_running(play_when_ready);
        }
    }

    fn set_looping(&mut self, looping: bool) {
        let mut clock = lock(&self.clock);
        let running = clock.running_since.is_some();
        clock.set_running(running);
        clock.looping = looping;
    }

    fn set_volume(&mut self, volume: f64) {
        lock(&self.clock).volume = volume;
    }

    fn seek_to(&mut self, position: Duration) {
        let mut clock = lock(&self.clock);
        clock.anchor = position.min(clock.duration);
        if clock.running_since.is_some() {
            clock.running_since = Some(Instant::now());
        }
    }

    fn position(&self) -> Duration {
        lock(&self.clock).position()
    }

    fn buffered_position(&self) -> Duration {
        let clock = lock(&self.clock);
        if clock.prepared {
            clock.duration
        } else {
            Duration::ZERO
        }
    }

    fn release(&mut self) -> Result<()> {
        let mut clock = lock(&self.clock);
        if clock.released {
            return Err(Error::Engine("engine already released".into()));
        }
        clock.released = true;
        clock.set_running(false);
        debug!(volume = clock.volume, "Simulated engine released");
        Ok(())
    }
}
