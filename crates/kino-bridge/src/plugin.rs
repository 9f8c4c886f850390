//! Video player plugin - lifecycle controller
//!
//! Binds the [`Dispatcher`] to the host for both embedding generations:
//! - modern: [`VideoPlayerPlugin::new`], then the host attaches later with
//!   [`VideoPlayerPlugin::on_attached_to_engine`]
//! - legacy: [`VideoPlayerPlugin::register_with`] receives the host binding
//!   eagerly and is torn down by [`VideoPlayerPlugin::on_view_destroyed`]
//!
//! All command processing and engine callbacks run on one task through
//! [`VideoPlayerPlugin::serve`], so player state needs no locking.

use crate::{
    channel::{Invocation, MethodCall, MethodChannel, MethodResult},
    config::PluginConfig,
    dispatcher::Dispatcher,
    engine::{CallbackQueue, EngineCallback},
    host::HostBinding,
};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// One unit of work for the dispatch loop
enum Step {
    Call(Invocation),
    Callback(EngineCallback),
    Tick,
    Closed,
}

/// Lifecycle controller owning the dispatcher
#[derive(Debug)]
pub struct VideoPlayerPlugin {
    dispatcher: Dispatcher,
    /// Engine callbacks waiting to run on the dispatch loop
    callbacks: CallbackQueue,
    /// Method calls reach the dispatcher only while listening
    listening: bool,
}

impl VideoPlayerPlugin {
    /// Plugin for the modern embedding; the host binding arrives on attach
    pub fn new(config: PluginConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            dispatcher: Dispatcher::new(config, tx),
            callbacks: rx,
            listening: false,
        }
    }

    /// Plugin for the legacy embedding, bound and listening immediately
    pub fn register_with(registrar: HostBinding, config: PluginConfig) -> Self {
        let mut plugin = Self::new(config);
        plugin.dispatcher.configure(registrar);
        plugin.start_listening();
        plugin
    }

    pub fn config(&self) -> &PluginConfig {
        self.dispatcher.config()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Bind to a host. Re-attaching swaps the binding and keeps live players.
    #[instrument(skip(self, binding))]
    pub fn on_attached_to_engine(&mut self, binding: HostBinding) {
        self.dispatcher.configure(binding);
        self.start_listening();
    }

    /// Unbind from the host and release every player
    #[instrument(skip(self))]
    pub fn on_detached_from_engine(&mut self) {
        if !self.dispatcher.has_host() {
            error!("Detached from the engine before registering to it");
            return;
        }
        self.stop_listening();
        self.teardown();
        self.dispatcher.clear_host();
    }

    /// Legacy host view destroyed; release every player
    #[instrument(skip(self))]
    pub fn on_view_destroyed(&mut self) {
        self.teardown();
    }

    fn start_listening(&mut self) {
        self.listening = true;
        info!(channel = %self.config().method_channel, "Listening for method calls");
    }

    fn stop_listening(&mut self) {
        self.listening = false;
        info!(channel = %self.config().method_channel, "Stopped listening for method calls");
    }

    /// Dispose every live player; a registry already emptied makes this a no-op.
    ///
    /// Analytics sessions are released with their players.
    fn teardown(&mut self) {
        if self.dispatcher.registry().is_empty() {
            debug!("No players to release");
            return;
        }

        let live = self.dispatcher.registry().len();
        let failures = self.dispatcher.dispose_all();
        info!(live, failures, "Released all players");
    }

    /// Answer one method call.
    ///
    /// With no handler bound the call is not implemented, matching a host
    /// channel that has nobody listening.
    pub fn handle_method_call(&mut self, call: &MethodCall) -> MethodResult {
        if !self.listening {
            warn!(method = %call.method, "Method call while not listening");
            return MethodResult::NotImplemented;
        }
        self.drain_engine_callbacks();
        self.dispatcher.handle_method_call(call)
    }

    /// Run every engine callback queued so far; returns how many were delivered
    pub fn drain_engine_callbacks(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(callback) = self.callbacks.try_recv() {
            if self.dispatcher.on_engine_callback(callback) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Serve a method channel until every client is gone.
    ///
    /// Method calls, engine callbacks, and the buffering ticker are processed
    /// one at a time in arrival order.
    pub async fn serve(&mut self, mut channel: MethodChannel) {
        info!(channel = %channel.name(), "Serving method channel");
        let mut ticker = self.config().buffering_update_interval().map(|period| {
            let mut ticker: Interval = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            let step = tokio::select! {
                invocation = channel.recv() => match invocation {
                    Some(invocation) => Step::Call(invocation),
                    None => Step::Closed,
                },
                Some(callback) = self.callbacks.recv() => Step::Callback(callback),
                _ = tick(&mut ticker) => Step::Tick,
            };

            match step {
                Step::Call(invocation) => {
                    let started = Instant::now();
                    let result = self.handle_method_call(&invocation.call);
                    debug!(
                        method = %invocation.call.method,
                        elapsed_us = started.elapsed().as_micros() as u64,
                        "Method call handled"
                    );
                    invocation.respond(result);
                }
                Step::Callback(callback) => {
                    self.dispatcher.on_engine_callback(callback);
                }
                Step::Tick => self.dispatcher.send_buffering_updates(),
                Step::Closed => break,
            }
        }

        info!(channel = %channel.name(), "Method channel closed");
    }
}

/// Next tick of an optional ticker; never resolves when ticking is off
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl Drop for VideoPlayerPlugin {
    fn drop(&mut self) {
        self.teardown();
    }
}
