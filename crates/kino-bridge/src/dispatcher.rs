//! Command dispatcher
//!
//! Executes host commands against the registry. Every call first checks
//! that a usable host binding (including a texture registry) is present;
//! without one the call fails with `no_activity` before touching any player.

use crate::{
    channel::{Command, InstanceCommand, MethodCall, MethodResult, Reply},
    config::PluginConfig,
    engine::EngineCallback,
    host::HostBinding,
    registry::PlayerRegistry,
    types::TextureId,
    Error, Result,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Routes commands and engine callbacks to players
#[derive(Debug)]
pub struct Dispatcher {
    config: PluginConfig,
    host: Option<HostBinding>,
    registry: PlayerRegistry,
}

impl Dispatcher {
    pub fn new(config: PluginConfig, callbacks: mpsc::UnboundedSender<EngineCallback>) -> Self {
        Self {
            config,
            host: None,
            registry: PlayerRegistry::new(callbacks),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Install or replace the host binding; live players are kept
    pub fn configure(&mut self, host: HostBinding) {
        if self.host.is_some() {
            debug!(live = self.registry.len(), "Replacing host binding");
        }
        self.host = Some(host);
    }

    /// Drop the host binding, returning it
    pub fn clear_host(&mut self) -> Option<HostBinding> {
        self.host.take()
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// Parse and execute a raw method call
    pub fn handle_method_call(&mut self, call: &MethodCall) -> MethodResult {
        let outcome = usable_host(&self.host)
            .and_then(|_| Command::parse(call))
            .and_then(|command| self.handle(command));

        if let Err(e) = &outcome {
            debug!(method = %call.method, error = %e, "Method call failed");
        }
        outcome.into()
    }

    /// Execute a typed command
    #[instrument(skip(self, command), fields(method = %command.name()))]
    pub fn handle(&mut self, command: Command) -> Result<Reply> {
        let host = usable_host(&self.host)?;

        match command {
            Command::Init => {
                self.registry.dispose_all();
                Ok(Reply::empty())
            }
            Command::Create(request) => {
                let source = request.resolve(host.assets.as_ref(), &self.config.asset_scheme)?;
                let texture_id = self.registry.create(host, &self.config, source)?;
                Ok(Reply::Success(json!(texture_id.value())))
            }
            Command::Instance { texture_id, command } => {
                let player = self.registry.get_mut(texture_id)?;

                match command {
                    InstanceCommand::SetLooping(looping) => player.set_looping(looping),
                    InstanceCommand::SetVolume(volume) => player.set_volume(volume),
                    InstanceCommand::Play => player.play(),
                    InstanceCommand::Pause => player.pause(),
                    InstanceCommand::SeekTo(location) => player.seek_to(location),
                    InstanceCommand::Position => {
                        let position = player.position();
                        player.send_buffering_update();
                        return Ok(Reply::Success(json!(position)));
                    }
                    InstanceCommand::Dispose => {
                        if let Err(e) = self.registry.dispose(texture_id) {
                            warn!(texture_id = %texture_id, error = %e, "Player released with errors");
                        }
                    }
                    InstanceCommand::SetupAnalytics(setup) => {
                        let setup = setup.for_source(player.source());
                        let session = host.analytics.start_session(texture_id, &setup)?;
                        player.attach_analytics(session);
                    }
                    InstanceCommand::Unsupported(method) => {
                        debug!(texture_id = %texture_id, method = %method, "Method not implemented");
                        return Ok(Reply::NotImplemented);
                    }
                }

                Ok(Reply::empty())
            }
        }
    }

    /// Deliver a marshaled engine callback
    pub fn on_engine_callback(&mut self, callback: EngineCallback) -> bool {
        self.registry.route_engine_callback(callback)
    }

    /// Periodic buffering updates for ready players
    pub fn send_buffering_updates(&mut self) {
        self.registry.send_buffering_updates();
    }

    /// Dispose every player; returns the number of failed releases
    pub fn dispose_all(&mut self) -> usize {
        self.registry.dispose_all()
    }

    pub fn is_live(&self, texture_id: TextureId) -> bool {
        self.registry.contains(texture_id)
    }
}

fn usable_host(host: &Option<HostBinding>) -> Result<&HostBinding> {
    match host {
        Some(host) if host.textures.is_some() => Ok(host),
        _ => Err(Error::NoHostContext),
    }
}
