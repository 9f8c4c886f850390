//! CLI command implementations

use crate::output::Output;
use crate::sim::{SimulatedFactory, SimulationConfig};
use anyhow::Context;
use kino_bridge::{
    method_channel, ChannelClient, EventStream, HostBinding, InMemoryMessenger, MethodCall, PluginConfig,
    SequentialTextureRegistry, VideoPlayerPlugin,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing::{debug, info};

/// One line of a host script
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptLine {
    /// Let simulated time pass before the next call
    Wait {
        #[serde(rename = "waitMs")]
        wait_ms: u64,
    },
    Call(MethodCall),
}

/// Options for [`run`]
#[derive(Debug)]
pub struct RunOptions {
    pub script: Option<PathBuf>,
    pub simulation: SimulationConfig,
    /// Register eagerly the way legacy hosts do
    pub legacy: bool,
    /// Time to keep collecting events after the last line
    pub settle: Duration,
}

/// Serve a script of method calls through a plugin backed by simulated engines
pub async fn run(config: PluginConfig, options: RunOptions, output: Output) -> anyhow::Result<()> {
    let messenger = Arc::new(InMemoryMessenger::new());
    let binding = HostBinding::new(
        messenger.clone(),
        Arc::new(SimulatedFactory::new(options.simulation, Handle::current())),
    )
    .with_textures(Arc::new(SequentialTextureRegistry::new()));

    let mut plugin = if options.legacy {
        VideoPlayerPlugin::register_with(binding, config.clone())
    } else {
        let mut plugin = VideoPlayerPlugin::new(config.clone());
        plugin.on_attached_to_engine(binding);
        plugin
    };

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &options.script {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening script {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let (client, channel) = method_channel(config.method_channel.clone());
    let mut host = ScriptHost {
        client,
        messenger: messenger.clone(),
        streams: BTreeMap::new(),
        output,
        calls: 0,
        events: 0,
    };

    let settle = options.settle;
    let script = async move {
        let outcome = host.play(reader, settle).await;
        (host.calls, host.events, outcome)
    };
    let ((), (calls, events, outcome)) = tokio::join!(plugin.serve(channel), script);

    let live = plugin.dispatcher().registry().len();
    if options.legacy {
        plugin.on_view_destroyed();
    } else {
        plugin.on_detached_from_engine();
    }

    output.summary(calls, events, live);
    outcome
}

/// Print the effective plugin configuration
pub fn show_config(config: &PluginConfig, output: Output) -> anyhow::Result<()> {
    output.config(config)
}

/// Host side of the channel: sends calls and prints what comes back
struct ScriptHost {
    client: ChannelClient,
    messenger: Arc<InMemoryMessenger>,
    /// Event streams published so far, by channel name
    streams: BTreeMap<String, EventStream>,
    output: Output,
    calls: usize,
    events: usize,
}

impl ScriptHost {
    async fn play(&mut self, reader: Box<dyn AsyncBufRead + Unpin + Send>, settle: Duration) -> anyhow::Result<()> {
        let mut lines = reader.lines();
        let mut number = 0;

        while let Some(line) = lines.next_line().await? {
            number += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parsed: ScriptLine =
                serde_json::from_str(line).with_context(|| format!("script line {number} is not a call"))?;

            match parsed {
                ScriptLine::Wait { wait_ms } => {
                    debug!(wait_ms, "Waiting");
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                }
                ScriptLine::Call(call) => {
                    let result = self.client.invoke(call.clone()).await;
                    self.calls += 1;
                    self.output.result(&call, &result);
                }
            }
            self.flush_events();
        }

        tokio::time::sleep(settle).await;
        self.flush_events();
        info!(calls = self.calls, events = self.events, "Script finished");
        Ok(())
    }

    /// Print every event queued on any stream
    fn flush_events(&mut self) {
        self.streams.extend(self.messenger.take_all());

        for (channel, stream) in self.streams.iter_mut() {
            while let Ok(event) = stream.try_recv() {
                self.events += 1;
                self.output.event(channel, &event);
            }
        }

        // Streams whose player is gone and that are fully drained
        self.streams.retain(|_, stream| !(stream.is_closed() && stream.is_empty()));
    }
}
