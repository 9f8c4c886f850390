//! Output formatting for CLI

use console::style;
use kino_bridge::{MethodCall, MethodResult, PlayerEvent, PluginConfig};
use serde_json::json;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Writes call results and stream events to stdout
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn result(&self, call: &MethodCall, result: &MethodResult) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", json!({ "call": call, "result": result }));
            }
            OutputFormat::Text => {
                println!("{} {} {}", style("→").cyan(), style(&call.method).bold(), call.arguments);
                match result {
                    MethodResult::Success { result } => println!("  {} {}", style("✓").green(), result),
                    MethodResult::Error { code, message, .. } => {
                        println!("  {} {}: {}", style("✗").red(), code, message)
                    }
                    MethodResult::NotImplemented => println!("  {} not implemented", style("-").yellow()),
                }
            }
        }
    }

    pub fn event(&self, channel: &str, event: &PlayerEvent) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", json!({ "stream": channel, "event": event }));
            }
            OutputFormat::Text => {
                let payload = serde_json::to_value(event).unwrap_or_default();
                let label = match event {
                    PlayerEvent::Error { .. } => style(event.kind()).red(),
                    PlayerEvent::Completed => style(event.kind()).green(),
                    _ => style(event.kind()).magenta(),
                };
                println!("  {} {} {}", style(format!("[{channel}]")).dim(), label, payload);
            }
        }
    }

    pub fn summary(&self, calls: usize, events: usize, live: usize) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", json!({ "summary": { "calls": calls, "events": events, "livePlayers": live } }));
            }
            OutputFormat::Text => {
                println!();
                println!("{} calls, {} events, {} players live at exit", calls, events, live);
            }
        }
    }

    pub fn config(&self, config: &PluginConfig) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
            OutputFormat::Text => println!("{}", Table::new(config_rows(config))),
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Setting")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn config_rows(config: &PluginConfig) -> Vec<ConfigRow> {
    vec![
        ConfigRow { key: "methodChannel", value: config.method_channel.clone() },
        ConfigRow { key: "eventChannelPrefix", value: config.event_channel_prefix.clone() },
        ConfigRow { key: "assetScheme", value: config.asset_scheme.clone() },
        ConfigRow {
            key: "bufferingUpdateIntervalMs",
            value: config.buffering_update_interval_ms.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Text);
    }

    #[test]
    fn test_config_rows() {
        let rows = config_rows(&PluginConfig::default());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].value, "flutter.io/videoPlayer");
        assert_eq!(rows[3].value, "500");
    }
}
