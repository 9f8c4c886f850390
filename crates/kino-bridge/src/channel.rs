//! Host method channel
//!
//! Wire types exchanged with the host's script layer and the async pair that
//! carries them:
//! - [`MethodCall`]: a method name with a JSON argument map
//! - [`Command`]: the typed form the dispatcher executes
//! - [`MethodResult`]: success, error, or not implemented
//! - [`method_channel`]: host-side [`ChannelClient`] and plugin-side [`MethodChannel`]

use crate::{analytics::AnalyticsSetup, source::SourceRequest, types::TextureId, Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Number, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// A method invocation as sent by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Typed lookup of one argument; absent and `null` both read as `None`
    pub fn argument<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.arguments.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| Error::invalid_argument(key, e.to_string())),
        }
    }

    /// Typed lookup of an argument the method cannot run without
    pub fn required_argument<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.argument(key)?.ok_or_else(|| Error::missing_argument(key))
    }

    /// Integer argument; any JSON number is accepted and truncated toward zero
    pub fn required_integer(&self, key: &str) -> Result<i64> {
        let number: Number = self.required_argument(key)?;
        if let Some(value) = number.as_i64() {
            return Ok(value);
        }
        match number.as_f64() {
            Some(value) if value.is_finite() && value.abs() < i64::MAX as f64 => Ok(value.trunc() as i64),
            _ => Err(Error::invalid_argument(key, format!("{number} is not a representable integer"))),
        }
    }
}

/// Operation addressed to one live player
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceCommand {
    SetLooping(bool),
    SetVolume(f64),
    Play,
    Pause,
    SeekTo(i64),
    Position,
    Dispose,
    SetupAnalytics(Box<AnalyticsSetup>),
    /// Recognized as instance-addressed but not supported
    Unsupported(String),
}

/// Typed form of every method the plugin answers
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Dispose every player
    Init,
    /// Construct a player for a source
    Create(SourceRequest),
    /// Operation on one player
    Instance {
        texture_id: TextureId,
        command: InstanceCommand,
    },
}

impl Command {
    /// Parse a method call into a command.
    ///
    /// Any method other than `init` and `create` is addressed to a player and
    /// must carry a `textureId`.
    pub fn parse(call: &MethodCall) -> Result<Self> {
        match call.method.as_str() {
            "init" => Ok(Command::Init),
            "create" => Ok(Command::Create(SourceRequest::from_call(call)?)),
            method => {
                let texture_id = TextureId(call.required_integer("textureId")?);
                let command = match method {
                    "setLooping" => InstanceCommand::SetLooping(call.required_argument("looping")?),
                    "setVolume" => InstanceCommand::SetVolume(call.required_argument("volume")?),
                    "play" => InstanceCommand::Play,
                    "pause" => InstanceCommand::Pause,
                    "seekTo" => {
                        let location = call.required_integer("location")?;
                        if location < 0 {
                            return Err(Error::invalid_argument("location", "must be non-negative"));
                        }
                        InstanceCommand::SeekTo(location)
                    }
                    "position" => InstanceCommand::Position,
                    "dispose" => InstanceCommand::Dispose,
                    "setupMux" => InstanceCommand::SetupAnalytics(Box::new(AnalyticsSetup::from_call(call)?)),
                    other => InstanceCommand::Unsupported(other.to_string()),
                };
                Ok(Command::Instance { texture_id, command })
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Init => "init",
            Command::Create(_) => "create",
            Command::Instance { command, .. } => match command {
                InstanceCommand::SetLooping(_) => "setLooping",
                InstanceCommand::SetVolume(_) => "setVolume",
                InstanceCommand::Play => "play",
                InstanceCommand::Pause => "pause",
                InstanceCommand::SeekTo(_) => "seekTo",
                InstanceCommand::Position => "position",
                InstanceCommand::Dispose => "dispose",
                InstanceCommand::SetupAnalytics(_) => "setupMux",
                InstanceCommand::Unsupported(name) => name.as_str(),
            },
        }
    }
}

/// Successful outcome of a command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Handled, with a result value (`null` when the method returns nothing)
    Success(Value),
    /// Recognized but unsupported; not a failure
    NotImplemented,
}

impl Reply {
    pub fn empty() -> Self {
        Reply::Success(Value::Null)
    }
}

/// Result as delivered back over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResult {
    Success {
        #[serde(default)]
        result: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default)]
        details: Value,
    },
    NotImplemented,
}

impl MethodResult {
    pub fn is_success(&self) -> bool {
        matches!(self, MethodResult::Success { .. })
    }

    /// Error code, if this is an error result
    pub fn error_code(&self) -> Option<&str> {
        match self {
            MethodResult::Error { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Result value, if this is a success result
    pub fn value(&self) -> Option<&Value> {
        match self {
            MethodResult::Success { result } => Some(result),
            _ => None,
        }
    }
}

impl From<Result<Reply>> for MethodResult {
    fn from(outcome: Result<Reply>) -> Self {
        match outcome {
            Ok(Reply::Success(result)) => MethodResult::Success { result },
            Ok(Reply::NotImplemented) => MethodResult::NotImplemented,
            Err(err) => MethodResult::Error {
                code: err.error_code().to_string(),
                message: err.to_string(),
                details: Value::Null,
            },
        }
    }
}

/// A call waiting for its result
#[derive(Debug)]
pub struct Invocation {
    pub call: MethodCall,
    reply: oneshot::Sender<MethodResult>,
}

impl Invocation {
    /// Deliver the result; a host that stopped waiting is not an error
    pub fn respond(self, result: MethodResult) {
        if self.reply.send(result).is_err() {
            warn!(method = %self.call.method, "Host dropped the call before the result arrived");
        }
    }
}

/// Host side of a method channel
#[derive(Debug, Clone)]
pub struct ChannelClient {
    name: String,
    tx: mpsc::UnboundedSender<Invocation>,
}

impl ChannelClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a call and wait for its result.
    ///
    /// A channel whose plugin side is gone answers `NotImplemented`, the same
    /// as a channel with no handler attached.
    pub async fn invoke(&self, call: MethodCall) -> MethodResult {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Invocation { call, reply }).is_err() {
            return MethodResult::NotImplemented;
        }
        rx.await.unwrap_or(MethodResult::NotImplemented)
    }
}

/// Plugin side of a method channel
#[derive(Debug)]
pub struct MethodChannel {
    name: String,
    rx: mpsc::UnboundedReceiver<Invocation>,
}

impl MethodChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next pending call, or `None` once every client is dropped
    pub async fn recv(&mut self) -> Option<Invocation> {
        self.rx.recv().await
    }
}

/// Create a named method channel pair
pub fn method_channel(name: impl Into<String>) -> (ChannelClient, MethodChannel) {
    let name = name.into();
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChannelClient {
            name: name.clone(),
            tx,
        },
        MethodChannel { name, rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_instance_commands() {
        let call = MethodCall::new("seekTo", json!({ "textureId": 4, "location": 1200 }));
        assert_eq!(
            Command::parse(&call).unwrap(),
            Command::Instance {
                texture_id: TextureId(4),
                command: InstanceCommand::SeekTo(1200),
            }
        );

        let call = MethodCall::new("setVolume", json!({ "textureId": 0, "volume": 3.5 }));
        assert_eq!(
            Command::parse(&call).unwrap(),
            Command::Instance {
                texture_id: TextureId(0),
                command: InstanceCommand::SetVolume(3.5),
            }
        );
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let call = MethodCall::new("foo", json!({ "textureId": 1 }));
        let command = Command::parse(&call).unwrap();
        assert_eq!(command.name(), "foo");
        assert!(matches!(
            command,
            Command::Instance { command: InstanceCommand::Unsupported(_), .. }
        ));
    }

    #[test]
    fn test_missing_texture_id() {
        let call = MethodCall::new("play", json!({}));
        assert!(matches!(Command::parse(&call), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_float_integers_truncated() {
        let call = MethodCall::new("seekTo", json!({ "textureId": 3.0, "location": 1500.7 }));
        assert_eq!(
            Command::parse(&call).unwrap(),
            Command::Instance {
                texture_id: TextureId(3),
                command: InstanceCommand::SeekTo(1500),
            }
        );

        let call = MethodCall::new("play", json!({ "textureId": "3" }));
        assert_eq!(Command::parse(&call).unwrap_err().error_code(), "invalid_argument");

        let call = MethodCall::new("play", json!({ "textureId": 1e300 }));
        assert_eq!(Command::parse(&call).unwrap_err().error_code(), "invalid_argument");
    }

    #[test]
    fn test_negative_seek_rejected() {
        let call = MethodCall::new("seekTo", json!({ "textureId": 0, "location": -1 }));
        assert!(matches!(Command::parse(&call), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_wrong_argument_type() {
        let call = MethodCall::new("setLooping", json!({ "textureId": 0, "looping": "yes" }));
        let err = Command::parse(&call).unwrap_err();
        assert_eq!(err.error_code(), "invalid_argument");
    }

    #[test]
    fn test_method_result_wire_format() {
        let ok: MethodResult = Ok(Reply::Success(json!(7))).into();
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "status": "success", "result": 7 })
        );

        let missing: MethodResult = Ok(Reply::NotImplemented).into();
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            json!({ "status": "notImplemented" })
        );

        let err: MethodResult = Err(Error::UnknownHandle { texture_id: TextureId(2) }).into();
        assert_eq!(err.error_code(), Some("Unknown textureId"));
    }

    #[tokio::test]
    async fn test_channel_roundtrip() {
        let (client, mut channel) = method_channel("test/channel");

        let server = tokio::spawn(async move {
            let invocation = channel.recv().await.unwrap();
            assert_eq!(invocation.call.method, "position");
            invocation.respond(MethodResult::Success { result: json!(250) });
        });

        let result = client.invoke(MethodCall::new("position", json!({ "textureId": 0 }))).await;
        assert_eq!(result.value(), Some(&json!(250)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_channel_is_not_implemented() {
        let (client, channel) = method_channel("test/closed");
        drop(channel);
        let result = client.invoke(MethodCall::new("init", Value::Null)).await;
        assert_eq!(result, MethodResult::NotImplemented);
    }
}
