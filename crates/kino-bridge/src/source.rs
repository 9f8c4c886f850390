//! Media source resolution
//!
//! Turns the arguments of a `create` call into the [`MediaSource`] handed to
//! the engine:
//! - bundled assets, optionally qualified by package, resolved through the
//!   host's [`AssetResolver`]
//! - remote or local URIs with an optional stream format hint

use crate::{channel::MethodCall, host::AssetResolver, Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Stream container family the engine should use for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    /// Microsoft Smooth Streaming
    SmoothStreaming,
    /// MPEG-DASH
    Dash,
    /// HTTP Live Streaming
    Hls,
    /// Progressive container (mp4, webm, ...)
    Other,
}

impl FormatHint {
    /// Parse the wire value of the `formatHint` argument
    pub fn parse(hint: &str) -> Result<Self> {
        match hint {
            "ss" => Ok(FormatHint::SmoothStreaming),
            "dash" => Ok(FormatHint::Dash),
            "hls" => Ok(FormatHint::Hls),
            "other" => Ok(FormatHint::Other),
            unknown => Err(Error::UnsupportedFormat(unknown.to_string())),
        }
    }

    /// Infer the format from the path of a URI
    pub fn infer(uri: &str) -> Self {
        let path = match Url::parse(uri) {
            Ok(url) => url.path().to_lowercase(),
            Err(_) => uri.split(['?', '#']).next().unwrap_or(uri).to_lowercase(),
        };

        if path.ends_with(".mpd") {
            return FormatHint::Dash;
        }
        if path.ends_with(".m3u8") {
            return FormatHint::Hls;
        }
        if is_smooth_streaming_path(&path) {
            return FormatHint::SmoothStreaming;
        }

        FormatHint::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatHint::SmoothStreaming => "ss",
            FormatHint::Dash => "dash",
            FormatHint::Hls => "hls",
            FormatHint::Other => "other",
        }
    }
}

/// Matches `.ism`, `.isml`, and either followed by `/manifest` or `/manifest(...)`
fn is_smooth_streaming_path(path: &str) -> bool {
    let Some(idx) = path.rfind(".ism") else {
        return false;
    };
    let rest = &path[idx + ".ism".len()..];
    let rest = rest.strip_prefix('l').unwrap_or(rest);
    if rest.is_empty() {
        return true;
    }
    match rest.strip_prefix("/manifest") {
        Some("") => true,
        Some(qualifier) => qualifier.len() > 2 && qualifier.starts_with('(') && qualifier.ends_with(')'),
        None => false,
    }
}

/// Where the engine reads a source from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Bundled with the application
    Asset,
    /// Fetched over http(s)
    Network,
    /// Any other scheme (file, content, ...)
    Local,
}

impl SourceKind {
    /// Classify a URI that did not come from the asset resolver
    pub fn of_uri(uri: &str) -> Self {
        match Url::parse(uri) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => SourceKind::Network,
            _ => SourceKind::Local,
        }
    }
}

/// Source arguments of a `create` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    /// Bundled asset, optionally qualified by the package that ships it
    Asset {
        asset: String,
        package: Option<String>,
    },
    /// URI with an optional format hint
    Uri {
        uri: String,
        format_hint: Option<String>,
    },
}

impl SourceRequest {
    /// Read the source arguments; `asset` takes precedence over `uri`
    pub fn from_call(call: &MethodCall) -> Result<Self> {
        if let Some(asset) = call.argument::<String>("asset")? {
            return Ok(SourceRequest::Asset {
                asset,
                package: call.argument("package")?,
            });
        }

        let uri = call
            .argument::<String>("uri")?
            .ok_or_else(|| Error::invalid_argument("uri", "either `asset` or `uri` is required"))?;

        Ok(SourceRequest::Uri {
            uri,
            format_hint: call.argument("formatHint")?,
        })
    }

    /// Resolve into the locator the engine consumes
    pub fn resolve(self, assets: &dyn AssetResolver, asset_scheme: &str) -> Result<MediaSource> {
        match self {
            SourceRequest::Asset { asset, package } => {
                let key = match package {
                    Some(package) => assets.lookup_key_for_package(&asset, &package),
                    None => assets.lookup_key(&asset),
                };
                let uri = format!("{asset_scheme}{key}");
                Ok(MediaSource {
                    format: FormatHint::infer(&uri),
                    uri,
                    kind: SourceKind::Asset,
                })
            }
            SourceRequest::Uri { uri, format_hint } => {
                let format = match format_hint {
                    Some(hint) => FormatHint::parse(&hint)?,
                    None => FormatHint::infer(&uri),
                };
                Ok(MediaSource {
                    kind: SourceKind::of_uri(&uri),
                    uri,
                    format,
                })
            }
        }
    }
}

/// Fully resolved source bound to one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub uri: String,
    pub kind: SourceKind,
    pub format: FormatHint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BundledAssetResolver;
    use serde_json::json;

    #[test]
    fn test_infer_format() {
        assert_eq!(FormatHint::infer("https://cdn.example/live/master.m3u8"), FormatHint::Hls);
        assert_eq!(FormatHint::infer("https://cdn.example/vod/manifest.MPD"), FormatHint::Dash);
        assert_eq!(FormatHint::infer("https://cdn.example/a.ism/Manifest"), FormatHint::SmoothStreaming);
        assert_eq!(FormatHint::infer("https://cdn.example/a.isml"), FormatHint::SmoothStreaming);
        assert_eq!(
            FormatHint::infer("https://cdn.example/a.ism/manifest(format=mpd-time-csf)"),
            FormatHint::SmoothStreaming
        );
        assert_eq!(FormatHint::infer("https://example/video.mp4"), FormatHint::Other);
        assert_eq!(FormatHint::infer("x"), FormatHint::Other);
        assert_eq!(FormatHint::infer("clip.m3u8?token=abc"), FormatHint::Hls);
    }

    #[test]
    fn test_parse_hint() {
        assert_eq!(FormatHint::parse("ss").unwrap(), FormatHint::SmoothStreaming);
        assert_eq!(FormatHint::parse("other").unwrap(), FormatHint::Other);
        assert!(matches!(FormatHint::parse("flv"), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceKind::of_uri("https://example/video.mp4"), SourceKind::Network);
        assert_eq!(SourceKind::of_uri("file:///sdcard/video.mp4"), SourceKind::Local);
        assert_eq!(SourceKind::of_uri("x"), SourceKind::Local);
    }

    #[test]
    fn test_asset_takes_precedence() {
        let call = MethodCall::new("create", json!({ "asset": "vid.mp4", "uri": "https://example/a.mp4" }));
        let request = SourceRequest::from_call(&call).unwrap();
        assert_eq!(
            request,
            SourceRequest::Asset { asset: "vid.mp4".into(), package: None }
        );
    }

    #[test]
    fn test_resolve_packaged_asset() {
        let call = MethodCall::new("create", json!({ "asset": "vid.mp4", "package": "clips" }));
        let source = SourceRequest::from_call(&call)
            .unwrap()
            .resolve(&BundledAssetResolver::default(), "asset:///")
            .unwrap();
        assert_eq!(source.uri, "asset:///flutter_assets/packages/clips/vid.mp4");
        assert_eq!(source.kind, SourceKind::Asset);
        assert_eq!(source.format, FormatHint::Other);
    }

    #[test]
    fn test_resolve_uri_with_hint() {
        let call = MethodCall::new("create", json!({ "uri": "https://example/stream", "formatHint": "hls" }));
        let source = SourceRequest::from_call(&call)
            .unwrap()
            .resolve(&BundledAssetResolver::default(), "asset:///")
            .unwrap();
        assert_eq!(source.format, FormatHint::Hls);
        assert_eq!(source.kind, SourceKind::Network);
    }

    #[test]
    fn test_missing_source() {
        let call = MethodCall::new("create", json!({}));
        assert!(matches!(
            SourceRequest::from_call(&call),
            Err(Error::InvalidArgument { .. })
        ));
    }
}
