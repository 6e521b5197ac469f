//! Host/webview message protocol.
//!
//! Frames are JSON objects carrying the protocol version under `v` and the
//! message tag under `type`. The tag sets are closed: a frame with an unknown
//! tag, a different version or a body that does not match its tag is a
//! protocol violation on whichever side receives it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{AppError, FailureKind, Result};
use super::launch::{LaunchConfig, Platform};

/// Current protocol version. Bumped on any change to the tag sets.
pub const PROTOCOL_VERSION: u64 = 1;

const VERSION_KEY: &str = "v";
const TAG_KEY: &str = "type";

/// Identifies one run of the launch state machine.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AttemptToken(u64);

impl AttemptToken {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The token following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for AttemptToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Preview session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PreviewState {
    Idle,
    Resolving,
    Building,
    Launching,
    Attached,
    Failed { kind: FailureKind },
    Stopped,
}

impl PreviewState {
    /// An attempt is in flight and can be cancelled.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Resolving | Self::Building | Self::Launching)
    }
}

impl std::fmt::Display for PreviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Resolving => write!(f, "resolving"),
            Self::Building => write!(f, "building"),
            Self::Launching => write!(f, "launching"),
            Self::Attached => write!(f, "attached"),
            Self::Failed { kind } => write!(f, "failed ({kind})"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Messages from the host to the webview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    /// Launch configuration picked for the attempt.
    ConfigResolved {
        attempt: AttemptToken,
        config: LaunchConfig,
    },
    /// The webview bundle is in place.
    BuildReady {
        attempt: AttemptToken,
        script: String,
        stylesheet: String,
        assets: Vec<String>,
    },
    /// State machine moved.
    LaunchStatus {
        attempt: AttemptToken,
        status: PreviewState,
    },
    /// Something failed.
    Error {
        attempt: Option<AttemptToken>,
        kind: FailureKind,
        message: String,
    },
}

/// Actions a user can trigger from the preview panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UserAction {
    Launch { platform: Platform },
    Stop,
}

/// Messages from the webview to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebviewMessage {
    /// The panel finished loading.
    Ready,
    UserAction { action: UserAction },
}

/// A message type that can cross the bridge.
pub trait Frame: Serialize + DeserializeOwned {
    /// Every tag this direction accepts.
    const TAGS: &'static [&'static str];
}

impl Frame for HostMessage {
    const TAGS: &'static [&'static str] =
        &["configResolved", "buildReady", "launchStatus", "error"];
}

impl Frame for WebviewMessage {
    const TAGS: &'static [&'static str] = &["ready", "userAction"];
}

/// Serialize a message into a versioned frame.
///
/// # Errors
/// Returns error if the message cannot be serialized.
pub fn encode<T: Frame>(message: &T) -> Result<String> {
    let mut value = serde_json::to_value(message).map_err(AppError::json_parse)?;
    if let Value::Object(map) = &mut value {
        map.insert(VERSION_KEY.into(), Value::from(PROTOCOL_VERSION));
    }
    serde_json::to_string(&value).map_err(AppError::json_parse)
}

/// Parse a frame, rejecting anything outside the protocol.
///
/// # Errors
/// Returns `ProtocolViolation` for non-JSON input, a version mismatch, an
/// unknown tag or a body that does not fit its tag.
pub fn decode<T: Frame>(raw: &str) -> Result<T> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::protocol(format!("frame is not valid JSON: {e}")))?;

    let Value::Object(mut map) = value else {
        return Err(AppError::protocol("frame is not a JSON object"));
    };

    match map.remove(VERSION_KEY).as_ref().and_then(Value::as_u64) {
        Some(PROTOCOL_VERSION) => {}
        Some(other) => {
            return Err(AppError::protocol(format!(
                "unsupported protocol version {other}, expected {PROTOCOL_VERSION}"
            )))
        }
        None => return Err(AppError::protocol("frame has no protocol version")),
    }

    let tag = map
        .get(TAG_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::protocol("frame has no message tag"))?
        .to_string();

    if !T::TAGS.contains(&tag.as_str()) {
        return Err(AppError::protocol(format!("unknown message tag '{tag}'")));
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|e| AppError::protocol(format!("malformed '{tag}' message: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_adds_version_and_tag() {
        let frame = encode(&HostMessage::LaunchStatus {
            attempt: AttemptToken::new(3),
            status: PreviewState::Failed {
                kind: FailureKind::LaunchTimeout,
            },
        })
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["v"], 1);
        assert_eq!(value["type"], "launchStatus");
        assert_eq!(value["attempt"], 3);
        assert_eq!(value["status"]["state"], "failed");
        assert_eq!(value["status"]["kind"], "launchTimeout");
    }

    #[test]
    fn test_decode_user_action() {
        let msg: WebviewMessage = decode(
            r#"{"v":1,"type":"userAction","action":{"kind":"launch","platform":"android"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            WebviewMessage::UserAction {
                action: UserAction::Launch {
                    platform: Platform::Android
                }
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let err = decode::<WebviewMessage>(r#"{"v":1,"type":"openFile","path":"/etc"}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::ProtocolViolation { .. }));
        assert!(err.to_string().contains("openFile"));
    }

    #[test]
    fn test_decode_rejects_host_tag_on_webview_side() {
        let frame = encode(&HostMessage::Error {
            attempt: None,
            kind: FailureKind::BuildFailure,
            message: "x".into(),
        })
        .unwrap();
        assert!(matches!(
            decode::<WebviewMessage>(&frame),
            Err(AppError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_version_skew() {
        let err = decode::<WebviewMessage>(r#"{"v":2,"type":"ready"}"#).unwrap_err();
        assert!(err.to_string().contains("version 2"));

        let err = decode::<WebviewMessage>(r#"{"type":"ready"}"#).unwrap_err();
        assert!(matches!(err, AppError::ProtocolViolation { .. }));
    }

    #[test]
    fn test_decode_rejects_malformed_body() {
        let err = decode::<WebviewMessage>(
            r#"{"v":1,"type":"userAction","action":{"kind":"launch","platform":"symbian"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("malformed 'userAction'"));

        assert!(decode::<WebviewMessage>("not json").is_err());
        assert!(decode::<WebviewMessage>("[1,2]").is_err());
    }

    #[test]
    fn test_host_message_survives_the_wire() {
        let msg = HostMessage::BuildReady {
            attempt: AttemptToken::new(1),
            script: "webview.js".into(),
            stylesheet: "webview.css".into(),
            assets: vec!["assets/logo-0011aabb.png".into()],
        };
        let decoded: HostMessage = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_attempt_tokens_increase() {
        let first = AttemptToken::default().next();
        assert!(first.next() > first);
        assert_eq!(first.to_string(), "#1");
    }
}
