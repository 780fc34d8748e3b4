//! SSAP wire frame types.
//!
//! Every frame on the control link is a JSON text message carrying a `type`,
//! a correlation `id`, and for outbound frames a `ssap://` or `luna://`
//! namespace `uri` plus an optional `payload`. The TV matches responses and
//! subscription pushes to requests purely by id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Port of the webOS control socket (`ws://<ip>:3000`).
pub const CONTROL_PORT: u16 = 3000;

/// Placeholder substituted with the stored client key at send time.
pub const CLIENT_KEY_PLACEHOLDER: &str = "CLIENTKEYGOESHERE";

/// Registration manifest sent during pairing. The TV grants the listed
/// permissions server-side and answers with a client key that skips the
/// on-screen prompt on later connects.
///
/// The raw template (placeholder included, before substitution) is what the
/// key store fingerprints: a key is only reusable as long as this text is
/// byte-identical to the one it was paired under.
pub const REGISTRATION_TEMPLATE: &str = r#"{
    "forcePairing": false,
    "pairingType": "PROMPT",
    "client-key": "CLIENTKEYGOESHERE",
    "manifest": {
        "manifestVersion": 1,
        "appVersion": "1.1",
        "appId": "com.lgctl.remote",
        "vendorId": "com.lgctl",
        "localizedAppNames": {
            "": "lgctl"
        },
        "localizedVendorNames": {
            "": "lgctl"
        },
        "permissions": [
            "LAUNCH",
            "LAUNCH_WEBAPP",
            "APP_TO_APP",
            "CLOSE",
            "TEST_OPEN",
            "TEST_PROTECTED",
            "CONTROL_AUDIO",
            "CONTROL_DISPLAY",
            "CONTROL_INPUT_JOYSTICK",
            "CONTROL_INPUT_MEDIA_RECORDING",
            "CONTROL_INPUT_MEDIA_PLAYBACK",
            "CONTROL_INPUT_TV",
            "CONTROL_POWER",
            "CONTROL_TV_SCREEN",
            "CONTROL_MOUSE_AND_KEYBOARD",
            "CONTROL_INPUT_TEXT",
            "READ_APP_STATUS",
            "READ_CURRENT_CHANNEL",
            "READ_INPUT_DEVICE_LIST",
            "READ_NETWORK_STATE",
            "READ_RUNNING_APPS",
            "READ_TV_CHANNEL_LIST",
            "READ_POWER_STATE",
            "READ_COUNTRY_INFO",
            "READ_SETTINGS",
            "WRITE_NOTIFICATION_TOAST",
            "WRITE_NOTIFICATION_ALERT",
            "WRITE_SETTINGS"
        ]
    }
}"#;

/// Correlation identifier carried on every frame.
///
/// Unique within the lifetime of a connection; the link mints them from a
/// monotonic counter and renders them as decimal strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId(n.to_string())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId(s.to_string())
    }
}

/// Frame types this client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundType {
    Register,
    Request,
    Subscribe,
    Unsubscribe,
}

/// Frame types the TV sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundType {
    Response,
    Registered,
    Error,
}

/// An outbound SSAP frame.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub msg_type: OutboundType,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl OutboundMessage {
    #[must_use]
    pub fn request(id: RequestId, uri: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            msg_type: OutboundType::Request,
            id,
            uri: Some(uri.into()),
            payload,
        }
    }

    #[must_use]
    pub fn subscribe(id: RequestId, uri: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            msg_type: OutboundType::Subscribe,
            id,
            uri: Some(uri.into()),
            payload,
        }
    }

    #[must_use]
    pub fn unsubscribe(id: RequestId) -> Self {
        Self {
            msg_type: OutboundType::Unsubscribe,
            id,
            uri: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn register(id: RequestId, payload: Value) -> Self {
        Self {
            msg_type: OutboundType::Register,
            id,
            uri: None,
            payload: Some(payload),
        }
    }
}

/// An inbound SSAP frame.
///
/// `error` frames put a descriptive string in `error` and usually an empty
/// `payload`; `response` and `registered` frames carry everything in
/// `payload`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub msg_type: InboundType,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl InboundMessage {
    /// True for the intermediate frame the TV sends while the pairing
    /// prompt is on screen. It shares the register request's id but is not
    /// the final answer.
    #[must_use]
    pub fn is_pairing_prompt(&self) -> bool {
        self.msg_type == InboundType::Response
            && self.payload.get("pairingType").and_then(Value::as_str) == Some("PROMPT")
    }
}

/// Build the registration payload, substituting the stored client key (or
/// blanking the placeholder when pairing from scratch).
///
/// # Errors
///
/// Returns an error if the substituted template is not valid JSON.
pub fn registration_payload(client_key: Option<&str>) -> Result<Value, serde_json::Error> {
    let raw = REGISTRATION_TEMPLATE.replace(CLIENT_KEY_PLACEHOLDER, client_key.unwrap_or(""));
    serde_json::from_str(&raw)
}
