//! Typed response payloads per webOS service namespace.
//!
//! Every command decodes its payload into one of these instead of poking at
//! raw JSON at the call site. Fields the client does not consume are either
//! defaulted away or kept in a generic `extra` map where forward
//! compatibility matters (firmware revisions add fields freely).

use serde::Deserialize;
use serde_json::Value;

/// `ssap://audio/getVolume`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStatus {
    #[serde(default)]
    pub volume: i32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// `ssap://audio/getStatus`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStatus {
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub volume: i32,
}

/// One channel entry as the TV reports it; numbers come over the wire as
/// strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEntry {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub channel_number: Option<String>,
}

/// `ssap://tv/getChannelList`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelList {
    #[serde(default)]
    pub channel_list: Vec<ChannelEntry>,
}

/// A channel projected into usable types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub number: u32,
}

impl ChannelEntry {
    /// Project into [`ChannelInfo`]; entries without an id or a parseable
    /// number are skipped by callers.
    #[must_use]
    pub fn into_info(self) -> Option<ChannelInfo> {
        Some(ChannelInfo {
            id: self.channel_id?,
            name: self.channel_name.unwrap_or_default(),
            number: self.channel_number.as_deref()?.parse().ok()?,
        })
    }
}

/// `ssap://com.webos.applicationManager/listLaunchPoints`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPoint {
    pub id: String,
    #[serde(default)]
    pub launch_point_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPoints {
    #[serde(default)]
    pub launch_points: Vec<LaunchPoint>,
}

/// `ssap://com.webos.applicationManager/listApps`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppList {
    #[serde(default)]
    pub apps: Vec<AppEntry>,
}

/// `ssap://tv/getExternalInputList`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInput {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInputList {
    #[serde(default)]
    pub devices: Vec<ExternalInput>,
}

/// `ssap://com.webos.service.tvpower/power/getPowerState` (also pushed by
/// the power-state subscription).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerState {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub processing: Option<String>,
    #[serde(default)]
    pub power_on_reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// `ssap://com.webos.service.tv.display/get3DStatus`
#[derive(Debug, Clone, Deserialize)]
pub struct ThreeDStatusPayload {
    #[serde(rename = "status3D", default)]
    pub status_3d: ThreeDStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeDStatus {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// `ssap://settings/getSystemSettings` (also pushed by the picture-settings
/// subscription). The settings themselves are key-driven, so they stay
/// generic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub settings: Value,
}

/// Responses that carry a launcher session id (`launch`, `close`, `open`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSession {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `ssap://com.webos.service.networkinput/getPointerInputSocket`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerSocket {
    pub socket_path: String,
}

/// `ssap://system.notifications/createAlert`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCreated {
    #[serde(default)]
    pub alert_id: Option<String>,
}
