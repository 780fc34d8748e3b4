//! The command facade: one async method per TV capability.
//!
//! A [`TvClient`] owns the control link and the pairing state for one TV.
//! Every capability call is independently fallible: callers applying a
//! sequence of settings are expected to log and continue on failure rather
//! than abort the rest, because a TV mid-wake answers some namespaces
//! before others.

use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::handshake::{DEFAULT_PAIRING_TIMEOUT, pair};
use crate::keystore::{KeyStore, default_data_dir};
use crate::link::{DEFAULT_REQUEST_TIMEOUT, Link, Subscription};
use crate::pointer::PointerLink;
use crate::protocol::{CONTROL_PORT, RequestId};
use crate::responses::{
    AlertCreated, AppEntry, AppList, AudioStatus, ChannelEntry, ChannelInfo, ChannelList,
    ExternalInput, ExternalInputList, LaunchPoint, LaunchPoints, LaunchSession, PointerSocket,
    PowerState, SystemSettings, ThreeDStatusPayload, VolumeStatus,
};

/// Tunables for [`TvClient::connect_with`].
#[derive(Debug, Clone)]
pub struct TvClientOptions {
    /// Attempts for the whole connect+handshake sequence. TVs woken over
    /// the network need a few tries before the socket server is up.
    pub connect_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Budget for a single command round-trip.
    pub request_timeout: Duration,
    /// Budget for the registration exchange, covering the on-screen prompt
    /// on first pairing.
    pub pairing_timeout: Duration,
    /// Overrides the data directory holding client keys and app caches.
    pub data_dir: Option<PathBuf>,
    /// Port of the control socket. Real TVs always listen on
    /// [`CONTROL_PORT`]; overridable so tests can stand in for one.
    pub control_port: u16,
}

impl Default for TvClientOptions {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            retry_delay: Duration::from_millis(500),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pairing_timeout: DEFAULT_PAIRING_TIMEOUT,
            data_dir: None,
            control_port: CONTROL_PORT,
        }
    }
}

/// A paired, ready-to-use client for one TV.
pub struct TvClient {
    link: Link,
    ip: String,
    data_dir: PathBuf,
    pointer: Mutex<Option<PointerLink>>,
}

impl std::fmt::Debug for TvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TvClient")
            .field("ip", &self.ip)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl TvClient {
    /// Connect and pair with default options.
    ///
    /// # Errors
    ///
    /// [`Error::Connect`] when every attempt failed to reach the TV,
    /// [`Error::Pairing`] when it answered but pairing did not complete.
    /// Never returns a partially-initialized client.
    pub async fn connect(ip: &str) -> Result<Self> {
        Self::connect_with(ip, TvClientOptions::default()).await
    }

    /// Connect and pair, retrying the whole connect+handshake sequence up
    /// to `options.connect_attempts` times with a fixed delay in between.
    ///
    /// # Errors
    ///
    /// Same as [`TvClient::connect`].
    pub async fn connect_with(ip: &str, options: TvClientOptions) -> Result<Self> {
        let url = format!("ws://{ip}:{}", options.control_port);
        url::Url::parse(&url).map_err(|e| Error::Connect(format!("bad address {ip}: {e}")))?;

        let data_dir = match &options.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        let mut store = KeyStore::open_in(&data_dir, ip)?;

        let mut last_err = Error::Connect(format!("no connect attempts made for {ip}"));
        for attempt in 1..=options.connect_attempts {
            match Link::connect_with_timeout(&url, options.request_timeout).await {
                Ok(link) => match pair(&link, &mut store, options.pairing_timeout).await {
                    Ok(_) => {
                        return Ok(Self {
                            link,
                            ip: ip.to_string(),
                            data_dir,
                            pointer: Mutex::new(None),
                        });
                    }
                    // Local storage problems will not heal by retrying.
                    Err(e @ (Error::Storage(_) | Error::Json(_))) => {
                        link.close().await;
                        return Err(e);
                    }
                    Err(e) => {
                        debug!("pairing attempt {attempt} failed: {e}");
                        link.close().await;
                        last_err = e;
                    }
                },
                Err(e @ Error::Connect(_)) => {
                    debug!("connect attempt {attempt} failed: {e}");
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
            if attempt < options.connect_attempts {
                tokio::time::sleep(options.retry_delay).await;
            }
        }
        Err(last_err)
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    /// Close the control link and, if open, the pointer sub-link.
    /// Idempotent.
    pub async fn close(&self) {
        if let Some(pointer) = self.pointer.lock().await.take() {
            pointer.close().await;
        }
        self.link.close().await;
    }

    // ---- audio ----------------------------------------------------------

    /// Current volume, with `-1` as the muted sentinel.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn get_volume(&self) -> Result<i32> {
        let status: VolumeStatus = decode(self.request("ssap://audio/getVolume", None).await?)?;
        Ok(if status.muted { -1 } else { status.volume })
    }

    /// Set the volume; the TV accepts 0–100.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when out of range, otherwise any failure
    /// of the call itself.
    pub async fn set_volume(&self, volume: i32) -> Result<()> {
        if !(0..=100).contains(&volume) {
            return Err(Error::InvalidArgument(format!(
                "volume {volume} outside 0..=100"
            )));
        }
        self.request("ssap://audio/setVolume", Some(json!({ "volume": volume })))
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn volume_up(&self) -> Result<()> {
        self.request("ssap://audio/volumeUp", None).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn volume_down(&self) -> Result<()> {
        self.request("ssap://audio/volumeDown", None).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn is_muted(&self) -> Result<bool> {
        let status: AudioStatus = decode(self.request("ssap://audio/getStatus", None).await?)?;
        Ok(status.mute)
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn set_mute(&self, mute: bool) -> Result<()> {
        self.request("ssap://audio/setMute", Some(json!({ "mute": mute })))
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for either call.
    pub async fn toggle_mute(&self) -> Result<()> {
        let muted = self.is_muted().await?;
        self.set_mute(!muted).await
    }

    // ---- channels -------------------------------------------------------

    /// All channels, sorted by number. Entries the TV reports without an id
    /// or a parseable number are skipped.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn channel_list(&self) -> Result<Vec<ChannelInfo>> {
        let list: ChannelList = decode(self.request("ssap://tv/getChannelList", None).await?)?;
        let mut channels: Vec<ChannelInfo> = list
            .channel_list
            .into_iter()
            .filter_map(ChannelEntry::into_info)
            .collect();
        channels.sort_by_key(|c| c.number);
        Ok(channels)
    }

    /// # Errors
    ///
    /// [`Error::UnexpectedResponse`] when the TV is not on a channel.
    pub async fn current_channel(&self) -> Result<ChannelInfo> {
        let entry: ChannelEntry = decode(self.request("ssap://tv/getCurrentChannel", None).await?)?;
        entry.into_info().ok_or(Error::UnexpectedResponse)
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn set_channel(&self, channel_id: &str) -> Result<()> {
        self.request("ssap://tv/openChannel", Some(json!({ "channelId": channel_id })))
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn channel_up(&self) -> Result<()> {
        self.request("ssap://tv/channelUp", None).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn channel_down(&self) -> Result<()> {
        self.request("ssap://tv/channelDown", None).await?;
        Ok(())
    }

    /// Raw program metadata for the current channel.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn program_info(&self) -> Result<Value> {
        self.request("ssap://tv/getChannelProgramInfo", None).await
    }

    // ---- apps and launcher ----------------------------------------------

    /// Launcher entries, sorted by title.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn launch_points(&self) -> Result<Vec<LaunchPoint>> {
        let points: LaunchPoints = decode(
            self.request("ssap://com.webos.applicationManager/listLaunchPoints", None)
                .await?,
        )?;
        let mut points = points.launch_points;
        points.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(points)
    }

    /// All installed apps, sorted by title. The response is large and
    /// nearly static, so it is cached per device on disk; `force_refresh`
    /// bypasses and rewrites the cache. A broken cache is ignored; unlike
    /// the key store, losing it costs one extra round-trip, nothing more.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn apps(&self, force_refresh: bool) -> Result<Vec<AppEntry>> {
        let cache_path = self.data_dir.join(format!("{}_apps.json", self.ip));
        if !force_refresh
            && let Ok(content) = fs::read_to_string(&cache_path)
            && let Ok(list) = serde_json::from_str::<AppList>(&content)
        {
            return Ok(sorted_apps(list.apps));
        }

        let payload = self
            .request(
                "ssap://com.webos.applicationManager/listApps",
                Some(json!({})),
            )
            .await?;
        let raw = serde_json::to_string(&payload)?;
        let list: AppList = decode(payload)?;

        if let Err(e) = fs::create_dir_all(&self.data_dir)
            .and_then(|()| fs::write(&cache_path, &raw))
        {
            warn!("could not cache app list for {}: {e}", self.ip);
        }
        Ok(sorted_apps(list.apps))
    }

    /// Launch an app by id; returns the launcher session id when the TV
    /// reports one.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn launch_app(&self, app_id: &str) -> Result<Option<String>> {
        let session: LaunchSession = decode(
            self.request("ssap://system.launcher/launch", Some(json!({ "id": app_id })))
                .await?,
        )?;
        Ok(session.session_id)
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn close_app(&self, app_id: &str) -> Result<Option<String>> {
        let session: LaunchSession = decode(
            self.request("ssap://system.launcher/close", Some(json!({ "id": app_id })))
                .await?,
        )?;
        Ok(session.session_id)
    }

    /// Open a URL in the TV browser.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn open_browser(&self, url: &str) -> Result<Option<String>> {
        let session: LaunchSession = decode(
            self.request("ssap://system.launcher/open", Some(json!({ "target": url })))
                .await?,
        )?;
        Ok(session.session_id)
    }

    /// Launch the YouTube leanback app on a specific video.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn launch_youtube(&self, video_id: &str) -> Result<Option<String>> {
        let target = format!("http://www.youtube.com/tv?v={video_id}");
        let session: LaunchSession = decode(
            self.request(
                "ssap://system.launcher/launch",
                Some(json!({ "id": "youtube.leanback.v4", "params": { "contentTarget": target } })),
            )
            .await?,
        )?;
        Ok(session.session_id)
    }

    // ---- external inputs ------------------------------------------------

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn inputs(&self) -> Result<Vec<ExternalInput>> {
        let list: ExternalInputList =
            decode(self.request("ssap://tv/getExternalInputList", None).await?)?;
        Ok(list.devices)
    }

    /// Switch to an external input (`"HDMI_1"`, ...).
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn set_input(&self, input_id: &str) -> Result<()> {
        self.request("ssap://tv/switchInput", Some(json!({ "inputId": input_id })))
            .await?;
        Ok(())
    }

    // ---- power and screen -----------------------------------------------

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn turn_off(&self) -> Result<()> {
        self.request("ssap://system/turnOff", None).await?;
        Ok(())
    }

    /// Blank the panel while keeping webOS running.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn screen_off(&self) -> Result<()> {
        self.request("ssap://com.webos.service.tvpower/power/turnOffScreen", None)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn screen_on(&self) -> Result<()> {
        self.request("ssap://com.webos.service.tvpower/power/turnOnScreen", None)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn power_state(&self) -> Result<PowerState> {
        decode(
            self.request("ssap://com.webos.service.tvpower/power/getPowerState", None)
                .await?,
        )
    }

    // ---- media ----------------------------------------------------------

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn play(&self) -> Result<()> {
        self.request("ssap://media.controls/play", None).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn pause(&self) -> Result<()> {
        self.request("ssap://media.controls/pause", None).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn stop(&self) -> Result<()> {
        self.request("ssap://media.controls/stop", None).await?;
        Ok(())
    }

    // ---- 3D -------------------------------------------------------------

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn set_3d(&self, on: bool) -> Result<()> {
        let uri = if on {
            "ssap://com.webos.service.tv.display/set3DOn"
        } else {
            "ssap://com.webos.service.tv.display/set3DOff"
        };
        self.request(uri, None).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn is_3d_on(&self) -> Result<bool> {
        let status: ThreeDStatusPayload = decode(
            self.request("ssap://com.webos.service.tv.display/get3DStatus", None)
                .await?,
        )?;
        Ok(status.status_3d.status)
    }

    // ---- notifications and system ---------------------------------------

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn show_toast(&self, message: &str) -> Result<()> {
        self.request(
            "ssap://system.notifications/createToast",
            Some(json!({ "message": message })),
        )
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn system_info(&self, keys: &[&str]) -> Result<Value> {
        self.request("ssap://system/getSystemInfo", Some(json!({ "keys": keys })))
            .await
    }

    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn system_settings(&self, category: &str, keys: &[&str]) -> Result<SystemSettings> {
        decode(
            self.request(
                "ssap://settings/getSystemSettings",
                Some(json!({ "category": category, "keys": keys })),
            )
            .await?,
        )
    }

    /// Write one system setting (`"backlight"`, `"contrast"`, ...) in the
    /// given category via the settings service.
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn set_system_setting(&self, key: &str, value: Value, category: &str) -> Result<()> {
        self.execute_luna(
            "luna://com.webos.settingsservice/setSystemSettings",
            json!({ "category": category, "settings": { key: value } }),
        )
        .await
    }

    /// Write one config flag via the config service (used for picture
    /// options that never got an ssap endpoint).
    ///
    /// # Errors
    ///
    /// Any transport or TV failure for the call.
    pub async fn set_config(&self, key: &str, value: Value) -> Result<()> {
        self.execute_luna(
            "luna://com.webos.service.config/setConfigs",
            json!({ "configs": { key: value } }),
        )
        .await
    }

    /// `luna://` endpoints are not directly callable from a paired client.
    /// The established workaround is an invisible alert whose close hook
    /// fires the luna call with system privileges; the alert is dismissed
    /// immediately afterwards.
    async fn execute_luna(&self, luna_uri: &str, params: Value) -> Result<()> {
        let payload = json!({
            "message": "Applying...",
            "buttons": [ { "label": "", "onClick": luna_uri, "params": params.clone() } ],
            "onclose": { "uri": luna_uri, "params": params.clone() },
            "onfail": { "uri": luna_uri, "params": params },
        });
        let alert: AlertCreated = decode(
            self.request("ssap://system.notifications/createAlert", Some(payload))
                .await?,
        )?;
        if let Some(alert_id) = alert.alert_id {
            self.request(
                "ssap://system.notifications/closeAlert",
                Some(json!({ "alertId": alert_id })),
            )
            .await?;
        }
        Ok(())
    }

    // ---- subscriptions --------------------------------------------------

    /// Volume changes as a typed stream; the first delivery is the current
    /// state.
    ///
    /// # Errors
    ///
    /// Returns the write failure if the subscribe frame could not be sent.
    pub async fn subscribe_volume(&self) -> Result<TypedSubscription<VolumeStatus>> {
        let inner = self.link.subscribe("ssap://audio/getVolume", None).await?;
        Ok(TypedSubscription::new(inner))
    }

    /// Power-state transitions (`Active`, `Active Standby`, `Suspend`, ...)
    /// as a typed stream.
    ///
    /// # Errors
    ///
    /// Returns the write failure if the subscribe frame could not be sent.
    pub async fn subscribe_power_state(&self) -> Result<TypedSubscription<PowerState>> {
        let inner = self
            .link
            .subscribe("ssap://com.webos.service.tvpower/power/getPowerState", None)
            .await?;
        Ok(TypedSubscription::new(inner))
    }

    /// Picture-setting changes for the given keys (defaults to contrast and
    /// backlight, the two a preset engine cares about).
    ///
    /// # Errors
    ///
    /// Returns the write failure if the subscribe frame could not be sent.
    pub async fn subscribe_picture_settings(
        &self,
        keys: &[&str],
    ) -> Result<TypedSubscription<SystemSettings>> {
        let keys: Vec<&str> = if keys.is_empty() {
            vec!["contrast", "backlight"]
        } else {
            keys.to_vec()
        };
        let inner = self
            .link
            .subscribe(
                "ssap://settings/getSystemSettings",
                Some(json!({ "category": "picture", "keys": keys })),
            )
            .await?;
        Ok(TypedSubscription::new(inner))
    }

    // ---- pointer --------------------------------------------------------

    /// The pointer/mouse sub-link, created lazily on first use. The TV
    /// hands out a one-shot socket URL; the link lives independently of the
    /// control link and is recreated if it went away.
    ///
    /// # Errors
    ///
    /// Any failure requesting the socket path or connecting to it.
    pub async fn pointer(&self) -> Result<PointerLink> {
        let mut guard = self.pointer.lock().await;
        if let Some(pointer) = guard.as_ref()
            && !pointer.is_closed()
        {
            return Ok(pointer.clone());
        }
        let socket: PointerSocket = decode(
            self.request(
                "ssap://com.webos.service.networkinput/getPointerInputSocket",
                Some(json!({})),
            )
            .await?,
        )?;
        let pointer = PointerLink::connect(&socket.socket_path).await?;
        *guard = Some(pointer.clone());
        Ok(pointer)
    }

    // ---------------------------------------------------------------------

    async fn request(&self, uri: &str, payload: Option<Value>) -> Result<Value> {
        let payload = self.link.request(uri, payload).await?;
        ensure_return_value(&payload)?;
        Ok(payload)
    }
}

/// A [`Subscription`] whose payloads decode into `T`. Pushes that fail to
/// decode are logged and skipped rather than ending the stream.
pub struct TypedSubscription<T> {
    inner: Subscription,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> TypedSubscription<T> {
    fn new(inner: Subscription) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> &RequestId {
        self.inner.id()
    }

    /// Next decoded update, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<T> {
        while let Some(value) = self.inner.next().await {
            match serde_json::from_value(value) {
                Ok(update) => return Some(update),
                Err(e) => warn!("skipping undecodable push: {e}"),
            }
        }
        None
    }

    /// Cancel the subscription.
    ///
    /// # Errors
    ///
    /// Returns the write failure if the unsubscribe frame could not be sent
    /// over a live link.
    pub async fn unsubscribe(self) -> Result<()> {
        self.inner.unsubscribe().await
    }
}

/// TVs report command failure inside a successful response frame via
/// `returnValue: false` plus an `errorText`.
fn ensure_return_value(payload: &Value) -> Result<()> {
    if payload.get("returnValue") == Some(&Value::Bool(false)) {
        let text = payload
            .get("errorText")
            .and_then(Value::as_str)
            .unwrap_or("command failed");
        return Err(Error::Tv(text.to_string()));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        debug!("payload decode failed: {e}");
        Error::UnexpectedResponse
    })
}

fn sorted_apps(mut apps: Vec<AppEntry>) -> Vec<AppEntry> {
    apps.sort_by(|a, b| a.title.cmp(&b.title));
    apps
}
