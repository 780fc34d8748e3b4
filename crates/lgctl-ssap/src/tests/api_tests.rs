//! Command facade scenarios against a mock TV.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use super::fixtures::{accept_pairing, read_frame, send_response, spawn_tv};
use crate::api::{TvClient, TvClientOptions};
use crate::error::Error;

fn options_for(addr: SocketAddr, dir: &Path) -> TvClientOptions {
    TvClientOptions {
        connect_attempts: 1,
        retry_delay: Duration::from_millis(10),
        request_timeout: Duration::from_secs(2),
        pairing_timeout: Duration::from_secs(2),
        data_dir: Some(dir.to_path_buf()),
        control_port: addr.port(),
    }
}

async fn connect_client(addr: SocketAddr, dir: &Path) -> TvClient {
    TvClient::connect_with("127.0.0.1", options_for(addr, dir))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_get_volume_and_muted_sentinel() {
    let addr = spawn_tv(|mut ws| async move {
        accept_pairing(&mut ws).await;

        let req = read_frame(&mut ws).await;
        assert_eq!(req["uri"], "ssap://audio/getVolume");
        send_response(
            &mut ws,
            &req["id"],
            json!({ "volume": 7, "muted": false, "returnValue": true }),
        )
        .await;

        let req = read_frame(&mut ws).await;
        send_response(
            &mut ws,
            &req["id"],
            json!({ "volume": 7, "muted": true, "returnValue": true }),
        )
        .await;
        let _ = ws.next().await;
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let tv = connect_client(addr, dir.path()).await;
    assert_eq!(tv.get_volume().await.unwrap(), 7);
    assert_eq!(tv.get_volume().await.unwrap(), -1, "muted reports -1");
    tv.close().await;
}

#[tokio::test]
async fn test_set_volume_rejects_out_of_range_locally() {
    let addr = spawn_tv(|mut ws| async move {
        accept_pairing(&mut ws).await;
        let _ = ws.next().await;
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let tv = connect_client(addr, dir.path()).await;
    let err = tv.set_volume(130).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    tv.close().await;
}

#[tokio::test]
async fn test_return_value_false_surfaces_as_tv_error() {
    let addr = spawn_tv(|mut ws| async move {
        accept_pairing(&mut ws).await;
        let req = read_frame(&mut ws).await;
        assert_eq!(req["uri"], "ssap://tv/switchInput");
        send_response(
            &mut ws,
            &req["id"],
            json!({ "returnValue": false, "errorText": "no such input" }),
        )
        .await;
        let _ = ws.next().await;
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let tv = connect_client(addr, dir.path()).await;
    let err = tv.set_input("HDMI_9").await.unwrap_err();
    assert!(matches!(err, Error::Tv(ref text) if text == "no such input"));
    tv.close().await;
}

#[tokio::test]
async fn test_launch_app_sends_id_and_returns_session() {
    let addr = spawn_tv(|mut ws| async move {
        accept_pairing(&mut ws).await;
        let req = read_frame(&mut ws).await;
        assert_eq!(req["uri"], "ssap://system.launcher/launch");
        assert_eq!(req["payload"]["id"], "netflix");
        send_response(
            &mut ws,
            &req["id"],
            json!({ "returnValue": true, "sessionId": "sess-1" }),
        )
        .await;
        let _ = ws.next().await;
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let tv = connect_client(addr, dir.path()).await;
    let session = tv.launch_app("netflix").await.unwrap();
    assert_eq!(session.as_deref(), Some("sess-1"));
    tv.close().await;
}

#[tokio::test]
async fn test_apps_are_cached_per_device() {
    let addr = spawn_tv(|mut ws| async move {
        accept_pairing(&mut ws).await;
        // Exactly one listApps is served; a second one would hang the
        // client into a timeout and fail the test.
        let req = read_frame(&mut ws).await;
        assert_eq!(req["uri"], "ssap://com.webos.applicationManager/listApps");
        send_response(
            &mut ws,
            &req["id"],
            json!({
                "returnValue": true,
                "apps": [
                    { "id": "netflix", "title": "Netflix" },
                    { "id": "airplay", "title": "AirPlay" }
                ]
            }),
        )
        .await;
        let _ = ws.next().await;
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let tv = connect_client(addr, dir.path()).await;

    let first = tv.apps(false).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].title, "AirPlay", "sorted by title");

    let cache = dir.path().join("127.0.0.1_apps.json");
    assert!(cache.exists(), "app list should be cached on disk");

    let second = tv.apps(false).await.unwrap();
    assert_eq!(second.len(), 2, "second call is served from the cache");
    tv.close().await;
}

#[tokio::test]
async fn test_set_system_setting_goes_through_alert_bridge() {
    let addr = spawn_tv(|mut ws| async move {
        accept_pairing(&mut ws).await;

        let alert = read_frame(&mut ws).await;
        assert_eq!(alert["uri"], "ssap://system.notifications/createAlert");
        let button = &alert["payload"]["buttons"][0];
        assert_eq!(
            button["onClick"],
            "luna://com.webos.settingsservice/setSystemSettings"
        );
        assert_eq!(button["params"]["category"], "picture");
        assert_eq!(button["params"]["settings"]["backlight"], 80);
        send_response(
            &mut ws,
            &alert["id"],
            json!({ "returnValue": true, "alertId": "alert-7" }),
        )
        .await;

        let close = read_frame(&mut ws).await;
        assert_eq!(close["uri"], "ssap://system.notifications/closeAlert");
        assert_eq!(close["payload"]["alertId"], "alert-7");
        send_response(&mut ws, &close["id"], json!({ "returnValue": true })).await;
        let _ = ws.next().await;
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let tv = connect_client(addr, dir.path()).await;
    tv.set_system_setting("backlight", json!(80), "picture")
        .await
        .unwrap();
    tv.close().await;
}

#[tokio::test]
async fn test_power_state_subscription_is_typed_and_ordered() {
    let addr = spawn_tv(|mut ws| async move {
        accept_pairing(&mut ws).await;
        let sub = read_frame(&mut ws).await;
        assert_eq!(sub["type"], "subscribe");
        assert_eq!(
            sub["uri"],
            "ssap://com.webos.service.tvpower/power/getPowerState"
        );
        for state in ["Active", "Active Standby", "Suspend"] {
            send_response(
                &mut ws,
                &sub["id"],
                json!({ "state": state, "returnValue": true }),
            )
            .await;
        }
        let _ = ws.next().await;
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let tv = connect_client(addr, dir.path()).await;
    let mut updates = tv.subscribe_power_state().await.unwrap();
    for expected in ["Active", "Active Standby", "Suspend"] {
        let state = updates.next().await.unwrap();
        assert_eq!(state.state.as_deref(), Some(expected));
    }
    tv.close().await;
}

/// Drops the first `drops` TCP connections before the websocket handshake
/// completes, then behaves like a paired TV.
async fn spawn_flaky_tv(drops: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for _ in 0..drops {
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        }
        if let Ok((stream, _)) = listener.accept().await
            && let Ok(mut ws) = accept_async(stream).await
        {
            accept_pairing(&mut ws).await;
            while ws.next().await.is_some() {}
        }
    });
    addr
}

#[tokio::test]
async fn test_connect_retries_until_the_tv_is_ready() {
    let addr = spawn_flaky_tv(2).await;
    let dir = tempfile::tempdir().unwrap();

    let mut options = options_for(addr, dir.path());
    options.connect_attempts = 3;

    let tv = TvClient::connect_with("127.0.0.1", options).await.unwrap();
    assert!(!tv.is_closed());
    tv.close().await;
}

#[tokio::test]
async fn test_connect_gives_up_after_the_retry_bound() {
    let addr = spawn_flaky_tv(10).await;
    let dir = tempfile::tempdir().unwrap();

    let mut options = options_for(addr, dir.path());
    options.connect_attempts = 2;

    let err = TvClient::connect_with("127.0.0.1", options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connect(_)));
}
