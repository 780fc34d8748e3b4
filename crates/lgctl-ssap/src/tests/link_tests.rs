//! Correlator and subscription behavior on a live link.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use super::fixtures::{read_frame, send_json, send_response, spawn_tv};
use crate::error::Error;
use crate::link::Link;

#[tokio::test]
async fn test_concurrent_requests_resolve_by_id_regardless_of_order() {
    let addr = spawn_tv(|mut ws| async move {
        let mut frames = Vec::new();
        for _ in 0..3 {
            frames.push(read_frame(&mut ws).await);
        }
        // Answer in reverse arrival order.
        for frame in frames.iter().rev() {
            send_response(&mut ws, &frame["id"], json!({ "echo": frame["uri"] })).await;
        }
        let _ = ws.next().await;
    })
    .await;

    let link = Link::connect(&format!("ws://{addr}")).await.unwrap();
    let (a, b, c) = tokio::join!(
        link.request("ssap://test/a", None),
        link.request("ssap://test/b", None),
        link.request("ssap://test/c", None),
    );
    assert_eq!(a.unwrap()["echo"], "ssap://test/a");
    assert_eq!(b.unwrap()["echo"], "ssap://test/b");
    assert_eq!(c.unwrap()["echo"], "ssap://test/c");
    link.close().await;
}

#[tokio::test]
async fn test_close_resolves_outstanding_waiters_and_ends_subscriptions() {
    let addr = spawn_tv(|mut ws| async move {
        // Swallow everything, never answer.
        while ws.next().await.is_some() {}
    })
    .await;

    let link = Arc::new(Link::connect(&format!("ws://{addr}")).await.unwrap());
    let mut sub = link.subscribe("ssap://audio/getVolume", None).await.unwrap();

    let first = Arc::clone(&link);
    let first = tokio::spawn(async move { first.request("ssap://test/a", None).await });
    let second = Arc::clone(&link);
    let second = tokio::spawn(async move { second.request("ssap://test/b", None).await });

    // Let both requests hit the wire before closing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    link.close().await;

    assert!(matches!(first.await.unwrap(), Err(Error::Closed)));
    assert!(matches!(second.await.unwrap(), Err(Error::Closed)));
    assert!(sub.next().await.is_none(), "subscription should have ended");

    // Idempotent: a second close neither errors nor re-resolves anything.
    link.close().await;
    assert!(link.is_closed());

    let err = link.request("ssap://test/c", None).await.unwrap_err();
    assert!(matches!(err, Error::Closed));
}

#[tokio::test]
async fn test_unmatched_frames_are_dropped_not_fatal() {
    let addr = spawn_tv(|mut ws| async move {
        // Unsolicited frames: stale id, missing id, unknown type.
        send_json(
            &mut ws,
            &json!({ "type": "response", "id": "999", "payload": {} }),
        )
        .await;
        send_json(&mut ws, &json!({ "type": "response", "payload": {} })).await;
        send_json(&mut ws, &json!({ "type": "banter", "id": "7" })).await;

        let frame = read_frame(&mut ws).await;
        send_response(&mut ws, &frame["id"], json!({ "ok": true })).await;
        let _ = ws.next().await;
    })
    .await;

    let link = Link::connect(&format!("ws://{addr}")).await.unwrap();
    let payload = link.request("ssap://test/ping", None).await.unwrap();
    assert_eq!(payload["ok"], true);
    link.close().await;
}

#[tokio::test]
async fn test_request_timeout_frees_the_waiter() {
    let addr = spawn_tv(|mut ws| async move {
        let slow = read_frame(&mut ws).await;
        // Ignore the first request until the second arrives.
        let fast = read_frame(&mut ws).await;
        send_response(&mut ws, &fast["id"], json!({ "ok": true })).await;
        // The late answer must be dropped as unmatched, not crash anything.
        send_response(&mut ws, &slow["id"], json!({ "late": true })).await;
        let _ = ws.next().await;
    })
    .await;

    let link = Link::connect_with_timeout(&format!("ws://{addr}"), Duration::from_millis(200))
        .await
        .unwrap();

    let err = link.request("ssap://test/slow", None).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));

    let payload = link.request("ssap://test/fast", None).await.unwrap();
    assert_eq!(payload["ok"], true);
    link.close().await;
}

#[tokio::test]
async fn test_error_frame_resolves_the_matching_waiter() {
    let addr = spawn_tv(|mut ws| async move {
        let frame = read_frame(&mut ws).await;
        send_json(
            &mut ws,
            &json!({
                "type": "error",
                "id": frame["id"],
                "error": "401 insufficient permissions",
                "payload": {}
            }),
        )
        .await;
        let _ = ws.next().await;
    })
    .await;

    let link = Link::connect(&format!("ws://{addr}")).await.unwrap();
    let err = link.request("ssap://test/denied", None).await.unwrap_err();
    assert!(matches!(err, Error::Tv(ref text) if text.contains("401")));
    link.close().await;
}

#[tokio::test]
async fn test_subscription_delivers_each_push_until_unsubscribed() {
    let addr = spawn_tv(|mut ws| async move {
        let sub = read_frame(&mut ws).await;
        assert_eq!(sub["type"], "subscribe");
        for volume in [1, 2, 3] {
            send_response(&mut ws, &sub["id"], json!({ "volume": volume })).await;
        }

        let unsub = read_frame(&mut ws).await;
        assert_eq!(unsub["type"], "unsubscribe");
        assert_eq!(unsub["id"], sub["id"]);

        // A push after unsubscribe must go nowhere.
        send_response(&mut ws, &sub["id"], json!({ "volume": 4 })).await;

        let ping = read_frame(&mut ws).await;
        send_response(&mut ws, &ping["id"], json!({ "pong": true })).await;
        let _ = ws.next().await;
    })
    .await;

    let link = Link::connect(&format!("ws://{addr}")).await.unwrap();
    let mut sub = link.subscribe("ssap://audio/getVolume", None).await.unwrap();
    for expected in [1, 2, 3] {
        let update = sub.next().await.unwrap();
        assert_eq!(update["volume"], expected);
    }
    sub.unsubscribe().await.unwrap();

    // The link is still healthy and the stale push was dropped.
    let payload = link.request("ssap://test/ping", None).await.unwrap();
    assert_eq!(payload["pong"], true);
    link.close().await;
}

#[tokio::test]
async fn test_concurrent_subscriptions_are_independent() {
    let addr = spawn_tv(|mut ws| async move {
        let volume = read_frame(&mut ws).await;
        let power = read_frame(&mut ws).await;
        send_response(&mut ws, &power["id"], json!({ "state": "Active" })).await;
        send_response(&mut ws, &volume["id"], json!({ "volume": 12 })).await;
        send_response(&mut ws, &power["id"], json!({ "state": "Suspend" })).await;
        let _ = ws.next().await;
    })
    .await;

    let link = Link::connect(&format!("ws://{addr}")).await.unwrap();
    let mut volume = link.subscribe("ssap://audio/getVolume", None).await.unwrap();
    let mut power = link
        .subscribe("ssap://com.webos.service.tvpower/power/getPowerState", None)
        .await
        .unwrap();

    assert_eq!(power.next().await.unwrap()["state"], "Active");
    assert_eq!(volume.next().await.unwrap()["volume"], 12);
    assert_eq!(power.next().await.unwrap()["state"], "Suspend");
    link.close().await;
}

#[tokio::test]
async fn test_peer_close_flushes_waiters() {
    let addr = spawn_tv(|mut ws| async move {
        let _ = read_frame(&mut ws).await;
        // Close without answering.
        let _ = ws.send(Message::Close(None)).await;
    })
    .await;

    let link = Link::connect(&format!("ws://{addr}")).await.unwrap();
    let err = link.request("ssap://test/a", None).await.unwrap_err();
    assert!(matches!(err, Error::Closed));
}

#[tokio::test]
async fn test_refused_connection_is_a_recoverable_connect_error() {
    // Bind and immediately drop a listener to get a port nobody serves.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = Link::connect(&format!("ws://{addr}")).await.unwrap_err();
    assert!(matches!(err, Error::Connect(_)));
}
