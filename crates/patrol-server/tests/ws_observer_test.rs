//! WebSocket observer integration tests.
//!
//! - Applied updates reach connected observers in order
//! - Rejected updates are never broadcast
//! - Closing the socket removes the observer from the hub

mod integration;
use integration::common::test_server::{TestServer, COMMAND, MEMBER};

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use patrol_hub::HubConfig;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_event(ws: &mut WsStream) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn post_update(client: &reqwest::Client, server: &TestServer, id: u64, lat: f64, lon: f64) -> StatusCode {
    client
        .post(server.url(&format!("/patrols/{id}/update")))
        .bearer_auth(MEMBER)
        .json(&json!({ "latitude": lat, "longitude": lon }))
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_observer_receives_updates_in_order() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let patrol: Value = client
        .post(server.url("/patrols/create"))
        .bearer_auth(COMMAND)
        .json(&json!({ "unit": "A1", "route_name": "north", "route": [[1.0, 1.0], [1.0, 1.1]] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = patrol["id"].as_u64().unwrap();

    let (mut ws, _) = connect_async(server.ws_url()).await.unwrap();
    assert!(server.wait_for_observers(1).await);

    assert_eq!(post_update(&client, &server, id, 1.0, 1.0003).await, StatusCode::OK);
    assert_eq!(post_update(&client, &server, id, 2.0, 2.0).await, StatusCode::OK);

    let first = next_event(&mut ws).await;
    assert_eq!(first["type"], "location_update");
    assert_eq!(first["patrol_id"], id);
    assert_eq!(first["unit"], "A1");
    assert_eq!(first["location"], json!([1.0, 1.0003]));
    assert_eq!(first["on_track"], true);
    assert!(first["timestamp"].is_string());

    let second = next_event(&mut ws).await;
    assert_eq!(second["location"], json!([2.0, 2.0]));
    assert_eq!(second["on_track"], false);
}

#[tokio::test]
async fn test_rejected_update_not_broadcast() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let (mut ws, _) = connect_async(server.ws_url()).await.unwrap();
    assert!(server.wait_for_observers(1).await);

    assert_eq!(post_update(&client, &server, 7, 1.0, 1.0).await, StatusCode::NOT_FOUND);

    let nothing = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(nothing.is_err(), "no event expected for a rejected update");
}

#[tokio::test]
async fn test_inbound_messages_ignored() {
    let server = TestServer::start().await;
    let (mut ws, _) = connect_async(server.ws_url()).await.unwrap();
    assert!(server.wait_for_observers(1).await);

    ws.send(Message::Text("hello".into())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(server.state().hub().observer_count(), 1);
}

#[tokio::test]
async fn test_disconnect_unregisters_observer() {
    let server = TestServer::start().await;

    let (mut first, _) = connect_async(server.ws_url()).await.unwrap();
    let (_second, _) = connect_async(server.ws_url()).await.unwrap();
    assert!(server.wait_for_observers(2).await);

    first.close(None).await.unwrap();
    assert!(server.wait_for_observers(1).await, "closed observer should be removed");
}

#[tokio::test]
async fn test_observer_limit() {
    let server = TestServer::start_with_hub(HubConfig {
        max_observers: 1,
        ..HubConfig::default()
    })
    .await;

    let (_ws, _) = connect_async(server.ws_url()).await.unwrap();
    assert!(server.wait_for_observers(1).await);

    let refused = connect_async(server.ws_url()).await;
    match refused {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 503);
        }
        Err(e) => panic!("expected HTTP 503 refusal, got {e}"),
        Ok(_) => panic!("second observer should have been refused"),
    }
}
