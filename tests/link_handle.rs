mod common;

use common::{sent_messages, sent_updates, MockTransport, URL};
use opencontroller_link::codec::{ControlUpdate, FrameEncoder, WireMessage};
use opencontroller_link::config::LinkConfig;
use opencontroller_link::link::{ConnectionState, LinkHandle, CLOSE_NORMAL};
use opencontroller_link::scheduler::SubmitOptions;
use opencontroller_link::LinkError;
use std::time::Duration;

fn spawn(transport: MockTransport) -> LinkHandle {
    LinkHandle::spawn_with(LinkConfig::default(), FrameEncoder::binary(), move |events| {
        transport.with_events(events)
    })
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_handle_connects_sends_and_shuts_down() {
    let transport = MockTransport::new();
    let log = transport.log();
    let mut link = spawn(transport);

    link.connect(URL).await.unwrap();
    link.subscribe()
        .wait_for(|status| status.connected)
        .await
        .unwrap();

    link.submit_value(10, 1.0, SubmitOptions::priority()).unwrap();
    let stats = link.stats().await.unwrap();
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(
        sent_updates(&log.lock().sent),
        vec![ControlUpdate::new(10, 1.0)]
    );

    link.shutdown().await.unwrap();
    assert_eq!(
        log.lock().closes,
        vec![(CLOSE_NORMAL, "Client disconnecting".to_string())]
    );
    assert_eq!(link.status().state, ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_handle_coalesces_burst() {
    let transport = MockTransport::new();
    let log = transport.log();
    let link = spawn(transport);
    link.connect(URL).await.unwrap();
    link.subscribe()
        .wait_for(|status| status.connected)
        .await
        .unwrap();

    for value in [0.1, 0.2, 0.3, 0.4, 0.5] {
        link.submit_value(1, value, SubmitOptions::default()).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = link.stats().await.unwrap();
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(stats.messages_coalesced, 4);
    assert_eq!(
        sent_updates(&log.lock().sent),
        vec![ControlUpdate::new(1, 0.5)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_handle_sends_heartbeat() {
    let transport = MockTransport::new();
    let log = transport.log();
    let link = spawn(transport);
    link.connect(URL).await.unwrap();
    link.subscribe()
        .wait_for(|status| status.connected)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    link.stats().await.unwrap();

    let messages = sent_messages(&log.lock().sent);
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], WireMessage::Ping { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_handle_gives_up_after_max_attempts() {
    let transport = MockTransport::new();
    let log = transport.log();
    log.lock().refuse = true;
    let link = spawn(transport);

    link.connect(URL).await.unwrap();
    let status = link
        .subscribe()
        .wait_for(|status| status.state == ConnectionState::Failed)
        .await
        .unwrap()
        .clone();

    assert_eq!(status.reconnect_attempt, 10);
    assert!(!status.connected);
    assert_eq!(log.lock().opens.len(), 11);
    assert_eq!(link.stats().await.unwrap().reconnect_attempts_total, 10);
}

#[tokio::test]
async fn test_spawn_rejects_invalid_config() {
    let config = LinkConfig {
        queue_capacity: 0,
        ..LinkConfig::default()
    };
    let result =
        LinkHandle::spawn_with(config, FrameEncoder::binary(), |_events| MockTransport::new());
    assert!(matches!(result, Err(LinkError::Config(_))));
}
