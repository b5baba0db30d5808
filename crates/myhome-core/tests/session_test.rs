#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeGateway, MAC, PASSWORD};
use myhome_api::connection::{ACK, NACK};
use myhome_core::{
    AuthState, Command, CoreError, GatewayConfig, GatewaySession, MacAddress, Message, SessionState,
};

fn session(config: GatewayConfig) -> GatewaySession {
    GatewaySession::new(config)
}

async fn next_message(session: &GatewaySession) -> Arc<Message> {
    tokio::time::timeout(Duration::from_secs(5), session.messages().recv())
        .await
        .unwrap()
}

async fn wait_for_state(session: &GatewaySession, wanted: SessionState) {
    let mut rx = session.watch_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == wanted))
        .await
        .unwrap()
        .unwrap();
}

// ── Lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_opens_event_and_command_sessions() {
    let gateway = FakeGateway::start().await;
    let session = session(gateway.config());
    assert_eq!(session.state(), SessionState::Disconnected);

    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.auth_state(), AuthState::Authenticated);
    assert_eq!(gateway.connections(), 2);

    // Already ready: no second handshake.
    session.connect().await.unwrap();
    assert_eq!(gateway.connections(), 2);

    session.close().await;
}

#[tokio::test]
async fn one_command_connection_per_worker() {
    let gateway = FakeGateway::start().await;
    let mut config = gateway.config();
    config.command_workers = 3;
    let session = session(config);

    session.connect().await.unwrap();
    assert_eq!(gateway.connections(), 4);
    session.close().await;
}

#[tokio::test]
async fn close_is_idempotent_and_allows_reconnect() {
    let gateway = FakeGateway::start().await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    session.close().await;
    session.close().await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.auth_state(), AuthState::Unauthenticated);

    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    session.close().await;
}

#[tokio::test]
async fn unreachable_gateway_fails_the_session() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = GatewayConfig::new("127.0.0.1", MacAddress::new(MAC).unwrap());
    config.port = port;
    let session = session(config);

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "{err:?}");
    assert_eq!(session.state(), SessionState::Failed);
}

// ── Authentication ───────────────────────────────────────────────────

#[tokio::test]
async fn password_gateway_accepts_the_right_password() {
    let gateway = FakeGateway::with_password().await;
    let session = session(gateway.config_with_password(PASSWORD));

    session.connect().await.unwrap();
    assert_eq!(session.auth_state(), AuthState::Authenticated);
    session.close().await;
}

#[tokio::test]
async fn missing_password_is_reported_distinctly() {
    let gateway = FakeGateway::with_password().await;
    let session = session(gateway.config());

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::PasswordRequired), "{err:?}");
    assert_eq!(session.auth_state(), AuthState::PasswordRequired);
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn wrong_password_is_reported_distinctly() {
    let gateway = FakeGateway::with_password().await;
    let session = session(gateway.config_with_password("54321"));

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::PasswordError), "{err:?}");
    assert_eq!(session.auth_state(), AuthState::Failed);
}

// ── Sending ──────────────────────────────────────────────────────────

#[tokio::test]
async fn send_while_disconnected_is_not_ready() {
    let config = GatewayConfig::new("192.0.2.1", MacAddress::new(MAC).unwrap());
    let session = session(config);

    let err = session
        .send(&Command::action("1", "1", "21"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CoreError::NotReady { state: SessionState::Disconnected }),
        "{err:?}"
    );
}

#[tokio::test]
async fn single_worker_preserves_order() {
    let gateway = FakeGateway::start().await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    for what in ["1", "0", "1"] {
        session.send(&Command::action("1", what, "21")).await.unwrap();
    }
    session.send(&Command::status_request("1", "21")).await.unwrap();

    let received = gateway.wait_for_commands(4).await;
    assert_eq!(received, vec!["*1*1*21##", "*1*0*21##", "*1*1*21##", "*#1*21##"]);
    session.close().await;
}

#[tokio::test]
async fn execute_collects_replies_and_forwards_them() {
    let gateway = FakeGateway::with_responder(Arc::new(|frame: &str| match frame {
        "*#1*21##" => vec!["*1*1*21##".to_owned(), ACK.to_owned()],
        _ => vec![ACK.to_owned()],
    }))
    .await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    let replies = session
        .execute(&Command::status_request("1", "21"))
        .await
        .unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].address(), Some("21"));

    // Replies reach the inbound queue through the listening task too.
    let forwarded = next_message(&session).await;
    assert_eq!(forwarded.kind(), "lighting");
    session.close().await;
}

#[tokio::test]
async fn nack_is_rejected() {
    let gateway = FakeGateway::with_responder(Arc::new(|_: &str| vec![NACK.to_owned()])).await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    let err = session
        .execute(&Command::status_request("25", "0"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Rejected { ref command } if command == "*#25*0##"), "{err:?}");
    // A rejection is not fatal.
    assert_eq!(session.state(), SessionState::Ready);
    session.close().await;
}

#[tokio::test]
async fn unanswered_request_fails_only_itself() {
    let gateway = FakeGateway::with_responder(Arc::new(|frame: &str| match frame {
        "*#25*0##" => Vec::new(),
        _ => vec![ACK.to_owned()],
    }))
    .await;
    let session = session(gateway.config());
    session.connect().await.unwrap();
    assert_eq!(gateway.connections(), 2);

    let err = session
        .execute(&Command::status_request("25", "0"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CoreError::NoReply { ref command, timeout_ms: 500 } if command == "*#25*0##"),
        "{err:?}"
    );
    assert!(!err.is_fatal());
    assert_eq!(session.state(), SessionState::Ready);
    // The worker replaced its command connection.
    assert_eq!(gateway.connections(), 3);

    session.execute(&Command::action("1", "1", "21")).await.unwrap();
    assert_eq!(
        gateway.received().await,
        vec!["*#25*0##".to_owned(), "*1*1*21##".to_owned()]
    );
    session.close().await;
}

#[tokio::test]
async fn silent_gateway_fails_the_session() {
    let gateway = FakeGateway::with_responder(Arc::new(|_: &str| Vec::new())).await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    // An unanswered action may or may not have run; the session gives up.
    let err = session
        .execute(&Command::action("1", "1", "21"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TransportFailure { .. }), "{err:?}");
    wait_for_state(&session, SessionState::Failed).await;

    let err = session.send(&Command::action("1", "0", "21")).await.unwrap_err();
    assert!(matches!(err, CoreError::NotReady { state: SessionState::Failed }));
    session.close().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn invalid_command_never_reaches_the_gateway() {
    let gateway = FakeGateway::start().await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    let err = session
        .send(&Command::action("1", "", "21"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCommand { .. }), "{err:?}");
    assert!(gateway.received().await.is_empty());
    session.close().await;
}

// ── Listening ────────────────────────────────────────────────────────

#[tokio::test]
async fn events_arrive_in_order_and_bad_frames_are_skipped() {
    let gateway = FakeGateway::start().await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    gateway.emit("*1*1*11##");
    gateway.emit("*1*1*1a##");
    gateway.emit("*2*1*41##");

    assert_eq!(next_message(&session).await.address(), Some("11"));
    assert_eq!(next_message(&session).await.address(), Some("41"));
    assert_eq!(session.state(), SessionState::Ready);
    session.close().await;
}

#[tokio::test]
async fn event_connection_loss_is_fatal() {
    let gateway = FakeGateway::start().await;
    let session = session(gateway.config());
    session.connect().await.unwrap();

    gateway.close_events();
    wait_for_state(&session, SessionState::Failed).await;

    // The caller reconnects explicitly.
    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    session.close().await;
}
