// In-process fake gateway for session tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use myhome_api::FrameCodec;
use myhome_api::connection::{ACK, NACK};
use myhome_core::{GatewayConfig, MacAddress};
use secrecy::SecretString;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

pub const MAC: &str = "00:03:50:1b:1c:7d";

/// Frames the fake sends back for one command frame.
pub type Responder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

pub enum EventAction {
    Frame(String),
    Close,
}

/// OPEN-password challenge the fake issues when built with [`FakeGateway::with_password`].
pub const NONCE: &str = "603356072";
pub const PASSWORD: &str = "12345";
const NONCE_ANSWER: &str = "*#25280520##";

struct Shared {
    responder: Responder,
    received: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<EventAction>>>,
    connections: AtomicUsize,
    require_password: bool,
}

pub struct FakeGateway {
    pub port: u16,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<EventAction>,
    task: JoinHandle<()>,
}

impl FakeGateway {
    /// A gateway that acknowledges every command.
    pub async fn start() -> Self {
        Self::with_responder(Arc::new(|_: &str| vec![ACK.to_owned()])).await
    }

    pub async fn with_responder(responder: Responder) -> Self {
        Self::spawn(responder, false).await
    }

    pub async fn with_password() -> Self {
        Self::spawn(Arc::new(|_: &str| vec![ACK.to_owned()]), true).await
    }

    async fn spawn(responder: Responder, require_password: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (events, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            responder,
            received: Mutex::new(Vec::new()),
            events: Mutex::new(Some(events_rx)),
            connections: AtomicUsize::new(0),
            require_password,
        });

        let task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    shared.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, Arc::clone(&shared)));
                }
            })
        };

        Self {
            port,
            shared,
            events,
            task,
        }
    }

    pub fn config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::new("127.0.0.1", MacAddress::new(MAC).unwrap());
        config.port = self.port;
        config.connect_timeout = Duration::from_secs(2);
        config.response_timeout = Duration::from_millis(500);
        config
    }

    pub fn config_with_password(&self, password: &str) -> GatewayConfig {
        let mut config = self.config();
        config.password = Some(SecretString::from(password.to_owned()));
        config
    }

    /// Push a frame on the event session.
    pub fn emit(&self, frame: &str) {
        self.events.send(EventAction::Frame(frame.to_owned())).unwrap();
    }

    /// Close the event session from the gateway side.
    pub fn close_events(&self) {
        self.events.send(EventAction::Close).unwrap();
    }

    pub async fn received(&self) -> Vec<String> {
        self.shared.received.lock().await.clone()
    }

    /// Wait until at least `count` command frames arrived.
    pub async fn wait_for_commands(&self, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let received = self.received().await;
                if received.len() >= count {
                    return received;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>) {
    let mut framed = Framed::new(stream, FrameCodec::new());
    if framed.send(ACK).await.is_err() {
        return;
    }
    let Some(Ok(request)) = framed.next().await else {
        return;
    };

    if shared.require_password {
        framed.send(format!("*#{NONCE}##")).await.unwrap();
        let Some(Ok(answer)) = framed.next().await else {
            return;
        };
        if answer != NONCE_ANSWER {
            let _ = framed.send(NACK).await;
            return;
        }
    }
    if framed.send(ACK).await.is_err() {
        return;
    }

    match request.as_str() {
        "*99*1##" => {
            let Some(mut events) = shared.events.lock().await.take() else {
                // Later event sessions stay silent until the client leaves.
                while let Some(Ok(_)) = framed.next().await {}
                return;
            };
            while let Some(action) = events.recv().await {
                match action {
                    EventAction::Frame(frame) => {
                        if framed.send(frame).await.is_err() {
                            return;
                        }
                    }
                    EventAction::Close => return,
                }
            }
        }
        "*99*9##" => {
            while let Some(Ok(frame)) = framed.next().await {
                shared.received.lock().await.push(frame.clone());
                for reply in (shared.responder)(&frame) {
                    if framed.send(reply).await.is_err() {
                        return;
                    }
                }
            }
        }
        _ => {}
    }
}
