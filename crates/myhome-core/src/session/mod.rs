// ── Gateway session ──
//
// One live connection set to one gateway: an event connection owned by
// the listening task and one command connection per sending worker. All
// inbound messages, including replies collected by the workers, pass
// through the listening task before reaching observers and the inbound
// queue.

mod queue;

use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use myhome_api::connection::tcp_connect;
use myhome_api::{Command, Connection, Message, SessionKind};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::error::CoreError;
use crate::model::MacAddress;

pub use queue::InboundQueue;

// ── State ───────────────────────────────────────────────────────────

/// Lifecycle of a [`GatewaySession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Closing,
    Failed,
}

/// Outcome of the most recent authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    /// The gateway demanded a password and none is configured.
    PasswordRequired,
    Authenticated,
    /// The gateway rejected the configured password.
    Failed,
}

/// Receives every decoded inbound message, on the listening task.
///
/// Implementations must not block.
pub trait MessageObserver: Send + Sync {
    fn on_message(&self, message: &Arc<Message>);
}

type Reply = Result<Vec<Arc<Message>>, CoreError>;

/// A command queued for the sending workers.
struct CommandEnvelope {
    frame: String,
    /// Status or dimension request; an unanswered one fails only itself.
    request: bool,
    response_tx: Option<oneshot::Sender<Reply>>,
}

// ── GatewaySession ──────────────────────────────────────────────────

/// Cheaply cloneable handle to one gateway session.
#[derive(Clone)]
pub struct GatewaySession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: GatewayConfig,
    state: watch::Sender<SessionState>,
    auth: watch::Sender<AuthState>,
    inbound: Arc<InboundQueue>,
    command_tx: Mutex<Option<mpsc::Sender<CommandEnvelope>>>,
    /// Token of the current connection set; replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes `connect` and `close`.
    lifecycle: Mutex<()>,
    observers: ArcSwap<Vec<Weak<dyn MessageObserver>>>,
}

impl GatewaySession {
    /// Create a session. Does NOT connect: call [`connect()`](Self::connect).
    pub fn new(config: GatewayConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (auth, _) = watch::channel(AuthState::Unauthenticated);
        let inbound = Arc::new(InboundQueue::new(config.inbound_capacity));

        Self {
            inner: Arc::new(SessionInner {
                config,
                state,
                auth,
                inbound,
                command_tx: Mutex::new(None),
                cancel_child: Mutex::new(CancellationToken::new()),
                task_handles: Mutex::new(Vec::new()),
                lifecycle: Mutex::new(()),
                observers: ArcSwap::from_pointee(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn mac(&self) -> &MacAddress {
        &self.inner.config.mac
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open and authenticate the event connection and every command
    /// connection, then spawn the listening and sending tasks.
    ///
    /// A no-op on a session that is already `Ready`.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.state() == SessionState::Ready {
            debug!(gateway = %self.mac(), "session already ready");
            return Ok(());
        }

        // Leftovers of a failed session.
        self.join_tasks().await;

        let (event, commands) = match self.open_connections().await {
            Ok(connections) => connections,
            Err(e) => {
                let auth = match e {
                    myhome_api::Error::PasswordRequired => AuthState::PasswordRequired,
                    myhome_api::Error::PasswordError => AuthState::Failed,
                    _ => *self.inner.auth.borrow(),
                };
                self.inner.auth.send_replace(auth);
                self.inner.state.send_replace(SessionState::Failed);
                warn!(gateway = %self.mac(), error = %e, "gateway connection failed");
                return Err(e.into());
            }
        };
        self.inner.auth.send_replace(AuthState::Authenticated);

        let cancel = CancellationToken::new();
        *self.inner.cancel_child.lock().await = cancel.clone();

        let (command_tx, command_rx) = mpsc::channel(self.inner.config.outbound_capacity.max(1));
        let command_rx = Arc::new(Mutex::new(command_rx));
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        *self.inner.command_tx.lock().await = Some(command_tx);
        self.inner.state.send_replace(SessionState::Ready);

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(listening_loop(
            Arc::clone(&self.inner),
            event,
            reply_rx,
            cancel.clone(),
        )));
        for (worker, connection) in commands.into_iter().enumerate() {
            handles.push(tokio::spawn(sending_loop(
                worker,
                connection,
                Arc::clone(&command_rx),
                reply_tx.clone(),
                Arc::clone(&self.inner),
                cancel.clone(),
            )));
        }

        info!(
            gateway = %self.mac(),
            host = %self.inner.config.host,
            workers = handles.len() - 1,
            "gateway session ready"
        );
        Ok(())
    }

    async fn open_connections(&self) -> Result<(Connection, Vec<Connection>), myhome_api::Error> {
        let options = self.inner.config.connect_options();
        let workers = self.inner.config.command_workers.max(1);

        self.inner.state.send_replace(SessionState::Connecting);
        let stream = tcp_connect(&options).await?;
        self.inner.state.send_replace(SessionState::Authenticating);
        let event = Connection::authenticate(stream, SessionKind::Event, &options).await?;
        debug!(gateway = %self.mac(), "event session established");

        let mut commands = Vec::with_capacity(workers);
        for worker in 0..workers {
            let stream = tcp_connect(&options).await?;
            commands.push(Connection::authenticate(stream, SessionKind::Command, &options).await?);
            debug!(gateway = %self.mac(), worker, "command session established");
        }
        Ok((event, commands))
    }

    /// Stop every task and drop the connections.
    ///
    /// Idempotent. Callers still waiting on [`execute`](Self::execute)
    /// receive an error.
    pub async fn close(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.state() == SessionState::Disconnected {
            return;
        }

        self.inner.state.send_replace(SessionState::Closing);
        self.inner.command_tx.lock().await.take();
        self.inner.cancel_child.lock().await.cancel();
        self.join_tasks().await;

        self.inner.auth.send_replace(AuthState::Unauthenticated);
        self.inner.state.send_replace(SessionState::Disconnected);
        debug!(gateway = %self.mac(), "gateway session closed");
    }

    async fn join_tasks(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "session task ended abnormally");
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue a command without waiting for the gateway's answer.
    pub async fn send(&self, command: &Command) -> Result<(), CoreError> {
        self.enqueue(command, None).await
    }

    /// Queue a command and wait for the gateway's ACK.
    ///
    /// Returns the messages the gateway sent before acknowledging;
    /// a NACK yields [`CoreError::Rejected`] and an unanswered status
    /// request [`CoreError::NoReply`].
    pub async fn execute(&self, command: &Command) -> Result<Vec<Arc<Message>>, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(command, Some(tx)).await?;
        rx.await.map_err(|_| self.not_ready())?
    }

    async fn enqueue(
        &self,
        command: &Command,
        response_tx: Option<oneshot::Sender<Reply>>,
    ) -> Result<(), CoreError> {
        if self.state() != SessionState::Ready {
            return Err(self.not_ready());
        }
        let frame = command.encode()?;
        let request = command.is_request();

        let command_tx = self
            .inner
            .command_tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| self.not_ready())?;
        command_tx
            .send(CommandEnvelope {
                frame,
                request,
                response_tx,
            })
            .await
            .map_err(|_| self.not_ready())
    }

    fn not_ready(&self) -> CoreError {
        CoreError::NotReady {
            state: self.state(),
        }
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to session state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn auth_state(&self) -> AuthState {
        *self.inner.auth.borrow()
    }

    /// The inbound queue; survives reconnects.
    pub fn messages(&self) -> Arc<InboundQueue> {
        Arc::clone(&self.inner.inbound)
    }

    /// Register an observer. Held weakly: it stops receiving messages
    /// once its last strong reference is dropped.
    pub fn add_observer(&self, observer: Weak<dyn MessageObserver>) {
        self.inner.observers.rcu(|current| {
            let mut next: Vec<_> = current
                .iter()
                .filter(|o| o.strong_count() > 0)
                .cloned()
                .collect();
            next.push(observer.clone());
            next
        });
    }
}

impl SessionInner {
    fn dispatch(&self, message: Arc<Message>) {
        for observer in self.observers.load().iter() {
            if let Some(observer) = observer.upgrade() {
                observer.on_message(&message);
            }
        }
        self.inbound.push(message);
    }

    /// Mark a ready session failed and stop its tasks.
    fn fail(&self, reason: &str, cancel: &CancellationToken) {
        let failed = self.state.send_if_modified(|state| {
            if *state == SessionState::Ready {
                *state = SessionState::Failed;
                true
            } else {
                false
            }
        });
        if failed {
            error!(gateway = %self.config.mac, reason, "gateway session failed");
        }
        cancel.cancel();
    }
}

// ── Background tasks ────────────────────────────────────────────────

async fn listening_loop(
    inner: Arc<SessionInner>,
    mut connection: Connection,
    mut replies: mpsc::UnboundedReceiver<Arc<Message>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(message) = replies.recv() => inner.dispatch(message),
            frame = connection.next_frame() => match frame {
                Ok(Some(raw)) => match Message::parse(&raw) {
                    Ok(message) => inner.dispatch(Arc::new(message)),
                    Err(e) => warn!(error = %e, "skipping undecodable event frame"),
                },
                Ok(None) => {
                    inner.fail("event connection closed by gateway", &cancel);
                    break;
                }
                Err(e) => {
                    inner.fail(&e.to_string(), &cancel);
                    break;
                }
            },
        }
    }
    debug!("listening task exited");
}

enum Exchange {
    Acked(Vec<Arc<Message>>),
    Nacked(Vec<Arc<Message>>),
    /// Neither ACK nor NACK arrived within the response timeout.
    Silent,
    Cancelled,
}

async fn sending_loop(
    worker: usize,
    mut connection: Connection,
    queue: Arc<Mutex<mpsc::Receiver<CommandEnvelope>>>,
    replies: mpsc::UnboundedSender<Arc<Message>>,
    inner: Arc<SessionInner>,
    cancel: CancellationToken,
) {
    let response_timeout = inner.config.response_timeout;
    loop {
        let envelope = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = async { queue.lock().await.recv().await } => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let CommandEnvelope {
            frame,
            request,
            response_tx,
        } = envelope;
        let reply = match exchange(&mut connection, &frame, response_timeout, &cancel).await {
            Ok(Exchange::Acked(responses)) => {
                forward(&replies, &responses);
                Ok(responses)
            }
            Ok(Exchange::Nacked(responses)) => {
                debug!(worker, %frame, "gateway rejected command");
                forward(&replies, &responses);
                Err(CoreError::Rejected { command: frame })
            }
            Ok(Exchange::Silent) if request => {
                debug!(worker, %frame, "no reply to request, reopening command connection");
                let reopened = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    reopened = reopen(&inner) => Some(reopened),
                };
                match reopened {
                    Some(Ok(fresh)) => connection = fresh,
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        inner.fail(&reason, &cancel);
                        respond(response_tx, Err(CoreError::TransportFailure { reason }));
                        break;
                    }
                    None => {
                        respond(response_tx, Err(CoreError::NotReady {
                            state: SessionState::Closing,
                        }));
                        break;
                    }
                }
                Err(CoreError::NoReply {
                    command: frame,
                    timeout_ms: millis(response_timeout),
                })
            }
            Ok(Exchange::Silent) => {
                let reason = format!(
                    "no reply to {frame} within {}ms",
                    millis(response_timeout)
                );
                inner.fail(&reason, &cancel);
                respond(response_tx, Err(CoreError::TransportFailure { reason }));
                break;
            }
            Ok(Exchange::Cancelled) => {
                respond(response_tx, Err(CoreError::NotReady {
                    state: SessionState::Closing,
                }));
                break;
            }
            Err(e) => {
                let reason = e.to_string();
                inner.fail(&reason, &cancel);
                respond(response_tx, Err(CoreError::TransportFailure { reason }));
                break;
            }
        };
        respond(response_tx, reply);
    }
    debug!(worker, "sending task exited");
}

/// Write one frame, then collect replies until the gateway's ACK or NACK.
async fn exchange(
    connection: &mut Connection,
    frame: &str,
    response_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Exchange, CoreError> {
    connection.send_frame(frame).await?;

    let deadline = tokio::time::sleep(response_timeout);
    tokio::pin!(deadline);
    let mut responses = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(Exchange::Cancelled),
            () = &mut deadline => return Ok(Exchange::Silent),
            next = connection.next_frame() => next?,
        };
        let Some(raw) = next else {
            return Err(CoreError::TransportFailure {
                reason: "command connection closed by gateway".into(),
            });
        };
        match Message::parse(&raw) {
            Ok(message) if message.is_ack() => return Ok(Exchange::Acked(responses)),
            Ok(message) if message.is_nack() => return Ok(Exchange::Nacked(responses)),
            Ok(message) => responses.push(Arc::new(message)),
            Err(e) => warn!(error = %e, "skipping undecodable reply frame"),
        }
    }
}

/// Replace a worker's command connection after an unanswered request.
///
/// A late ACK on the old connection would otherwise be taken as the
/// answer to the next command.
async fn reopen(inner: &SessionInner) -> Result<Connection, myhome_api::Error> {
    let options = inner.config.connect_options();
    let stream = tcp_connect(&options).await?;
    Connection::authenticate(stream, SessionKind::Command, &options).await
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn forward(replies: &mpsc::UnboundedSender<Arc<Message>>, responses: &[Arc<Message>]) {
    for message in responses {
        let _ = replies.send(Arc::clone(message));
    }
}

fn respond(response_tx: Option<oneshot::Sender<Reply>>, reply: Reply) {
    if let Some(tx) = response_tx {
        let _ = tx.send(reply);
    }
}
