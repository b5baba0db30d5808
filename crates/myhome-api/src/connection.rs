//! Authenticated gateway connections.
//!
//! Every OpenWebNet connection starts with the same exchange:
//!
//! ```text
//! gateway  *#*1##                 ready
//! client   *99*1## | *99*9##      event or command session
//! gateway  *#*1##                 open gateway, done
//!        | *#NONCE##              OPEN password challenge
//!        | *98*1## | *98*2##      HMAC challenge (SHA-1 / SHA-256)
//! ```
//!
//! A gateway serves one session type per socket, so a client that both
//! listens and sends holds at least two connections.

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ring::rand::SystemRandom;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::auth::{self, HmacAlgorithm};
use crate::codec::FrameCodec;
use crate::error::{Error, Result};
use crate::message::{GatewayMessage, Message};

pub const ACK: &str = "*#*1##";
pub const NACK: &str = "*#*0##";
pub const DEFAULT_PORT: u16 = 20000;

// ── SessionKind ──────────────────────────────────────────────────────

/// The logical channel a connection is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Receives every bus event (`*99*1##`).
    Event,
    /// Sends commands and reads their replies (`*99*9##`).
    Command,
}

impl SessionKind {
    pub fn request_frame(self) -> &'static str {
        match self {
            Self::Event => "*99*1##",
            Self::Command => "*99*9##",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => f.write_str("event"),
            Self::Command => f.write_str("command"),
        }
    }
}

// ── ConnectOptions ───────────────────────────────────────────────────

/// Where and how to reach a gateway.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,
    /// Bound for TCP connect and, separately, for the handshake.
    pub connect_timeout: Duration,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            password: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout_ms: u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// One authenticated socket to the gateway.
pub struct Connection<S = TcpStream> {
    framed: Framed<S, FrameCodec>,
    kind: SessionKind,
}

impl Connection<TcpStream> {
    /// Connect over TCP and complete the handshake for `kind`.
    pub async fn open(options: &ConnectOptions, kind: SessionKind) -> Result<Self> {
        let stream = tcp_connect(options).await?;
        Self::authenticate(stream, kind, options).await
    }
}

/// Open the TCP socket only, bounded by `connect_timeout`.
pub async fn tcp_connect(options: &ConnectOptions) -> Result<TcpStream> {
    let address = options.address();
    debug!(%address, "connecting to gateway");

    let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(&address))
        .await
        .map_err(|_| options.timeout_error())?
        .map_err(|source| Error::Unreachable {
            address: address.clone(),
            source,
        })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Handshake over a connected stream, bounded by `connect_timeout`.
    pub async fn authenticate(stream: S, kind: SessionKind, options: &ConnectOptions) -> Result<Self> {
        tokio::time::timeout(
            options.connect_timeout,
            Self::establish(stream, kind, options.password.as_ref()),
        )
        .await
        .map_err(|_| options.timeout_error())?
    }

    /// Run the handshake over an already connected stream.
    pub async fn establish(stream: S, kind: SessionKind, password: Option<&SecretString>) -> Result<Self> {
        let mut framed = Framed::new(stream, FrameCodec::new());
        handshake(&mut framed, kind, password).await?;
        Ok(Self { framed, kind })
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Write one frame and flush it.
    pub async fn send_frame(&mut self, frame: &str) -> Result<()> {
        trace!(%frame, kind = %self.kind, "tx");
        self.framed.send(frame).await
    }

    /// Next raw frame; `None` once the gateway closed the socket.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        let frame = self.framed.next().await.transpose()?;
        if let Some(ref frame) = frame {
            trace!(%frame, kind = %self.kind, "rx");
        }
        Ok(frame)
    }
}

// ── Handshake ────────────────────────────────────────────────────────

/// Greeting, session request, and whichever authentication the gateway demands.
pub async fn handshake<S>(
    framed: &mut Framed<S, FrameCodec>,
    kind: SessionKind,
    password: Option<&SecretString>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match read_control(framed).await? {
        GatewayMessage::Ack => {}
        GatewayMessage::Nack => return Err(handshake_error("gateway refused the connection")),
        other => return Err(handshake_error(format!("unexpected greeting {other:?}"))),
    }

    framed.send(kind.request_frame()).await?;

    match read_control(framed).await? {
        GatewayMessage::Ack => {
            debug!(%kind, "gateway accepted session without authentication");
            Ok(())
        }
        GatewayMessage::Nack => Err(handshake_error(format!("{kind} session refused"))),
        GatewayMessage::Nonce { digits } => open_auth(framed, &digits, password).await,
        GatewayMessage::HmacMethod { method } => hmac_auth(framed, &method, password).await,
        other => Err(handshake_error(format!("unexpected reply {other:?}"))),
    }
}

async fn open_auth<S>(framed: &mut Framed<S, FrameCodec>, nonce: &str, password: Option<&SecretString>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let password = password.ok_or(Error::PasswordRequired)?;
    let answer = auth::open_password(password.expose_secret(), nonce)?;
    framed.send(format!("*#{answer}##")).await?;

    match read_control(framed).await? {
        GatewayMessage::Ack => {
            debug!("OPEN password accepted");
            Ok(())
        }
        GatewayMessage::Nack => Err(Error::PasswordError),
        other => Err(handshake_error(format!("unexpected reply to password {other:?}"))),
    }
}

async fn hmac_auth<S>(framed: &mut Framed<S, FrameCodec>, method: &str, password: Option<&SecretString>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let algorithm = HmacAlgorithm::from_method(method)
        .ok_or_else(|| handshake_error(format!("unsupported HMAC method {method}")))?;
    let Some(password) = password else {
        framed.send(NACK).await?;
        return Err(Error::PasswordRequired);
    };
    let password = password.expose_secret();

    framed.send(ACK).await?;
    let GatewayMessage::Nonce { digits } = read_control(framed).await? else {
        return Err(handshake_error("expected HMAC challenge"));
    };
    let ra = auth::digits_to_hex(&digits).ok_or_else(|| handshake_error("invalid HMAC challenge"))?;

    let rb = algorithm.random_challenge(&SystemRandom::new())?;
    let proof = algorithm.client_proof(&ra, &rb, password);
    framed
        .send(format!("*#{}*{}##", wire_digits(&rb)?, wire_digits(&proof)?))
        .await?;

    match read_control(framed).await? {
        GatewayMessage::Nonce { digits } => {
            if digits != wire_digits(&algorithm.server_proof(&ra, &rb, password))? {
                return Err(handshake_error("gateway failed to prove the shared secret"));
            }
            framed.send(ACK).await?;
            debug!(?algorithm, "HMAC authentication complete");
            Ok(())
        }
        GatewayMessage::Nack => Err(Error::PasswordError),
        other => Err(handshake_error(format!("unexpected reply to HMAC proof {other:?}"))),
    }
}

async fn read_control<S>(framed: &mut Framed<S, FrameCodec>) -> Result<GatewayMessage>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = framed.next().await.transpose()?.ok_or(Error::ConnectionClosed)?;
    trace!(frame = %raw, "handshake rx");
    match Message::parse(&raw)? {
        Message::Gateway(message) => Ok(message),
        _ => Err(handshake_error(format!("unexpected frame `{raw}`"))),
    }
}

fn wire_digits(hex: &str) -> Result<String> {
    auth::hex_to_digits(hex).ok_or_else(|| handshake_error("digest is not hex"))
}

fn handshake_error(message: impl Into<String>) -> Error {
    Error::Handshake {
        message: message.into(),
    }
}
