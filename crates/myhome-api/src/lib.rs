// myhome-api: Async OpenWebNet client for MyHOME gateways (frames, messages, connections)

pub mod auth;
pub mod codec;
pub mod command;
pub mod connection;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::FrameCodec;
pub use command::Command;
pub use connection::{ConnectOptions, Connection, SessionKind};
pub use error::Error;
pub use frame::Frame;
pub use message::{GatewayMessage, Message};
