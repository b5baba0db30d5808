//! Command dispatch: bridges CLI args -> gateway operations -> output formatting.

pub mod config_cmd;
pub mod discover;
pub mod listen;
pub mod send;
pub mod system;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use myhome_core::{Gateway, HostEvent};

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Listen(args) => listen::handle(&target, args, global).await,
        Command::Send(args) => send::handle(&target, args, global).await,
        Command::Discover(args) => discover::handle(&target, args, global).await,
        Command::Probe(args) => discover::probe(&target, args, global).await,
        Command::SyncTime(args) => system::sync_time(&target, args, global).await,
        Command::Info => system::info(&target, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Connect to the target gateway, run `f`, and close the gateway whatever
/// `f` returned.
pub(crate) async fn with_gateway<F, Fut, T>(target: &Target, f: F) -> Result<T, CliError>
where
    F: FnOnce(Gateway, mpsc::UnboundedReceiver<HostEvent>) -> Fut,
    Fut: Future<Output = Result<T, CliError>>,
{
    let (tx, rx) = mpsc::unbounded_channel::<HostEvent>();
    let gateway = Gateway::new(target.gateway.clone(), Arc::new(tx));
    gateway.connect().await?;

    let result = f(gateway.clone(), rx).await;
    gateway.close().await;
    result
}
