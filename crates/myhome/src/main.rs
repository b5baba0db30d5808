mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Environment variable holding a full `tracing` filter, e.g.
/// `myhome_core=debug,myhome_api=trace`.
const LOG_ENV: &str = "MYHOME_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Bus traffic is logged at `trace` by the wire crate, so `-vvv` shows
/// every frame.
fn init_tracing(global: &GlobalOpts) {
    let level = if global.quiet {
        "error"
    } else {
        ["warn", "info", "debug"]
            .get(usize::from(global.verbose))
            .copied()
            .unwrap_or("trace")
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(global.verbose > 1)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        Command::Config(args) => commands::config_cmd::handle(args, &global),
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "myhome",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        command => {
            let target = config::resolve_target(&global)?;
            tracing::debug!(
                ?command,
                profile = %target.profile_name,
                address = %format!("{}:{}", target.gateway.host, target.gateway.port),
                "running gateway command"
            );
            let profile_name = target.profile_name.clone();
            commands::dispatch(command, target, &global)
                .await
                .map_err(|e| e.for_profile(&profile_name))
        }
    }
}
