//! `listen`: print bus events as they arrive.

use std::fmt::Write as _;
use std::future;

use owo_colors::OwoColorize;
use tokio::time::{Instant, sleep_until};

use myhome_core::{Message, SessionState};

use crate::cli::{GlobalOpts, ListenArgs, OutputFormat};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

pub async fn handle(target: &Target, args: ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    super::with_gateway(target, |gateway, _events| async move {
        let inbound = gateway.session().messages();
        let mut state = gateway.session().watch_state();
        let deadline = args.duration.map(|d| Instant::now() + d);
        let stop = async {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => future::pending().await,
            }
        };
        tokio::pin!(stop);

        if !global.quiet {
            eprintln!("Listening on {} (Ctrl-C to stop)", target.gateway.host);
        }

        let mut seen = 0usize;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                () = &mut stop => break,
                _ = state.wait_for(|s| *s == SessionState::Failed) => {
                    return Err(CliError::Transport {
                        reason: "event session closed by the gateway".into(),
                    });
                }
                message = inbound.recv() => {
                    output::print_output(&render_event(&message, &global.output, color)?, global.quiet);
                    seen += 1;
                    if args.count.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
            }
        }
        Ok(())
    })
    .await
}

fn render_event(message: &Message, format: &OutputFormat, color: bool) -> Result<String, CliError> {
    let address = message.address().unwrap_or("-");
    match format {
        OutputFormat::Table => {
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let kind = format!("{:<14}", message.kind());
            let mut line = String::new();
            if color {
                let _ = write!(line, "{}  {}  {address:<10}", time.dimmed(), kind.cyan());
            } else {
                let _ = write!(line, "{time}  {kind}  {address:<10}");
            }
            let _ = write!(line, " {}", serde_json::to_string(message)?);
            Ok(line)
        }
        // One document per event so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(message, true),
        OutputFormat::Yaml => Ok(format!("---\n{}", serde_yaml::to_string(message)?)),
        OutputFormat::Plain => Ok(format!("{} {address}", message.kind())),
    }
}
