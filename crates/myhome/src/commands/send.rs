//! `send`: deliver raw frames and show what the gateway answered.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use myhome_core::{Command, CoreError, Message};

use crate::cli::{GlobalOpts, SendArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Exchange {
    frame: String,
    replies: Vec<Arc<Message>>,
}

#[derive(Tabled)]
struct ExchangeRow {
    #[tabled(rename = "Sent")]
    frame: String,
    #[tabled(rename = "Reply")]
    reply: String,
    #[tabled(rename = "Where")]
    address: String,
}

impl ExchangeRow {
    fn new(e: &Exchange) -> Self {
        let kinds: Vec<&str> = e.replies.iter().map(|m| m.kind()).collect();
        let addresses: Vec<&str> = e.replies.iter().filter_map(|m| m.address()).collect();
        Self {
            frame: e.frame.clone(),
            reply: if kinds.is_empty() {
                "ACK".into()
            } else {
                kinds.join(", ")
            },
            address: addresses.join(", "),
        }
    }
}

/// Parse every frame up front so nothing is sent when one is invalid.
fn parse_frames(frames: &[String]) -> Result<Vec<Command>, CliError> {
    frames
        .iter()
        .map(|raw| Command::parse(raw.trim()).map_err(|e| CliError::from(CoreError::from(e))))
        .collect()
}

pub async fn handle(target: &Target, args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let commands = parse_frames(&args.frames)?;

    let exchanges = super::with_gateway(target, |gateway, _events| async move {
        let mut exchanges = Vec::with_capacity(commands.len());
        for command in commands {
            let replies = gateway.session().execute(&command).await?;
            exchanges.push(Exchange {
                frame: command.to_string(),
                replies,
            });
        }
        Ok::<_, CliError>(exchanges)
    })
    .await?;

    let out = output::render_list(&global.output, &exchanges, ExchangeRow::new, |e| {
        e.frame.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn one_bad_frame_rejects_the_batch() {
        let frames = vec!["*1*1*21##".to_owned(), "*1*1*21".to_owned()];
        let err = parse_frames(&frames).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "frame"));

        let frames = vec![" *1*0*21## ".to_owned(), "*#1*21##".to_owned()];
        assert_eq!(parse_frames(&frames).unwrap().len(), 2);
    }

    #[test]
    fn rows_summarise_replies() {
        let exchange = Exchange {
            frame: "*#1*21##".into(),
            replies: vec![Arc::new(Message::parse("*1*1*21##").unwrap())],
        };
        let row = ExchangeRow::new(&exchange);
        assert_eq!(row.reply, "lighting");
        assert_eq!(row.address, "21");

        let ack_only = Exchange {
            frame: "*1*1*21##".into(),
            replies: Vec::new(),
        };
        assert_eq!(ExchangeRow::new(&ack_only).reply, "ACK");
    }
}
