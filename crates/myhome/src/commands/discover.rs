//! `discover` and `probe`: find the devices behind the gateway.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;
use tokio::sync::{mpsc, watch};

use myhome_config::devices::{DeviceDocument, MergeOutcome};
use myhome_core::{CompletionReason, DiscoveredDevice, HostEvent, SessionState, SuggestedConfig};

use crate::cli::{DiscoverArgs, GlobalOpts, OutputFormat, ProbeArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Where")]
    address: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
}

impl DeviceRow {
    fn new(d: &Arc<DiscoveredDevice>) -> Self {
        Self {
            address: d.address.clone(),
            device_type: d.device_type.to_string(),
            platform: d.platform.to_string(),
            name: d.name.clone(),
            unique_id: d.unique_id.clone(),
        }
    }
}

fn detail(d: &Arc<DiscoveredDevice>) -> String {
    [
        format!("Unique ID: {}", d.unique_id),
        format!("Name:      {}", d.name),
        format!("Where:     {}", d.address),
        format!("Type:      {}", d.device_type),
        format!("Platform:  {}", d.platform),
        format!("Category:  {}", d.category),
        format!("Seen as:   {}", d.message_kind),
    ]
    .join("\n")
}

fn spinner(global: &GlobalOpts) -> ProgressBar {
    if global.quiet || !matches!(global.output, OutputFormat::Table) {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

// ── Outcome of one run ──────────────────────────────────────────────

#[derive(Default)]
struct RunResult {
    devices: Vec<Arc<DiscoveredDevice>>,
    suggestions: Vec<SuggestedConfig>,
    reason: Option<CompletionReason>,
}

impl RunResult {
    fn record(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::DeviceDiscovered { device, .. } => self.devices.push(device),
            HostEvent::DeviceSuggestion {
                suggested_config, ..
            } => self.suggestions.push(suggested_config),
            HostEvent::DiscoveryCompleted { reason, .. } => {
                self.reason = Some(reason);
                return true;
            }
        }
        false
    }
}

/// Collect events until the run completes. Ctrl-C asks for an early
/// stop once; a failed session ends the run with an error.
async fn follow(
    events: &mut mpsc::UnboundedReceiver<HostEvent>,
    state: &mut watch::Receiver<SessionState>,
    stop: impl Fn(),
    bar: &ProgressBar,
) -> Result<RunResult, CliError> {
    let mut run = RunResult::default();
    let mut stopping = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                stop();
            }
            _ = state.wait_for(|s| *s == SessionState::Failed) => {
                return Err(CliError::Transport {
                    reason: "gateway session failed during discovery".into(),
                });
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if run.record(event) {
                    break;
                }
                bar.set_message(format!("{} device(s) found", run.devices.len()));
            }
        }
    }
    Ok(run)
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(target: &Target, args: DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut document = DeviceDocument::load(&target.devices_path)?;
    let mut gateway_config = target.gateway.clone();
    if let Some(duration) = args.duration {
        gateway_config.discovery.timeout = duration;
    }
    let mac = gateway_config.mac.clone();
    let configured = document.configured_ids(&mac);
    let target = Target {
        profile_name: target.profile_name.clone(),
        gateway: gateway_config,
        devices_path: target.devices_path.clone(),
    };

    let bar = spinner(global);
    let run = super::with_gateway(&target, |gateway, mut events| async move {
        gateway.discovery().set_configured(configured);
        let mut state = gateway.session().watch_state();
        gateway.start_discovery()?;
        bar.set_message("discovering");

        let run = follow(&mut events, &mut state, || gateway.stop_discovery(), &bar).await;
        bar.finish_and_clear();
        run
    })
    .await?;

    if !global.quiet {
        let why = run.reason.map_or_else(|| "ended".to_owned(), |r| r.to_string());
        eprintln!("Discovery finished ({why}): {} device(s)", run.devices.len());
    }

    let out = output::render_list(&global.output, &run.devices, DeviceRow::new, |d| {
        d.unique_id.clone()
    })?;
    output::print_output(&out, global.quiet);

    if args.save {
        let mut added = 0usize;
        for suggestion in &run.suggestions {
            if document.merge_suggestion(&mac, suggestion)? == MergeOutcome::Added {
                added += 1;
            }
        }
        document.save(&target.devices_path)?;
        if !global.quiet {
            eprintln!(
                "Added {added} device(s) to {}",
                target.devices_path.display()
            );
        }
    }
    Ok(())
}

pub async fn probe(target: &Target, args: ProbeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let address = args.address.trim().to_owned();
    let found = super::with_gateway(target, |gateway, _events| {
        let address = address.clone();
        async move { Ok::<_, CliError>(gateway.discover_by_address(&address).await?) }
    })
    .await?;

    let device = found.ok_or_else(|| CliError::NotFound {
        resource_type: "device".into(),
        identifier: address,
        hint: "No probed subsystem answered for this address; run `myhome discover` to list devices."
            .into(),
    })?;

    let out = output::render_single(&global.output, &device, detail, |d| d.unique_id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
