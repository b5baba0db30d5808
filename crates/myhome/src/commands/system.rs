//! Gateway-level commands: `info` and `sync-time`.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use myhome_core::GatewayInfo;

use crate::cli::{GlobalOpts, SyncTimeArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

fn info_detail(info: &GatewayInfo) -> String {
    let or_unknown = |v: Option<String>| v.unwrap_or_else(|| "unknown".into());
    [
        format!("Model:    {}", or_unknown(info.model.clone())),
        format!("Firmware: {}", or_unknown(info.firmware.clone())),
        format!(
            "MAC:      {}",
            or_unknown(info.mac.as_ref().map(ToString::to_string))
        ),
    ]
    .join("\n")
}

pub async fn info(target: &Target, global: &GlobalOpts) -> Result<(), CliError> {
    let info = super::with_gateway(target, |gateway, _events| async move {
        Ok::<_, CliError>(gateway.gateway_info().await?)
    })
    .await?;

    if let Some(ref reported) = info.mac {
        if *reported != target.gateway.mac {
            tracing::warn!(
                configured = %target.gateway.mac,
                reported = %reported,
                "gateway reports a different MAC than configured"
            );
        }
    }

    let out = output::render_single(&global.output, &info, info_detail, |i| {
        i.model.clone().unwrap_or_default()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[derive(Serialize)]
struct TimeSync {
    gateway: String,
    time: DateTime<FixedOffset>,
}

pub async fn sync_time(
    target: &Target,
    args: SyncTimeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let offset = args
        .offset
        .unwrap_or_else(|| *chrono::Local::now().offset());

    let time = super::with_gateway(target, |gateway, _events| async move {
        Ok::<_, CliError>(gateway.sync_time(offset).await?)
    })
    .await?;

    let sync = TimeSync {
        gateway: target.gateway.mac.to_string(),
        time,
    };
    let out = output::render_single(
        &global.output,
        &sync,
        |s| format!("Gateway {} clock set to {}", s.gateway, s.time.to_rfc3339()),
        |s| s.time.to_rfc3339(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use myhome_core::MacAddress;

    #[test]
    fn info_detail_marks_missing_fields() {
        let info = GatewayInfo {
            model: Some("MyHOMEServer1".into()),
            firmware: None,
            mac: Some(MacAddress::new("00:03:50:1b:1c:7d").unwrap()),
        };
        let text = info_detail(&info);
        assert!(text.contains("Model:    MyHOMEServer1"), "{text}");
        assert!(text.contains("Firmware: unknown"), "{text}");
        assert!(text.contains("MAC:      00:03:50:1b:1c:7d"), "{text}");
    }
}
