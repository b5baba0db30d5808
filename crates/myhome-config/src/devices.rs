// ── Device document ──
//
// YAML file mapping gateway MAC → platform → device key (`where`) →
// configuration entry. Hand-written entries may carry fields the tools
// don't know about, so entries stay untyped and are never rewritten.

use std::collections::BTreeMap;
use std::path::Path;

use myhome_core::{MacAddress, Platform, SuggestedConfig};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::ConfigError;

/// Key older documents use for their single gateway.
const LEGACY_GATEWAY_KEY: &str = "gateway";

/// Top-level keys that are not gateways.
const IGNORED_KEYS: [&str; 1] = ["service"];

const HEADER: &str = "# MyHOME Configuration\n# Add your gateway configurations here\n";

/// Device entries of one gateway, by platform then device key.
pub type GatewayDevices = BTreeMap<String, BTreeMap<String, Value>>;

/// The whole device document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceDocument {
    gateways: BTreeMap<String, GatewayDevices>,
}

/// Outcome of [`DeviceDocument::merge_suggestion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    AlreadyPresent,
}

impl DeviceDocument {
    /// Read the document at `path`. A missing or empty file is an empty
    /// document.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "device document not found, starting empty");
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: Value = serde_yaml::from_str(text)?;
        let Value::Mapping(mut top) = raw else {
            return Ok(Self::default());
        };
        for key in IGNORED_KEYS {
            if top.remove(key).is_some() {
                info!(key, "ignoring non-gateway key in device document");
            }
        }
        let gateways = serde_yaml::from_value(Value::Mapping(top))?;
        Ok(Self { gateways })
    }

    /// Write the document to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = if self.gateways.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(&self.gateways)?
        };
        std::fs::write(path, format!("{HEADER}{body}"))?;
        Ok(())
    }

    /// Devices of the gateway `mac`. The legacy `gateway` key wins over
    /// MAC-keyed sections.
    pub fn gateway(&self, mac: &MacAddress) -> Option<&GatewayDevices> {
        self.gateways.get(LEGACY_GATEWAY_KEY).or_else(|| {
            self.gateways
                .iter()
                .find(|(key, _)| MacAddress::new(key.as_str()).is_ok_and(|k| &k == mac))
                .map(|(_, devices)| devices)
        })
    }

    fn gateway_key(&self, mac: &MacAddress) -> String {
        if self.gateways.contains_key(LEGACY_GATEWAY_KEY) {
            return LEGACY_GATEWAY_KEY.to_owned();
        }
        self.gateways
            .keys()
            .find(|key| MacAddress::new(key.as_str()).is_ok_and(|k| &k == mac))
            .cloned()
            .unwrap_or_else(|| mac.to_string())
    }

    /// Unique ids (`"{mac}-{where}"`) of every configured device of `mac`.
    pub fn configured_ids(&self, mac: &MacAddress) -> Vec<String> {
        let Some(devices) = self.gateway(mac) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = devices
            .values()
            .flat_map(|entries| entries.iter())
            .map(|(key, entry)| format!("{mac}-{}", entry_address(key, entry)))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Add a suggested device unless an entry for its address already
    /// exists on any platform of the gateway.
    pub fn merge_suggestion(
        &mut self,
        mac: &MacAddress,
        suggestion: &SuggestedConfig,
    ) -> Result<MergeOutcome, ConfigError> {
        let key = self.gateway_key(mac);
        let devices = self.gateways.entry(key).or_default();

        let exists = devices.values().any(|entries| {
            entries
                .iter()
                .any(|(key, entry)| entry_address(key, entry) == suggestion.address)
        });
        if exists {
            return Ok(MergeOutcome::AlreadyPresent);
        }

        let entry = serde_yaml::to_value(suggestion)?;
        devices
            .entry(platform_key(suggestion.platform))
            .or_default()
            .insert(suggestion.address.clone(), entry);
        Ok(MergeOutcome::Added)
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

fn platform_key(platform: Platform) -> String {
    let name: &'static str = platform.into();
    name.to_owned()
}

/// The entry's `where` field, falling back to its key.
fn entry_address(key: &str, entry: &Value) -> String {
    match entry.as_mapping().and_then(|m: &Mapping| m.get("where")) {
        Some(Value::String(address)) => address.clone(),
        Some(Value::Number(address)) => address.to_string(),
        _ => key.to_owned(),
    }
}
