// ── Gateway identity as reported over the bus ──

use serde::{Deserialize, Serialize};

use super::mac::MacAddress;
use myhome_api::command::gateway_dimension;

/// Model, firmware and MAC read back from the gateway (WHO 13).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub mac: Option<MacAddress>,
}

impl GatewayInfo {
    /// Fold one gateway dimension response into the record.
    pub fn apply(&mut self, dimension: &str, values: &[String]) {
        match dimension {
            gateway_dimension::MODEL => {
                if let Some(code) = values.first() {
                    self.model = Some(model_name(code));
                }
            }
            gateway_dimension::FIRMWARE => {
                if !values.is_empty() {
                    self.firmware = Some(values.join("."));
                }
            }
            gateway_dimension::MAC_ADDRESS => {
                self.mac = MacAddress::from_decimal_octets(values);
            }
            _ => {}
        }
    }
}

/// Human-readable name of a gateway model code.
pub fn model_name(code: &str) -> String {
    let name = match code {
        "2" => "MHServer",
        "4" => "MH200",
        "6" => "F452",
        "7" => "F452V",
        "11" => "MHServer2",
        "12" => "F453AV",
        "13" => "H4684",
        "15" => "F454",
        "16" => "F453",
        "23" => "F454 (new)",
        "27" => "MyHOMEServer1",
        other => return format!("Unknown({other})"),
    };
    name.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn folds_dimension_responses() {
        let mut info = GatewayInfo::default();
        info.apply("15", &values(&["27"]));
        info.apply("16", &values(&["1", "2", "14"]));
        info.apply("12", &values(&["0", "3", "80", "27", "28", "125"]));
        info.apply("19", &values(&["1", "2", "3", "4"]));

        assert_eq!(info.model.as_deref(), Some("MyHOMEServer1"));
        assert_eq!(info.firmware.as_deref(), Some("1.2.14"));
        assert_eq!(info.mac.as_ref().map(MacAddress::as_str), Some("00:03:50:1b:1c:7d"));
    }

    #[test]
    fn unknown_model_code() {
        assert_eq!(model_name("99"), "Unknown(99)");
        assert_eq!(model_name("23"), "F454 (new)");
    }
}
