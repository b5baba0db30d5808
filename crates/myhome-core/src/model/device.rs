// ── Device taxonomy ──
//
// Every discovered device has exactly one type, and every type maps to
// exactly one host platform and one category via the fixed tables below.

use chrono::{DateTime, Utc};
use myhome_api::Message;
use serde::{Deserialize, Serialize};

use super::mac::MacAddress;

/// Device types known to the bridge.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
pub enum DeviceType {
    #[serde(rename = "bus_on_off_switch")]
    #[strum(serialize = "bus_on_off_switch")]
    OnOffSwitch,
    #[serde(rename = "bus_dimmer")]
    #[strum(serialize = "bus_dimmer")]
    Dimmer,
    #[serde(rename = "bus_light_group")]
    #[strum(serialize = "bus_light_group")]
    LightGroup,
    #[serde(rename = "bus_automation")]
    #[strum(serialize = "bus_automation")]
    Automation,
    #[serde(rename = "bus_energy_meter")]
    #[strum(serialize = "bus_energy_meter")]
    EnergyMeter,
    #[serde(rename = "bus_thermo_sensor")]
    #[strum(serialize = "bus_thermo_sensor")]
    ThermoSensor,
    #[serde(rename = "bus_thermo_zone")]
    #[strum(serialize = "bus_thermo_zone")]
    ThermoZone,
    #[serde(rename = "bus_thermo_cu")]
    #[strum(serialize = "bus_thermo_cu")]
    ThermoCentralUnit,
    #[serde(rename = "bus_cen_scenario_control")]
    #[strum(serialize = "bus_cen_scenario_control")]
    CenScenarioControl,
    #[serde(rename = "bus_cenplus_scenario_control")]
    #[strum(serialize = "bus_cenplus_scenario_control")]
    CenPlusScenarioControl,
    #[serde(rename = "bus_dry_contact_ir")]
    #[strum(serialize = "bus_dry_contact_ir")]
    DryContactIr,
    #[serde(rename = "bus_scenario_control")]
    #[strum(serialize = "bus_scenario_control")]
    ScenarioControl,
    #[serde(rename = "bus_alarm_system")]
    #[strum(serialize = "bus_alarm_system")]
    AlarmSystem,
    #[serde(rename = "bus_alarm_zone")]
    #[strum(serialize = "bus_alarm_zone")]
    AlarmZone,
    #[serde(rename = "bus_aux")]
    #[strum(serialize = "bus_aux")]
    Aux,
    #[serde(rename = "generic_device")]
    #[strum(serialize = "generic_device")]
    Generic,
}

/// Host platform a device type is exposed on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Light,
    Cover,
    Sensor,
    Climate,
    Button,
    BinarySensor,
    AlarmControlPanel,
    Switch,
}

/// Functional grouping of device types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Lighting,
    LightingGroup,
    Automation,
    EnergyManagement,
    Thermoregulation,
    Scenario,
    ScenarioBasic,
    Alarm,
    Auxiliary,
    Generic,
}

impl DeviceType {
    /// Resolve a configured type name; unknown names fall back to [`DeviceType::Generic`].
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(Self::Generic)
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn platform(self) -> Platform {
        match self {
            Self::OnOffSwitch | Self::Dimmer | Self::LightGroup => Platform::Light,
            Self::Automation => Platform::Cover,
            Self::EnergyMeter | Self::ThermoSensor | Self::Generic => Platform::Sensor,
            Self::ThermoZone | Self::ThermoCentralUnit => Platform::Climate,
            Self::CenScenarioControl | Self::CenPlusScenarioControl | Self::ScenarioControl => {
                Platform::Button
            }
            Self::DryContactIr | Self::AlarmZone => Platform::BinarySensor,
            Self::AlarmSystem => Platform::AlarmControlPanel,
            Self::Aux => Platform::Switch,
        }
    }

    pub fn category(self) -> Category {
        match self {
            Self::OnOffSwitch | Self::Dimmer => Category::Lighting,
            Self::LightGroup => Category::LightingGroup,
            Self::Automation => Category::Automation,
            Self::EnergyMeter => Category::EnergyManagement,
            Self::ThermoSensor | Self::ThermoZone | Self::ThermoCentralUnit => {
                Category::Thermoregulation
            }
            Self::CenScenarioControl | Self::CenPlusScenarioControl | Self::DryContactIr => {
                Category::Scenario
            }
            Self::ScenarioControl => Category::ScenarioBasic,
            Self::AlarmSystem | Self::AlarmZone => Category::Alarm,
            Self::Aux => Category::Auxiliary,
            Self::Generic => Category::Generic,
        }
    }

    /// Type name in title case, e.g. `"Bus On Off Switch"`.
    pub fn title(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ── DiscoveredDevice ────────────────────────────────────────────────

/// A device seen on the bus during discovery, keyed by `(gateway_mac, where)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub unique_id: String,
    pub gateway_mac: MacAddress,
    #[serde(rename = "where")]
    pub address: String,
    pub name: String,
    pub who: Option<u16>,
    pub device_type: DeviceType,
    pub platform: Platform,
    pub category: Category,
    pub discovered_at: DateTime<Utc>,
    /// Kind of the message the device was classified from.
    pub message_kind: String,
    pub properties: DeviceProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceProperties {
    /// `"{who}*{where}"`, or the bare address when the WHO is unknown.
    pub own_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimmable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Unique id of the device at `address` behind gateway `mac`.
pub fn device_key(mac: &MacAddress, address: &str) -> String {
    format!("{mac}-{address}")
}

impl DiscoveredDevice {
    /// Build the record for a message already classified as `device_type`.
    ///
    /// Returns `None` when the message carries no bus address.
    pub fn from_message(
        gateway_mac: &MacAddress,
        message: &Message,
        device_type: DeviceType,
        discovered_at: DateTime<Utc>,
    ) -> Option<Self> {
        let address = message.address().filter(|a| !a.is_empty())?.to_owned();
        let who = message.who();
        let own_id = who.map_or_else(|| address.clone(), |w| format!("{w}*{address}"));

        let mut properties = DeviceProperties {
            own_id,
            ..DeviceProperties::default()
        };
        match message {
            Message::Lighting(e) => {
                properties.dimmable = Some(device_type == DeviceType::Dimmer);
                properties.brightness = e.brightness;
            }
            Message::Automation(e) => properties.position = e.position,
            Message::Energy(e) => properties.power = e.power,
            Message::Heating(e) => properties.temperature = e.temperature,
            _ => {}
        }

        Some(Self {
            unique_id: device_key(gateway_mac, &address),
            gateway_mac: gateway_mac.clone(),
            name: format!("MyHOME {} {address}", device_type.title()),
            address,
            who,
            device_type,
            platform: device_type.platform(),
            category: device_type.category(),
            discovered_at,
            message_kind: message.kind().to_owned(),
            properties,
        })
    }
}

// ── SuggestedConfig ─────────────────────────────────────────────────

/// Configuration entry proposed to the host for a newly discovered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedConfig {
    #[serde(rename = "where")]
    pub address: String,
    pub name: String,
    pub device_type: DeviceType,
    pub platform: Platform,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimmable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    /// Shutter run time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutter_run: Option<u32>,
    /// Energy meter polling period in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_period: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standalone: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<String>,
}

impl SuggestedConfig {
    pub fn for_device(device: &DiscoveredDevice) -> Self {
        let mut config = Self {
            address: device.address.clone(),
            name: device.name.clone(),
            device_type: device.device_type,
            platform: device.platform,
            category: device.category,
            dimmable: None,
            device_class: None,
            unit_of_measurement: None,
            shutter_run: None,
            refresh_period: None,
            standalone: None,
            buttons: None,
        };

        let class = |c: &str| Some(c.to_owned());
        match device.device_type {
            DeviceType::OnOffSwitch | DeviceType::Dimmer => {
                config.dimmable = Some(device.device_type == DeviceType::Dimmer);
            }
            DeviceType::Automation => {
                config.device_class = class("shutter");
                config.shutter_run = Some(20);
            }
            DeviceType::EnergyMeter => {
                config.device_class = class("energy");
                config.unit_of_measurement = class("W");
                config.refresh_period = Some(30);
            }
            DeviceType::ThermoZone | DeviceType::ThermoSensor => {
                config.device_class = class("temperature");
                config.unit_of_measurement = class("°C");
                config.standalone = Some(device.device_type == DeviceType::ThermoSensor);
            }
            DeviceType::CenScenarioControl | DeviceType::CenPlusScenarioControl => {
                config.device_class = class("button");
                config.buttons = class("1,2,3,4");
            }
            DeviceType::DryContactIr => config.device_class = class("motion"),
            DeviceType::Aux => config.device_class = class("switch"),
            DeviceType::AlarmSystem | DeviceType::AlarmZone => config.device_class = class("safety"),
            DeviceType::LightGroup
            | DeviceType::ThermoCentralUnit
            | DeviceType::ScenarioControl
            | DeviceType::Generic => {}
        }
        config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    fn mac() -> MacAddress {
        MacAddress::new("00:03:50:1b:1c:7d").unwrap()
    }

    #[test]
    fn taxonomy_tables() {
        let expected = [
            (DeviceType::OnOffSwitch, "light", "lighting"),
            (DeviceType::Dimmer, "light", "lighting"),
            (DeviceType::LightGroup, "light", "lighting_group"),
            (DeviceType::Automation, "cover", "automation"),
            (DeviceType::EnergyMeter, "sensor", "energy_management"),
            (DeviceType::ThermoSensor, "sensor", "thermoregulation"),
            (DeviceType::ThermoZone, "climate", "thermoregulation"),
            (DeviceType::ThermoCentralUnit, "climate", "thermoregulation"),
            (DeviceType::CenScenarioControl, "button", "scenario"),
            (DeviceType::CenPlusScenarioControl, "button", "scenario"),
            (DeviceType::DryContactIr, "binary_sensor", "scenario"),
            (DeviceType::ScenarioControl, "button", "scenario_basic"),
            (DeviceType::AlarmSystem, "alarm_control_panel", "alarm"),
            (DeviceType::AlarmZone, "binary_sensor", "alarm"),
            (DeviceType::Aux, "switch", "auxiliary"),
            (DeviceType::Generic, "sensor", "generic"),
        ];
        assert_eq!(expected.len(), DeviceType::iter().count());
        for (ty, platform, category) in expected {
            assert_eq!(ty.platform().to_string(), platform, "{ty}");
            assert_eq!(ty.category().to_string(), category, "{ty}");
        }
    }

    #[test]
    fn type_names() {
        for ty in DeviceType::iter() {
            assert_eq!(DeviceType::from_name(ty.as_str()), ty);
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{ty}\""));
        }
        assert_eq!(DeviceType::from_name("bus_teleporter"), DeviceType::Generic);
        assert_eq!(DeviceType::OnOffSwitch.title(), "Bus On Off Switch");
        assert_eq!(DeviceType::Generic.title(), "Generic Device");
    }

    #[test]
    fn record_from_lighting_message() {
        let msg = Message::parse("*#1*21*1*145*0##").unwrap();
        let now = Utc::now();
        let device = DiscoveredDevice::from_message(&mac(), &msg, DeviceType::Dimmer, now).unwrap();

        assert_eq!(device.unique_id, "00:03:50:1b:1c:7d-21");
        assert_eq!(device.name, "MyHOME Bus Dimmer 21");
        assert_eq!(device.who, Some(1));
        assert_eq!(device.platform, Platform::Light);
        assert_eq!(device.message_kind, "lighting");
        assert_eq!(device.discovered_at, now);
        assert_eq!(device.properties.own_id, "1*21");
        assert_eq!(device.properties.brightness, Some(45));
        assert_eq!(device.properties.dimmable, Some(true));
    }

    #[test]
    fn record_requires_an_address() {
        let ack = Message::parse("*#*1##").unwrap();
        assert!(DiscoveredDevice::from_message(&mac(), &ack, DeviceType::Generic, Utc::now()).is_none());
    }

    #[test]
    fn suggestions_per_type() {
        let now = Utc::now();
        let shutter = Message::parse("*2*1*41##").unwrap();
        let device = DiscoveredDevice::from_message(&mac(), &shutter, DeviceType::Automation, now).unwrap();
        let config = SuggestedConfig::for_device(&device);
        assert_eq!(config.device_class.as_deref(), Some("shutter"));
        assert_eq!(config.shutter_run, Some(20));
        assert_eq!(config.dimmable, None);

        let probe = Message::parse("*#4*1*0*0215##").unwrap();
        let device = DiscoveredDevice::from_message(&mac(), &probe, DeviceType::ThermoSensor, now).unwrap();
        let config = SuggestedConfig::for_device(&device);
        assert_eq!(config.unit_of_measurement.as_deref(), Some("°C"));
        assert_eq!(config.standalone, Some(true));
        assert_eq!(device.properties.temperature, Some(21.5));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["where"], "1");
        assert_eq!(json["device_type"], "bus_thermo_sensor");
        assert!(json.get("buttons").is_none());
    }
}
