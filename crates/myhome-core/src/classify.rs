// ── Device type classifier ──
//
// Pure mapping from the shape of an inbound message to a device type.
// Ambiguous lighting messages resolve to the plain switch.

use myhome_api::Message;

use crate::model::DeviceType;

/// Classify a message into a device type.
///
/// Returns `None` for messages that do not describe a bus device
/// (echoed requests and gateway control frames).
pub fn classify(message: &Message) -> Option<DeviceType> {
    let device_type = match message {
        Message::Lighting(e) => {
            if e.brightness.is_some_and(|b| b > 0) || e.brightness_preset.is_some() {
                DeviceType::Dimmer
            } else {
                DeviceType::OnOffSwitch
            }
        }
        Message::Automation(_) => DeviceType::Automation,
        Message::Energy(_) => DeviceType::EnergyMeter,
        Message::Heating(e) => {
            if e.temperature.is_some() {
                DeviceType::ThermoSensor
            } else {
                DeviceType::ThermoZone
            }
        }
        Message::DryContact(_) => DeviceType::DryContactIr,
        Message::Aux(_) => DeviceType::Aux,
        Message::Cen(_) => DeviceType::CenScenarioControl,
        Message::CenPlus(_) => DeviceType::CenPlusScenarioControl,
        Message::Alarm(_) => DeviceType::AlarmZone,
        Message::GenericStatus(_) => DeviceType::Generic,
        Message::Command(_) | Message::Gateway(_) => return None,
    };
    Some(device_type)
}
