//! Typed inbound messages.
//!
//! [`Message::parse`] turns one raw frame into the variant matching its
//! WHO family. Physical attributes (brightness, temperature, power, …)
//! are decoded permissively: a missing or non-numeric payload leaves the
//! attribute `None` instead of failing the whole frame.

use std::fmt;

use serde::Serialize;

use crate::command::{Command, is_number, is_where};
use crate::error::{Error, Result};
use crate::frame::Frame;

/// WHO codes of the subsystems this crate decodes into dedicated variants.
pub mod who {
    pub const LIGHTING: u16 = 1;
    pub const AUTOMATION: u16 = 2;
    pub const THERMOREGULATION: u16 = 4;
    pub const ALARM: u16 = 5;
    pub const AUXILIARY: u16 = 9;
    pub const GATEWAY: u16 = 13;
    pub const CEN: u16 = 15;
    pub const ENERGY: u16 = 18;
    pub const CEN_PLUS_DRY_CONTACT: u16 = 25;
}

// ── Message ──────────────────────────────────────────────────────────

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Lighting(LightingEvent),
    Automation(AutomationEvent),
    Energy(EnergyEvent),
    Heating(HeatingEvent),
    DryContact(DryContactEvent),
    Aux(AuxEvent),
    Cen(CenEvent),
    CenPlus(CenPlusEvent),
    Alarm(AlarmEvent),
    /// Any WHO (or dimension) without a dedicated decoder.
    GenericStatus(GenericStatus),
    /// A request frame (status/dimension request or dimension write).
    Command(Command),
    Gateway(GatewayMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightingEvent {
    #[serde(rename = "where")]
    pub address: String,
    pub is_on: Option<bool>,
    /// Brightness in percent, reported by dimension 1.
    pub brightness: Option<u8>,
    /// Preset level 2..=10 (20 % – 100 %) carried in WHAT.
    pub brightness_preset: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterState {
    Stopped,
    Opening,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutomationEvent {
    #[serde(rename = "where")]
    pub address: String,
    pub state: Option<ShutterState>,
    /// Position in percent, reported by advanced actuators (dimension 10).
    pub position: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnergyEvent {
    #[serde(rename = "where")]
    pub address: String,
    /// Active power in watts (dimension 113).
    pub power: Option<i64>,
    /// Totaliser in watt-hours (dimension 51).
    pub energy: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatingEvent {
    #[serde(rename = "where")]
    pub address: String,
    /// Measured temperature in °C (dimensions 0 and 15).
    pub temperature: Option<f64>,
    /// Set point in °C (dimension 14).
    pub set_point: Option<f64>,
    /// Target temperature in °C (dimension 12).
    pub target: Option<f64>,
    /// Raw WHAT code of `*4*WHAT*WHERE##` operating-mode frames.
    pub mode: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryContactEvent {
    #[serde(rename = "where")]
    pub address: String,
    pub is_on: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuxEvent {
    #[serde(rename = "where")]
    pub address: String,
    pub state: Option<u16>,
    pub is_on: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressKind {
    Press,
    ReleaseShort,
    StartExtended,
    Extended,
    ReleaseExtended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CenEvent {
    #[serde(rename = "where")]
    pub address: String,
    pub button: Option<u8>,
    pub press: Option<PressKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CenPlusEvent {
    #[serde(rename = "where")]
    pub address: String,
    pub button: Option<u8>,
    pub press: Option<PressKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmEvent {
    #[serde(rename = "where")]
    pub address: String,
    pub state: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenericStatus {
    pub who: u16,
    pub what: Option<String>,
    #[serde(rename = "where")]
    pub address: String,
    pub dimension: Option<String>,
    pub values: Vec<String>,
}

/// Signalling frames and gateway management (WHO 13) responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// `*#*1##`
    Ack,
    /// `*#*0##`
    Nack,
    /// `*#DIGITS##`: password nonce, HMAC challenge or HMAC confirmation.
    Nonce { digits: String },
    /// `*99*N##`
    SessionRequest { session: String },
    /// `*98*N##`
    HmacMethod { method: String },
    /// `*#13**DIM*V1*…##`
    Dimension { dimension: String, values: Vec<String> },
}

impl Message {
    /// Decode one raw frame.
    pub fn parse(raw: &str) -> Result<Self> {
        let frame = Frame::parse(raw)?;
        Self::from_frame(&frame)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.is_request_form() {
            decode_request_form(frame)
        } else {
            decode_event_form(frame)
        }
    }

    pub fn who(&self) -> Option<u16> {
        match self {
            Self::Lighting(_) => Some(who::LIGHTING),
            Self::Automation(_) => Some(who::AUTOMATION),
            Self::Energy(_) => Some(who::ENERGY),
            Self::Heating(_) => Some(who::THERMOREGULATION),
            Self::DryContact(_) | Self::CenPlus(_) => Some(who::CEN_PLUS_DRY_CONTACT),
            Self::Aux(_) => Some(who::AUXILIARY),
            Self::Cen(_) => Some(who::CEN),
            Self::Alarm(_) => Some(who::ALARM),
            Self::GenericStatus(g) => Some(g.who),
            Self::Command(c) => c.who().parse().ok(),
            Self::Gateway(GatewayMessage::Dimension { .. }) => Some(who::GATEWAY),
            Self::Gateway(_) => None,
        }
    }

    /// The WHERE field, if the message refers to a bus address.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Lighting(e) => Some(&e.address),
            Self::Automation(e) => Some(&e.address),
            Self::Energy(e) => Some(&e.address),
            Self::Heating(e) => Some(&e.address),
            Self::DryContact(e) => Some(&e.address),
            Self::Aux(e) => Some(&e.address),
            Self::Cen(e) => Some(&e.address),
            Self::CenPlus(e) => Some(&e.address),
            Self::Alarm(e) => Some(&e.address),
            Self::GenericStatus(e) => Some(&e.address),
            Self::Command(c) => Some(c.address()),
            Self::Gateway(_) => None,
        }
    }

    /// Stable snake_case name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lighting(_) => "lighting",
            Self::Automation(_) => "automation",
            Self::Energy(_) => "energy",
            Self::Heating(_) => "heating",
            Self::DryContact(_) => "dry_contact",
            Self::Aux(_) => "aux",
            Self::Cen(_) => "cen",
            Self::CenPlus(_) => "cen_plus",
            Self::Alarm(_) => "alarm",
            Self::GenericStatus(_) => "generic_status",
            Self::Command(_) => "command",
            Self::Gateway(_) => "gateway",
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Gateway(GatewayMessage::Ack))
    }

    pub fn is_nack(&self) -> bool {
        matches!(self, Self::Gateway(GatewayMessage::Nack))
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

fn decode_request_form(frame: &Frame) -> Result<Message> {
    let raw = frame.raw();
    let fields = frame.fields();

    match fields {
        [hash, flag] if hash == "#" => {
            return match flag.as_str() {
                "1" => Ok(Message::Gateway(GatewayMessage::Ack)),
                "0" => Ok(Message::Gateway(GatewayMessage::Nack)),
                _ => Err(Error::malformed(raw, "unknown acknowledgement")),
            };
        }
        [single] => {
            let digits = &single[1..];
            return if is_number(digits) {
                Ok(Message::Gateway(GatewayMessage::Nonce {
                    digits: digits.to_owned(),
                }))
            } else {
                Err(Error::malformed(raw, "invalid nonce"))
            };
        }
        _ => {}
    }

    // Requests echoed back by the gateway, and dimension writes.
    if fields.len() <= 3 || fields.get(2).is_some_and(|d| d.starts_with('#')) {
        return Command::from_frame(frame).map(Message::Command);
    }

    let who = parse_who(frame)?;
    let address = fields[1].as_str();
    let dimension = fields[2].as_str();
    let values = &fields[3..];
    if !is_where(frame.who(), address) {
        return Err(Error::malformed(raw, "invalid WHERE"));
    }
    if !is_number(dimension) {
        return Err(Error::malformed(raw, "non-numeric dimension"));
    }

    let message = match who {
        who::LIGHTING => Message::Lighting(lighting_dimension(address, dimension, values)),
        who::AUTOMATION => Message::Automation(automation_dimension(address, dimension, values)),
        who::THERMOREGULATION => Message::Heating(heating_dimension(address, dimension, values)),
        who::ENERGY => Message::Energy(energy_dimension(address, dimension, values)),
        who::GATEWAY => Message::Gateway(GatewayMessage::Dimension {
            dimension: dimension.to_owned(),
            values: values.to_vec(),
        }),
        other => Message::GenericStatus(GenericStatus {
            who: other,
            what: None,
            address: address.to_owned(),
            dimension: Some(dimension.to_owned()),
            values: values.to_vec(),
        }),
    };
    Ok(message)
}

fn decode_event_form(frame: &Frame) -> Result<Message> {
    let raw = frame.raw();
    let fields = frame.fields();

    if let [who, session] = fields {
        match who.as_str() {
            "99" if is_number(session) => {
                return Ok(Message::Gateway(GatewayMessage::SessionRequest {
                    session: session.clone(),
                }));
            }
            "98" if is_number(session) => {
                return Ok(Message::Gateway(GatewayMessage::HmacMethod {
                    method: session.clone(),
                }));
            }
            _ => {}
        }
    }

    let [_, what, address, ..] = fields else {
        return Err(Error::malformed(raw, "fewer than 3 fields"));
    };
    let who = parse_who(frame)?;
    if what.is_empty() {
        return Err(Error::malformed(raw, "empty WHAT"));
    }
    if !is_where(frame.who(), address) {
        return Err(Error::malformed(raw, "invalid WHERE"));
    }

    let (what_code, what_param) = match what.split_once('#') {
        Some((code, param)) => (code, Some(param)),
        None => (what.as_str(), None),
    };
    let code: Option<u16> = what_code.parse().ok();
    let address = address.clone();

    let message = match (who, code) {
        (who::LIGHTING, _) => Message::Lighting(LightingEvent {
            address,
            is_on: code.and_then(light_state),
            brightness: None,
            brightness_preset: code
                .filter(|c| (2..=10).contains(c))
                .and_then(|c| u8::try_from(c).ok()),
        }),
        (who::AUTOMATION, _) => Message::Automation(AutomationEvent {
            address,
            state: code.and_then(shutter_state),
            position: None,
        }),
        (who::THERMOREGULATION, _) => Message::Heating(HeatingEvent {
            address,
            temperature: None,
            set_point: None,
            target: None,
            mode: code,
        }),
        (who::ENERGY, _) => Message::Energy(EnergyEvent {
            address,
            power: None,
            energy: None,
        }),
        (who::ALARM, _) => Message::Alarm(AlarmEvent {
            address,
            state: code,
        }),
        (who::AUXILIARY, _) => Message::Aux(AuxEvent {
            address,
            state: code,
            is_on: code.and_then(|c| match c {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            }),
        }),
        (who::CEN, _) => Message::Cen(CenEvent {
            address,
            button: what_code.parse().ok(),
            press: match what_param {
                None => Some(PressKind::Press),
                Some("1") => Some(PressKind::ReleaseShort),
                Some("2") => Some(PressKind::StartExtended),
                Some("3") => Some(PressKind::ReleaseExtended),
                Some(_) => None,
            },
        }),
        (who::CEN_PLUS_DRY_CONTACT, Some(31 | 32)) => Message::DryContact(DryContactEvent {
            address,
            is_on: code.map(|c| c == 31),
        }),
        (who::CEN_PLUS_DRY_CONTACT, Some(21..=24)) => Message::CenPlus(CenPlusEvent {
            address,
            button: what_param.and_then(|p| p.parse().ok()),
            press: match code {
                Some(21) => Some(PressKind::ReleaseShort),
                Some(22) => Some(PressKind::StartExtended),
                Some(23) => Some(PressKind::Extended),
                Some(24) => Some(PressKind::ReleaseExtended),
                _ => None,
            },
        }),
        (other, _) => Message::GenericStatus(GenericStatus {
            who: other,
            what: Some(what.clone()),
            address,
            dimension: None,
            values: fields[3..].to_vec(),
        }),
    };
    Ok(message)
}

fn parse_who(frame: &Frame) -> Result<u16> {
    let who = frame.who();
    if !is_number(who) {
        return Err(Error::malformed(frame.raw(), "non-numeric WHO"));
    }
    who.parse()
        .map_err(|_| Error::malformed(frame.raw(), "WHO out of range"))
}

fn light_state(what: u16) -> Option<bool> {
    match what {
        0 => Some(false),
        1..=18 | 20..=22 | 30 | 31 => Some(true),
        _ => None,
    }
}

fn shutter_state(what: u16) -> Option<ShutterState> {
    match what {
        0 => Some(ShutterState::Stopped),
        1 => Some(ShutterState::Opening),
        2 => Some(ShutterState::Closing),
        _ => None,
    }
}

/// `*#1*WHERE*1*LEVEL*SPEED##`, LEVEL = 100 + percent.
fn lighting_dimension(address: &str, dimension: &str, values: &[String]) -> LightingEvent {
    let brightness = match dimension {
        "1" => values
            .first()
            .and_then(|v| v.parse::<u16>().ok())
            .map(|level| level.saturating_sub(100).min(100))
            .and_then(|pct| u8::try_from(pct).ok()),
        _ => None,
    };
    LightingEvent {
        address: address.to_owned(),
        is_on: brightness.map(|b| b > 0),
        brightness,
        brightness_preset: None,
    }
}

/// `*#2*WHERE*10*STATUS*POSITION*PRIORITY*INFO##`
fn automation_dimension(address: &str, dimension: &str, values: &[String]) -> AutomationEvent {
    let (state, position) = if dimension == "10" {
        (
            values
                .first()
                .and_then(|v| v.parse().ok())
                .and_then(shutter_state),
            values
                .get(1)
                .and_then(|v| v.parse::<u8>().ok())
                .filter(|p| *p <= 100),
        )
    } else {
        (None, None)
    };
    AutomationEvent {
        address: address.to_owned(),
        state,
        position,
    }
}

fn heating_dimension(address: &str, dimension: &str, values: &[String]) -> HeatingEvent {
    let first = values.first().and_then(|v| parse_temperature(v));
    let mut event = HeatingEvent {
        address: address.to_owned(),
        temperature: None,
        set_point: None,
        target: None,
        mode: None,
    };
    match dimension {
        "0" => event.temperature = first,
        // `*#4*WHERE*15*PROBE*TTTT##`
        "15" => event.temperature = values.get(1).and_then(|v| parse_temperature(v)),
        "14" => event.set_point = first,
        "12" => event.target = first,
        _ => {}
    }
    event
}

fn energy_dimension(address: &str, dimension: &str, values: &[String]) -> EnergyEvent {
    let first = values.first();
    EnergyEvent {
        address: address.to_owned(),
        power: (dimension == "113")
            .then(|| first.and_then(|v| v.parse().ok()))
            .flatten(),
        energy: (dimension == "51")
            .then(|| first.and_then(|v| v.parse().ok()))
            .flatten(),
    }
}

/// Thermoregulation temperatures: `SNNN`, sign digit (`0` positive,
/// `1` negative) followed by tenths of a degree.
pub fn parse_temperature(raw: &str) -> Option<f64> {
    let (sign, digits) = raw.split_at_checked(1)?;
    if !is_number(digits) {
        return None;
    }
    let tenths: u32 = digits.parse().ok()?;
    let value = f64::from(tenths) / 10.0;
    match sign {
        "0" => Some(value),
        "1" => Some(-value),
        _ => None,
    }
}

// ── Display ──────────────────────────────────────────────────────────

fn on_off(v: Option<bool>) -> &'static str {
    match v {
        Some(true) => "on",
        Some(false) => "off",
        None => "unknown",
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lighting(e) => match (e.brightness, e.brightness_preset) {
                (Some(b), _) => write!(f, "Light {} at {b}%", e.address),
                (None, Some(p)) => write!(f, "Light {} at preset {}%", e.address, u16::from(p) * 10),
                (None, None) => write!(f, "Light {} is {}", e.address, on_off(e.is_on)),
            },
            Self::Automation(e) => match (e.state, e.position) {
                (_, Some(p)) => write!(f, "Cover {} at {p}%", e.address),
                (Some(s), None) => write!(f, "Cover {} is {s:?}", e.address),
                (None, None) => write!(f, "Cover {} reported", e.address),
            },
            Self::Energy(e) => match (e.power, e.energy) {
                (Some(p), _) => write!(f, "Meter {} power {p} W", e.address),
                (None, Some(wh)) => write!(f, "Meter {} total {wh} Wh", e.address),
                (None, None) => write!(f, "Meter {} reported", e.address),
            },
            Self::Heating(e) => match (e.temperature, e.set_point.or(e.target)) {
                (Some(t), _) => write!(f, "Zone {} temperature {t:.1}°C", e.address),
                (None, Some(t)) => write!(f, "Zone {} set to {t:.1}°C", e.address),
                (None, None) => write!(f, "Zone {} reported", e.address),
            },
            Self::DryContact(e) => write!(f, "Dry contact {} is {}", e.address, on_off(e.is_on)),
            Self::Aux(e) => write!(f, "Aux {} is {}", e.address, on_off(e.is_on)),
            Self::Cen(e) => write!(f, "CEN {} button {:?} {:?}", e.address, e.button, e.press),
            Self::CenPlus(e) => write!(f, "CEN+ {} button {:?} {:?}", e.address, e.button, e.press),
            Self::Alarm(e) => write!(f, "Alarm {} state {:?}", e.address, e.state),
            Self::GenericStatus(g) => write!(f, "WHO {} at {:?} reported", g.who, g.address),
            Self::Command(c) => write!(f, "Request {c}"),
            Self::Gateway(g) => write!(f, "Gateway {g:?}"),
        }
    }
}
