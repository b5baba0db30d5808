//! Outbound commands and request frames.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::{Frame, join_fields};

/// WHO of the gateway management subsystem.
pub const GATEWAY_WHO: &str = "13";

/// WHO of the burglar alarm subsystem; system-wide alarm frames have no WHERE.
pub const ALARM_WHO: &str = "5";

/// Dimensions of the gateway management subsystem.
pub mod gateway_dimension {
    pub const TIME: &str = "0";
    pub const DATE: &str = "1";
    pub const IP_ADDRESS: &str = "10";
    pub const NET_MASK: &str = "11";
    pub const MAC_ADDRESS: &str = "12";
    pub const MODEL: &str = "15";
    pub const FIRMWARE: &str = "16";
    pub const UPTIME: &str = "19";
    pub const DATETIME: &str = "22";
}

/// A frame the client sends to the gateway.
///
/// Field values are kept as text so that any well-formed command frame
/// parses and re-encodes to exactly the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// `*WHO*WHAT*WHERE##`
    Action {
        who: String,
        what: String,
        #[serde(rename = "where")]
        address: String,
    },
    /// `*#WHO*WHERE##`
    StatusRequest {
        who: String,
        #[serde(rename = "where")]
        address: String,
    },
    /// `*#WHO*WHERE*DIM##`
    DimensionRequest {
        who: String,
        #[serde(rename = "where")]
        address: String,
        dimension: String,
    },
    /// `*#WHO*WHERE*#DIM*V1*…##`
    DimensionWrite {
        who: String,
        #[serde(rename = "where")]
        address: String,
        dimension: String,
        values: Vec<String>,
    },
}

impl Command {
    // ── Constructors ─────────────────────────────────────────────────

    pub fn action(who: impl Into<String>, what: impl Into<String>, address: impl Into<String>) -> Self {
        Self::Action {
            who: who.into(),
            what: what.into(),
            address: address.into(),
        }
    }

    pub fn status_request(who: impl Into<String>, address: impl Into<String>) -> Self {
        Self::StatusRequest {
            who: who.into(),
            address: address.into(),
        }
    }

    pub fn dimension_request(
        who: impl Into<String>,
        address: impl Into<String>,
        dimension: impl Into<String>,
    ) -> Self {
        Self::DimensionRequest {
            who: who.into(),
            address: address.into(),
            dimension: dimension.into(),
        }
    }

    /// Query one gateway management dimension (`*#13**DIM##`).
    pub fn gateway_query(dimension: &str) -> Self {
        Self::dimension_request(GATEWAY_WHO, "", dimension)
    }

    /// Set the gateway clock:
    /// `*#13**#22*HH*MM*SS*ZZZ*WD*DD*MM*YYYY##`.
    ///
    /// `ZZZ` is a sign digit (`0` east of UTC, `1` west) followed by the
    /// whole-hour offset; `WD` counts days from Sunday (`00`).
    pub fn set_datetime(now: &DateTime<FixedOffset>) -> Self {
        let offset_secs = now.offset().local_minus_utc();
        let sign = if offset_secs < 0 { '1' } else { '0' };
        let offset_hours = offset_secs.unsigned_abs() / 3600;

        Self::DimensionWrite {
            who: GATEWAY_WHO.into(),
            address: String::new(),
            dimension: gateway_dimension::DATETIME.into(),
            values: vec![
                format!("{:02}", now.hour()),
                format!("{:02}", now.minute()),
                format!("{:02}", now.second()),
                format!("{sign}{offset_hours:02}"),
                format!("{:02}", now.weekday().num_days_from_sunday()),
                format!("{:02}", now.day()),
                format!("{:02}", now.month()),
                format!("{:04}", now.year()),
            ],
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn who(&self) -> &str {
        match self {
            Self::Action { who, .. }
            | Self::StatusRequest { who, .. }
            | Self::DimensionRequest { who, .. }
            | Self::DimensionWrite { who, .. } => who,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::Action { address, .. }
            | Self::StatusRequest { address, .. }
            | Self::DimensionRequest { address, .. }
            | Self::DimensionWrite { address, .. } => address,
        }
    }

    /// `true` for frames that ask the gateway to report state rather than change it.
    pub fn is_request(&self) -> bool {
        matches!(self, Self::StatusRequest { .. } | Self::DimensionRequest { .. })
    }

    // ── Wire conversion ──────────────────────────────────────────────

    /// Parse a command frame.
    pub fn parse(raw: &str) -> Result<Self> {
        let frame = Frame::parse(raw)?;
        Self::from_frame(&frame)
    }

    pub(crate) fn from_frame(frame: &Frame) -> Result<Self> {
        let raw = frame.raw();
        let fields = frame.fields();

        if frame.is_request_form() {
            let who = frame.who();
            if who.is_empty() || who.contains('#') {
                return Err(Error::malformed(raw, "request without WHO"));
            }
            let address = fields.get(1).ok_or_else(|| Error::malformed(raw, "request without WHERE"))?;
            check_address(raw, who, address)?;

            return match fields.get(2..).unwrap_or_default() {
                [] => Ok(Self::status_request(who, address.as_str())),
                [dimension] if is_number(dimension) => {
                    Ok(Self::dimension_request(who, address.as_str(), dimension.as_str()))
                }
                [dimension, values @ ..] if !values.is_empty() => {
                    let dimension = dimension
                        .strip_prefix('#')
                        .filter(|d| is_number(d))
                        .ok_or_else(|| Error::malformed(raw, "dimension write without `#DIM`"))?;
                    if !values.iter().all(|v| is_number(v)) {
                        return Err(Error::malformed(raw, "non-numeric dimension value"));
                    }
                    Ok(Self::DimensionWrite {
                        who: who.to_owned(),
                        address: address.clone(),
                        dimension: dimension.to_owned(),
                        values: values.to_vec(),
                    })
                }
                _ => Err(Error::malformed(raw, "unsupported request shape")),
            };
        }

        match fields {
            [who, what, address] => {
                if !is_number(who) {
                    return Err(Error::malformed(raw, "non-numeric WHO"));
                }
                if what.is_empty() {
                    return Err(Error::malformed(raw, "empty WHAT"));
                }
                check_address(raw, who, address)?;
                Ok(Self::action(who.as_str(), what.as_str(), address.as_str()))
            }
            _ => Err(Error::malformed(raw, "expected *WHO*WHAT*WHERE##")),
        }
    }

    /// Render the wire frame, validating every field.
    pub fn encode(&self) -> Result<String> {
        let who = self.who();
        if !is_number(who) {
            return Err(unencodable(format!("WHO must be numeric, got `{who}`")));
        }
        let address = self.address();
        if !is_where(who, address) {
            return Err(unencodable(format!("invalid WHERE `{address}`")));
        }

        let frame = match self {
            Self::Action { what, .. } => {
                if !is_address(what) {
                    return Err(unencodable(format!("invalid WHAT `{what}`")));
                }
                join_fields([who, what.as_str(), address])
            }
            Self::StatusRequest { .. } => join_fields([format!("#{who}").as_str(), address]),
            Self::DimensionRequest { dimension, .. } => {
                if !is_number(dimension) {
                    return Err(unencodable(format!("invalid dimension `{dimension}`")));
                }
                join_fields([format!("#{who}").as_str(), address, dimension.as_str()])
            }
            Self::DimensionWrite {
                dimension, values, ..
            } => {
                if !is_number(dimension) {
                    return Err(unencodable(format!("invalid dimension `{dimension}`")));
                }
                if values.is_empty() {
                    return Err(unencodable("dimension write without values".into()));
                }
                if let Some(bad) = values.iter().find(|v| !is_number(v)) {
                    return Err(unencodable(format!("invalid dimension value `{bad}`")));
                }
                let head = [format!("#{who}"), address.to_owned(), format!("#{dimension}")];
                join_fields(head.iter().chain(values.iter()))
            }
        };
        Ok(frame)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(frame) => f.write_str(&frame),
            Err(_) => write!(f, "<invalid {} command>", self.who()),
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ── Field validation ─────────────────────────────────────────────────

pub(crate) fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// WHERE / WHAT: digits with optional `#` parameters, never starting or
/// ending on `#` and never containing `##`.
fn is_address(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit() || b == b'#')
        && !s.starts_with('#')
        && !s.ends_with('#')
        && !s.contains("##")
}

/// Group addresses (`#5`) carry one leading `#`; only the gateway and
/// alarm subsystems accept an empty WHERE.
pub(crate) fn is_where(who: &str, address: &str) -> bool {
    if address.is_empty() {
        return who == GATEWAY_WHO || who == ALARM_WHO;
    }
    is_address(address.strip_prefix('#').unwrap_or(address))
}

fn check_address(raw: &str, who: &str, address: &str) -> Result<()> {
    if is_where(who, address) {
        Ok(())
    } else {
        Err(Error::malformed(raw, "invalid WHERE"))
    }
}

fn unencodable(reason: String) -> Error {
    Error::UnencodableCommand { reason }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn command_frames_round_trip() {
        for raw in [
            "*1*1*12##",
            "*1*0*0##",
            "*2*2*41##",
            "*1*1*12#4#01##",
            "*1*0*#5##",
            "*15*3#1*21##",
            "*#1*12##",
            "*#4*1*0##",
            "*#18*51*113##",
            "*#1*12*#1*150*0##",
            "*#13**15##",
            "*#13**#22*10*30*00*001*03*17*10*2026##",
        ] {
            let cmd = Command::parse(raw).unwrap();
            assert_eq!(cmd.encode().unwrap(), raw, "round trip of {raw}");
        }
    }

    #[test]
    fn parse_distinguishes_shapes() {
        assert_eq!(
            Command::parse("*#2*41##").unwrap(),
            Command::status_request("2", "41")
        );
        assert_eq!(
            Command::parse("*#4*1*0##").unwrap(),
            Command::dimension_request("4", "1", "0")
        );
        assert!(matches!(
            Command::parse("*#1*12*#1*150*0##").unwrap(),
            Command::DimensionWrite { ref dimension, ref values, .. } if dimension == "1" && values.len() == 2
        ));
    }

    #[test]
    fn rejects_short_or_malformed_commands() {
        for raw in ["*1*1##", "*1*1*12*4##", "*a*1*12##", "*#*1##", "*#1*12*1*150##", "*1**12##"] {
            assert!(Command::parse(raw).is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn encode_rejects_bad_fields() {
        let cases = [
            Command::action("", "1", "12"),
            Command::action("1", "", "12"),
            Command::action("1", "1", ""),
            Command::action("1", "1*1", "12"),
            Command::action("1", "1", "12##"),
            Command::status_request("x", "12"),
            Command::dimension_request("4", "1", ""),
            Command::DimensionWrite {
                who: "1".into(),
                address: "12".into(),
                dimension: "1".into(),
                values: Vec::new(),
            },
        ];
        for cmd in cases {
            let err = cmd.encode().unwrap_err();
            assert!(matches!(err, Error::UnencodableCommand { .. }), "{cmd:?}");
        }
    }

    #[test]
    fn gateway_address_may_be_empty() {
        assert_eq!(Command::gateway_query(gateway_dimension::MODEL).encode().unwrap(), "*#13**15##");
        assert!(Command::status_request("1", "").encode().is_err());
    }

    #[test]
    fn set_datetime_frame() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 10, 18, 9, 5, 7).unwrap();
        assert_eq!(
            Command::set_datetime(&now).encode().unwrap(),
            "*#13**#22*09*05*07*002*00*18*10*2026##"
        );

        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let then = west.with_ymd_and_hms(2026, 1, 7, 23, 59, 0).unwrap();
        assert_eq!(
            Command::set_datetime(&then).encode().unwrap(),
            "*#13**#22*23*59*00*105*03*07*01*2026##"
        );
    }
}
