// ── Gateway identity ──
//
// Every gateway, and therefore every discovered device key, is anchored
// on the gateway's MAC address.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

/// Returned when a string is not a 48-bit MAC address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a MAC address")]
pub struct InvalidMac(pub String);

impl MacAddress {
    /// Parse a MAC address from any common format.
    /// Accepts colon-separated, dash-separated, or bare hex.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidMac> {
        let raw = raw.as_ref().trim();
        let hex: String = raw
            .chars()
            .filter(|c| !matches!(c, ':' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let separators = raw.chars().filter(|c| matches!(c, ':' | '-')).count();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) || !matches!(separators, 0 | 5) {
            return Err(InvalidMac(raw.to_owned()));
        }

        let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
        Ok(Self(octets.join(":")))
    }

    /// Build from the six decimal octets the gateway reports for dimension 12.
    pub fn from_decimal_octets<S: AsRef<str>>(values: &[S]) -> Option<Self> {
        if values.len() != 6 {
            return None;
        }
        let octets: Option<Vec<String>> = values
            .iter()
            .map(|v| v.as_ref().parse::<u8>().ok().map(|b| format!("{b:02x}")))
            .collect();
        octets.map(|o| Self(o.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = InvalidMac;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}
