//! Raw OpenWebNet frames.
//!
//! Wire format:
//! ```text
//! *WHO*WHAT*WHERE##              command / event
//! *#WHO*WHERE##                  status request
//! *#WHO*WHERE*DIM##              dimension request
//! *#WHO*WHERE*DIM*V1*..*Vn##     dimension response
//! *#WHO*WHERE*#DIM*V1*..*Vn##    dimension write
//! *#*1##  *#*0##                 ACK / NACK
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub(crate) const START: char = '*';
pub(crate) const TERMINATOR: &str = "##";

/// A syntactically valid frame: the raw text plus its `*`-separated fields.
///
/// Fields keep their exact textual form (including any `#` prefixes), so
/// a frame always renders back to the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    raw: String,
    fields: Vec<String>,
}

impl Frame {
    /// Parse one complete frame (leading `*` through trailing `##`).
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.starts_with(START) {
            return Err(Error::malformed(raw, "missing leading `*`"));
        }
        if raw.len() < 4 || !raw.ends_with(TERMINATOR) {
            return Err(Error::malformed(raw, "missing `##` terminator"));
        }

        let body = &raw[1..raw.len() - TERMINATOR.len()];
        if body.contains(TERMINATOR) {
            return Err(Error::malformed(raw, "embedded `##` terminator"));
        }
        if let Some(bad) = body.chars().find(|c| !matches!(c, '0'..='9' | '*' | '#')) {
            tracing::trace!(character = ?bad, "rejecting frame with non-protocol character");
            return Err(Error::malformed(raw, "unexpected character"));
        }

        Ok(Self {
            raw: raw.to_owned(),
            fields: body.split(START).map(str::to_owned).collect(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// `true` for the `*#…` family (status, dimension and signalling frames).
    pub fn is_request_form(&self) -> bool {
        self.fields.first().is_some_and(|f| f.starts_with('#'))
    }

    /// WHO field with any `#` prefix stripped. Empty for ACK/NACK.
    pub fn who(&self) -> &str {
        self.field(0).map_or("", |f| f.trim_start_matches('#'))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Frame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Build a frame string from fields: `*f1*f2*…##`.
pub(crate) fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::with_capacity(32);
    for field in fields {
        out.push(START);
        out.push_str(field.as_ref());
    }
    out.push_str(TERMINATOR);
    out
}
