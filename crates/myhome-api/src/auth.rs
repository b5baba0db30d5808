//! Gateway authentication algorithms.
//!
//! Two schemes exist in the field:
//!
//! - **OPEN password**: the gateway sends a numeric nonce and the client
//!   answers with a 32-bit scramble of its numeric password.
//! - **HMAC** (`*98*1##` SHA-1, `*98*2##` SHA-256): a mutual challenge
//!   where both sides prove knowledge of the password digest. On the wire
//!   every hex digit travels as two decimal digits.

use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Error, Result};

/// Fixed client/server identities mixed into the client proof.
const CLIENT_ID: &str = "736F70653E";
const SERVER_ID: &str = "636F70653E";

// ── OPEN password ────────────────────────────────────────────────────

/// Scramble a numeric password with the gateway nonce.
pub fn open_password(password: &str, nonce: &str) -> Result<String> {
    let password: u32 = password.trim().parse().map_err(|_| Error::PasswordError)?;

    let mut started = false;
    let mut num1: u32 = 0;
    let mut num2: u32 = 0;

    for c in nonce.chars() {
        if c != '0' && !started {
            num2 = password;
            started = true;
        }
        num1 = match c {
            '1' => {
                let n = (num2 & 0xFFFF_FF80) >> 7;
                num2 <<= 25;
                n
            }
            '2' => {
                let n = (num2 & 0xFFFF_FFF0) >> 4;
                num2 <<= 28;
                n
            }
            '3' => {
                let n = (num2 & 0xFFFF_FFF8) >> 3;
                num2 <<= 29;
                n
            }
            '4' => {
                let n = num2 << 1;
                num2 >>= 31;
                n
            }
            '5' => {
                let n = num2 << 5;
                num2 >>= 27;
                n
            }
            '6' => {
                let n = num2 << 12;
                num2 >>= 20;
                n
            }
            '7' => {
                let n = (num2 & 0x0000_FF00) | ((num2 & 0x0000_00FF) << 24) | ((num2 & 0x00FF_0000) >> 16);
                num2 = (num2 & 0xFF00_0000) >> 8;
                n
            }
            '8' => {
                let n = ((num2 & 0x0000_FFFF) << 16) | (num2 >> 24);
                num2 = (num2 & 0x00FF_0000) >> 8;
                n
            }
            '9' => !num2,
            '0' => num2,
            _ => return Err(Error::Handshake {
                message: format!("non-numeric nonce `{nonce}`"),
            }),
        };
        if c != '0' && c != '9' {
            num1 |= num2;
        }
        num2 = num1;
    }

    Ok(num1.to_string())
}

// ── HMAC ─────────────────────────────────────────────────────────────

/// Digest used by the HMAC handshake, selected by the gateway's `*98*N##`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacAlgorithm {
    Sha1,
    Sha256,
}

impl HmacAlgorithm {
    /// Map the `N` of `*98*N##`.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "1" => Some(Self::Sha1),
            "2" => Some(Self::Sha256),
            _ => None,
        }
    }

    fn digest_algorithm(self) -> &'static digest::Algorithm {
        match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn hex_digest(self, data: &str) -> String {
        to_hex(digest::digest(self.digest_algorithm(), data.as_bytes()).as_ref())
    }

    /// Fresh client challenge `Rb` as lowercase hex, one digest long.
    pub fn random_challenge(self, rng: &SystemRandom) -> Result<String> {
        let mut bytes = vec![0u8; self.digest_algorithm().output_len()];
        rng.fill(&mut bytes).map_err(|_| Error::Handshake {
            message: "system random source unavailable".into(),
        })?;
        Ok(self.hex_digest(&to_hex(&bytes)))
    }

    /// Client proof: `H(Ra ‖ Rb ‖ A ‖ B ‖ H(password))`, hex.
    pub fn client_proof(self, ra: &str, rb: &str, password: &str) -> String {
        let kab = self.hex_digest(password);
        self.hex_digest(&format!("{ra}{rb}{CLIENT_ID}{SERVER_ID}{kab}"))
    }

    /// Expected gateway confirmation: `H(Ra ‖ Rb ‖ H(password))`, hex.
    pub fn server_proof(self, ra: &str, rb: &str, password: &str) -> String {
        let kab = self.hex_digest(password);
        self.hex_digest(&format!("{ra}{rb}{kab}"))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Wire form of a hex string: each hex digit becomes two decimal digits.
pub fn hex_to_digits(hex: &str) -> Option<String> {
    hex.chars()
        .map(|c| c.to_digit(16).map(|d| format!("{d:02}")))
        .collect()
}

/// Inverse of [`hex_to_digits`].
pub fn digits_to_hex(digits: &str) -> Option<String> {
    if digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let value = u32::from(pair[0] - b'0') * 10 + u32::from(pair[1] - b'0');
            char::from_digit(value, 16)
        })
        .collect()
}
