//! HOTP (RFC 4226) and TOTP (RFC 6238) code generation.

use crate::account::{OtpAccount, OtpKind, MAX_DIGITS, MIN_DIGITS};
use crate::{base32, AuthenticatorError, Result};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::str::FromStr;
use tracing::warn;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Supported HMAC algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl OtpAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            OtpAlgorithm::Sha1 => "SHA1",
            OtpAlgorithm::Sha256 => "SHA256",
            OtpAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl std::fmt::Display for OtpAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpAlgorithm {
    type Err = AuthenticatorError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SHA1" => Ok(OtpAlgorithm::Sha1),
            "SHA256" => Ok(OtpAlgorithm::Sha256),
            "SHA512" => Ok(OtpAlgorithm::Sha512),
            other => Err(AuthenticatorError::Generation(format!(
                "unsupported algorithm '{}'",
                other
            ))),
        }
    }
}

/// Compute an HOTP code: HMAC over the 8-byte big-endian counter, dynamic
/// truncation, modulo `10^digits`, left zero-padded.
pub fn hotp(secret_base32: &str, counter: u64, digits: u32, algorithm: OtpAlgorithm) -> Result<String> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(AuthenticatorError::Generation(format!(
            "digits must be between {} and {}",
            MIN_DIGITS, MAX_DIGITS
        )));
    }

    let key = base32::decode(secret_base32)
        .map_err(|e| AuthenticatorError::Generation(format!("invalid secret: {}", e)))?;
    let counter_bytes = counter.to_be_bytes();

    let digest = match algorithm {
        OtpAlgorithm::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(&key)
                .map_err(|_| AuthenticatorError::Generation("invalid secret".to_string()))?;
            mac.update(&counter_bytes);
            mac.finalize().into_bytes().to_vec()
        }
        OtpAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(&key)
                .map_err(|_| AuthenticatorError::Generation("invalid secret".to_string()))?;
            mac.update(&counter_bytes);
            mac.finalize().into_bytes().to_vec()
        }
        OtpAlgorithm::Sha512 => {
            let mut mac = HmacSha512::new_from_slice(&key)
                .map_err(|_| AuthenticatorError::Generation("invalid secret".to_string()))?;
            mac.update(&counter_bytes);
            mac.finalize().into_bytes().to_vec()
        }
    };

    // Dynamic truncation: the low 4 bits of the last byte select a 4-byte
    // window read as a big-endian 31-bit integer.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    let modulo = 10u64.pow(digits);
    let code = binary as u64 % modulo;
    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// Compute a TOTP code for the given timestamp: counter is the number of
/// whole periods elapsed since the Unix epoch. Timestamps before the epoch
/// clamp to zero.
pub fn totp(
    secret_base32: &str,
    period: u32,
    digits: u32,
    algorithm: OtpAlgorithm,
    now_unix: i64,
) -> Result<String> {
    if period == 0 {
        return Err(AuthenticatorError::Generation(
            "period must be greater than zero".to_string(),
        ));
    }

    let counter = (now_unix.max(0) as u64) / period as u64;
    hotp(secret_base32, counter, digits, algorithm)
}

/// Seconds until the next TOTP rotation, in `[1, period]`.
pub fn remaining_seconds(period: u32, now_unix: i64) -> u32 {
    if period == 0 {
        return 0;
    }

    let elapsed = now_unix.rem_euclid(period as i64) as u32;
    if elapsed == 0 {
        period
    } else {
        period - elapsed
    }
}

/// Compute the current code for a credential, selecting the counter rule by
/// kind. The engine never advances an HOTP counter; consuming a code and
/// persisting the increment is the caller's job
/// (`AccountVault::advance_counter`).
pub fn account_code(account: &OtpAccount, now_unix: i64) -> Result<String> {
    let algorithm = account.algorithm.parse::<OtpAlgorithm>()?;
    match account.kind {
        OtpKind::Totp => totp(
            &account.secret,
            account.period,
            account.digits,
            algorithm,
            now_unix,
        ),
        OtpKind::Hotp => hotp(&account.secret, account.counter, account.digits, algorithm),
    }
}

/// `account_code`, collapsing failures to a display sentinel so one bad
/// credential never blocks the rest of a polled list.
pub fn account_code_or_sentinel(account: &OtpAccount, now_unix: i64) -> String {
    match account_code(account, now_unix) {
        Ok(code) => code,
        Err(e) => {
            warn!(account = %account.name, error = %e, "code generation failed");
            code_sentinel(account.digits)
        }
    }
}

/// All-dashes placeholder shown in place of a code that could not be
/// generated.
pub fn code_sentinel(digits: u32) -> String {
    "-".repeat(digits.clamp(MIN_DIGITS, MAX_DIGITS) as usize)
}
