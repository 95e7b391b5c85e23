//! Credential data model.

use crate::{base32, AuthenticatorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounds applied to `digits` when a credential is constructed or parsed.
pub const MIN_DIGITS: u32 = 4;
pub const MAX_DIGITS: u32 = 10;

/// Bounds applied to `period` (seconds) when a credential is constructed or
/// parsed. HOTP credentials carry a period too but never consult it.
pub const MIN_PERIOD: u32 = 1;
pub const MAX_PERIOD: u32 = 300;

/// Which counter-derivation rule applies to a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpKind {
    Totp,
    Hotp,
}

impl OtpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OtpKind::Totp => "TOTP",
            OtpKind::Hotp => "HOTP",
        }
    }

    /// Wire fallback rule: `"HOTP"` (case-insensitive) selects HOTP, every
    /// other value is read as TOTP. Applied wherever a kind string crosses a
    /// deserialization boundary (backup files, snapshots, database rows).
    pub fn from_wire(value: &str) -> Self {
        if value.eq_ignore_ascii_case("HOTP") {
            OtpKind::Hotp
        } else {
            OtpKind::Totp
        }
    }
}

impl fmt::Display for OtpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored OTP credential.
///
/// `id` is `None` until the vault assigns one at insert. `algorithm` stays a
/// free string here; an unsupported value surfaces as a generation error when
/// a code is computed, not before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpAccount {
    pub id: Option<i64>,
    pub name: String,
    pub issuer: String,
    pub secret: String,
    pub algorithm: String,
    pub digits: u32,
    pub period: u32,
    pub kind: OtpKind,
    pub counter: u64,
}

impl Default for OtpAccount {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            issuer: String::new(),
            secret: String::new(),
            algorithm: "SHA1".to_string(),
            digits: 6,
            period: 30,
            kind: OtpKind::Totp,
            counter: 0,
        }
    }
}

impl OtpAccount {
    /// Build a TOTP credential with default parameters. The secret is
    /// normalized to its stored form.
    pub fn new(name: &str, issuer: &str, secret: &str) -> Result<Self> {
        let account = Self {
            name: name.to_string(),
            issuer: issuer.to_string(),
            secret: base32::normalize(secret)?,
            ..Self::default()
        };
        account.validate()?;
        Ok(account)
    }

    /// Check the credential invariants: non-empty trimmed name, decodable
    /// secret, digits and period within bounds.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AuthenticatorError::Validation(
                "account name cannot be empty".to_string(),
            ));
        }
        if !base32::is_valid(&self.secret) {
            return Err(AuthenticatorError::Validation(
                "secret must be valid base32".to_string(),
            ));
        }
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&self.digits) {
            return Err(AuthenticatorError::Validation(format!(
                "digits must be between {} and {}",
                MIN_DIGITS, MAX_DIGITS
            )));
        }
        if !(MIN_PERIOD..=MAX_PERIOD).contains(&self.period) {
            return Err(AuthenticatorError::Validation(format!(
                "period must be between {} and {} seconds",
                MIN_PERIOD, MAX_PERIOD
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_secret() {
        let account = OtpAccount::new("alice", "Example", "jbsw y3dp ehpk 3pxp").unwrap();
        assert_eq!(account.secret, "JBSWY3DPEHPK3PXP");
        assert_eq!(account.algorithm, "SHA1");
        assert_eq!(account.digits, 6);
        assert_eq!(account.period, 30);
        assert_eq!(account.kind, OtpKind::Totp);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let account = OtpAccount {
            name: "   ".to_string(),
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            ..OtpAccount::default()
        };
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_secret() {
        let account = OtpAccount {
            name: "alice".to_string(),
            secret: "not base32!".to_string(),
            ..OtpAccount::default()
        };
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let base = OtpAccount {
            name: "alice".to_string(),
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            ..OtpAccount::default()
        };

        let account = OtpAccount { digits: 3, ..base.clone() };
        assert!(account.validate().is_err());

        let account = OtpAccount { digits: 11, ..base.clone() };
        assert!(account.validate().is_err());

        let account = OtpAccount { period: 0, ..base.clone() };
        assert!(account.validate().is_err());

        let account = OtpAccount { period: 301, ..base };
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_kind_wire_fallback() {
        assert_eq!(OtpKind::from_wire("HOTP"), OtpKind::Hotp);
        assert_eq!(OtpKind::from_wire("hotp"), OtpKind::Hotp);
        assert_eq!(OtpKind::from_wire("TOTP"), OtpKind::Totp);
        assert_eq!(OtpKind::from_wire("steam"), OtpKind::Totp);
        assert_eq!(OtpKind::from_wire(""), OtpKind::Totp);
    }
}
