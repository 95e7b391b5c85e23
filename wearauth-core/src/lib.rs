//! WearAuth Core Library
//!
//! This library provides the core functionality shared by the phone and
//! watch applications: HOTP/TOTP code generation, otpauth URI handling,
//! the credential vault, the password lock gate, and backup/sync codecs.

pub mod account;
pub mod backup;
pub mod base32;
pub mod clock;
pub mod lock;
pub mod otp;
pub mod sync;
pub mod uri;
pub mod vault;

pub use account::{OtpAccount, OtpKind};
pub use backup::{export_backup, import_backup, BackupData, BackupInfo, ImportMode};
pub use clock::{Clock, ManualClock, SystemClock};
pub use lock::{
    classify_password, keystore::SecretKeyStore, keystore::SoftwareKeyStore, LockGate,
    LockSettings, LockState, PasswordStrength, StoredPassword,
};
pub use otp::{account_code, hotp, remaining_seconds, totp, OtpAlgorithm};
pub use sync::{apply_snapshot, export_snapshot, parse_snapshot, SyncSnapshot};
pub use uri::{parse_otpauth_uri, serialize_otpauth_uri};
pub use vault::AccountVault;

use thiserror::Error;

/// Result type for authenticator core operations
pub type Result<T> = std::result::Result<T, AuthenticatorError>;

/// General error type for authenticator core operations
#[derive(Error, Debug)]
pub enum AuthenticatorError {
    #[error("Invalid base32: {0}")]
    Format(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Code generation failed: {0}")]
    Generation(String),

    #[error("Parse failure: {0}")]
    Parse(String),

    /// Carries no detail: a caller cannot tell a wrong password from an
    /// absent one.
    #[error("Authentication failed")]
    Auth,

    #[error("Crypto error: {0}")]
    Crypto(#[from] lock::keystore::CryptoError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Vault lock poisoned")]
    LockPoisoned,
}
