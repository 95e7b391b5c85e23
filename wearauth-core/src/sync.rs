//! Credential snapshot exchange between the phone and watch trust domains.
//!
//! The transport is a one-shot exchange with no conflict resolution: the
//! receiver replaces its contents with the incoming set, last snapshot wins.
//! Records carry the sender's numeric ids so the watch can echo them back in
//! per-account requests, but the receiving vault always assigns fresh ones.

use crate::account::{OtpAccount, OtpKind};
use crate::backup::{import_records, ImportMode};
use crate::clock::Clock;
use crate::vault::AccountVault;
use crate::{AuthenticatorError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_algorithm() -> String {
    "SHA1".to_string()
}

fn default_digits() -> u32 {
    6
}

fn default_period() -> u32 {
    30
}

fn default_kind() -> String {
    "TOTP".to_string()
}

/// One credential in a snapshot: the backup wire record plus the sender-side
/// id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAccount {
    pub id: i64,
    pub name: String,
    pub issuer: String,
    pub secret: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_digits")]
    pub digits: u32,
    #[serde(default = "default_period")]
    pub period: u32,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub counter: u64,
}

impl From<&OtpAccount> for SyncAccount {
    fn from(account: &OtpAccount) -> Self {
        Self {
            id: account.id.unwrap_or(0),
            name: account.name.clone(),
            issuer: account.issuer.clone(),
            secret: account.secret.clone(),
            algorithm: account.algorithm.clone(),
            digits: account.digits,
            period: account.period,
            kind: account.kind.to_string(),
            counter: account.counter,
        }
    }
}

impl SyncAccount {
    pub fn into_account(self) -> OtpAccount {
        OtpAccount {
            id: None,
            name: self.name,
            issuer: self.issuer,
            secret: self.secret,
            algorithm: self.algorithm,
            digits: self.digits,
            period: self.period,
            kind: OtpKind::from_wire(&self.kind),
            counter: self.counter,
        }
    }
}

/// A complete credential-set snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub accounts: Vec<SyncAccount>,
    pub timestamp: i64,
}

/// Serialize the vault's contents for transport to the paired device.
pub fn export_snapshot(vault: &AccountVault, clock: &dyn Clock) -> Result<String> {
    let snapshot = SyncSnapshot {
        accounts: vault.list()?.iter().map(SyncAccount::from).collect(),
        timestamp: clock.now_unix_millis(),
    };

    let json = serde_json::to_string(&snapshot)
        .map_err(|e| AuthenticatorError::Parse(format!("failed to encode snapshot: {}", e)))?;
    debug!(count = snapshot.accounts.len(), "exported snapshot");
    Ok(json)
}

/// Parse a received snapshot. A malformed document fails the whole exchange.
pub fn parse_snapshot(json: &str) -> Result<SyncSnapshot> {
    serde_json::from_str(json)
        .map_err(|e| AuthenticatorError::Parse(format!("invalid snapshot: {}", e)))
}

/// Replace the vault's contents with the snapshot, returning how many
/// records were applied. Records failing credential validation are skipped.
pub fn apply_snapshot(vault: &AccountVault, snapshot: SyncSnapshot) -> Result<usize> {
    let applied = import_records(
        vault,
        snapshot.accounts.into_iter().map(SyncAccount::into_account),
        ImportMode::Replace,
    )?;
    debug!(applied, "applied snapshot");
    Ok(applied)
}
