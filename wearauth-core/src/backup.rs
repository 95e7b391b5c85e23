//! Backup export/import in the JSON interchange format.
//!
//! The file shape is `{version, timestamp, accounts: [...]}` with per-account
//! defaults for absent fields. A malformed file is a single fatal failure; a
//! single record failing credential validation is skipped and the rest of the
//! import proceeds.

use crate::account::{OtpAccount, OtpKind};
use crate::clock::Clock;
use crate::vault::AccountVault;
use crate::{AuthenticatorError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const BACKUP_VERSION: &str = "1.0";

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

/// One credential on the wire. `id` is deliberately absent: ids are local to
/// a vault and reassigned on import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupAccount {
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

impl From<&OtpAccount> for BackupAccount {
    fn from(account: &OtpAccount) -> Self {
        Self {
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

impl BackupAccount {
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

/// A complete backup document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupData {
    pub version: String,
    pub timestamp: i64,
    pub accounts: Vec<BackupAccount>,
}

/// Header summary of a backup file, shown before the user confirms an
/// import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub version: String,
    pub timestamp: i64,
    pub account_count: usize,
}

/// How incoming records combine with the existing vault contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Skip records whose `(name, issuer)` pair already exists.
    Merge,
    /// Drop everything first, then insert the incoming set.
    Replace,
}

/// Serialize the whole vault to a backup document. The timestamp is epoch
/// milliseconds from the injected clock.
pub fn export_backup(vault: &AccountVault, clock: &dyn Clock) -> Result<String> {
    let accounts: Vec<BackupAccount> = vault.list()?.iter().map(BackupAccount::from).collect();
    let data = BackupData {
        version: BACKUP_VERSION.to_string(),
        timestamp: clock.now_unix_millis(),
        accounts,
    };

    let json = serde_json::to_string_pretty(&data)
        .map_err(|e| AuthenticatorError::Parse(format!("failed to encode backup: {}", e)))?;
    debug!(count = data.accounts.len(), "exported backup");
    Ok(json)
}

/// Read the header of a backup document without touching the vault.
pub fn backup_info(json: &str) -> Result<BackupInfo> {
    let data = parse_backup(json)?;
    Ok(BackupInfo {
        version: data.version,
        timestamp: data.timestamp,
        account_count: data.accounts.len(),
    })
}

/// Parse a backup document. Malformed JSON or a wrong top-level shape fails
/// the whole operation.
pub fn parse_backup(json: &str) -> Result<BackupData> {
    serde_json::from_str(json)
        .map_err(|e| AuthenticatorError::Parse(format!("invalid backup file: {}", e)))
}

/// Import a backup document into the vault, returning how many records were
/// inserted.
pub fn import_backup(vault: &AccountVault, json: &str, mode: ImportMode) -> Result<usize> {
    let data = parse_backup(json)?;
    let inserted = import_records(
        vault,
        data.accounts.into_iter().map(BackupAccount::into_account),
        mode,
    )?;
    debug!(inserted, ?mode, "imported backup");
    Ok(inserted)
}

pub(crate) fn import_records<I>(vault: &AccountVault, accounts: I, mode: ImportMode) -> Result<usize>
where
    I: IntoIterator<Item = OtpAccount>,
{
    if mode == ImportMode::Replace {
        vault.delete_all()?;
    }

    let mut inserted = 0;
    for account in accounts {
        if let Err(e) = account.validate() {
            warn!(name = %account.name, error = %e, "skipping invalid record");
            continue;
        }
        if mode == ImportMode::Merge
            && vault.find_duplicate(&account.name, &account.issuer)?.is_some()
        {
            debug!(name = %account.name, issuer = %account.issuer, "skipping duplicate");
            continue;
        }
        vault.insert(&account)?;
        inserted += 1;
    }

    Ok(inserted)
}
