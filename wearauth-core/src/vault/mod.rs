//! Credential vault backed by sqlite.
//!
//! The vault is constructed explicitly and passed to whoever needs it; there
//! is no process-wide instance. A single mutex around the connection
//! serializes mutations against `list()` readers.


use crate::account::{OtpAccount, OtpKind};
use crate::{base32, AuthenticatorError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// The authoritative set of stored credentials.
pub struct AccountVault {
    conn: Mutex<Connection>,
}

impl AccountVault {
    /// Open (creating if needed) a vault database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::initialize(Connection::open(path)?)
    }

    /// Open an in-memory vault, used by tests.
    pub fn in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS otp_accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                issuer TEXT NOT NULL DEFAULT '',
                secret TEXT NOT NULL,
                algorithm TEXT NOT NULL DEFAULT 'SHA1',
                digits INTEGER NOT NULL DEFAULT 6,
                period INTEGER NOT NULL DEFAULT 30,
                type TEXT NOT NULL DEFAULT 'TOTP',
                counter INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_otp_accounts_order
             ON otp_accounts (issuer, name)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AuthenticatorError::LockPoisoned)
    }

    /// Insert a credential, assigning a fresh id. The secret is stored in
    /// normalized form. Fails with a validation error before touching the
    /// database if any credential invariant is violated.
    pub fn insert(&self, account: &OtpAccount) -> Result<i64> {
        account.validate()?;
        let secret = base32::normalize(&account.secret)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO otp_accounts (name, issuer, secret, algorithm, digits, period, type, counter)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                account.name,
                account.issuer,
                secret,
                account.algorithm,
                account.digits,
                account.period,
                account.kind.as_str(),
                account.counter as i64,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, name = %account.name, issuer = %account.issuer, "inserted account");
        Ok(id)
    }

    /// Fetch one credential by id.
    pub fn get(&self, id: i64) -> Result<OtpAccount> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, issuer, secret, algorithm, digits, period, type, counter
             FROM otp_accounts WHERE id = ?1",
            [id],
            row_to_account,
        )
        .optional()?
        .ok_or_else(|| AuthenticatorError::NotFound(format!("account {}", id)))
    }

    /// All credentials ordered by `(issuer, name)`, id as a stable tiebreak.
    pub fn list(&self) -> Result<Vec<OtpAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, issuer, secret, algorithm, digits, period, type, counter
             FROM otp_accounts ORDER BY issuer, name, id",
        )?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Replace every field of the credential at `id` (except the id itself).
    pub fn update(&self, id: i64, account: &OtpAccount) -> Result<()> {
        account.validate()?;
        let secret = base32::normalize(&account.secret)?;

        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE otp_accounts
             SET name = ?1, issuer = ?2, secret = ?3, algorithm = ?4,
                 digits = ?5, period = ?6, type = ?7, counter = ?8
             WHERE id = ?9",
            params![
                account.name,
                account.issuer,
                secret,
                account.algorithm,
                account.digits,
                account.period,
                account.kind.as_str(),
                account.counter as i64,
                id,
            ],
        )?;

        if updated == 0 {
            return Err(AuthenticatorError::NotFound(format!("account {}", id)));
        }
        debug!(id, "updated account");
        Ok(())
    }

    /// Delete one credential.
    pub fn delete(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM otp_accounts WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(AuthenticatorError::NotFound(format!("account {}", id)));
        }
        debug!(id, "deleted account");
        Ok(())
    }

    /// Delete every credential, returning how many were removed.
    pub fn delete_all(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM otp_accounts", [])?;
        debug!(deleted, "cleared vault");
        Ok(deleted)
    }

    /// Find a credential matching exactly on both name and issuer, the
    /// identity import/merge deduplicates on.
    pub fn find_duplicate(&self, name: &str, issuer: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM otp_accounts WHERE name = ?1 AND issuer = ?2 LIMIT 1",
                params![name, issuer],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Consume an HOTP code: increment the stored counter by exactly one and
    /// return the new value. The code generator itself never does this.
    pub fn advance_counter(&self, id: i64) -> Result<u64> {
        let conn = self.conn()?;
        let (kind, counter): (String, i64) = conn
            .query_row(
                "SELECT type, counter FROM otp_accounts WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| AuthenticatorError::NotFound(format!("account {}", id)))?;

        if OtpKind::from_wire(&kind) != OtpKind::Hotp {
            return Err(AuthenticatorError::Validation(
                "counter advance only applies to HOTP credentials".to_string(),
            ));
        }

        let next = counter.max(0) as u64 + 1;
        conn.execute(
            "UPDATE otp_accounts SET counter = ?1 WHERE id = ?2",
            params![next as i64, id],
        )?;
        debug!(id, counter = next, "advanced hotp counter");
        Ok(next)
    }

    /// Number of stored credentials.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM otp_accounts", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<OtpAccount> {
    let kind: String = row.get(7)?;
    let counter: i64 = row.get(8)?;
    Ok(OtpAccount {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        issuer: row.get(2)?,
        secret: row.get(3)?,
        algorithm: row.get(4)?,
        digits: row.get(5)?,
        period: row.get(6)?,
        kind: OtpKind::from_wire(&kind),
        counter: counter.max(0) as u64,
    })
}
