//! Password gate guarding vault access.
//!
//! The gate tracks a two-state machine (`Unlocked`/`Locked`) driven by
//! background/foreground transitions and password verification. Entering
//! `Locked` never touches vault data; it only signals that the surrounding
//! app must withhold the vault until `verify` succeeds. Failed attempts are
//! not counted and there is no backoff, a known hardening gap.

pub mod keystore;

use crate::{AuthenticatorError, Result};
use keystore::SecretKeyStore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Gate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
}

/// Lock policy knobs, owned by the host's settings screen.
#[derive(Debug, Clone)]
pub struct LockSettings {
    pub password_lock_enabled: bool,
    /// Lock the instant the app backgrounds instead of waiting for the
    /// timeout.
    pub lock_on_background: bool,
    pub auto_lock_timeout_secs: u32,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            password_lock_enabled: false,
            lock_on_background: false,
            auto_lock_timeout_secs: 30,
        }
    }
}

/// The encrypted password blob plus its IV. Persisting this wherever the
/// host keeps small settings is the host's job; it is only "set" when both
/// parts are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPassword {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Password strength buckets, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Empty,
    TooShort,
    Weak,
    Medium,
    Strong,
}

/// Bucket a candidate password: empty, under 4, under 6, under 8 characters,
/// then `Strong` only for 8+ characters mixing letters and digits (8+
/// without the mix stays `Medium`).
pub fn classify_password(password: &str) -> PasswordStrength {
    let length = password.chars().count();
    if length == 0 {
        PasswordStrength::Empty
    } else if length < 4 {
        PasswordStrength::TooShort
    } else if length < 6 {
        PasswordStrength::Weak
    } else if length < 8 {
        PasswordStrength::Medium
    } else if password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_alphabetic())
    {
        PasswordStrength::Strong
    } else {
        PasswordStrength::Medium
    }
}

/// Password-based gate over vault access.
pub struct LockGate {
    keystore: Box<dyn SecretKeyStore>,
    settings: LockSettings,
    stored: Option<StoredPassword>,
    state: LockState,
    backgrounded_at: Option<i64>,
    lock_deadline: Option<i64>,
}

impl LockGate {
    /// A fresh gate with no password set, starting unlocked.
    pub fn new(keystore: Box<dyn SecretKeyStore>, settings: LockSettings) -> Self {
        Self::restore(keystore, settings, None)
    }

    /// Rebuild a gate from a persisted password blob, e.g. at app startup.
    /// Starts locked iff the lock is enabled and a password exists.
    pub fn restore(
        keystore: Box<dyn SecretKeyStore>,
        settings: LockSettings,
        stored: Option<StoredPassword>,
    ) -> Self {
        let has_password = stored
            .as_ref()
            .map(|s| !s.ciphertext.is_empty() && !s.iv.is_empty())
            .unwrap_or(false);
        let state = if settings.password_lock_enabled && has_password {
            LockState::Locked
        } else {
            LockState::Unlocked
        };

        Self {
            keystore,
            settings,
            stored,
            state,
            backgrounded_at: None,
            lock_deadline: None,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: LockSettings) {
        self.settings = settings;
    }

    /// True iff both ciphertext and IV are present.
    pub fn has_password(&self) -> bool {
        self.stored
            .as_ref()
            .map(|s| !s.ciphertext.is_empty() && !s.iv.is_empty())
            .unwrap_or(false)
    }

    /// The blob the host should persist, if any.
    pub fn stored_password(&self) -> Option<&StoredPassword> {
        self.stored.as_ref()
    }

    /// Encrypt and store a new password. Replaces any previous one.
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        let (ciphertext, iv) = self.keystore.encrypt(password.as_bytes())?;
        self.stored = Some(StoredPassword { ciphertext, iv });
        debug!("lock password set");
        Ok(())
    }

    /// Remove the password. The lock state it guarded goes with it.
    pub fn clear_password(&mut self) {
        self.stored = None;
        self.state = LockState::Unlocked;
        self.backgrounded_at = None;
        self.lock_deadline = None;
        debug!("lock password cleared");
    }

    /// Attempt to unlock. The error is the same whether no password is set,
    /// the blob fails to decrypt, or the password simply does not match.
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        let stored = self.stored.as_ref().ok_or(AuthenticatorError::Auth)?;
        let plaintext = self
            .keystore
            .decrypt(&stored.ciphertext, &stored.iv)
            .map_err(|_| AuthenticatorError::Auth)?;

        if plaintext.ct_eq(password.as_bytes()).into() {
            self.state = LockState::Unlocked;
            self.backgrounded_at = None;
            self.lock_deadline = None;
            debug!("gate unlocked");
            Ok(())
        } else {
            Err(AuthenticatorError::Auth)
        }
    }

    /// `unlock` reduced to success/failure.
    pub fn verify(&mut self, password: &str) -> bool {
        self.unlock(password).is_ok()
    }

    /// Manual lock.
    pub fn lock(&mut self) {
        self.state = LockState::Locked;
        debug!("gate locked manually");
    }

    /// The app moved to background. Locks immediately under the
    /// lock-on-background policy, otherwise arms the auto-lock deadline.
    pub fn on_background(&mut self, now_unix: i64) {
        self.lock_deadline = None;
        if !self.lock_enabled() {
            return;
        }

        self.backgrounded_at = Some(now_unix);
        if self.settings.lock_on_background {
            self.state = LockState::Locked;
            debug!("gate locked on background");
        } else {
            self.lock_deadline = Some(now_unix + self.settings.auto_lock_timeout_secs as i64);
        }
    }

    /// The app returned to foreground. The pending deadline is dropped
    /// before anything else so a timer firing concurrently with the return
    /// resolves to "do not lock"; the elapsed-background check below is what
    /// decides.
    pub fn on_foreground(&mut self, now_unix: i64) {
        self.lock_deadline = None;

        if !self.lock_enabled() {
            self.state = LockState::Unlocked;
            self.backgrounded_at = None;
            return;
        }

        if let Some(backgrounded_at) = self.backgrounded_at {
            let elapsed = (now_unix - backgrounded_at).max(0);
            if self.settings.lock_on_background
                || elapsed >= self.settings.auto_lock_timeout_secs as i64
            {
                self.state = LockState::Locked;
                debug!(elapsed, "gate locked on foreground check");
            }
        }
    }

    /// Host ticker hook: applies the armed deadline once it passes. A
    /// foreground transition that already cleared the deadline makes this a
    /// no-op.
    pub fn poll_timeout(&mut self, now_unix: i64) {
        if let Some(deadline) = self.lock_deadline {
            if now_unix >= deadline {
                self.state = LockState::Locked;
                self.lock_deadline = None;
                debug!("gate locked on timeout");
            }
        }
    }

    fn lock_enabled(&self) -> bool {
        self.settings.password_lock_enabled && self.has_password()
    }
}

#[cfg(test)]
mod tests {
    use super::keystore::SoftwareKeyStore;
    use super::*;

    fn gate(settings: LockSettings) -> LockGate {
        LockGate::new(Box::new(SoftwareKeyStore::new()), settings)
    }

    fn enabled_settings() -> LockSettings {
        LockSettings {
            password_lock_enabled: true,
            lock_on_background: false,
            auto_lock_timeout_secs: 30,
        }
    }

    #[test]
    fn test_set_verify_clear_password() {
        let mut gate = gate(enabled_settings());
        assert!(!gate.has_password());

        gate.set_password("Abc12345").unwrap();
        assert!(gate.has_password());
        assert!(gate.verify("Abc12345"));
        assert!(!gate.verify("wrong"));

        gate.clear_password();
        assert!(!gate.has_password());
        assert_eq!(gate.state(), LockState::Unlocked);
    }

    #[test]
    fn test_verify_does_not_reveal_whether_password_exists() {
        let mut no_password = gate(enabled_settings());
        let mut wrong_password = gate(enabled_settings());
        wrong_password.set_password("Abc12345").unwrap();

        assert!(matches!(
            no_password.unlock("guess").unwrap_err(),
            AuthenticatorError::Auth
        ));
        assert!(matches!(
            wrong_password.unlock("guess").unwrap_err(),
            AuthenticatorError::Auth
        ));
    }

    #[test]
    fn test_background_cycle_without_password_never_locks() {
        let mut gate = gate(enabled_settings());

        gate.on_background(100);
        gate.poll_timeout(100_000);
        gate.on_foreground(100_000);
        assert_eq!(gate.state(), LockState::Unlocked);
    }

    #[test]
    fn test_lock_on_background_policy_locks_immediately() {
        let mut gate = gate(LockSettings {
            lock_on_background: true,
            ..enabled_settings()
        });
        gate.set_password("Abc12345").unwrap();

        gate.on_background(100);
        assert_eq!(gate.state(), LockState::Locked);

        gate.unlock("Abc12345").unwrap();
        assert_eq!(gate.state(), LockState::Unlocked);
    }

    #[test]
    fn test_timeout_locks_after_deadline() {
        let mut gate = gate(enabled_settings());
        gate.set_password("Abc12345").unwrap();

        gate.on_background(100);
        gate.poll_timeout(129);
        assert_eq!(gate.state(), LockState::Unlocked);

        gate.poll_timeout(130);
        assert_eq!(gate.state(), LockState::Locked);
    }

    #[test]
    fn test_foreground_cancels_pending_timeout() {
        let mut gate = gate(enabled_settings());
        gate.set_password("Abc12345").unwrap();

        gate.on_background(100);
        gate.on_foreground(110);
        assert_eq!(gate.state(), LockState::Unlocked);

        // the old deadline must not fire later: cancel wins
        gate.poll_timeout(10_000);
        assert_eq!(gate.state(), LockState::Unlocked);
    }

    #[test]
    fn test_long_background_locks_on_foreground_check() {
        let mut gate = gate(enabled_settings());
        gate.set_password("Abc12345").unwrap();

        gate.on_background(100);
        gate.on_foreground(200);
        assert_eq!(gate.state(), LockState::Locked);
    }

    #[test]
    fn test_unlock_clears_pending_state() {
        let mut gate = gate(LockSettings {
            lock_on_background: true,
            ..enabled_settings()
        });
        gate.set_password("Abc12345").unwrap();

        gate.on_background(100);
        gate.unlock("Abc12345").unwrap();
        gate.poll_timeout(10_000);
        assert_eq!(gate.state(), LockState::Unlocked);
    }

    #[test]
    fn test_manual_lock() {
        let mut gate = gate(enabled_settings());
        gate.set_password("Abc12345").unwrap();

        gate.lock();
        assert!(gate.is_locked());
        assert!(gate.verify("Abc12345"));
        assert!(!gate.is_locked());
    }

    #[test]
    fn test_restore_starts_locked_with_password_and_lock_enabled() {
        let key = [9u8; 32];
        let mut first = LockGate::new(
            Box::new(SoftwareKeyStore::from_bytes(key)),
            enabled_settings(),
        );
        first.set_password("Abc12345").unwrap();
        let stored = first.stored_password().cloned();

        let mut restored = LockGate::restore(
            Box::new(SoftwareKeyStore::from_bytes(key)),
            enabled_settings(),
            stored.clone(),
        );
        assert_eq!(restored.state(), LockState::Locked);
        assert!(restored.verify("Abc12345"));

        let disabled = LockGate::restore(
            Box::new(SoftwareKeyStore::from_bytes(key)),
            LockSettings::default(),
            stored,
        );
        assert_eq!(disabled.state(), LockState::Unlocked);
    }

    #[test]
    fn test_classify_password_buckets() {
        assert_eq!(classify_password(""), PasswordStrength::Empty);
        assert_eq!(classify_password("abc"), PasswordStrength::TooShort);
        assert_eq!(classify_password("abcde"), PasswordStrength::Weak);
        assert_eq!(classify_password("abcdefg"), PasswordStrength::Medium);
        assert_eq!(classify_password("abcdefg1"), PasswordStrength::Strong);
        // 8+ characters without a letter+digit mix stays Medium
        assert_eq!(classify_password("abcdefgh"), PasswordStrength::Medium);
        assert_eq!(classify_password("12345678"), PasswordStrength::Medium);
        assert!(PasswordStrength::Weak < PasswordStrength::Strong);
    }
}
