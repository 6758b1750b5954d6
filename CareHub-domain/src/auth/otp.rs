//! One-time passwords for SMS login
//!
//! Only a salted hash of each code is held. A phone has at most one live code;
//! requesting a new one replaces it once the resend cooldown has passed.
//! Abandoned codes are dropped on the next issue once they have expired and
//! their cooldown is over.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::debug;

use crate::config::SmsConfig;
use crate::util::{generate_numeric_code, hash_otp};

/// OTP errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    /// A code was sent too recently
    #[error("Please wait {retry_after} seconds before requesting another code")]
    Cooldown { retry_after: i64 },

    /// No live code for this phone
    #[error("No verification code was requested for this number")]
    NotRequested,

    /// The code's TTL has passed
    #[error("Verification code has expired")]
    Expired,

    /// Wrong code; `remaining` attempts are left
    #[error("Incorrect verification code")]
    Mismatch { remaining: u32 },

    /// Too many wrong attempts; the code was discarded
    #[error("Too many incorrect attempts, request a new code")]
    TooManyAttempts,
}

/// Policy for issued codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub length: usize,
    pub ttl: Duration,
    pub resend_cooldown: Duration,
    pub max_attempts: u32,
}

impl From<&SmsConfig> for OtpPolicy {
    fn from(config: &SmsConfig) -> Self {
        Self {
            length: config.otp_length,
            ttl: Duration::seconds(config.otp_ttl_seconds),
            resend_cooldown: Duration::seconds(config.resend_cooldown_seconds),
            max_attempts: config.max_attempts,
        }
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::from(&SmsConfig::default())
    }
}

#[derive(Debug, Clone)]
struct PendingCode {
    code_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

/// A freshly issued code; the plain code is only ever handed to the SMS sender
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub expires_in: i64,
    pub resend_after: i64,
}

/// In-process store of pending codes keyed by normalized phone
#[derive(Debug)]
pub struct OtpStore {
    policy: OtpPolicy,
    pending: Mutex<HashMap<String, PendingCode>>,
}

impl OtpStore {
    pub fn new(policy: OtpPolicy) -> Self {
        Self { policy, pending: Mutex::new(HashMap::new()) }
    }

    pub fn policy(&self) -> OtpPolicy {
        self.policy
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PendingCode>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of codes currently held
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep entries that can still be verified or still block a resend
    fn retain_live(&self, pending: &mut HashMap<String, PendingCode>, now: DateTime<Utc>) -> usize {
        let before = pending.len();
        let cooldown = self.policy.resend_cooldown;
        pending.retain(|_, entry| entry.expires_at > now || entry.issued_at + cooldown > now);
        before - pending.len()
    }

    /// Issue a new code for `phone` at `now`
    pub fn issue(&self, phone: &str, now: DateTime<Utc>) -> Result<IssuedCode, OtpError> {
        let mut pending = self.entries();

        let purged = self.retain_live(&mut pending, now);
        if purged > 0 {
            debug!("Dropped {} abandoned OTP entries", purged);
        }

        if let Some(existing) = pending.get(phone) {
            let ready_at = existing.issued_at + self.policy.resend_cooldown;
            if now < ready_at {
                let retry_after = (ready_at - now).num_seconds().max(1);
                return Err(OtpError::Cooldown { retry_after });
            }
        }

        let code = generate_numeric_code(self.policy.length);
        pending.insert(
            phone.to_string(),
            PendingCode {
                code_hash: hash_otp(phone, &code),
                issued_at: now,
                expires_at: now + self.policy.ttl,
                failed_attempts: 0,
            },
        );
        debug!("Issued OTP for {}", crate::util::mask_phone(phone));

        Ok(IssuedCode {
            code,
            expires_in: self.policy.ttl.num_seconds(),
            resend_after: self.policy.resend_cooldown.num_seconds(),
        })
    }

    /// Check `code` for `phone`; a matching code is consumed
    pub fn verify(&self, phone: &str, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        let mut pending = self.entries();

        let entry = pending.get_mut(phone).ok_or(OtpError::NotRequested)?;

        if now >= entry.expires_at {
            pending.remove(phone);
            return Err(OtpError::Expired);
        }

        if entry.code_hash == hash_otp(phone, code.trim()) {
            pending.remove(phone);
            return Ok(());
        }

        entry.failed_attempts += 1;
        if entry.failed_attempts >= self.policy.max_attempts {
            pending.remove(phone);
            return Err(OtpError::TooManyAttempts);
        }

        Err(OtpError::Mismatch { remaining: self.policy.max_attempts - entry.failed_attempts })
    }

    /// Forget the pending code for `phone`, e.g. when delivery failed
    pub fn discard(&self, phone: &str) {
        self.entries().remove(phone);
    }

    /// Drop codes whose TTL and resend cooldown have both passed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut pending = self.entries();
        self.retain_live(&mut pending, now)
    }
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new(OtpPolicy::default())
    }
}
