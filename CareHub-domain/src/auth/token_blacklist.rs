use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

type RevokedMap = HashMap<String, (SystemTime, SystemTime)>;

/// Revoked token ids, kept until the token would have expired anyway.
///
/// `max_size` is a soft limit: when it is reached expired entries are pruned,
/// but an unexpired revocation is never dropped early.
#[derive(Debug)]
pub struct TokenBlacklist {
    /// Key: token id (`jti`)
    /// Value: (expiration timestamp, revocation timestamp)
    revoked_tokens: Mutex<RevokedMap>,

    /// Size at which expired entries are pruned on insert
    max_size: usize,
}

impl Default for TokenBlacklist {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBlacklist {
    /// Create a new token blacklist that prunes at 10,000 entries
    pub fn new() -> Self {
        Self::with_max_size(10_000)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            revoked_tokens: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, RevokedMap> {
        // The map holds plain data, so a poisoned lock is still usable
        self.revoked_tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a token to the blacklist until `expiration`.
    ///
    /// Returns `false` if the token id was already revoked, so callers can
    /// treat revocation as a single-use claim.
    pub fn revoke_token(&self, token_id: &str, expiration: SystemTime) -> bool {
        let revocation_time = SystemTime::now();
        let mut tokens = self.entries();

        if tokens.contains_key(token_id) {
            debug!("Token already revoked: {}", token_id);
            return false;
        }

        if tokens.len() >= self.max_size {
            Self::cleanup_expired(&mut tokens);
            if tokens.len() >= self.max_size {
                warn!(
                    "Token blacklist holds {} unexpired entries, above its limit of {}",
                    tokens.len(),
                    self.max_size
                );
            }
        }

        tokens.insert(token_id.to_string(), (expiration, revocation_time));
        debug!("Token revoked: {}", token_id);
        true
    }

    /// Whether a token id has been revoked
    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.entries().contains_key(token_id)
    }

    /// Number of revoked entries currently held
    pub fn size(&self) -> usize {
        self.entries().len()
    }

    /// Remove entries whose tokens have expired; returns how many were removed
    pub fn cleanup_expired_tokens(&self) -> usize {
        let mut tokens = self.entries();
        Self::cleanup_expired(&mut tokens)
    }

    fn cleanup_expired(tokens: &mut RevokedMap) -> usize {
        let now = SystemTime::now();
        let before_count = tokens.len();

        tokens.retain(|_, (expiration, _)| *expiration > now);

        let removed = before_count - tokens.len();
        if removed > 0 {
            debug!("Removed {} expired tokens from blacklist", removed);
        }
        removed
    }
}

/// Spawn a task that prunes expired entries every `interval`
pub fn start_cleanup_task(blacklist: Arc<TokenBlacklist>, interval: Duration) -> tokio::task::JoinHandle<()> {
    info!("Starting token blacklist cleanup every {:?}", interval);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = blacklist.cleanup_expired_tokens();
            debug!("Removed {} expired tokens, {} remain in blacklist", removed, blacklist.size());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoke_and_check_token() {
        let blacklist = TokenBlacklist::new();
        let expiration = SystemTime::now() + Duration::from_secs(1);

        blacklist.revoke_token("test-token-1", expiration);

        assert!(blacklist.is_revoked("test-token-1"));
        assert!(!blacklist.is_revoked("unknown-token"));
    }

    #[test]
    fn test_cleanup_expired_tokens() {
        let blacklist = TokenBlacklist::new();

        let expired = SystemTime::now() - Duration::from_secs(1);
        let not_expired = SystemTime::now() + Duration::from_secs(60);

        blacklist.revoke_token("expired-token", expired);
        blacklist.revoke_token("valid-token", not_expired);
        assert_eq!(blacklist.size(), 2);

        let removed = blacklist.cleanup_expired_tokens();

        assert_eq!(removed, 1);
        assert_eq!(blacklist.size(), 1);
        assert!(!blacklist.is_revoked("expired-token"));
        assert!(blacklist.is_revoked("valid-token"));
    }

    #[test]
    fn test_full_blacklist_keeps_unexpired_entries() {
        let blacklist = TokenBlacklist::with_max_size(4);
        let expiration = SystemTime::now() + Duration::from_secs(300);

        for i in 0..4 {
            blacklist.revoke_token(&format!("token-{}", i), expiration);
        }
        assert!(blacklist.revoke_token("new-token", expiration));

        assert_eq!(blacklist.size(), 5);
        for i in 0..4 {
            assert!(blacklist.is_revoked(&format!("token-{}", i)));
        }
        assert!(blacklist.is_revoked("new-token"));
    }

    #[test]
    fn test_full_blacklist_prunes_expired_first() {
        let blacklist = TokenBlacklist::with_max_size(2);
        blacklist.revoke_token("stale", SystemTime::now() - Duration::from_secs(1));
        blacklist.revoke_token("live", SystemTime::now() + Duration::from_secs(300));

        blacklist.revoke_token("new-token", SystemTime::now() + Duration::from_secs(300));

        assert_eq!(blacklist.size(), 2);
        assert!(!blacklist.is_revoked("stale"));
        assert!(blacklist.is_revoked("live"));
    }

    #[test]
    fn test_revoke_reports_first_claim_only() {
        let blacklist = TokenBlacklist::new();
        let expiration = SystemTime::now() + Duration::from_secs(60);

        assert!(blacklist.revoke_token("once", expiration));
        assert!(!blacklist.revoke_token("once", expiration));
    }
}
