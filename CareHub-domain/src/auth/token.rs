use std::sync::Arc;
use std::time::{Duration as StdDuration, SystemTime};

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::token_blacklist::TokenBlacklist;
use crate::config::JwtConfig;

/// Security errors for authentication and token operations
#[derive(Debug, Error)]
pub enum SecurityError {
    /// JWT validation error
    #[error("Token validation error: {0}")]
    TokenValidation(String),

    /// Expired token
    #[error("Token has expired")]
    TokenExpired,

    /// Invalid token structure
    #[error("Invalid token format")]
    InvalidToken,

    /// Token has been revoked
    #[error("Token has been revoked")]
    TokenRevoked,

    /// Access token presented where a refresh token is expected, or the reverse
    #[error("Expected a {expected} token but got a {actual} token")]
    WrongTokenType { expected: TokenType, actual: TokenType },

    /// Invalid issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,

    /// Configuration error
    #[error("Security configuration error: {0}")]
    ConfigError(String),
}

/// Token types for authentication
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived access token
    Access,
    /// Long-lived refresh token
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Authentication claims for JSON Web Tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (as timestamp)
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Token ID, the key used for revocation
    pub jti: String,
    /// Roles granted at issue time
    #[serde(default)]
    pub roles: Vec<String>,
    pub token_type: TokenType,
}

impl Claims {
    /// Subject parsed as a user id
    pub fn user_id(&self) -> Result<Uuid, SecurityError> {
        Uuid::parse_str(&self.sub).map_err(|_| SecurityError::InvalidToken)
    }
}

/// Access and refresh token issued together at login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues and validates HS256 tokens.
///
/// Clones share the signing keys and the revocation list.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<JwtConfig>,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    blacklist: Arc<TokenBlacklist>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").field("config", &self.config).finish()
    }
}

impl TokenService {
    /// Create a token service with its own revocation list
    pub fn new(config: JwtConfig) -> Self {
        Self::with_blacklist(config, Arc::new(TokenBlacklist::new()))
    }

    pub fn with_blacklist(config: JwtConfig, blacklist: Arc<TokenBlacklist>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config: Arc::new(config),
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            blacklist,
        }
    }

    /// Revocation list shared by this service
    pub fn blacklist(&self) -> Arc<TokenBlacklist> {
        Arc::clone(&self.blacklist)
    }

    /// Lifetime of a token type
    pub fn lifetime(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => Duration::minutes(self.config.access_token_minutes),
            TokenType::Refresh => Duration::days(self.config.refresh_token_days),
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(
        &self,
        user_id: Uuid,
        roles: &[String],
        token_type: TokenType,
    ) -> Result<String, SecurityError> {
        let now = Utc::now();
        let expiration = now + self.lifetime(token_type);

        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
            roles: roles.to_vec(),
            token_type,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to encode JWT token: {}", e);
            SecurityError::TokenValidation(e.to_string())
        })?;

        // Log token generation (but not the token itself)
        debug!("Generated {} token for user {}, expires {}", token_type, user_id, expiration);

        Ok(token)
    }

    /// Issue an access/refresh pair
    pub fn issue_pair(&self, user_id: Uuid, roles: &[String]) -> Result<TokenPair, SecurityError> {
        Ok(TokenPair {
            access_token: self.generate_token(user_id, roles, TokenType::Access)?,
            refresh_token: self.generate_token(user_id, roles, TokenType::Refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.lifetime(TokenType::Access).num_seconds(),
        })
    }

    /// Validate a token of the expected type and return its claims
    pub fn validate_token(&self, token: &str, expected: TokenType) -> Result<Claims, SecurityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidToken => SecurityError::InvalidToken,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => SecurityError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                SecurityError::TokenValidation("Invalid signature".to_string())
            }
            _ => SecurityError::TokenValidation(e.to_string()),
        })?;

        let claims = token_data.claims;

        if claims.token_type != expected {
            return Err(SecurityError::WrongTokenType { expected, actual: claims.token_type });
        }

        if self.blacklist.is_revoked(&claims.jti) {
            debug!("Rejected revoked token {} for user {}", claims.jti, claims.sub);
            return Err(SecurityError::TokenRevoked);
        }

        Ok(claims)
    }

    /// Revoke a token until it would have expired anyway.
    ///
    /// Returns `false` when the token had already been revoked.
    pub fn revoke(&self, claims: &Claims) -> bool {
        let remaining = (claims.exp - Utc::now().timestamp()).max(0) as u64;
        let expiration = SystemTime::now() + StdDuration::from_secs(remaining);
        let newly_revoked = self.blacklist.revoke_token(&claims.jti, expiration);
        if newly_revoked {
            info!("Revoked {} token {} for user {}", claims.token_type, claims.jti, claims.sub);
        }
        newly_revoked
    }
}
