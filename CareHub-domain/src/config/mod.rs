//! Typed application configuration loaded from environment variables
//!
//! Every section has a `from_lookup` constructor taking a key lookup closure so
//! it can be exercised without touching the process environment. `from_env`
//! wraps it with `std::env::var`.

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use care_hub_data::database::{DatabaseConfig, DatabaseError};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    /// A variable is set but cannot be parsed
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    /// Database section error
    #[error("Database configuration error: {0}")]
    Database(#[from] DatabaseError),
}

/// Read a variable, treating empty strings as unset
pub fn lookup_var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Value of `key` or `default`
pub fn env_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup_var(lookup, key).unwrap_or_else(|| default.to_string())
}

/// Parse `key` into `T`, falling back to `default` when unset
pub fn parse_env<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup_var(lookup, key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Value of `key`, or `ConfigError::Missing`
pub fn require_env<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_var(lookup, key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Split a comma separated list, dropping blanks
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `development`, `staging`, `production`, ...
    pub environment: String,
    /// Allowed CORS origins; `*` allows any
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let origins = lookup_var(lookup, "CORS_ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.cors_allowed_origins);

        Ok(Self {
            host: env_or(lookup, "HOST", &defaults.host),
            port: parse_env(lookup, "PORT", defaults.port)?,
            environment: env_or(lookup, "APP_ENV", &defaults.environment),
            cors_allowed_origins: origins,
        })
    }

    /// Socket address string for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// JWT signing settings
#[derive(Clone, PartialEq)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"***")
            .field("issuer", &self.issuer)
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}

/// Shortest accepted signing secret, in bytes
pub const MIN_JWT_SECRET_LEN: usize = 16;
/// One year
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 60 * 24 * 365;
/// Ten years
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 3650;
/// One day; also bounds the resend cooldown
pub const MAX_OTP_TTL_SECONDS: i64 = 86_400;

/// `ConfigError::Invalid` unless `min <= value <= max`
fn check_range(key: &str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("must be between {} and {}", min, max),
        })
    }
}

impl JwtConfig {
    /// Build a config directly; used by tests and tools
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "carehub-api".to_string(),
            access_token_minutes: 120,
            refresh_token_days: 30,
        }
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = require_env(lookup, "JWT_SECRET")?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET".to_string(),
                message: format!("must be at least {} bytes", MIN_JWT_SECRET_LEN),
            });
        }

        let access_token_minutes = parse_env(lookup, "ACCESS_TOKEN_EXPIRATION_MINUTES", 120i64)?;
        let refresh_token_days = parse_env(lookup, "REFRESH_TOKEN_EXPIRATION_DAYS", 30i64)?;
        check_range("ACCESS_TOKEN_EXPIRATION_MINUTES", access_token_minutes, 1, MAX_ACCESS_TOKEN_MINUTES)?;
        check_range("REFRESH_TOKEN_EXPIRATION_DAYS", refresh_token_days, 1, MAX_REFRESH_TOKEN_DAYS)?;

        Ok(Self {
            secret,
            issuer: env_or(lookup, "JWT_ISSUER", "carehub-api"),
            access_token_minutes,
            refresh_token_days,
        })
    }
}

/// Which SMS backend delivers one-time passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsProvider {
    /// Write codes to the log (development)
    Log,
    /// POST to an HTTP gateway
    Http,
}

impl FromStr for SmsProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(SmsProvider::Log),
            "http" => Ok(SmsProvider::Http),
            other => Err(format!("unknown SMS provider '{}', expected log or http", other)),
        }
    }
}

/// SMS gateway and OTP policy
#[derive(Clone, PartialEq)]
pub struct SmsConfig {
    pub provider: SmsProvider,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub sign_name: Option<String>,
    pub template_code: Option<String>,
    pub otp_length: usize,
    pub otp_ttl_seconds: i64,
    pub resend_cooldown_seconds: i64,
    pub max_attempts: u32,
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &self.access_key_secret.as_ref().map(|_| "***"))
            .field("sign_name", &self.sign_name)
            .field("template_code", &self.template_code)
            .field("otp_length", &self.otp_length)
            .field("otp_ttl_seconds", &self.otp_ttl_seconds)
            .field("resend_cooldown_seconds", &self.resend_cooldown_seconds)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            provider: SmsProvider::Log,
            endpoint: None,
            access_key_id: None,
            access_key_secret: None,
            sign_name: None,
            template_code: None,
            otp_length: 6,
            otp_ttl_seconds: 300,
            resend_cooldown_seconds: 60,
            max_attempts: 5,
        }
    }
}

impl SmsConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            provider: parse_env(lookup, "SMS_PROVIDER", defaults.provider)?,
            endpoint: lookup_var(lookup, "SMS_ENDPOINT"),
            access_key_id: lookup_var(lookup, "SMS_ACCESS_KEY_ID"),
            access_key_secret: lookup_var(lookup, "SMS_ACCESS_KEY_SECRET"),
            sign_name: lookup_var(lookup, "SMS_SIGN_NAME"),
            template_code: lookup_var(lookup, "SMS_TEMPLATE_CODE"),
            otp_length: parse_env(lookup, "OTP_LENGTH", defaults.otp_length)?,
            otp_ttl_seconds: parse_env(lookup, "OTP_TTL_SECONDS", defaults.otp_ttl_seconds)?,
            resend_cooldown_seconds: parse_env(lookup, "OTP_RESEND_COOLDOWN_SECONDS", defaults.resend_cooldown_seconds)?,
            max_attempts: parse_env(lookup, "OTP_MAX_ATTEMPTS", defaults.max_attempts)?,
        };

        if !(4..=8).contains(&config.otp_length) {
            return Err(ConfigError::Invalid {
                key: "OTP_LENGTH".to_string(),
                message: "must be between 4 and 8".to_string(),
            });
        }
        check_range("OTP_TTL_SECONDS", config.otp_ttl_seconds, 1, MAX_OTP_TTL_SECONDS)?;
        check_range("OTP_RESEND_COOLDOWN_SECONDS", config.resend_cooldown_seconds, 0, MAX_OTP_TTL_SECONDS)?;
        if config.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "OTP_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if config.provider == SmsProvider::Http {
            for (key, value) in [
                ("SMS_ENDPOINT", &config.endpoint),
                ("SMS_ACCESS_KEY_ID", &config.access_key_id),
                ("SMS_ACCESS_KEY_SECRET", &config.access_key_secret),
            ] {
                if value.is_none() {
                    return Err(ConfigError::Missing(key.to_string()));
                }
            }
        }

        Ok(config)
    }
}

/// WeChat mini-program credentials
#[derive(Clone, PartialEq)]
pub struct WeChatConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub api_base: String,
}

impl fmt::Debug for WeChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeChatConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for WeChatConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            api_base: "https://api.weixin.qq.com".to_string(),
        }
    }
}

impl WeChatConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            app_id: lookup_var(lookup, "WECHAT_APP_ID"),
            app_secret: lookup_var(lookup, "WECHAT_APP_SECRET"),
            api_base: env_or(lookup, "WECHAT_API_BASE", "https://api.weixin.qq.com")
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// WeChat login needs both the app id and the secret
    pub fn is_enabled(&self) -> bool {
        self.app_id.is_some() && self.app_secret.is_some()
    }
}

/// Object storage used for public assets such as doctor avatars
#[derive(Clone, Default, PartialEq)]
pub struct OssConfig {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub public_base_url: Option<String>,
}

impl fmt::Debug for OssConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OssConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &self.access_key_secret.as_ref().map(|_| "***"))
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl OssConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            endpoint: lookup_var(lookup, "OSS_ENDPOINT"),
            bucket: lookup_var(lookup, "OSS_BUCKET"),
            access_key_id: lookup_var(lookup, "OSS_ACCESS_KEY_ID"),
            access_key_secret: lookup_var(lookup, "OSS_ACCESS_KEY_SECRET"),
            public_base_url: lookup_var(lookup, "OSS_PUBLIC_BASE_URL"),
        })
    }

    /// Base URL objects are served from, if one can be derived
    pub fn base_url(&self) -> Option<String> {
        if let Some(url) = &self.public_base_url {
            return Some(url.trim_end_matches('/').to_string());
        }
        match (&self.bucket, &self.endpoint) {
            (Some(bucket), Some(endpoint)) => {
                let host = endpoint
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/');
                Some(format!("https://{}.{}", bucket, host))
            }
            _ => None,
        }
    }

    /// Turn a stored object key into a public URL; absolute URLs pass through
    pub fn public_url(&self, key: &str) -> String {
        if key.starts_with("http://") || key.starts_with("https://") {
            return key.to_string();
        }
        match self.base_url() {
            Some(base) => format!("{}/{}", base, key.trim_start_matches('/')),
            None => key.to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub sms: SmsConfig,
    pub wechat: WeChatConfig,
    pub oss: OssConfig,
}

impl AppConfig {
    /// Load every section from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            server: ServerConfig::from_lookup(lookup)?,
            database: DatabaseConfig::from_lookup(lookup)?,
            jwt: JwtConfig::from_lookup(lookup)?,
            sms: SmsConfig::from_lookup(lookup)?,
            wechat: WeChatConfig::from_lookup(lookup)?,
            oss: OssConfig::from_lookup(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const SECRET: &str = "a-test-secret-that-is-long-enough";

    #[test]
    fn test_defaults() {
        let lookup = lookup_from(&[("JWT_SECRET", SECRET)]);
        let config = AppConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.cors_allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.jwt.issuer, "carehub-api");
        assert_eq!(config.jwt.access_token_minutes, 120);
        assert_eq!(config.jwt.refresh_token_days, 30);
        assert_eq!(config.sms.provider, SmsProvider::Log);
        assert_eq!(config.sms.otp_length, 6);
        assert_eq!(config.sms.max_attempts, 5);
        assert!(!config.wechat.is_enabled());
        assert_eq!(config.database.pool_size, 10);
    }

    #[test]
    fn test_missing_jwt_secret() {
        let lookup = lookup_from(&[]);
        let result = AppConfig::from_lookup(&lookup);
        assert!(matches!(result, Err(ConfigError::Missing(key)) if key == "JWT_SECRET"));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let lookup = lookup_from(&[("JWT_SECRET", "short")]);
        assert!(matches!(JwtConfig::from_lookup(&lookup), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_token_lifetimes_bounded() {
        let minutes = (i64::MAX / 60).to_string();
        let lookup = lookup_from(&[("JWT_SECRET", SECRET), ("ACCESS_TOKEN_EXPIRATION_MINUTES", &minutes)]);
        let result = JwtConfig::from_lookup(&lookup);
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "ACCESS_TOKEN_EXPIRATION_MINUTES"));

        let lookup = lookup_from(&[("JWT_SECRET", SECRET), ("REFRESH_TOKEN_EXPIRATION_DAYS", "99999999")]);
        let result = JwtConfig::from_lookup(&lookup);
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "REFRESH_TOKEN_EXPIRATION_DAYS"));

        let lookup = lookup_from(&[("JWT_SECRET", SECRET), ("ACCESS_TOKEN_EXPIRATION_MINUTES", "0")]);
        assert!(JwtConfig::from_lookup(&lookup).is_err());

        let longest = MAX_ACCESS_TOKEN_MINUTES.to_string();
        let lookup = lookup_from(&[("JWT_SECRET", SECRET), ("ACCESS_TOKEN_EXPIRATION_MINUTES", &longest)]);
        assert_eq!(JwtConfig::from_lookup(&lookup).unwrap().access_token_minutes, MAX_ACCESS_TOKEN_MINUTES);
    }

    #[test]
    fn test_otp_ttl_bounded() {
        for ttl in ["18446744073709551615", "0", "-5", "86401"] {
            let lookup = lookup_from(&[("OTP_TTL_SECONDS", ttl)]);
            let result = SmsConfig::from_lookup(&lookup);
            assert!(
                matches!(&result, Err(ConfigError::Invalid { key, .. }) if key == "OTP_TTL_SECONDS"),
                "ttl {} accepted",
                ttl
            );
        }

        let lookup = lookup_from(&[("OTP_RESEND_COOLDOWN_SECONDS", "-1")]);
        assert!(SmsConfig::from_lookup(&lookup).is_err());

        let lookup = lookup_from(&[("OTP_TTL_SECONDS", "600")]);
        assert_eq!(SmsConfig::from_lookup(&lookup).unwrap().otp_ttl_seconds, 600);
    }

    #[test]
    fn test_invalid_port() {
        let lookup = lookup_from(&[("JWT_SECRET", SECRET), ("PORT", "eighty")]);
        let result = AppConfig::from_lookup(&lookup);
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "PORT"));
    }

    #[test]
    fn test_http_sms_requires_credentials() {
        let lookup = lookup_from(&[("SMS_PROVIDER", "http"), ("SMS_ENDPOINT", "https://sms.example.com/send")]);
        let result = SmsConfig::from_lookup(&lookup);
        assert!(matches!(result, Err(ConfigError::Missing(key)) if key == "SMS_ACCESS_KEY_ID"));

        let lookup = lookup_from(&[("SMS_PROVIDER", "carrier-pigeon")]);
        assert!(SmsConfig::from_lookup(&lookup).is_err());
    }

    #[test]
    fn test_cors_list_and_wechat() {
        let lookup = lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("CORS_ALLOWED_ORIGINS", "https://carehub.cn, https://admin.carehub.cn,"),
            ("WECHAT_APP_ID", "wx123"),
            ("WECHAT_APP_SECRET", "s3cret"),
            ("WECHAT_API_BASE", "http://localhost:9000/"),
        ]);
        let config = AppConfig::from_lookup(&lookup).unwrap();

        assert_eq!(
            config.server.cors_allowed_origins,
            vec!["https://carehub.cn".to_string(), "https://admin.carehub.cn".to_string()]
        );
        assert!(config.wechat.is_enabled());
        assert_eq!(config.wechat.api_base, "http://localhost:9000");
        assert!(!format!("{:?}", config.wechat).contains("s3cret"));
    }

    #[test]
    fn test_oss_public_url() {
        let oss = OssConfig {
            endpoint: Some("https://oss-cn-shanghai.aliyuncs.com".to_string()),
            bucket: Some("carehub-assets".to_string()),
            ..Default::default()
        };
        assert_eq!(
            oss.public_url("avatars/li.png"),
            "https://carehub-assets.oss-cn-shanghai.aliyuncs.com/avatars/li.png"
        );
        assert_eq!(oss.public_url("https://cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(OssConfig::default().public_url("avatars/li.png"), "avatars/li.png");
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_process_environment() {
        env::set_var("JWT_SECRET", SECRET);
        env::set_var("PORT", "8081");
        env::set_var("APP_ENV", "production");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.port, 8081);
        assert!(config.server.is_production());

        env::remove_var("PORT");
        env::remove_var("APP_ENV");
        env::remove_var("JWT_SECRET");
    }
}
