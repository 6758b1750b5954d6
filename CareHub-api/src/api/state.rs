//! Shared application state.
//!
//! Each repository is built once and its clones are handed to every service
//! that needs it, so in-memory storage stays consistent across services.

use std::sync::Arc;

use tracing::{info, warn};

use care_hub_data::repository::{
    AppointmentRepository, ConsultationRepository, DoctorRepository, MembershipRepository, UserRepository,
};
use care_hub_domain::auth::{
    sender_from_config, AuthService, AuthServiceTrait, DisabledWeChatClient, HttpWeChatClient,
    OtpPolicy, SmsSender, TokenBlacklist, TokenService, WeChatClient,
};
use care_hub_domain::config::{AppConfig, OssConfig, ServerConfig};
use care_hub_domain::health::{HealthService, HealthServiceTrait};
use care_hub_domain::services::{
    AppointmentService, AppointmentServiceTrait, ConsultationService, ConsultationServiceTrait, DoctorService,
    DoctorServiceTrait, MembershipService, MembershipServiceTrait,
};

/// Services and configuration shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthServiceTrait>,
    pub doctors: Arc<dyn DoctorServiceTrait>,
    pub appointments: Arc<dyn AppointmentServiceTrait>,
    pub consultations: Arc<dyn ConsultationServiceTrait>,
    pub membership: Arc<dyn MembershipServiceTrait>,
    pub health: Arc<dyn HealthServiceTrait>,
    pub tokens: TokenService,
    pub server: ServerConfig,
    pub oss: OssConfig,
}

/// Startup failures of external integrations
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("SMS configuration error: {0}")]
    Sms(#[from] care_hub_domain::auth::SmsError),

    #[error("WeChat configuration error: {0}")]
    WeChat(#[from] care_hub_domain::auth::WeChatError),
}

impl AppState {
    /// Build the production state from configuration.
    ///
    /// Repositories pick up the global pool when it has been initialized and
    /// fall back to in-memory storage otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self, StateError> {
        let tokens = TokenService::with_blacklist(config.jwt.clone(), Arc::new(TokenBlacklist::new()));
        let sms = sender_from_config(&config.sms)?;
        let wechat: Arc<dyn WeChatClient> = match HttpWeChatClient::from_config(&config.wechat)? {
            Some(client) => {
                info!("WeChat login enabled");
                Arc::new(client)
            }
            None => {
                warn!("WECHAT_APP_ID / WECHAT_APP_SECRET not set, WeChat login disabled");
                Arc::new(DisabledWeChatClient)
            }
        };

        Ok(Self::assemble(
            Repositories::detect(),
            tokens,
            OtpPolicy::from(&config.sms),
            sms,
            wechat,
            Arc::new(HealthService::new(config.server.environment.clone())),
            config.server.clone(),
            config.oss.clone(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        repos: Repositories,
        tokens: TokenService,
        otp_policy: OtpPolicy,
        sms: Arc<dyn SmsSender>,
        wechat: Arc<dyn WeChatClient>,
        health: Arc<dyn HealthServiceTrait>,
        server: ServerConfig,
        oss: OssConfig,
    ) -> Self {
        let Repositories { users, doctors, appointments, consultations, memberships } = repos;

        Self {
            auth: Arc::new(AuthService::new(users, tokens.clone(), otp_policy, sms, wechat)),
            doctors: Arc::new(DoctorService::new(doctors.clone())),
            appointments: Arc::new(AppointmentService::new(appointments, doctors, memberships.clone())),
            consultations: Arc::new(ConsultationService::new(consultations)),
            membership: Arc::new(MembershipService::new(memberships)),
            health,
            tokens,
            server,
            oss,
        }
    }
}

struct Repositories {
    users: UserRepository,
    doctors: DoctorRepository,
    appointments: AppointmentRepository,
    consultations: ConsultationRepository,
    memberships: MembershipRepository,
}

impl Repositories {
    fn detect() -> Self {
        Self {
            users: UserRepository::new(),
            doctors: DoctorRepository::new(),
            appointments: AppointmentRepository::new(),
            consultations: ConsultationRepository::new(),
            memberships: MembershipRepository::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory state with recording SMS and stub WeChat clients

    use super::*;
    use care_hub_domain::config::JwtConfig;
    use care_hub_domain::testing::{MockHealthService, RecordingSmsSender, StubWeChatClient};

    pub const TEST_JWT_SECRET: &str = "test-secret-key-at-least-32-bytes!!";

    /// Handles that tests use to drive and observe the state
    pub struct TestContext {
        pub state: AppState,
        pub sms: Arc<RecordingSmsSender>,
        pub doctors: DoctorRepository,
        pub memberships: MembershipRepository,
    }

    impl TestContext {
        pub fn new() -> Self {
            Self::with_health(Arc::new(MockHealthService::new()))
        }

        pub fn with_health(health: Arc<dyn HealthServiceTrait>) -> Self {
            let sms = Arc::new(RecordingSmsSender::default());
            let wechat = StubWeChatClient::new().with_code("wx-code-1", "openid-1");
            let repos = Repositories {
                users: UserRepository::in_memory(),
                doctors: DoctorRepository::in_memory(),
                appointments: AppointmentRepository::in_memory(),
                consultations: ConsultationRepository::in_memory(),
                memberships: MembershipRepository::in_memory(),
            };
            let doctors = repos.doctors.clone();
            let memberships = repos.memberships.clone();

            let state = AppState::assemble(
                repos,
                TokenService::new(JwtConfig::new(TEST_JWT_SECRET)),
                OtpPolicy::default(),
                sms.clone(),
                Arc::new(wechat),
                health,
                ServerConfig::default(),
                OssConfig { public_base_url: Some("https://cdn.example.com".to_string()), ..OssConfig::default() },
            );

            Self { state, sms, doctors, memberships }
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }
}
