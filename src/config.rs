use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::mastery::policy::{ItemTypePolicy, QueueOrder, DEFAULT_FRQ_MIN_SCORE, DEFAULT_MCQ_MIN_SCORE};
use crate::mastery::tiers::DEFAULT_MASTERED_THRESHOLD;
use crate::mastery::engine::{DEFAULT_INITIAL_SCORE, DEFAULT_TARGET_LANGUAGE};
use crate::mastery::MasterySettings;
use crate::services::llm_provider::{env_string, env_u64};
use crate::services::{LLMConfig, RetryPolicy};
use crate::session::registry::DEFAULT_IDLE_TTL;
use crate::store::RtdbConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Rtdb,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(StoreBackend::Memory),
            "rtdb" | "firebase" => Some(StoreBackend::Rtdb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub store_backend: StoreBackend,
    pub rtdb: Option<RtdbConfig>,
    pub llm: LLMConfig,
    pub mastery: MasterySettings,
    pub retry: RetryPolicy,
    pub session_idle_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let store_backend = env_string("STORE_BACKEND")
            .and_then(|v| StoreBackend::parse(&v))
            .unwrap_or_default();

        let rtdb = env_string("STORE_URL").map(|url| {
            let mut config = RtdbConfig::new(url);
            config.auth_token = env_string("STORE_AUTH_TOKEN");
            if let Some(ms) = env_u64("STORE_TIMEOUT") {
                config.timeout = Duration::from_millis(ms);
            }
            if let Some(attempts) = env_u64("STORE_CAS_ATTEMPTS") {
                config.cas_attempts = attempts.max(1) as usize;
            }
            config
        });

        let llm = LLMConfig::from_env();
        let retry = retry_policy_from_env().covering(llm.timeout);

        Self {
            host,
            port,
            log_level,
            store_backend,
            rtdb,
            llm,
            mastery: mastery_settings_from_env(),
            retry,
            session_idle_ttl: env_u64("SESSION_IDLE_TTL")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_IDLE_TTL),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_u32(key: &str) -> Option<u32> {
    env_u64(key).and_then(|v| u32::try_from(v).ok())
}

fn mastery_settings_from_env() -> MasterySettings {
    let item_policy = ItemTypePolicy::new(
        env_u32("MCQ_MIN_SCORE").unwrap_or(DEFAULT_MCQ_MIN_SCORE),
        env_u32("FRQ_MIN_SCORE").unwrap_or(DEFAULT_FRQ_MIN_SCORE),
    );

    MasterySettings {
        mastered_threshold: env_u32("MASTERED_THRESHOLD")
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MASTERED_THRESHOLD),
        initial_score: env_u32("INITIAL_TERM_SCORE").unwrap_or(DEFAULT_INITIAL_SCORE),
        item_policy,
        queue_order: env_string("QUEUE_ORDER")
            .and_then(|v| QueueOrder::parse(&v))
            .unwrap_or_default(),
        target_language: env_string("TARGET_LANGUAGE")
            .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string()),
    }
}

fn retry_policy_from_env() -> RetryPolicy {
    let defaults = RetryPolicy::default();
    RetryPolicy {
        max_attempts: env_u64("SERVICE_MAX_ATTEMPTS")
            .map(|v| v.max(1) as usize)
            .unwrap_or(defaults.max_attempts),
        base_backoff: env_u64("SERVICE_BASE_BACKOFF")
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_backoff),
        max_backoff: env_u64("SERVICE_MAX_BACKOFF")
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_backoff),
        call_timeout: env_u64("SERVICE_CALL_TIMEOUT")
            .map(Duration::from_millis)
            .unwrap_or(defaults.call_timeout),
    }
}
