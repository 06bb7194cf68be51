use std::env;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use thiserror::Error;

use crate::tenancy::allowance::{
    PlanLimits, DEFAULT_FREE_MONTHLY_GENERATIONS, DEFAULT_FREE_PROJECT_LIMIT,
};

pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000));
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ORG_RATE_LIMIT_MS: u64 = 1000;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
/// One token per 200ms, roughly five requests a second per client IP.
pub const DEFAULT_IP_RATE_LIMIT_MS: u64 = 200;
pub const DEFAULT_IP_RATE_LIMIT_BURST: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub price_pro: String,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub frontend_origin: String,
    pub app_url: String,
    pub bind_addr: SocketAddr,
    pub auth: AuthSettings,
    pub stripe: StripeSettings,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub plan_limits: PlanLimits,
    pub org_rate_limit_ms: u64,
    pub ip_rate_limit_ms: u64,
    pub ip_rate_limit_burst: u32,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let frontend_origin = required("FRONTEND_ORIGIN")?;
        let app_url = optional("APP_URL").unwrap_or_else(|| frontend_origin.clone());

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed_or(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            app_url: app_url.trim_end_matches('/').to_string(),
            frontend_origin,
            bind_addr: parsed_or("BIND_ADDR", DEFAULT_BIND_ADDR)?,
            auth: AuthSettings {
                jwt_secret: required("AUTH_JWT_SECRET")?,
                jwt_issuer: required("AUTH_JWT_ISSUER")?,
                jwt_audience: required("AUTH_JWT_AUDIENCE")?,
            },
            stripe: StripeSettings {
                secret_key: required("STRIPE_SECRET_KEY")?,
                webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
                price_pro: required("STRIPE_PRICE_PRO")?,
            },
            openai_api_key: optional("OPENAI_API_KEY"),
            openai_model: optional("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            plan_limits: PlanLimits {
                free_monthly_generations: parsed_or(
                    "FREE_MONTHLY_GENERATIONS",
                    DEFAULT_FREE_MONTHLY_GENERATIONS,
                )?,
                free_project_limit: parsed_or("FREE_PROJECT_LIMIT", DEFAULT_FREE_PROJECT_LIMIT)?,
            },
            org_rate_limit_ms: parsed_or("ORG_RATE_LIMIT_MS", DEFAULT_ORG_RATE_LIMIT_MS)?,
            ip_rate_limit_ms: parsed_or("RATE_LIMITER_MILLISECONDS", DEFAULT_IP_RATE_LIMIT_MS)?,
            ip_rate_limit_burst: parsed_or("RATE_LIMITER_BURST", DEFAULT_IP_RATE_LIMIT_BURST)?,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn test_config() -> Self {
        Config {
            database_url: "postgres://localhost/test".into(),
            database_max_connections: 1,
            frontend_origin: "http://localhost:5173".into(),
            app_url: "https://app.test".into(),
            bind_addr: DEFAULT_BIND_ADDR,
            auth: AuthSettings {
                jwt_secret: "0123456789abcdef0123456789abcdef".into(),
                jwt_issuer: "test-issuer".into(),
                jwt_audience: "test-audience".into(),
            },
            stripe: StripeSettings {
                secret_key: "sk_test_stub".into(),
                webhook_secret: "whsec_test".into(),
                price_pro: "price_pro_test".into(),
            },
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            plan_limits: PlanLimits::default(),
            org_rate_limit_ms: 0,
            ip_rate_limit_ms: DEFAULT_IP_RATE_LIMIT_MS,
            ip_rate_limit_burst: DEFAULT_IP_RATE_LIMIT_BURST,
        }
    }
}
