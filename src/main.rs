use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::response::IntoResponse;
use reqwest::Client;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proposalhub_backend::{
    config::Config,
    db::{
        health::PostgresHealthCheck,
        postgres_organization_repository::PostgresOrganizationRepository,
        postgres_project_repository::PostgresProjectRepository,
        postgres_proposal_repository::PostgresProposalRepository,
        postgres_subscription_repository::PostgresSubscriptionRepository,
        postgres_usage_repository::PostgresUsageRepository,
        postgres_user_repository::PostgresUserRepository,
    },
    responses::JsonResponse,
    router,
    services::{
        generation::{OpenAiGenerator, TextGenerator, UnconfiguredGenerator},
        stripe::LiveStripeService,
    },
    utils::{jwt::JwtKeys, rate_limit::OrgRateLimiter},
    AppState,
};

fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.trim().is_empty())?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(sentry_tracing::layer())
        .init();
}

/// Establish a connection pool, verify it and apply migrations.
async fn establish_connection(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("failed to verify database connection")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    info!("connected to the database");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _sentry = init_sentry();
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    let jwt_keys = JwtKeys::from_secret(&config.auth.jwt_secret)?;
    let pool = establish_connection(&config).await?;

    let generator: Arc<dyn TextGenerator> = match &config.openai_api_key {
        Some(key) => Arc::new(OpenAiGenerator::new(
            Client::new(),
            key.clone(),
            config.openai_model.clone(),
        )),
        None => {
            warn!("OPENAI_API_KEY not set; generations will return stub output");
            Arc::new(UnconfiguredGenerator)
        }
    };

    let state = AppState {
        users: Arc::new(PostgresUserRepository { pool: pool.clone() }),
        organizations: Arc::new(PostgresOrganizationRepository { pool: pool.clone() }),
        subscriptions: Arc::new(PostgresSubscriptionRepository { pool: pool.clone() }),
        usage: Arc::new(PostgresUsageRepository { pool: pool.clone() }),
        projects: Arc::new(PostgresProjectRepository { pool: pool.clone() }),
        proposals: Arc::new(PostgresProposalRepository { pool: pool.clone() }),
        health: Arc::new(PostgresHealthCheck { pool }),
        stripe: Arc::new(LiveStripeService::from_settings(&config.stripe)),
        generator,
        rate_limiter: Arc::new(OrgRateLimiter::new(Duration::from_millis(
            config.org_rate_limit_ms,
        ))),
        config: Arc::new(config.clone()),
        jwt_keys: Arc::new(jwt_keys),
    };

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(config.ip_rate_limit_ms)
            .burst_size(config.ip_rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .context("invalid rate limiter configuration")?,
    );

    let governor_limiter = governor_conf.limiter().clone();
    let org_limiter = state.rate_limiter.clone();
    std::thread::spawn(move || loop {
        std::thread::sleep(Duration::from_secs(60));
        governor_limiter.retain_recent();
        org_limiter.retain_recent();
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_origin
                .parse::<HeaderValue>()
                .context("FRONTEND_ORIGIN is not a valid header value")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let app = router(state)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
