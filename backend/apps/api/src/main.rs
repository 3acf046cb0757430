//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod settings;

use axum::{
    Router, http,
    http::{Method, header},
};
use platform::rate_limit::{DailyRateLimiter, MemoryRateLimitStore};
use quiz::application::deliver_leads::DeliverLeadsUseCase;
use quiz::{HttpCrmClient, PgQuizAppState, PgQuizRepository, RecaptchaVerifier, quiz_router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::Settings;

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,quiz=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let repo = PgQuizRepository::new(pool.clone());
    let captcha = RecaptchaVerifier::new(settings.recaptcha)?;
    let crm = HttpCrmClient::new(settings.crm)?;
    let limiter = DailyRateLimiter::new(
        MemoryRateLimitStore::new(),
        settings.rate_limit_whitelist,
    );
    let state = PgQuizAppState::new(repo, captcha, crm, limiter, settings.quiz)?;

    spawn_outbox_worker(&state, settings.outbox_interval);

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = settings
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/quiz", quiz_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Listening on {}", settings.bind_addr);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically retry CRM leads left pending in the outbox
fn spawn_outbox_worker(state: &PgQuizAppState, every: Duration) {
    let use_case = DeliverLeadsUseCase::new(
        state.repo.clone(),
        state.crm.clone(),
        state.config.clone(),
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = use_case.drain_once().await {
                tracing::error!(error = %e, "CRM outbox drain failed");
            }
        }
    });
}
