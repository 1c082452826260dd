use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ratings_core::config::Settings;
use ratings_core::ingest::bootstrap::{ingest_if_empty, IngestOutcome};
use ratings_core::profile::{CompanyProfileProvider, HttpProfileClient};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod routes;

use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if let Err(err) = run(settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "api startup failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect_with(settings.pg_connect_options()?)
        .await
        .context("db connect failed")?;
    tracing::info!("connected to ratings database");

    ratings_core::storage::migrate(&pool).await?;

    match ingest_if_empty(&pool, &settings, false).await? {
        IngestOutcome::AlreadyPopulated => {
            tracing::info!("stock_items already populated; skipping ingestion")
        }
        IngestOutcome::Locked => {
            tracing::warn!("another process holds the ingest lock; serving without ingesting")
        }
        IngestOutcome::Completed(summary) => tracing::info!(
            pages = summary.pages,
            records = summary.records,
            "initial ratings ingestion complete"
        ),
    }

    let profile: Option<Arc<dyn CompanyProfileProvider>> =
        match HttpProfileClient::from_settings(&settings) {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                tracing::warn!(error = %err, "company profile lookup disabled");
                None
            }
        };

    let mut app = routes::router(AppState { pool, profile }).layer(TraceLayer::new_for_http());
    if let Some(origin) = settings.cors_allowed_origin.as_deref() {
        app = app.layer(cors_layer(origin)?);
    }

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr} failed"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("CORS_ALLOWED_ORIGIN is not a valid origin: {origin}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
