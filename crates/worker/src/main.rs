use anyhow::Context;
use clap::Parser;
use ratings_core::domain::feed::FeedItem;
use ratings_core::ingest::bootstrap::{ingest_if_empty, IngestOutcome};
use ratings_core::ingest::feed::HttpFeedClient;
use ratings_core::ingest::{ingest_all, RecordSink};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ratings_worker")]
struct Args {
    /// Ingest even when stock_items already has rows.
    #[arg(long)]
    force: bool,

    /// Fetch every page but write nothing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ratings_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if args.dry_run {
        let client = HttpFeedClient::from_settings(&settings)?;
        let summary = ingest_all(&client, &DiscardSink).await.map_err(|err| {
            sentry_anyhow::capture_anyhow(&err);
            err
        })?;
        tracing::info!(
            dry_run = true,
            pages = summary.pages,
            records = summary.records,
            "ratings feed fetched"
        );
        return Ok(());
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect_with(settings.pg_connect_options()?)
        .await
        .context("db connect failed")?;

    ratings_core::storage::migrate(&pool).await?;

    match ingest_if_empty(&pool, &settings, args.force).await {
        Ok(IngestOutcome::AlreadyPopulated) => {
            tracing::info!("stock_items already populated; pass --force to ingest anyway")
        }
        Ok(IngestOutcome::Locked) => {
            tracing::warn!("ingest lock not acquired; another run in progress")
        }
        Ok(IngestOutcome::Completed(summary)) => tracing::info!(
            force = args.force,
            pages = summary.pages,
            records = summary.records,
            "ratings ingestion complete"
        ),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "ratings ingestion failed");
            return Err(err);
        }
    }

    Ok(())
}

/// Counts records without storing them.
struct DiscardSink;

#[async_trait::async_trait]
impl RecordSink for DiscardSink {
    async fn insert_batch(&self, items: &[FeedItem]) -> anyhow::Result<u64> {
        Ok(items.len() as u64)
    }
}

fn init_sentry(settings: &ratings_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
