use crate::config::Settings;
use crate::ingest::feed::HttpFeedClient;
use crate::ingest::{ingest_all, IngestSummary};
use crate::storage::{lock, ratings};
use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    AlreadyPopulated,
    Locked,
    Completed(IngestSummary),
}

/// Loads the upstream feed into `stock_items` when the table is empty (or always, with `force`).
///
/// Credentials are only required once ingestion is actually needed.
pub async fn ingest_if_empty(
    pool: &sqlx::PgPool,
    settings: &Settings,
    force: bool,
) -> Result<IngestOutcome> {
    if !force && !ratings::is_empty(pool).await? {
        return Ok(IngestOutcome::AlreadyPopulated);
    }

    let guard = match lock::try_acquire_ingest_lock(pool).await {
        Ok(Some(guard)) => Some(guard),
        Ok(None) => return Ok(IngestOutcome::Locked),
        Err(err) => {
            // CockroachDB has no advisory locks; ingest unguarded there.
            tracing::warn!(error = %format!("{err:#}"), "ingest lock unavailable; continuing without it");
            None
        }
    };

    let result: Result<IngestOutcome> = async {
        // Re-check under the lock: a concurrent run may have just finished.
        if !force && !ratings::is_empty(pool).await? {
            return Ok(IngestOutcome::AlreadyPopulated);
        }
        let client = HttpFeedClient::from_settings(settings)?;
        let sink = ratings::PgRecordSink::new(pool.clone());
        let summary = ingest_all(&client, &sink)
            .await
            .context("ratings ingestion failed")?;
        Ok(IngestOutcome::Completed(summary))
    }
    .await;

    if let Some(guard) = guard {
        if let Err(err) = guard.release().await {
            tracing::warn!(error = %err, "failed to release ingest lock");
        }
    }
    result
}
