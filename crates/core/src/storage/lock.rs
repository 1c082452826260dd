use anyhow::Context;
use sqlx::{Connection, PgConnection};

// Advisory locks are scoped to the Postgres session. The guard opens its own session outside the
// pool so ingestion keeps every pooled connection, even with a pool of one.
const INGEST_LOCK_KEY: i64 = 0x5354_4F43_4B53; // "STOCKS"

pub struct IngestLock {
    conn: PgConnection,
}

/// Takes the ingestion lock without waiting. `None` means another process is ingesting.
pub async fn try_acquire_ingest_lock(pool: &sqlx::PgPool) -> anyhow::Result<Option<IngestLock>> {
    let options = pool.connect_options();
    let mut conn = PgConnection::connect_with(&*options)
        .await
        .context("failed to open connection for ingest lock")?;
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(INGEST_LOCK_KEY)
        .fetch_one(&mut conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={INGEST_LOCK_KEY})"))?;

    if !acquired.0 {
        let _ = conn.close().await;
        return Ok(None);
    }
    Ok(Some(IngestLock { conn }))
}

impl IngestLock {
    pub async fn release(mut self) -> anyhow::Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(INGEST_LOCK_KEY)
            .execute(&mut self.conn)
            .await
            .with_context(|| format!("failed to release advisory lock (key={INGEST_LOCK_KEY})"))?;
        self.conn
            .close()
            .await
            .context("failed to close ingest lock connection")?;
        Ok(())
    }
}
