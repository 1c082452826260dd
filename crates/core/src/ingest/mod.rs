pub mod bootstrap;
pub mod feed;

use crate::domain::feed::{FeedItem, FeedPage};
use anyhow::{Context, Result};

/// An upstream that serves rating pages chained by an opaque continuation token.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetches the first page when `next_page` is `None`, otherwise the page the token names.
    async fn fetch_page(&self, page_number: u32, next_page: Option<&str>) -> Result<FeedPage>;
}

#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    async fn insert_batch(&self, items: &[FeedItem]) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub pages: u32,
    pub records: u64,
}

/// Drains every page from `source` into `sink`.
///
/// The first failure aborts the run; pages already written stay written.
pub async fn ingest_all(source: &dyn FeedSource, sink: &dyn RecordSink) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    let mut token: Option<String> = None;

    loop {
        let page_number = summary.pages + 1;
        tracing::info!(page = page_number, "downloading ratings page");

        let page = source.fetch_page(page_number, token.as_deref()).await?;
        summary.pages = page_number;

        if !page.items.is_empty() {
            let inserted = sink
                .insert_batch(&page.items)
                .await
                .with_context(|| format!("storing ratings page {page_number} failed"))?;
            summary.records += inserted;
        }

        tracing::debug!(
            page = page_number,
            items = page.items.len(),
            records = summary.records,
            "ratings page stored"
        );

        match page.next_token() {
            Some(next) => token = Some(next.to_string()),
            None => break,
        }
    }

    tracing::info!(pages = summary.pages, records = summary.records, "ratings ingestion finished");
    Ok(summary)
}
