use crate::domain::feed::FeedItem;
use crate::domain::rating::{RatingPage, RatingRecord};
use crate::ingest::RecordSink;
use crate::query::{select_matching, RatingFilter, RatingQuery};
use anyhow::Context;
use sqlx::PgPool;

// Nine binds per row keeps a chunk well under the Postgres parameter limit.
const INSERT_CHUNK: usize = 500;

pub async fn is_empty(pool: &PgPool) -> anyhow::Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM stock_items)")
        .fetch_one(pool)
        .await
        .context("check stock_items emptiness failed")?;
    Ok(!exists)
}

/// Inserts one upstream page atomically and returns the number of rows written.
pub async fn insert_batch(pool: &PgPool, items: &[FeedItem]) -> anyhow::Result<u64> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let mut inserted: u64 = 0;

    for chunk in items.chunks(INSERT_CHUNK) {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO stock_items \
             (ticker, target_from, target_to, company, action, brokerage, rating_from, rating_to, time) ",
        );
        qb.push_values(chunk, |mut b, item| {
            b.push_bind(item.ticker.trim().to_string())
                .push_bind(item.target_from.clone())
                .push_bind(item.target_to.clone())
                .push_bind(item.company.clone())
                .push_bind(item.action.clone())
                .push_bind(item.brokerage.clone())
                .push_bind(item.rating_from.clone())
                .push_bind(item.rating_to.clone())
                .push_bind(item.time);
        });

        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert stock_items failed")?;
        inserted += res.rows_affected();
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(inserted)
}

/// One page of rows matching `query`, plus the unpaged total.
pub async fn list_page(pool: &PgPool, query: &RatingQuery) -> anyhow::Result<RatingPage> {
    let total: i64 = query
        .count_builder()
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .context("count stock_items failed")?;

    let data = query
        .select_builder()
        .build_query_as::<RatingRecord>()
        .fetch_all(pool)
        .await
        .context("select stock_items page failed")?;

    Ok(RatingPage { data, total })
}

/// Every row matching `filters`, unordered and unpaged. Feeds the ranking endpoints.
pub async fn fetch_matching(
    pool: &PgPool,
    filters: &[RatingFilter],
) -> anyhow::Result<Vec<RatingRecord>> {
    select_matching(filters)
        .build_query_as::<RatingRecord>()
        .fetch_all(pool)
        .await
        .context("select stock_items failed")
}

pub async fn distinct_brokerages(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    sqlx::query_scalar("SELECT DISTINCT brokerage FROM stock_items ORDER BY brokerage ASC")
        .fetch_all(pool)
        .await
        .context("select distinct brokerages failed")
}

pub async fn distinct_ratings(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    sqlx::query_scalar("SELECT DISTINCT rating_to FROM stock_items ORDER BY rating_to ASC")
        .fetch_all(pool)
        .await
        .context("select distinct ratings failed")
}

/// Writes ingested pages straight into `stock_items`.
#[derive(Debug, Clone)]
pub struct PgRecordSink {
    pool: PgPool,
}

impl PgRecordSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordSink for PgRecordSink {
    async fn insert_batch(&self, items: &[FeedItem]) -> anyhow::Result<u64> {
        insert_batch(&self.pool, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::parse_currency;
    use crate::query::DEFAULT_FILTER_LIMIT;
    use crate::scoring::{rank_top, TOP_OVERALL};
    use crate::storage::testing::scratch_db;
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeSet, HashMap};

    fn item(ticker: &str, brokerage: &str, rating_to: &str, target_to: &str, day: u32) -> FeedItem {
        FeedItem {
            ticker: ticker.to_string(),
            target_from: "$100.00".to_string(),
            target_to: target_to.to_string(),
            company: format!("{ticker} Inc."),
            action: "target raised by".to_string(),
            brokerage: brokerage.to_string(),
            rating_from: "Hold".to_string(),
            rating_to: rating_to.to_string(),
            time: Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
        }
    }

    fn query(pairs: &[(&str, &str)]) -> RatingQuery {
        let params: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RatingQuery::from_params(&params, DEFAULT_FILTER_LIMIT)
    }

    #[tokio::test]
    async fn facets_are_distinct_and_sorted() {
        let Some(db) = scratch_db(2).await else { return };
        let rows = [
            item("AAPL", "Morgan", "Buy", "$150", 1),
            item("MSFT", "Goldman", "Hold", "$300", 2),
            item("TSLA", "Goldman", "Buy", "$250", 3),
        ];
        assert_eq!(insert_batch(&db.pool, &rows).await.unwrap(), 3);
        assert!(!is_empty(&db.pool).await.unwrap());

        assert_eq!(distinct_brokerages(&db.pool).await.unwrap(), vec!["Goldman", "Morgan"]);
        assert_eq!(distinct_ratings(&db.pool).await.unwrap(), vec!["Buy", "Hold"]);

        db.cleanup().await;
    }

    #[tokio::test]
    async fn unscorable_rows_are_listed_but_never_ranked() {
        let Some(db) = scratch_db(2).await else { return };
        let rows = [
            item("AAPL", "Goldman", "Buy", "$150", 1),
            item("NOPE", "Goldman", "Buy", "N/A", 2),
        ];
        insert_batch(&db.pool, &rows).await.unwrap();

        let listed = list_page(&db.pool, &query(&[])).await.unwrap();
        assert_eq!(listed.total, 2);
        assert!(listed.data.iter().any(|r| r.ticker == "NOPE"));

        let filtered = list_page(&db.pool, &query(&[("brokerage", "goldman")])).await.unwrap();
        assert_eq!(filtered.total, 2);

        let ranked = rank_top(fetch_matching(&db.pool, &[]).await.unwrap(), TOP_OVERALL);
        let tickers: Vec<&str> = ranked.iter().map(|s| s.record.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL"]);

        db.cleanup().await;
    }

    #[tokio::test]
    async fn target_bounds_skip_amounts_the_parser_rejects() {
        let Some(db) = scratch_db(2).await else { return };
        let targets = [
            "$150".to_string(),
            "$1,250.50".to_string(),
            " $.5 ".to_string(),
            "N/A".to_string(),
            "$ 150".to_string(),
            "-$5".to_string(),
            format!("${}", "9".repeat(400)),
            format!("$1.{}", "1".repeat(400)),
            "$1.2.3".to_string(),
        ];
        let rows: Vec<FeedItem> = targets
            .iter()
            .enumerate()
            .map(|(i, t)| item(&format!("T{i}"), "Goldman", "Buy", t, 1))
            .collect();
        insert_batch(&db.pool, &rows).await.unwrap();

        let everything = list_page(
            &db.pool,
            &query(&[("target_min", "-1000000000000000000"), ("limit", "500")]),
        )
        .await
        .unwrap();
        let matched: BTreeSet<String> = everything.data.into_iter().map(|r| r.target_to).collect();
        let parseable: BTreeSet<String> = targets
            .iter()
            .filter(|t| parse_currency(t).is_some())
            .cloned()
            .collect();
        assert_eq!(matched, parseable);
        assert_eq!(matched.len(), 3);

        let bounded = list_page(&db.pool, &query(&[("target_min", "1"), ("target_max", "$1000")]))
            .await
            .unwrap();
        let in_range: Vec<String> = bounded.data.into_iter().map(|r| r.target_to).collect();
        assert_eq!(in_range, vec!["$150"]);

        db.cleanup().await;
    }

    #[tokio::test]
    async fn company_prefix_treats_wildcards_literally() {
        let Some(db) = scratch_db(2).await else { return };
        let mut percent = item("PCT", "Goldman", "Buy", "$10", 1);
        percent.company = "100% Holdings".to_string();
        let mut plain = item("ZERO", "Goldman", "Buy", "$10", 2);
        plain.company = "1000 Holdings".to_string();
        let mut apple = item("AAPL", "Goldman", "Buy", "$10", 3);
        apple.company = "Apple Inc.".to_string();
        insert_batch(&db.pool, &[percent, plain, apple]).await.unwrap();

        let page = list_page(&db.pool, &query(&[("company", "100%")])).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].ticker, "PCT");

        let page = list_page(&db.pool, &query(&[("company", "apple")])).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].ticker, "AAPL");

        db.cleanup().await;
    }

    #[tokio::test]
    async fn total_is_unchanged_across_pages() {
        let Some(db) = scratch_db(2).await else { return };
        let rows: Vec<FeedItem> = (1..=7)
            .map(|day| item("AAPL", "Goldman", "Buy", "$150", day))
            .chain([item("MSFT", "Goldman", "Buy", "$150", 8)])
            .collect();
        insert_batch(&db.pool, &rows).await.unwrap();

        let first = list_page(&db.pool, &query(&[("ticker", "aapl"), ("limit", "3")]))
            .await
            .unwrap();
        let last = list_page(
            &db.pool,
            &query(&[("ticker", "aapl"), ("limit", "3"), ("page", "3"), ("order", "asc")]),
        )
        .await
        .unwrap();
        let beyond = list_page(&db.pool, &query(&[("ticker", "aapl"), ("page", "9")]))
            .await
            .unwrap();

        assert_eq!((first.total, last.total, beyond.total), (7, 7, 7));
        assert_eq!(first.data.len(), 3);
        assert_eq!(last.data.len(), 1);
        assert!(beyond.data.is_empty());
        assert_eq!(first.data[0].time, Utc.with_ymd_and_hms(2025, 1, 7, 12, 0, 0).unwrap());
        assert_eq!(last.data[0].time, Utc.with_ymd_and_hms(2025, 1, 7, 12, 0, 0).unwrap());

        db.cleanup().await;
    }
}
