use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One analyst rating / price-target event as stored in `stock_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RatingRecord {
    pub id: i64,
    pub ticker: String,
    pub target_from: String,
    pub target_to: String,
    pub company: String,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: RatingRecord,
    pub score: f64,
}

/// A page of listing results; `total` counts every matching row, not just this page.
#[derive(Debug, Clone, Serialize)]
pub struct RatingPage {
    pub data: Vec<RatingRecord>,
    pub total: i64,
}
