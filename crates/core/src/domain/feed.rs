use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream wire shape of a rating. `time` must be an RFC 3339 instant; anything else fails
/// decoding of the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<FeedItem>,
    /// Opaque continuation token. Empty (or absent) on the last page.
    #[serde(default)]
    pub next_page: String,
}

impl FeedPage {
    pub fn next_token(&self) -> Option<&str> {
        let token = self.next_page.trim();
        (!token.is_empty()).then_some(token)
    }
}
