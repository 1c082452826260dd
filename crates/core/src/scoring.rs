use crate::currency::parse_currency;
use crate::domain::rating::{RatingRecord, ScoredRecord};

pub const TOP_OVERALL: usize = 20;
pub const TOP_PER_BROKERAGE: usize = 10;

const BULLISH_RATING_BONUS: f64 = 10.0;
const RAISED_BONUS: f64 = 5.0;
const INITIATED_BONUS: f64 = 2.0;
const DOWNGRADED_PENALTY: f64 = -5.0;

/// Investment score for a single rating, or `None` when either price target is not a
/// currency amount or the starting target is zero.
pub fn score(record: &RatingRecord) -> Option<f64> {
    let from = parse_currency(&record.target_from)?;
    let to = parse_currency(&record.target_to)?;
    if from == 0.0 {
        return None;
    }

    let growth_pct = (to - from) / from * 100.0;
    Some(growth_pct + rating_bonus(&record.rating_to) + action_bonus(&record.action))
}

fn rating_bonus(rating_to: &str) -> f64 {
    match rating_to.to_lowercase().as_str() {
        "buy" | "outperform" => BULLISH_RATING_BONUS,
        _ => 0.0,
    }
}

// First match wins; an action mentioning both "raised" and "downgraded" counts as raised.
fn action_bonus(action: &str) -> f64 {
    let action = action.to_lowercase();
    if action.contains("raised") {
        RAISED_BONUS
    } else if action.contains("initiated") {
        INITIATED_BONUS
    } else if action.contains("downgraded") {
        DOWNGRADED_PENALTY
    } else {
        0.0
    }
}

/// Scores every record, drops the unscorable ones and keeps the best `k` by descending score.
pub fn rank_top(records: Vec<RatingRecord>, k: usize) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .into_iter()
        .filter_map(|record| score(&record).map(|score| ScoredRecord { record, score }))
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}
