use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;

// Numeric value of `target_to`, or NULL when the column is not an amount `parse_currency`
// would accept, so bounds never trip a cast error on rows such as "N/A". The digit caps match
// `currency::MAX_PART_DIGITS`.
const TARGET_TO_NUMERIC: &str = r"(CASE WHEN REPLACE(BTRIM(target_to, E' \t\r\n'), ',', '') ~ '^\$?-?([0-9]{1,15}(\.[0-9]{0,15})?|\.[0-9]{1,15})$' THEN CAST(REPLACE(REPLACE(BTRIM(target_to, E' \t\r\n'), ',', ''), '$', '') AS NUMERIC) END)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ticker,
    Brokerage,
    RatingTo,
    Action,
    Company,
    Time,
    TargetTo,
}

impl Field {
    fn sql(self) -> &'static str {
        match self {
            Field::Ticker => "ticker",
            Field::Brokerage => "brokerage",
            Field::RatingTo => "rating_to",
            Field::Action => "action",
            Field::Company => "company",
            Field::Time => "time",
            Field::TargetTo => TARGET_TO_NUMERIC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    EqIgnoreCase,
    StartsWithIgnoreCase,
    AtLeast,
    AtMost,
    Before,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Instant(DateTime<Utc>),
    Number(f64),
}

/// A single `field op value` predicate against `stock_items`.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingFilter {
    pub field: Field,
    pub op: Op,
    pub value: FilterValue,
}

impl RatingFilter {
    pub fn new(field: Field, op: Op, value: FilterValue) -> Self {
        Self { field, op, value }
    }

    pub fn ticker(ticker: &str) -> Self {
        Self::new(Field::Ticker, Op::Eq, FilterValue::Text(ticker.trim().to_uppercase()))
    }

    pub fn brokerage(name: &str) -> Self {
        Self::new(Field::Brokerage, Op::EqIgnoreCase, FilterValue::Text(name.trim().to_string()))
    }

    pub fn company_prefix(prefix: &str) -> Self {
        Self::new(
            Field::Company,
            Op::StartsWithIgnoreCase,
            FilterValue::Text(prefix.trim().to_string()),
        )
    }

    /// Appends this predicate to `qb`, binding the value as a parameter.
    pub fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let column = self.field.sql();
        match self.op {
            Op::Eq => {
                qb.push(column).push(" = ");
                self.push_value(qb);
            }
            Op::EqIgnoreCase => {
                qb.push("LOWER(").push(column).push(") = LOWER(");
                self.push_value(qb);
                qb.push(")");
            }
            Op::StartsWithIgnoreCase => {
                qb.push(column).push(" ILIKE ");
                match &self.value {
                    FilterValue::Text(s) => {
                        qb.push_bind(format!("{}%", escape_like(s)));
                    }
                    _ => self.push_value(qb),
                }
            }
            Op::AtLeast => {
                qb.push(column).push(" >= ");
                self.push_value(qb);
            }
            Op::AtMost => {
                qb.push(column).push(" <= ");
                self.push_value(qb);
            }
            Op::Before => {
                qb.push(column).push(" < ");
                self.push_value(qb);
            }
        }
    }

    fn push_value(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match &self.value {
            FilterValue::Text(s) => qb.push_bind(s.clone()),
            FilterValue::Instant(t) => qb.push_bind(*t),
            FilterValue::Number(n) => qb.push("CAST(").push_bind(*n).push(" AS NUMERIC)"),
        };
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Builds the filter list from query-string parameters.
///
/// Unknown keys are ignored. Dates and price bounds that do not parse are dropped rather than
/// rejected.
pub fn filters_from_params(params: &HashMap<String, String>) -> Vec<RatingFilter> {
    let mut filters = Vec::new();

    if let Some(v) = param(params, "ticker") {
        filters.push(RatingFilter::ticker(v));
    }
    if let Some(v) = param(params, "brokerage") {
        filters.push(RatingFilter::brokerage(v));
    }
    if let Some(v) = param(params, "rating_to") {
        filters.push(RatingFilter::new(Field::RatingTo, Op::Eq, FilterValue::Text(v.to_string())));
    }
    if let Some(v) = param(params, "action") {
        filters.push(RatingFilter::new(Field::Action, Op::Eq, FilterValue::Text(v.to_string())));
    }
    if let Some(v) = param(params, "company") {
        filters.push(RatingFilter::company_prefix(v));
    }
    if let Some(start) = param(params, "from").and_then(start_of_day) {
        filters.push(RatingFilter::new(Field::Time, Op::AtLeast, FilterValue::Instant(start)));
    }
    if let Some(end) = param(params, "to").and_then(end_of_day_exclusive) {
        filters.push(RatingFilter::new(Field::Time, Op::Before, FilterValue::Instant(end)));
    }
    if let Some(min) = param(params, "target_min").and_then(parse_bound) {
        filters.push(RatingFilter::new(Field::TargetTo, Op::AtLeast, FilterValue::Number(min)));
    }
    if let Some(max) = param(params, "target_max").and_then(parse_bound) {
        filters.push(RatingFilter::new(Field::TargetTo, Op::AtMost, FilterValue::Number(max)));
    }

    filters
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn start_of_day(s: &str) -> Option<DateTime<Utc>> {
    Some(parse_date(s)?.and_hms_opt(0, 0, 0)?.and_utc())
}

// `to` is inclusive of the whole day, so the bound is midnight of the following day.
fn end_of_day_exclusive(s: &str) -> Option<DateTime<Utc>> {
    Some(parse_date(s)?.succ_opt()?.and_hms_opt(0, 0, 0)?.and_utc())
}

fn parse_bound(s: &str) -> Option<f64> {
    s.trim_start_matches('$')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
