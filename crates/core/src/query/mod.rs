pub mod filter;

use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;

pub use filter::{filters_from_params, param, Field, FilterValue, Op, RatingFilter};

pub const RATING_COLUMNS: &str =
    "id, ticker, target_from, target_to, company, action, brokerage, rating_from, rating_to, time";

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const DEFAULT_FILTER_LIMIT: i64 = 21;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` / `desc` in any case; everything else is `Desc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Parses `page` / `limit`, silently falling back to page 1 and `default_limit` for
    /// missing, malformed or out-of-range values.
    pub fn from_params(page: Option<&str>, limit: Option<&str>, default_limit: i64) -> Self {
        let page = page
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = limit
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .unwrap_or(default_limit);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Filters, ordering and paging for a listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingQuery {
    pub filters: Vec<RatingFilter>,
    pub order: SortOrder,
    pub pagination: Pagination,
}

impl RatingQuery {
    pub fn new(filters: Vec<RatingFilter>, order: SortOrder, pagination: Pagination) -> Self {
        Self {
            filters,
            order,
            pagination,
        }
    }

    pub fn from_params(params: &HashMap<String, String>, default_limit: i64) -> Self {
        Self {
            filters: filters_from_params(params),
            order: SortOrder::parse(param(params, "order")),
            pagination: Pagination::from_params(
                param(params, "page"),
                param(params, "limit"),
                default_limit,
            ),
        }
    }

    /// One page of matching rows.
    pub fn select_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = select_matching(&self.filters);
        qb.push(" ORDER BY time ").push(self.order.sql());
        qb.push(" LIMIT ").push_bind(self.pagination.limit);
        qb.push(" OFFSET ").push_bind(self.pagination.offset());
        qb
    }

    /// Count of every matching row; paging and ordering are not applied.
    pub fn count_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM stock_items");
        push_where(&mut qb, &self.filters);
        qb
    }
}

/// Unpaged `SELECT` of every row matching `filters`.
pub fn select_matching(filters: &[RatingFilter]) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {RATING_COLUMNS} FROM stock_items"));
    push_where(&mut qb, filters);
    qb
}

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filters: &[RatingFilter]) {
    for (idx, filter) in filters.iter().enumerate() {
        qb.push(if idx == 0 { " WHERE " } else { " AND " });
        filter.push_to(qb);
    }
}
