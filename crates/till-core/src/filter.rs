//! # Sale History Filter
//!
//! Caller-facing listing filter and the defaults applied to it.
//!
//! ```text
//! SaleFilter (anything may be missing or out of range)
//!      │
//!      │ normalize_at(now)
//!      ▼
//! NormalizedFilter
//!   to      = to.unwrap_or(now)
//!   from    = from if present and ≤ to, else to − 30 days
//!   limit   = limit if in 1..=500, else 200
//!   offset  = max(offset, 0)
//!   query   = trimmed, None when blank
//! ```
//!
//! The clock is passed in so that normalisation stays a pure function.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{PaymentMethod, SaleStatus};
use crate::{DEFAULT_LIST_LIMIT, DEFAULT_LOOKBACK_DAYS, MAX_LIST_LIMIT};

/// Filter for listing sale history. Every criterion is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct SaleFilter {
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
    /// Empty means any method.
    pub payment_methods: Vec<PaymentMethod>,
    /// Empty means any status.
    pub statuses: Vec<SaleStatus>,
    /// Case-insensitive substring of customer name or sale number.
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A filter with every default resolved. Built by [`SaleFilter::normalize_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub payment_methods: Vec<PaymentMethod>,
    pub statuses: Vec<SaleStatus>,
    /// Lower-cased.
    pub query: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl SaleFilter {
    /// Resolves defaults against `now`.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{Duration, Utc};
    /// use till_core::filter::SaleFilter;
    ///
    /// let now = Utc::now();
    /// let filter = SaleFilter { limit: Some(0), ..Default::default() }.normalize_at(now);
    /// assert_eq!(filter.limit, 200);
    /// assert_eq!(filter.to, now);
    /// assert_eq!(filter.from, now - Duration::days(30));
    /// ```
    pub fn normalize_at(self, now: DateTime<Utc>) -> NormalizedFilter {
        let to = self.to.unwrap_or(now);
        let from = match self.from {
            Some(from) if from <= to => from,
            _ => to - Duration::days(DEFAULT_LOOKBACK_DAYS),
        };

        let limit = match self.limit {
            Some(limit) if limit > 0 && limit <= MAX_LIST_LIMIT => limit,
            _ => DEFAULT_LIST_LIMIT,
        };

        let query = self
            .query
            .map(|q| search_key(q.trim()))
            .filter(|q| !q.is_empty());

        NormalizedFilter {
            from,
            to,
            payment_methods: self.payment_methods,
            statuses: self.statuses,
            query,
            limit,
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

/// Case-folded form of text the free-text query is matched against.
///
/// Stored values and queries are both folded here, with full Unicode case
/// rules, so `ÉLODIE` finds `Élodie`.
pub fn search_key(text: &str) -> String {
    text.to_lowercase()
}
