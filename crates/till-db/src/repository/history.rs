//! # Sale History Listing
//!
//! Runs a [`NormalizedFilter`] against the sales table.
//!
//! ```text
//! SELECT … FROM sales
//!  WHERE ts_millis BETWEEN :from AND :to
//!    [AND payment_method IN (…)]
//!    [AND status IN (…)]
//!    [AND (customer_search LIKE :q OR sale_number_search LIKE :q)]
//!  ORDER BY ts_millis DESC, sale_number DESC
//!  LIMIT :limit OFFSET :offset
//!
//! then one IN (…) query for the lines of the whole page
//! ```
//!
//! The `*_search` columns are folded with [`search_key`](till_core::search_key)
//! when the sale is written, the same folding the filter applies to the
//! query. SQLite's own `LOWER()` only folds ASCII.
//!
//! Both queries run in one read transaction, so a page never mixes two
//! database states.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use till_core::{NormalizedFilter, Sale, SaleFilter};
use tracing::debug;

use super::sale::{load_lines, SaleRepository, SaleRow, SALE_COLUMNS};
use super::{begin_failed, commit_failed, to_millis};
use crate::error::DbResult;

/// `%needle%` with LIKE wildcards in the needle escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl SaleRepository {
    /// Lists sales newest first, resolving filter defaults against the
    /// current time.
    pub async fn list(&self, filter: SaleFilter) -> DbResult<Vec<Sale>> {
        self.list_normalized(&filter.normalize_at(Utc::now())).await
    }

    /// Lists sales matching an already normalised filter.
    pub async fn list_normalized(&self, filter: &NormalizedFilter) -> DbResult<Vec<Sale>> {
        debug!(
            from = %filter.from,
            to = %filter.to,
            limit = filter.limit,
            offset = filter.offset,
            query = filter.query.as_deref().unwrap_or(""),
            "Listing sales"
        );

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE ts_millis >= "
        ));
        qb.push_bind(to_millis(filter.from));
        qb.push(" AND ts_millis <= ");
        qb.push_bind(to_millis(filter.to));

        if !filter.payment_methods.is_empty() {
            qb.push(" AND payment_method IN (");
            let mut methods = qb.separated(", ");
            for method in &filter.payment_methods {
                methods.push_bind(*method);
            }
            methods.push_unseparated(")");
        }

        if !filter.statuses.is_empty() {
            qb.push(" AND status IN (");
            let mut statuses = qb.separated(", ");
            for status in &filter.statuses {
                statuses.push_bind(*status);
            }
            statuses.push_unseparated(")");
        }

        if let Some(query) = &filter.query {
            let pattern = like_pattern(query);
            qb.push(" AND (customer_search LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR sale_number_search LIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }

        qb.push(" ORDER BY ts_millis DESC, sale_number DESC LIMIT ");
        qb.push_bind(filter.limit);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset);

        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        let rows: Vec<SaleRow> = qb.build_query_as().fetch_all(&mut *tx).await?;
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let mut lines = load_lines(&mut tx, &ids).await?;

        tx.commit().await.map_err(commit_failed)?;

        rows.into_iter()
            .map(|row| {
                let row_lines = lines.remove(&row.id).unwrap_or_default();
                row.into_sale(row_lines)
            })
            .collect()
    }
}
