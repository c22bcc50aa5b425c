//! Insert-or-skip persistence of validated items plus store-wide totals.
//!
//! Both steps share one transaction: the totals observe exactly the rows the
//! inserts produced, and a failure anywhere rolls every insert back. Rows whose
//! `id` already exists are left untouched (first write wins).

use std::str::FromStr;
use std::time::Instant;

use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::db;
use crate::model::{Item, Totals};
use crate::{AppError, AppResult};

const INSERT_OR_SKIP: &str = "INSERT INTO prices (id, name, category, price, create_date) \
     VALUES (?1, ?2, ?3, ?4, ?5) \
     ON CONFLICT (id) DO NOTHING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Insert attempts that did not error, duplicates included. Reported to
    /// callers as `total_items`.
    pub accepted: u64,
    /// Rows that did not exist before this merge.
    pub inserted: u64,
    pub totals: Totals,
}

pub async fn merge_items(pool: &SqlitePool, items: Vec<Item>) -> AppResult<MergeReport> {
    let start = Instant::now();
    let report = db::with_tx(pool, move |conn| {
        Box::pin(async move { apply_merge(conn, &items).await })
    })
    .await?;

    info!(
        target: "pricebook",
        event = "import_merge",
        accepted = report.accepted,
        inserted = report.inserted,
        skipped = report.accepted - report.inserted,
        total_categories = report.totals.total_categories,
        total_price = %report.totals.total_price,
        ms = start.elapsed().as_millis() as u64
    );
    Ok(report)
}

async fn apply_merge(conn: &mut SqliteConnection, items: &[Item]) -> AppResult<MergeReport> {
    let mut accepted = 0u64;
    let mut inserted = 0u64;
    for item in items {
        let result = sqlx::query(INSERT_OR_SKIP)
            .bind(item.id)
            .bind(&item.name)
            .bind(&item.category)
            .bind(item.price.to_string())
            .bind(item.create_date)
            .execute(&mut *conn)
            .await
            .map_err(|err| {
                AppError::persistence("merge_insert", err).with_context("id", item.id.to_string())
            })?;
        accepted += 1;
        inserted += result.rows_affected();
    }

    let totals = store_totals(conn, accepted).await?;
    Ok(MergeReport {
        accepted,
        inserted,
        totals,
    })
}

/// Aggregate over every stored row, whatever request wrote it.
async fn store_totals(conn: &mut SqliteConnection, total_items: u64) -> AppResult<Totals> {
    let categories: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT category) FROM prices")
        .fetch_one(&mut *conn)
        .await
        .map_err(|err| AppError::persistence("totals_categories", err))?;

    let mut total_price = Decimal::ZERO;
    let mut prices = sqlx::query_scalar::<_, String>("SELECT price FROM prices").fetch(&mut *conn);
    while let Some(raw) = prices
        .try_next()
        .await
        .map_err(|err| AppError::persistence("totals_price", err))?
    {
        let price = Decimal::from_str(&raw).map_err(|err| {
            AppError::persistence("totals_price_decode", err.to_string())
                .with_context("stored_price", raw.clone())
        })?;
        total_price = total_price.checked_add(price).ok_or_else(|| {
            AppError::persistence("totals_price_overflow", "price sum overflowed")
        })?;
    }

    Ok(Totals {
        total_items,
        total_categories: categories as u64,
        total_price,
    })
}
