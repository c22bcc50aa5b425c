use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One priced entry as stored in the `prices` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Caller-supplied merge key; never generated by the store.
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub create_date: NaiveDate,
}

/// Aggregate snapshot returned by every import.
///
/// `total_items` counts the items accepted by the merge in this request, while
/// `total_categories` and `total_price` are recomputed over the whole store
/// after the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total_items: u64,
    pub total_categories: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}
