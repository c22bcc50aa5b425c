use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::model::Item;
use crate::records::{RawRecord, RejectReason, RowError, DATE_FORMAT};

/// Convert one raw row into a typed [`Item`].
///
/// Checks run in column order and the first failing conversion decides the
/// reason. `name` and `category` pass through untouched, empty strings included.
pub fn validate_record(raw: RawRecord) -> Result<Item, RowError> {
    let line = raw.line;
    let id = parse_id(&raw.id).ok_or_else(|| {
        RowError::new(line, RejectReason::InvalidId, format!("invalid id: {:?}", raw.id))
    })?;
    let price = parse_price(&raw.price).ok_or_else(|| {
        RowError::new(
            line,
            RejectReason::InvalidPrice,
            format!("invalid price: {:?}", raw.price),
        )
    })?;
    let create_date = parse_date(&raw.create_date).ok_or_else(|| {
        RowError::new(
            line,
            RejectReason::InvalidDate,
            format!("invalid date: {:?}", raw.create_date),
        )
    })?;

    Ok(Item {
        id,
        name: raw.name,
        category: raw.category,
        price,
        create_date,
    })
}

fn parse_id(value: &str) -> Option<i64> {
    value.parse::<i64>().ok()
}

fn parse_price(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// Strict `YYYY-MM-DD`: zero padded, no sign, no surrounding whitespace.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    let shape_ok = bytes.iter().enumerate().all(|(idx, b)| match idx {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}
