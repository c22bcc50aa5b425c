//! CSV row codec for the five-column price list layout.
//!
//! Reading discards exactly one header row and then yields raw field tuples
//! lazily. A row that cannot be split into the expected fields is reported as a
//! [`RowError`] in place and the sequence continues.

use std::fmt;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

use crate::model::Item;
use crate::{AppError, AppResult};

pub const HEADER: [&str; 5] = ["id", "name", "category", "price", "create_date"];
pub const FIELD_COUNT: usize = HEADER.len();
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a data row was dropped from an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    FieldCount,
    Unreadable,
    InvalidId,
    InvalidPrice,
    InvalidDate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectReason::FieldCount => "wrong number of fields",
            RejectReason::Unreadable => "unreadable row",
            RejectReason::InvalidId => "invalid id",
            RejectReason::InvalidPrice => "invalid price",
            RejectReason::InvalidDate => "invalid date",
        };
        f.write_str(label)
    }
}

/// A malformed data row. Never fatal to the surrounding batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}: {reason}: {detail}")]
pub struct RowError {
    pub line: u64,
    pub reason: RejectReason,
    pub detail: String,
}

impl RowError {
    pub fn new(line: u64, reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            line,
            reason,
            detail: detail.into(),
        }
    }
}

/// Untyped fields of one data row, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line in the member where the row starts.
    pub line: u64,
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: String,
    pub create_date: String,
}

/// Lazily reads data rows after consuming the header row.
pub struct RowReader<R: Read> {
    reader: csv::Reader<R>,
    header_width: usize,
    done: bool,
}

impl<R: Read> RowReader<R> {
    /// Consume the header row of `member`. A missing or unreadable header
    /// rejects the whole member.
    pub fn new(member: &str, source: R) -> AppResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut header = StringRecord::new();
        match reader.read_record(&mut header) {
            Ok(true) => {}
            Ok(false) => return Err(AppError::unreadable_header(member)),
            Err(err) => return Err(AppError::unreadable_header(member).with_cause(err)),
        }

        Ok(Self {
            reader,
            header_width: header.len(),
            done: false,
        })
    }

    fn split(&self, record: &StringRecord) -> Result<RawRecord, RowError> {
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        if record.len() < FIELD_COUNT || record.len() != self.header_width {
            return Err(RowError::new(
                line,
                RejectReason::FieldCount,
                format!(
                    "expected {} fields, found {}",
                    self.header_width.max(FIELD_COUNT),
                    record.len()
                ),
            ));
        }

        Ok(RawRecord {
            line,
            id: record[0].to_string(),
            name: record[1].to_string(),
            category: record[2].to_string(),
            price: record[3].to_string(),
            create_date: record[4].to_string(),
        })
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = Result<RawRecord, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut record = StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => Some(self.split(&record)),
            Err(err) => {
                let line = err.position().map(|pos| pos.line()).unwrap_or_default();
                // An I/O failure leaves the reader in an unknown position.
                if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                    self.done = true;
                }
                Some(Err(RowError::new(
                    line,
                    RejectReason::Unreadable,
                    err.to_string(),
                )))
            }
        }
    }
}

/// Render a price with exactly two decimal places, rounding half away from zero.
pub fn format_price(price: Decimal) -> String {
    let rounded = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// Serialize `items` as CSV: the header row followed by one row per item.
pub fn encode_items(items: &[Item]) -> AppResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(HEADER)
        .map_err(|err| AppError::encoding("csv_header", err))?;
    for item in items {
        writer
            .write_record([
                item.id.to_string(),
                item.name.clone(),
                item.category.clone(),
                format_price(item.price),
                item.create_date.format(DATE_FORMAT).to_string(),
            ])
            .map_err(|err| {
                AppError::encoding("csv_row", err).with_context("id", item.id.to_string())
            })?;
    }

    writer
        .into_inner()
        .map_err(|err| AppError::encoding("csv_flush", err.into_error()))
}
