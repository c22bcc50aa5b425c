//! Archive import: decode, parse, validate, then merge into the store.
//!
//! Archive and store failures abort the whole import. Row-level failures are
//! recorded in the [`ImportReport`] and the rest of the batch carries on.

pub mod merge;
pub mod report;
pub mod validator;

use std::time::Instant;

use sqlx::SqlitePool;
use tracing::info;

use crate::archive;
use crate::model::{Item, Totals};
use crate::records::RowReader;
use crate::{AppError, AppResult};

pub use merge::{merge_items, MergeReport};
pub use report::{write_import_report, ImportReport, RejectedRow};
pub use validator::validate_record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub report: ImportReport,
    pub merge: MergeReport,
}

impl ImportOutcome {
    pub fn totals(&self) -> Totals {
        self.merge.totals
    }
}

/// Decode `bytes` and return every valid item across all CSV members, in
/// member then row order.
pub fn parse_archive(bytes: &[u8]) -> AppResult<(Vec<Item>, ImportReport)> {
    let members = archive::decode_csv_members(bytes)?;
    let mut report = ImportReport::default();
    let mut items = Vec::new();

    for member in &members {
        report.members.push(member.name.clone());
        let rows = RowReader::new(&member.name, member.data.as_slice())?;
        for row in rows {
            report.rows_read += 1;
            match row.and_then(validate_record) {
                Ok(item) => items.push(item),
                Err(err) => report.reject(&member.name, err),
            }
        }
    }

    Ok((items, report))
}

pub async fn import_archive(pool: &SqlitePool, bytes: Vec<u8>) -> AppResult<ImportOutcome> {
    let start = Instant::now();
    let archive_bytes = bytes.len();

    // Decompression and parsing are CPU bound; keep them off the async workers.
    let (items, report) = tokio::task::spawn_blocking(move || parse_archive(&bytes))
        .await
        .map_err(|err| AppError::new("APP/TASK", "Import worker failed").with_cause(err.to_string()))??;

    let merge = merge_items(pool, items).await?;

    info!(
        target: "pricebook",
        event = "import_archive",
        archive_bytes = archive_bytes,
        members = report.members.len(),
        rows_read = report.rows_read,
        rows_rejected = report.rejected.len(),
        total_items = merge.totals.total_items,
        ms = start.elapsed().as_millis() as u64
    );

    Ok(ImportOutcome { report, merge })
}
