use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use super::merge::MergeReport;
use crate::records::{RejectReason, RowError};

/// A data row that was dropped before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub member: String,
    pub line: u64,
    pub reason: RejectReason,
    pub detail: String,
}

/// What the parsing half of an import saw, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// CSV members read, in archive order.
    pub members: Vec<String>,
    pub rows_read: u64,
    pub rejected: Vec<RejectedRow>,
}

impl ImportReport {
    pub(crate) fn reject(&mut self, member: &str, err: RowError) {
        warn!(
            target: "pricebook",
            event = "import_row_rejected",
            member = member,
            line = err.line,
            reason = %err.reason,
            detail = %err.detail
        );
        self.rejected.push(RejectedRow {
            member: member.to_string(),
            line: err.line,
            reason: err.reason,
            detail: err.detail,
        });
    }

    pub fn rows_valid(&self) -> u64 {
        self.rows_read - self.rejected.len() as u64
    }
}

#[derive(Serialize)]
struct ImportReportFile<'a> {
    generated_at: String,
    archive_path: String,
    parse: &'a ImportReport,
    merge: &'a MergeReport,
}

/// Persist a JSON report of one import next to other operator artifacts.
pub fn write_import_report(
    reports_dir: &Path,
    archive_path: &Path,
    report: &ImportReport,
    merge: &MergeReport,
) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir)
        .with_context(|| format!("create reports directory {}", reports_dir.display()))?;

    let timestamp = Utc::now().format("import-%Y%m%d-%H%M%S.json");
    let path = reports_dir.join(timestamp.to_string());
    let payload = ImportReportFile {
        generated_at: Utc::now().to_rfc3339(),
        archive_path: archive_path.display().to_string(),
        parse: report,
        merge,
    };
    let json = serde_json::to_string_pretty(&payload).context("serialize import report")?;
    fs::write(&path, json).with_context(|| format!("write import report {}", path.display()))?;
    Ok(path)
}
