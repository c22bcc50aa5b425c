use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::archive::{self, ArchiveMember};
use crate::model::Item;
use crate::records;
use crate::{AppError, AppResult};

/// Name of the single CSV member inside every export archive.
pub const EXPORT_MEMBER_NAME: &str = "data.csv";
/// Suggested download name for the archive itself.
pub const EXPORT_ARCHIVE_NAME: &str = "data.zip";

const PARTIAL_SUFFIX: &str = ".partial";

type ItemRow = (i64, String, String, String, NaiveDate);

/// Read every stored item ordered by `id`.
pub async fn load_items(pool: &SqlitePool) -> AppResult<Vec<Item>> {
    let rows: Vec<ItemRow> = sqlx::query_as(
        "SELECT id, name, category, price, create_date FROM prices ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::persistence("export_query", err))?;

    rows.into_iter()
        .map(|(id, name, category, price, create_date)| -> AppResult<Item> {
            let price = Decimal::from_str(&price).map_err(|err| {
                AppError::persistence("export_price_decode", err.to_string())
                    .with_context("id", id.to_string())
            })?;
            Ok(Item {
                id,
                name,
                category,
                price,
                create_date,
            })
        })
        .collect()
}

/// Build a zip archive holding the whole store as `data.csv`.
pub async fn export_archive(pool: &SqlitePool) -> AppResult<Vec<u8>> {
    let start = Instant::now();
    let items = load_items(pool).await?;
    let csv = records::encode_items(&items)?;
    let bytes = archive::encode_member(&ArchiveMember::new(EXPORT_MEMBER_NAME, csv))?;

    info!(
        target: "pricebook",
        event = "export_archive",
        count = items.len(),
        archive_bytes = bytes.len(),
        ms = start.elapsed().as_millis() as u64
    );
    Ok(bytes)
}

/// Export to `path`, writing through a `.partial` sibling so a failed export
/// never leaves a truncated archive behind.
pub async fn export_to_file(pool: &SqlitePool, path: &Path) -> AppResult<u64> {
    let bytes = export_archive(pool).await?;
    let tmp = tmp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    };
    if let Err(err) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(AppError::encoding("export_write", err)
            .with_context("path", path.display().to_string()));
    }
    Ok(bytes.len() as u64)
}

fn tmp_path(final_path: &Path) -> PathBuf {
    let mut s = OsString::from(final_path.as_os_str());
    s.push(PARTIAL_SUFFIX);
    PathBuf::from(s)
}
