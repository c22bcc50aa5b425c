#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::io::{Cursor, Write};

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const HEADER_LINE: &str = "id,name,category,price,create_date\n";

pub async fn temp_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    pricebook_lib::db::ensure_schema(&pool)
        .await
        .expect("create prices table");
    pool
}

/// Zip the given `(name, contents)` pairs; names ending in `/` become directories.
pub fn zip_members(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in members {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// A single `data.csv` member holding the header followed by `rows`.
pub fn price_archive(rows: &[&str]) -> Vec<u8> {
    let mut csv = String::from(HEADER_LINE);
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    zip_members(&[("data.csv", &csv)])
}

pub async fn stored_ids(pool: &SqlitePool) -> Vec<i64> {
    sqlx::query_scalar("SELECT id FROM prices ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}
