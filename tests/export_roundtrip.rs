use std::io::{Cursor, Read};

use anyhow::Result;
use pricebook_lib::export::{self, EXPORT_MEMBER_NAME};
use pricebook_lib::{import, Item};
use tempfile::tempdir;
use zip::ZipArchive;

mod util;

fn member_text(bytes: &[u8]) -> Result<(Vec<String>, String)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let names = archive.file_names().map(str::to_string).collect();
    let mut text = String::new();
    archive.by_name(EXPORT_MEMBER_NAME)?.read_to_string(&mut text)?;
    Ok((names, text))
}

#[tokio::test]
async fn empty_store_exports_header_only() -> Result<()> {
    let pool = util::temp_pool().await;
    let bytes = export::export_archive(&pool).await?;
    let (names, text) = member_text(&bytes)?;
    assert_eq!(names, vec![EXPORT_MEMBER_NAME.to_string()]);
    assert_eq!(text, util::HEADER_LINE);
    Ok(())
}

#[tokio::test]
async fn export_orders_by_id_with_two_decimal_prices() -> Result<()> {
    let pool = util::temp_pool().await;
    import::import_archive(
        &pool,
        util::price_archive(&[
            "20,Pen,Office,1.2,2024-01-02",
            "3,Bread,Food,2.5,2024-01-01",
            "7,\"Quoted \"\"name\"\"\",Food,1e1,2024-03-04",
        ]),
    )
    .await?;

    let (_, text) = member_text(&export::export_archive(&pool).await?)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "id,name,category,price,create_date",
            "3,Bread,Food,2.50,2024-01-01",
            "7,\"Quoted \"\"name\"\"\",Food,10.00,2024-03-04",
            "20,Pen,Office,1.20,2024-01-02",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn export_then_reimport_reproduces_the_store() -> Result<()> {
    let source = util::temp_pool().await;
    let first = import::import_archive(
        &source,
        util::price_archive(&[
            "1,Bread,Food,2.50,2024-01-01",
            "2,\"Pen, blue\",Office,1.20,2024-01-02",
            "3,Milk,Food,0.99,2024-01-03",
            "4,,,0.00,2023-12-31",
        ]),
    )
    .await?;

    let archive = export::export_archive(&source).await?;
    let target = util::temp_pool().await;
    let second = import::import_archive(&target, archive).await?;

    let source_items: Vec<Item> = export::load_items(&source).await?;
    let target_items: Vec<Item> = export::load_items(&target).await?;
    assert_eq!(source_items, target_items);
    assert_eq!(first.totals(), second.totals());
    assert!(second.report.rejected.is_empty());
    Ok(())
}

#[tokio::test]
async fn export_to_file_leaves_no_partial() -> Result<()> {
    let pool = util::temp_pool().await;
    import::import_archive(&pool, util::price_archive(&["1,Bread,Food,2.50,2024-01-01"])).await?;

    let dir = tempdir()?;
    let out = dir.path().join("data.zip");
    let written = export::export_to_file(&pool, &out).await?;

    let bytes = std::fs::read(&out)?;
    assert_eq!(written, bytes.len() as u64);
    assert!(!dir.path().join("data.zip.partial").exists());
    let (_, text) = member_text(&bytes)?;
    assert!(text.ends_with("1,Bread,Food,2.50,2024-01-01\n"));
    Ok(())
}

#[tokio::test]
async fn export_into_missing_directory_is_an_encoding_error() {
    let pool = util::temp_pool().await;
    let dir = tempdir().unwrap();
    let out = dir.path().join("missing").join("data.zip");
    let err = export::export_to_file(&pool, &out).await.unwrap_err();
    assert_eq!(err.code(), pricebook_lib::AppError::ENCODING_ERROR);
}
