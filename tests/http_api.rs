use std::io::{Cursor, Read};

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pricebook_lib::http::{router, PRICES_PATH};
use pricebook_lib::{AppError, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;
use zip::ZipArchive;

mod util;

const LIMIT: usize = 64 * 1024;
const BOUNDARY: &str = "pricebook-test-boundary";

async fn app() -> (Router, SqlitePool) {
    let pool = util::temp_pool().await;
    (router(AppState::new(pool.clone()), LIMIT), pool)
}

fn post_raw(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(PRICES_PATH)
        .header(header::CONTENT_TYPE, "application/zip")
        .body(Body::from(body))
        .unwrap()
}

fn post_multipart(field: &str, payload: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"data.zip\"\r\n\
             Content-Type: application/zip\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(PRICES_PATH)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn sample_archive() -> Vec<u8> {
    util::price_archive(&[
        "1,Bread,Food,2.50,2024-01-01",
        "2,Pen,Office,1.20,2024-01-02",
    ])
}

#[tokio::test]
async fn raw_body_import_returns_totals() -> Result<()> {
    let (app, _) = app().await;
    let response = app.oneshot(post_raw(sample_archive())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await?;
    assert_eq!(body["total_items"], 2);
    assert_eq!(body["total_categories"], 2);
    assert_eq!(body["total_price"], 3.7);
    assert_eq!(body.as_object().map(|o| o.len()), Some(3));
    Ok(())
}

#[tokio::test]
async fn multipart_import_reads_the_file_field() -> Result<()> {
    let (app, pool) = app().await;
    let response = app
        .oneshot(post_multipart("file", &sample_archive()))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["total_items"], 2);
    assert_eq!(util::stored_ids(&pool).await, vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn multipart_without_file_field_is_a_bad_request() -> Result<()> {
    let (app, _) = app().await;
    let response = app
        .oneshot(post_multipart("attachment", &sample_archive()))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["code"], AppError::MISSING_PAYLOAD);
    Ok(())
}

#[tokio::test]
async fn garbage_upload_is_a_bad_request() -> Result<()> {
    let (app, pool) = app().await;
    let response = app.oneshot(post_raw(b"not a zip at all".to_vec())).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await?;
    assert_eq!(body["code"], AppError::INVALID_ARCHIVE);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(util::stored_ids(&pool).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_body_is_a_bad_request() -> Result<()> {
    let (app, _) = app().await;
    let response = app.oneshot(post_raw(Vec::new())).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["code"], AppError::MISSING_PAYLOAD);
    Ok(())
}

#[tokio::test]
async fn oversized_upload_is_rejected() -> Result<()> {
    let (app, _) = app().await;
    let response = app.oneshot(post_raw(vec![0u8; LIMIT + 1])).await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await?["code"], AppError::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn store_failure_is_a_server_error() -> Result<()> {
    let (app, pool) = app().await;
    sqlx::query("DROP TABLE prices").execute(&pool).await?;

    let response = app.oneshot(post_raw(sample_archive())).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await?["code"], AppError::PERSISTENCE_FAILURE);
    Ok(())
}

#[tokio::test]
async fn export_download_is_a_named_zip() -> Result<()> {
    let (app, _) = app().await;
    app.clone().oneshot(post_raw(sample_archive())).await?;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri(PRICES_PATH)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=data.zip"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec()))?;
    assert_eq!(archive.len(), 1);
    let mut text = String::new();
    archive.by_name("data.csv")?.read_to_string(&mut text)?;
    assert_eq!(
        text,
        "id,name,category,price,create_date\n\
         1,Bread,Food,2.50,2024-01-01\n\
         2,Pen,Office,1.20,2024-01-02\n"
    );
    Ok(())
}

#[tokio::test]
async fn other_methods_are_not_allowed() -> Result<()> {
    let (app, _) = app().await;
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(PRICES_PATH)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}
