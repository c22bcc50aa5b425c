//! HTTP boundary: `POST` imports an archive, `GET` exports the store.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::model::Totals;
use crate::state::AppState;
use crate::{export, import, AppError, AppResult};

pub const PRICES_PATH: &str = "/api/v0/prices";
/// Multipart field carrying the uploaded archive.
pub const UPLOAD_FIELD: &str = "file";
const ZIP_CONTENT_TYPE: &str = "application/zip";
const EXPORT_DISPOSITION: &str = "attachment; filename=data.zip";

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(PRICES_PATH, post(post_prices).get(get_prices))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn serve(state: AppState, config: &ServerConfig) -> AppResult<()> {
    let listener = TcpListener::bind(config.listen).await.map_err(|err| {
        AppError::from(err)
            .with_context("operation", "bind")
            .with_context("listen", config.listen.to_string())
    })?;
    info!(target: "pricebook", event = "server_started", listen = %config.listen);

    axum::serve(listener, router(state, config.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "serve"))?;

    info!(target: "pricebook", event = "server_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: "pricebook", event = "shutdown_signal_failed", error = %err);
        std::future::pending::<()>().await;
    }
}

async fn post_prices(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<Totals>, AppError> {
    let payload = read_payload(request).await?;
    let outcome = import::import_archive(&state.pool, payload).await?;
    Ok(Json(outcome.totals()))
}

async fn get_prices(State(state): State<AppState>) -> Result<Response, AppError> {
    let bytes = export::export_archive(&state.pool).await?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(ZIP_CONTENT_TYPE)),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static(EXPORT_DISPOSITION),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Pull the archive out of either a multipart upload (field `file`) or the raw body.
async fn read_payload(request: Request) -> AppResult<Vec<u8>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|rej| body_error(rej.status(), rej.body_text()))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| body_error(err.status(), err.body_text()))?
        {
            if field.name() == Some(UPLOAD_FIELD) {
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| body_error(err.status(), err.body_text()))?;
                return Ok(data.to_vec());
            }
        }
        return Err(AppError::missing_payload().with_context("field", UPLOAD_FIELD));
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(|rej| body_error(rej.status(), rej.body_text()))?;
    if body.is_empty() {
        return Err(AppError::missing_payload());
    }
    Ok(body.to_vec())
}

fn body_error(status: StatusCode, reason: String) -> AppError {
    let error = if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(AppError::PAYLOAD_TOO_LARGE, "Upload exceeds the size limit.")
    } else {
        AppError::missing_payload()
    };
    error.with_context("reason", reason)
}

fn status_for(error: &AppError) -> StatusCode {
    match error.code() {
        AppError::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ if error.is_client_fault() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!(target: "pricebook", event = "request_failed", status = status.as_u16(), error = %self);
        } else {
            warn!(target: "pricebook", event = "request_rejected", status = status.as_u16(), error = %self);
        }
        let body = Json(json!({ "code": self.code, "message": self.message }));
        (status, body).into_response()
    }
}
