//! Inbound HTTP surface.
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /api/vimeo/webhook?connectionId=&secret=` | Webhook deliveries |
//! | `POST /api/sync/:connection_id/start` | Launch a background crawl |
//! | `GET /api/sync/:connection_id` | Persisted sync state |
//! | `POST /api/sync/:connection_id/newest` | Upsert the newest page |
//! | `POST`/`DELETE /api/webhooks/:connection_id` | Ensure / remove the subscription |
//! | `GET /health` | Liveness |

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use core_sync::{SyncError, WebhookDelivery, WebhookOutcome, WEBHOOK_CALLBACK_PATH};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, info_span, Span};

use crate::{CatalogSyncService, ServiceError};

const EVENT_HEADERS: [&str; 2] = ["x-vimeo-event", "x-event-type"];

pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            err if err.is_not_found() => StatusCode::NOT_FOUND,
            ServiceError::SyncInProgress { .. } => StatusCode::CONFLICT,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Provider(_) | ServiceError::Sync(SyncError::Provider(_)) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the application router.
pub fn router(service: CatalogSyncService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_CALLBACK_PATH, post(receive_webhook))
        .route("/api/sync/:connection_id", get(sync_status))
        .route("/api/sync/:connection_id/start", post(start_sync))
        .route("/api/sync/:connection_id/newest", post(sync_newest))
        .route(
            "/api/webhooks/:connection_id",
            post(ensure_webhook).delete(remove_webhook),
        )
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(service)
}

/// Request span with the path only; webhook query strings carry the secret.
fn request_span(req: &Request<Body>) -> Span {
    info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookQuery {
    connection_id: Option<String>,
    secret: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn receive_webhook(
    State(service): State<CatalogSyncService>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let (Some(connection_id), Some(secret)) =
        (non_empty(query.connection_id), non_empty(query.secret))
    else {
        return Err(ApiError(ServiceError::InvalidRequest(
            "connectionId and secret are required".to_string(),
        )));
    };

    let event_hint = EVENT_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
        debug!(error = %e, "Unparsable webhook body, treating as empty");
        json!({})
    });

    let delivery = WebhookDelivery {
        connection_id,
        secret,
        event_hint,
        payload,
        received_at: service.now(),
    };

    let response = match service.handle_webhook(delivery).await? {
        WebhookOutcome::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response(),
        _ => Json(json!({ "ok": true })).into_response(),
    };
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
struct StartSyncRequest {
    #[serde(default)]
    restart: bool,
}

async fn start_sync(
    State(service): State<CatalogSyncService>,
    Path(connection_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartSyncRequest::default()
    } else {
        serde_json::from_slice::<StartSyncRequest>(&body)
            .map_err(|e| ServiceError::InvalidRequest(format!("invalid body: {}", e)))?
    };

    let started = service.start_sync(&connection_id, request.restart);
    Ok((StatusCode::ACCEPTED, Json(json!({ "started": started }))).into_response())
}

async fn sync_status(
    State(service): State<CatalogSyncService>,
    Path(connection_id): Path<String>,
) -> ApiResult<Response> {
    let state = service.get_sync_status(&connection_id).await?;
    Ok(Json(state).into_response())
}

async fn sync_newest(
    State(service): State<CatalogSyncService>,
    Path(connection_id): Path<String>,
) -> ApiResult<Response> {
    let outcome = service.sync_newest(&connection_id).await?;
    Ok(Json(outcome).into_response())
}

async fn ensure_webhook(
    State(service): State<CatalogSyncService>,
    Path(connection_id): Path<String>,
) -> ApiResult<Response> {
    let state = service.ensure_webhook(&connection_id).await?;
    Ok(Json(state).into_response())
}

async fn remove_webhook(
    State(service): State<CatalogSyncService>,
    Path(connection_id): Path<String>,
) -> ApiResult<Response> {
    let state = service.remove_webhook(&connection_id).await?;
    Ok(Json(state).into_response())
}
