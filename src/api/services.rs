use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{models::HealthResponse, state::AppState, utils};
use crate::api::error::ApiError;
use crate::delivery::{QueryParams, Route, SubscriptionRequest};

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";
const NO_CACHE: &str = "no-store, no-cache";

/// Subscription endpoint (any path other than `/health`)
///
/// `/{token}`, `/{token}/{profile}`, the same under `/sub/`, or `/?token=`.
/// The body is the merged node list (base64), a synthesized Clash config, or
/// the external converter's output, chosen by the negotiated target.
pub async fn subscription(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = uri.path();
    if utils::is_static_asset(path) {
        return Err(ApiError::NotFound(path.to_string()));
    }

    let query = QueryParams::parse(uri.query().unwrap_or_default());
    let route = Route::parse(path, &query).ok_or_else(|| ApiError::NotFound(path.to_string()))?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let request = SubscriptionRequest {
        route,
        query,
        user_agent,
        base_url: utils::base_url(&headers, state.config.server.public_url.as_deref()),
    };

    let delivery = state.service.render(&request).await.inspect_err(|e| {
        warn!(path, error = %e, "Subscription request rejected");
    })?;
    debug!(path, format = ?delivery.format, bytes = delivery.body.len(), "Subscription rendered");

    let mut response = (StatusCode::OK, delivery.body).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PLAIN_TEXT));
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));

    if let Some(name) = delivery.file_name.as_deref() {
        let value = HeaderValue::from_str(&utils::content_disposition(name))
            .map_err(|e| ApiError::Internal(format!("Invalid file name header: {}", e)))?;
        response_headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// Health check endpoint (GET /health)
///
/// Returns 503 when the store cannot be read.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = BTreeMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let store_status = match state.service.check_store() {
        Ok(()) => "healthy".to_string(),
        Err(e) => {
            warn!(error = %e, "Store health check failed");
            "unhealthy".to_string()
        }
    };
    components.insert("store".to_string(), store_status);

    let all_healthy = components.values().all(|status| status == "healthy");
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.metrics.snapshot(),
    };

    (status_code, Json(response))
}
