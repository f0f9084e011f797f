use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use common::thumbnail::{normalize, OutputEncoding, RawThumbnailParams};
use telemetry::metrics::{self as thumbnail_metrics, THUMBNAIL_REQUESTS};
use tracing::{error, warn};

use crate::{error::ApiError, publisher::thumbnail_response, service::Origin, state::AppState};

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics() -> Response {
    match thumbnail_metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            ApiError::internal("failed to encode metrics").into_response()
        }
    }
}

pub async fn generate_thumbnail(
    State(state): State<AppState>,
    Query(params): Query<RawThumbnailParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    let encoding = OutputEncoding::negotiate(accept, state.avif_enabled());

    let request = normalize(&params, encoding).map_err(|err| {
        THUMBNAIL_REQUESTS.with_label_values(&["invalid"]).inc();
        warn!(key = ?params.key, error = %err, "rejected thumbnail request");
        ApiError::from(err)
    })?;

    match state.service().thumbnail(&request).await {
        Ok(thumbnail) => {
            let outcome = match thumbnail.origin {
                Origin::Cache => "hit",
                Origin::Generated => "generated",
            };
            THUMBNAIL_REQUESTS.with_label_values(&[outcome]).inc();
            Ok(thumbnail_response(thumbnail, state.avif_enabled()))
        }
        Err(err) => {
            THUMBNAIL_REQUESTS.with_label_values(&["failed"]).inc();
            Err(err.into())
        }
    }
}
