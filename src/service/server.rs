//! HTTP endpoint
//!
//! - `POST /predict` with `{"features": [...11 values...]}`
//! - `GET /health`
//!
//! Client mistakes answer 400, anything else 500. Every failure body is
//! `{"error": ..., "status": "fail"}`. Browser clients on another origin are
//! admitted through a CORS layer built from the configured origins.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use super::InferenceService;
use crate::model::Predict;
use crate::{Error, Result};

/// Origin entry that admits every origin
pub const ANY_ORIGIN: &str = "*";

/// Prediction request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Feature values in schema order
    pub features: Vec<Value>,
}

/// Outcome tag carried by every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Prediction produced
    Success,
    /// Request failed
    Fail,
}

/// Prediction response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    /// `{prediction, status: "success"}`
    Success {
        /// Predicted exam score
        prediction: f64,
        /// Always [`Status::Success`]
        status: Status,
    },
    /// `{error, status: "fail"}`
    Failure {
        /// Error message
        error: String,
        /// Always [`Status::Fail`]
        status: Status,
    },
}

impl PredictResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            status: Status::Fail,
        }
    }
}

/// Health response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Prediction handler
pub async fn predict<M: Predict + 'static>(
    State(service): State<InferenceService<M>>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> (StatusCode, Json<PredictResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(PredictResponse::failure(rejection.body_text())),
            );
        }
    };

    match service.predict_values(&request.features) {
        Ok(prediction) => (
            StatusCode::OK,
            Json(PredictResponse::Success {
                prediction,
                status: Status::Success,
            }),
        ),
        Err(e) => {
            let code = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            warn!(error = %e, status = code.as_u16(), "prediction failed");
            (code, Json(PredictResponse::failure(e.to_string())))
        }
    }
}

/// Health check handler
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// CORS policy for `origins`. A `"*"` entry admits any origin.
///
/// # Errors
///
/// Returns [`Error::Config`] if an origin is not a valid header value.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.iter().any(|o| o == ANY_ORIGIN) {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o)
                .map_err(|e| Error::Config(format!("invalid CORS origin '{o}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Routes over `service`, wrapped in `cors`.
pub fn router<M: Predict + 'static>(service: InferenceService<M>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/predict", post(predict::<M>))
        .route("/health", get(health))
        .with_state(service)
        .layer(cors)
}

/// Bind `address` and serve until the process stops.
///
/// # Errors
///
/// Returns an IO error if the address cannot be bound or the server fails.
pub async fn serve<M: Predict + 'static>(
    address: SocketAddr,
    service: InferenceService<M>,
    cors: CorsLayer,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "inference server listening");
    axum::serve(listener, router(service, cors)).await?;
    Ok(())
}
