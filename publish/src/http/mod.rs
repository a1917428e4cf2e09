//! The HTTP interface: publishing, registry reads and admin writes, and
//! configuration diagnostics.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::config::{EnvReport, Services};

mod envcheck;
mod publish;
mod registry;

pub use publish::{PublishLinks, PublishResponse};

/// Request bodies larger than this are refused.
const BODY_LIMIT: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    services: Services,
    env_report: Arc<EnvReport>,
}

impl AppState {
    pub fn new(services: Services, env_report: EnvReport) -> Self {
        Self {
            services,
            env_report: Arc::new(env_report),
        }
    }
}

pub fn gen_router() -> Router<AppState> {
    Router::new()
        .route("/publish", post(publish::post))
        .route("/registry", get(registry::get).post(registry::post))
        .route("/envcheck", get(envcheck::get))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}

/// Answers preflight requests for any path, and allows any origin on all
/// other responses.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("OPTIONS,GET,POST"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type,authorization"),
    );
    response
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// A JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &'static str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error,
                code: None,
                detail: None,
            },
        }
    }

    pub fn bad_request(error: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn code(mut self, code: &'static str) -> Self {
        self.body.code = Some(code);
        self
    }

    pub fn detail(mut self, detail: impl ToString) -> Self {
        self.body.detail = Some(detail.to_string());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Reads the whole body and parses it as JSON.
async fn json_body<T: serde::de::DeserializeOwned>(request: Request) -> Result<T, ApiError> {
    let body = axum::body::to_bytes(request.into_body(), BODY_LIMIT)
        .await
        .map_err(|e| {
            tracing::warn!(err = %e, "unable to read body");
            ApiError::bad_request("Invalid JSON body").detail(e)
        })?;

    serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(err = %e, "unable to parse body");
        ApiError::bad_request("Invalid JSON body").detail(e)
    })
}
