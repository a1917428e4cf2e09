use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};
use zine_ipfs::{Backend, Cid, IpfsPath};
use zine_registry::store::RegistryStore;
use zine_registry::{AdminChange, RegistryDocument, RegistryEntry};

use super::{json_body, ApiError, AppState};
use crate::PublishError;

#[derive(Debug, Default, Deserialize)]
pub struct RegistryQuery {
    /// Fetch this document instead of the current registry.
    pub cid: Option<String>,
    /// Fetch the document an IPNS name points to.
    pub key: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn fetch_failed(e: impl ToString) -> ApiError {
    ApiError::new(StatusCode::BAD_GATEWAY, "Registry fetch failed").detail(e)
}

#[instrument(skip_all, fields(cid = ?query.cid, key = ?query.key))]
pub async fn get(
    State(AppState { services, .. }): State<AppState>,
    Query(query): Query<RegistryQuery>,
) -> Result<Response, ApiError> {
    let path = match (non_empty(query.cid), non_empty(query.key)) {
        (Some(cid), _) => {
            Some(IpfsPath::parse(&cid).ok_or_else(|| ApiError::bad_request("Invalid cid"))?)
        }
        (None, Some(key)) => {
            let key = key.trim_start_matches('/');
            let key = key.strip_prefix("ipns/").unwrap_or(key);
            Some(IpfsPath::Ipns(key.to_string()))
        }
        (None, None) => None,
    };

    if let Some(path) = path {
        let doc: Value = services.gateway.fetch_json(&path).await.map_err(|e| {
            warn!(err = %e, "unable to fetch document");
            fetch_failed(e)
        })?;
        return Ok(Json(doc).into_response());
    }

    let Some(registry) = services.registry() else {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "No registry configured"));
    };

    let doc = registry.store().read().await.map_err(|e| {
        warn!(step = %e.step, err = %e.message, "unable to read registry");
        fetch_failed(e)
    })?;
    Ok(Json(doc).into_response())
}

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub mode: Option<String>,
    /// The full document, for `replace`.
    #[serde(default)]
    pub manifest: Option<RegistryDocument>,
    #[serde(default)]
    pub add: Vec<RegistryEntry>,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AdminRequest {
    fn into_change(self) -> Result<AdminChange, ApiError> {
        match self.mode.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("merge") => Ok(AdminChange::Merge {
                add: self.add,
                remove: self.remove,
            }),
            Some("replace") => self
                .manifest
                .map(AdminChange::Replace)
                .ok_or_else(|| ApiError::bad_request("Missing manifest")),
            Some(_) => Err(ApiError::bad_request("Unknown mode")),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminResponse {
    pub registry_cid: Cid,
    pub entries: usize,
}

/// Merges entries into, or replaces, the registry. Only available where
/// the registry isn't managed by publishes alone.
#[instrument(skip_all)]
pub async fn post(
    State(AppState { services, .. }): State<AppState>,
    request: Request,
) -> Result<Json<AdminResponse>, ApiError> {
    match services.backend {
        None => return Err(PublishError::MissingCredentials.into()),
        Some(Backend::Droplet) => {
            return Err(ApiError::new(
                StatusCode::METHOD_NOT_ALLOWED,
                "Registry writes go through /publish",
            ))
        }
        Some(Backend::Pinata) | Some(Backend::Memory) => {}
    }

    let Some(registry) = services.registry() else {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "No registry configured"));
    };

    let change = json_body::<AdminRequest>(request).await?.into_change()?;
    let update = registry.apply(change).await.map_err(|e| {
        warn!(step = %e.step, err = %e.message, "registry update failed");
        ApiError::new(StatusCode::BAD_GATEWAY, "Registry update failed")
            .code(e.step.as_str())
            .detail(e.message)
    })?;

    Ok(Json(AdminResponse {
        registry_cid: update.registry_cid,
        entries: update.entries,
    }))
}
