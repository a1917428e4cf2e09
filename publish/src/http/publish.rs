use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{instrument, warn};
use zine_ipfs::{Backend, Cid};
use zine_registry::RegistryStep;

use super::{json_body, ApiError, AppState};
use crate::{PublishError, PublishOutcome, PublishRequest, Publisher};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PublishLinks {
    pub manifest: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFailure {
    pub step: RegistryStep,
    pub detail: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub manifest_cid: Cid,
    pub project_cid: Cid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_cid: Option<Cid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey_cid: Option<Cid>,
    pub links: PublishLinks,
    /// Advisory, absent when the registry couldn't be updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_cid: Option<Cid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_error: Option<RegistryFailure>,
    pub pinned_via: Vec<Backend>,
}

impl PublishResponse {
    pub fn new(publisher: &Publisher, outcome: PublishOutcome) -> Self {
        let core = outcome.core;
        let (registry_cid, registry_name, registry_error) = match outcome.registry {
            Some(Ok(update)) => (Some(update.registry_cid), update.ipns_name, None),
            Some(Err(e)) => (
                None,
                None,
                Some(RegistryFailure {
                    step: e.step,
                    detail: e.message,
                }),
            ),
            None => (None, None, None),
        };

        Self {
            links: PublishLinks {
                manifest: publisher.link(&core.manifest_cid),
                project: publisher.link(&core.project_cid),
                backup: core.backup_cid.as_ref().map(|cid| publisher.link(cid)),
            },
            manifest_cid: core.manifest_cid,
            project_cid: core.project_cid,
            backup_cid: core.backup_cid,
            pubkey_cid: core.pubkey_cid,
            registry_cid,
            registry_name,
            registry_error,
            pinned_via: core.pinned_via,
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(value: PublishError) -> Self {
        match value {
            PublishError::MissingCredentials => ApiError::bad_request("Missing Pinata credentials"),
            PublishError::MissingProject => ApiError::bad_request("Missing project"),
            PublishError::Upload { step, source } => ApiError::bad_request("Upload failed")
                .code(step.as_str())
                .detail(source),
            e @ PublishError::Manifest(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Manifest build failed")
                    .code(e.code())
                    .detail(e)
            }
        }
    }
}

#[instrument(skip_all)]
pub async fn post(
    State(AppState { services, .. }): State<AppState>,
    request: Request,
) -> Result<Json<PublishResponse>, ApiError> {
    // Checked first, so nothing is parsed or sent without a backend.
    let Some(publisher) = services.publisher.as_ref() else {
        warn!("publish refused, no backend configured");
        return Err(PublishError::MissingCredentials.into());
    };

    let req: PublishRequest = json_body(request).await?;

    let outcome = publisher.publish(req).await.map_err(|e| {
        warn!(err = %e, code = e.code(), "publish failed");
        ApiError::from(e)
    })?;

    Ok(Json(PublishResponse::new(publisher, outcome)))
}
