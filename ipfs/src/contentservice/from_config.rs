use std::sync::Arc;

use reqwest_middleware::ClientWithMiddleware;

use super::{ContentService, KuboContentService, PinataContentService};
use crate::kubo::KuboClient;
use crate::pinata::PinataClient;
use crate::SelectedBackend;

/// Constructs the [ContentService] for a selected backend. All requests go
/// through the passed HTTP client.
pub fn from_config(
    selected: &SelectedBackend,
    http_client: ClientWithMiddleware,
) -> Arc<dyn ContentService> {
    match selected {
        SelectedBackend::Droplet(endpoint) => Arc::new(KuboContentService::new(KuboClient::new(
            endpoint.clone(),
            http_client,
        ))),
        SelectedBackend::Pinata(endpoint) => Arc::new(PinataContentService::new(
            PinataClient::new(endpoint.clone(), http_client),
        )),
    }
}
