//! Reading documents back through public IPFS HTTP gateways.

use std::time::Duration;

use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::http::{dir_url, excerpt};
use crate::{Cid, Error, IpfsPath};

/// Gateways tried, in order, when nothing else is configured.
pub const DEFAULT_GATEWAYS: [&str; 3] = [
    "https://ipfs.io",
    "https://cloudflare-ipfs.com",
    "https://dweb.link",
];

/// How long a single gateway gets before the next one is tried.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7);

/// Returns the browsable `<base>/ipfs/<cid>` link for some content.
pub fn content_url(base: &Url, cid: &Cid) -> String {
    format!("{}/ipfs/{}", base.as_str().trim_end_matches('/'), cid)
}

/// Fetches JSON documents from an ordered list of gateways, falling back to
/// the next one on any error, non-2xx status, unparseable body or timeout.
#[derive(Clone)]
pub struct GatewayClient {
    http_client: ClientWithMiddleware,
    gateways: Vec<Url>,
    timeout: Duration,
}

impl GatewayClient {
    pub fn new(http_client: ClientWithMiddleware, gateways: Vec<Url>, timeout: Duration) -> Self {
        Self {
            http_client,
            gateways: gateways.into_iter().map(dir_url).collect(),
            timeout,
        }
    }

    /// Puts `gateway` in front of the list, removing it from later
    /// positions if it was already present.
    pub fn with_preferred(mut self, gateway: Url) -> Self {
        let gateway = dir_url(gateway);
        self.gateways.retain(|g| g != &gateway);
        self.gateways.insert(0, gateway);
        self
    }

    pub fn gateways(&self) -> &[Url] {
        &self.gateways
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_from<T: DeserializeOwned>(&self, url: Url) -> Result<T, String> {
        let resp = self
            .http_client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("status {}: {}", status.as_u16(), excerpt(&body)));
        }

        let body = resp.bytes().await.map_err(|e| e.to_string())?;
        serde_json::from_slice(&body).map_err(|e| format!("invalid JSON: {}", e))
    }

    /// Fetches and parses the document at `path`, trying each gateway in
    /// turn. Fails with [Error::FetchFailed] once every gateway failed.
    #[instrument(skip_all, err, fields(path = %path))]
    pub async fn fetch_json<T: DeserializeOwned>(&self, path: &IpfsPath) -> Result<T, Error> {
        let rel = path.to_string();
        let mut failures = Vec::with_capacity(self.gateways.len());

        for gateway in &self.gateways {
            let url = match gateway.join(&rel) {
                Ok(url) => url,
                Err(e) => {
                    failures.push(format!("{}: {}", gateway, e));
                    continue;
                }
            };

            match tokio::time::timeout(self.timeout, self.fetch_from(url.clone())).await {
                Ok(Ok(doc)) => {
                    debug!(%url, "fetched");
                    return Ok(doc);
                }
                Ok(Err(detail)) => {
                    warn!(%url, detail = %detail, "gateway fetch failed");
                    failures.push(format!("{}: {}", gateway, detail));
                }
                Err(_) => {
                    warn!(%url, timeout = ?self.timeout, "gateway timed out");
                    failures.push(format!("{}: timed out after {:?}", gateway, self.timeout));
                }
            }
        }

        Err(Error::FetchFailed {
            path: rel,
            detail: if failures.is_empty() {
                "no gateways configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}
