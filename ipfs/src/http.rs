//! HTTP plumbing shared by all backends.

use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::warn;
use url::Url;

use crate::{Backend, Error};

/// Response bodies of failed requests are truncated to this many bytes
/// before ending up in errors and logs.
pub const EXCERPT_LIMIT: usize = 512;

/// Constructs the HTTP client used to talk to nodes, pinning services and
/// gateways, with request tracing attached.
pub fn client() -> ClientWithMiddleware {
    ClientBuilder::new(reqwest::Client::new())
        .with(zine_tracing::propagate::reqwest::tracing_middleware())
        .build()
}

/// Makes sure relative joins append below the base path, instead of
/// replacing its last segment.
pub(crate) fn dir_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Truncates `body` to at most [EXCERPT_LIMIT] bytes, on a char boundary.
pub fn excerpt(body: &str) -> String {
    if body.len() <= EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut end = EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

pub(crate) fn transport(backend: Backend) -> impl FnOnce(reqwest_middleware::Error) -> Error {
    move |source| Error::Transport { backend, source }
}

async fn failed_body(resp: Response) -> String {
    excerpt(&resp.text().await.unwrap_or_default())
}

/// Passes through 2xx responses, turns everything else into
/// [Error::UploadFailed].
pub(crate) async fn check_upload(resp: Response, backend: Backend) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = failed_body(resp).await;
    warn!(%backend, status = status.as_u16(), body = %body, "upload rejected");
    Err(Error::UploadFailed {
        status: status.as_u16(),
        backend,
        body,
    })
}

/// Passes through 2xx responses, turns everything else into
/// [Error::RequestFailed].
pub(crate) async fn check_status(
    resp: Response,
    backend: Backend,
    op: &'static str,
) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    Err(Error::RequestFailed {
        op,
        status: status.as_u16(),
        backend,
        body: failed_body(resp).await,
    })
}

/// Reads the full body and parses it as JSON of the given type.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    resp: Response,
    backend: Backend,
) -> Result<T, Error> {
    let body = resp
        .bytes()
        .await
        .map_err(|e| transport(backend)(e.into()))?;

    serde_json::from_slice(&body).map_err(|e| Error::InvalidResponse {
        backend,
        detail: e.to_string(),
    })
}
