use thiserror::Error;

use crate::Backend;

/// Errors talking to a content-addressed storage backend or gateway.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither an IPFS node nor Pinata is configured.
    #[error("missing credentials: neither an IPFS node nor Pinata is configured")]
    MissingCredentials,

    /// The backend rejected an upload.
    #[error("{backend} upload failed ({status}): {body}")]
    UploadFailed {
        status: u16,
        backend: Backend,
        body: String,
    },

    /// Any other backend RPC answered with a non-2xx status.
    #[error("{backend} {op} failed ({status}): {body}")]
    RequestFailed {
        op: &'static str,
        status: u16,
        backend: Backend,
        body: String,
    },

    /// The backend answered 2xx, but there was no CID in the response.
    #[error("missing CID in {0} response")]
    MissingCid(Backend),

    #[error("{backend} request failed: {source}")]
    Transport {
        backend: Backend,
        #[source]
        source: reqwest_middleware::Error,
    },

    #[error("invalid {backend} response: {detail}")]
    InvalidResponse { backend: Backend, detail: String },

    #[error("invalid CID: {0:?}")]
    InvalidCid(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No gateway returned a usable JSON document.
    #[error("unable to fetch {path} from any gateway: {detail}")]
    FetchFailed { path: String, detail: String },
}

impl Error {
    /// The HTTP status the backend answered with, if that's what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::UploadFailed { status, .. } | Error::RequestFailed { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// The (truncated) response body of a failed request.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::UploadFailed { body, .. } | Error::RequestFailed { body, .. } => Some(body),
            _ => None,
        }
    }
}
