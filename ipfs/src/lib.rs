mod backend;
mod cid;
mod errors;

#[cfg(test)]
use rstest_reuse;

pub mod contentservice;
pub mod gateway;
pub mod http;
pub mod kubo;
pub mod pinata;

pub use backend::{
    redacted, select_backend, Backend, BackendConfig, DropletCredentials, KuboEndpoint,
    PinataAuth, PinataCredentials, PinataEndpoint, SelectedBackend,
};
pub use cid::{Cid, ContentRecord, IpfsPath};
pub use errors::Error;
