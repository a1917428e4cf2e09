mod errors;

pub mod config;
pub mod http;
pub mod manifest;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use errors::{PublishError, UploadStep};
pub use manifest::{build_manifest, Manifest, ManifestError, ManifestInput};
pub use pipeline::{
    Clock, PublishOutcome, PublishRequest, PublishedCore, Publisher, SystemClock,
};
