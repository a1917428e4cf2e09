use std::fmt;

use thiserror::Error;

use crate::ManifestError;

/// The uploads a publish consists of, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStep {
    AddProject,
    AddBackup,
    AddPubkey,
    AddManifest,
}

impl UploadStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStep::AddProject => "add_project",
            UploadStep::AddBackup => "add_backup",
            UploadStep::AddPubkey => "add_pubkey",
            UploadStep::AddManifest => "add_manifest",
        }
    }
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a publish fails. Registry failures are not among them, those are
/// reported as part of the outcome.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("missing project")]
    MissingProject,

    #[error("{step} failed: {source}")]
    Upload {
        step: UploadStep,
        #[source]
        source: zine_ipfs::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl PublishError {
    /// Short machine-readable name, reported to clients as `code`.
    pub fn code(&self) -> &'static str {
        match self {
            PublishError::MissingCredentials => "missing_credentials",
            PublishError::MissingProject => "missing_project",
            PublishError::Upload { step, .. } => step.as_str(),
            PublishError::Manifest(_) => "build_manifest",
        }
    }

    pub(crate) fn upload(step: UploadStep) -> impl FnOnce(zine_ipfs::Error) -> PublishError {
        move |source| match source {
            zine_ipfs::Error::MissingCredentials => PublishError::MissingCredentials,
            source => PublishError::Upload { step, source },
        }
    }
}
