use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The individual steps of a registry update. Failures are reported with
/// the step they happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RegistryStep {
    #[serde(rename = "registry_read")]
    Read,
    #[serde(rename = "registry_merge")]
    Merge,
    #[serde(rename = "registry_write")]
    Write,
    #[serde(rename = "registry_stat")]
    Stat,
    #[serde(rename = "registry_key_lookup")]
    KeyLookup,
    #[serde(rename = "registry_republish")]
    Republish,
}

impl RegistryStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryStep::Read => "registry_read",
            RegistryStep::Merge => "registry_merge",
            RegistryStep::Write => "registry_write",
            RegistryStep::Stat => "registry_stat",
            RegistryStep::KeyLookup => "registry_key_lookup",
            RegistryStep::Republish => "registry_republish",
        }
    }
}

impl fmt::Display for RegistryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed registry step.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{step} failed: {message}")]
pub struct StepError {
    pub step: RegistryStep,
    pub message: String,
}

impl StepError {
    pub fn new(step: RegistryStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }

    /// Returns a closure wrapping a backend error into a [StepError] for
    /// the given step, for use with `map_err`.
    pub fn at(step: RegistryStep) -> impl FnOnce(zine_ipfs::Error) -> StepError {
        move |e| StepError::new(step, e.to_string())
    }
}
