mod document;
mod entry;
mod errors;
mod updater;

pub mod store;

#[cfg(test)]
mod tests;

pub use document::{RegistryDocument, SCHEMA};
pub use entry::{coerce_tags, RegistryEntry};
pub use errors::{RegistryStep, StepError};
pub use updater::{AdminChange, RegistryUpdate, RegistryUpdater, UpdateState};
