//! Module capability traits
//!
//! A concrete module implements these explicitly; the runtime holds the
//! capability set (`Arc<dyn ModuleCapabilities>`), never a concrete type.
//! The runtime calls each lifecycle hook exactly once per transition.

use serde::Serialize;

use crate::{ConfigMessage, ContractError};

/// Resource acquisition hook, called on `Starting -> Running`
pub trait Initializable {
    fn init_module(&self) -> Result<(), ContractError>;
}

/// Resource release hook, called on `Running -> Stopping -> Stopped`
pub trait Shutdownable {
    fn shutdown_module(&self) -> Result<(), ContractError>;
}

/// Read-only health reporting; must be safe to call from any thread
pub trait StatusReporting {
    fn status(&self) -> serde_json::Value;

    fn metrics(&self) -> serde_json::Value;
}

/// Applies key/value configuration through an explicit key table
pub trait Configurable {
    /// Keys this module accepts
    fn config_keys(&self) -> Vec<&'static str>;

    /// Merge an update; never fails as a whole
    fn merge_config(&self, update: &ConfigMessage) -> MergeReport;
}

/// Full capability set a module hands to the runtime
pub trait ModuleCapabilities:
    Initializable + Shutdownable + StatusReporting + Configurable + Send + Sync
{
}

impl<T> ModuleCapabilities for T where
    T: Initializable + Shutdownable + StatusReporting + Configurable + Send + Sync
{
}

/// A known key whose value was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRejection {
    pub key: String,
    pub reason: String,
}

/// Outcome of one configuration merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Keys applied
    pub applied: Vec<String>,

    /// Known keys whose value failed validation (left unchanged)
    pub rejected: Vec<KeyRejection>,

    /// Keys not in the table
    pub unknown: Vec<String>,
}

impl MergeReport {
    /// Whether anything changed
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Record an applied key
    pub fn applied(&mut self, key: impl Into<String>) {
        self.applied.push(key.into());
    }

    /// Record a rejected key
    pub fn rejected(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.rejected.push(KeyRejection {
            key: key.into(),
            reason: reason.into(),
        });
    }

    /// Record an unknown key
    pub fn unknown(&mut self, key: impl Into<String>) {
        self.unknown.push(key.into());
    }

    /// Fold another report into this one
    pub fn extend(&mut self, other: MergeReport) {
        self.applied.extend(other.applied);
        self.rejected.extend(other.rejected);
        self.unknown.extend(other.unknown);
    }
}
