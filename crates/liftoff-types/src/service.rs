//! Backing service desired state and inventory

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named service instance the pushed applications expect to exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub plan: String,
    #[serde(default)]
    pub reset_if_exists: bool,
}

impl ServiceRequest {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            plan: plan.into(),
            reset_if_exists: false,
        }
    }

    pub fn with_reset(mut self, reset_if_exists: bool) -> Self {
        self.reset_if_exists = reset_if_exists;
        self
    }
}

/// A service instance observed on the platform at run start
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInventoryEntry {
    pub name: String,
}

impl ServiceInventoryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What reconciliation decided for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAction {
    /// No instance existed, one is created
    Create,
    /// An instance existed and is accepted as-is
    Skip,
    /// An instance existed and is deleted then recreated
    Reset,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceAction::Create => write!(f, "create"),
            ServiceAction::Skip => write!(f, "skip"),
            ServiceAction::Reset => write!(f, "reset"),
        }
    }
}
