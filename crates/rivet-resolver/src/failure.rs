//! Failures recorded inside a target graph.

use std::fmt;

use rivet_core::config::ConflictPolicy;
use rivet_core::framework::Framework;
use rivet_core::package::PackageId;

use crate::provider::ProviderError;

/// Why a node could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailureKind {
    NotFound,
    NoMatchingVersion,
    Transient(String),
}

impl From<ProviderError> for ProviderFailureKind {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => Self::NotFound,
            ProviderError::Transient(message) => Self::Transient(message),
        }
    }
}

impl fmt::Display for ProviderFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::NoMatchingVersion => write!(f, "no matching version"),
            Self::Transient(message) => write!(f, "provider error: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The package could not be fetched or no version matched. Local to the node.
    ProviderFailure(ProviderFailureKind),
    /// The nearest version is below a farther range's minimum.
    VersionConflict,
    /// The nearest version is above a farther range's maximum.
    VersionOutsideConstraint,
    CycleDetected,
    /// The package ships framework assets, none usable by the target.
    IncompatibleFramework,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderFailure(_) => write!(f, "provider failure"),
            Self::VersionConflict => write!(f, "version conflict"),
            Self::VersionOutsideConstraint => write!(f, "version outside constraint"),
            Self::CycleDetected => write!(f, "cycle detected"),
            Self::IncompatibleFramework => write!(f, "incompatible framework"),
        }
    }
}

/// One failure, scoped to a (framework, RID) target graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFailure {
    pub id: PackageId,
    pub framework: Framework,
    pub runtime_identifier: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl RestoreFailure {
    /// Whether this failure fails its target graph.
    pub fn is_fatal(&self, policy: ConflictPolicy) -> bool {
        match self.kind {
            FailureKind::VersionConflict => policy == ConflictPolicy::Error,
            FailureKind::IncompatibleFramework => true,
            FailureKind::ProviderFailure(_)
            | FailureKind::VersionOutsideConstraint
            | FailureKind::CycleDetected => false,
        }
    }

    /// `netstandard1.5` or `netstandard1.5/win7-x86`.
    pub fn target_name(&self) -> String {
        match &self.runtime_identifier {
            Some(rid) => format!("{}/{rid}", self.framework),
            None => self.framework.to_string(),
        }
    }
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}: {}",
            self.id,
            self.target_name(),
            self.kind,
            self.message
        )
    }
}
