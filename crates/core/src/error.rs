use std::fmt;
use std::path::PathBuf;

use crate::topology::SubArraySide;

/// Result alias that carries the custom [`AutoR1Error`] type.
pub type Result<T> = std::result::Result<T, AutoR1Error>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AutoR1Error {
    /// An expected row, group, view, template or file is absent.
    #[error("{0} not found")]
    NotFound(Missing),
    /// The project exists but the vendor application never ran its initial
    /// setup on it, so there is nothing to attach generated content to.
    #[error("project has not been initialised: {0}")]
    NotInitialised(String),
    /// Required tables are missing or a row that must exist does not join.
    #[error("schema error: {0}")]
    Schema(String),
    /// A domain invariant was violated.
    #[error("{0}")]
    Domain(#[from] DomainError),
    /// Statement or connection failure in the embedded store.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed generator configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl AutoR1Error {
    pub fn schema<T: Into<String>>(msg: T) -> Self {
        Self::Schema(msg.into())
    }

    /// True for the "never initialised" case, which callers report with a
    /// dedicated message instead of a generic failure.
    pub fn is_not_initialised(&self) -> bool {
        matches!(self, Self::NotInitialised(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<Missing> for AutoR1Error {
    fn from(value: Missing) -> Self {
        Self::NotFound(value)
    }
}

/// What a [`AutoR1Error::NotFound`] was looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    ProjectFile(PathBuf),
    TemplateFile(PathBuf),
    SubArraySource,
    Template(String),
    TemplateGeometry(String),
    View(String),
    Group(String),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectFile(path) => write!(f, "project file `{}`", path.display()),
            Self::TemplateFile(path) => write!(f, "template file `{}`", path.display()),
            Self::SubArraySource => f.write_str("SUBarray source group"),
            Self::Template(name) => write!(f, "template `{name}`"),
            Self::TemplateGeometry(name) => write!(f, "controls for template `{name}`"),
            Self::View(name) => write!(f, "view `{name}`"),
            Self::Group(name) => write!(f, "group `{name}`"),
        }
    }
}

/// Domain invariant violations. Each one is a distinct variant so the
/// orchestrator can decide between aborting and skipping a step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("template `{0}` has no controls")]
    EmptyTemplate(String),
    #[error("SUBarray bucket {0} has no linked cabinets")]
    EmptySubArrayBucket(SubArraySide),
    #[error("no TOPs channels found on array processing enabled sources")]
    NoArrayProcessingChannels,
    #[error("project already contains generated content; clean it first")]
    AlreadyGenerated,
}
