//! Error types for kiln
//!
//! Every pipeline phase has its own error enum so callers can tell a
//! resolution failure from a build failure. All of them fold into
//! [`KilnError`], and all modules use `KilnResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// Settings validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value '{value}' for setting '{axis}' (allowed: {allowed})")]
    InvalidValue {
        axis: String,
        value: String,
        allowed: String,
    },

    #[error("Setting '{axis}' is required by {package} but has no value")]
    MissingAxis { axis: String, package: String },

    #[error("Unknown setting '{0}'")]
    UnknownAxis(String),
}

/// Requirement graph resolution failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Version conflict for '{name}': no version satisfies {}", .constraints.join(" and "))]
    VersionConflict {
        name: String,
        /// Each constraint rendered as `<req> (from <requester>)`
        constraints: Vec<String>,
    },

    #[error("Cyclic requirement: {}", .path.join(" -> "))]
    CyclicRequirement { path: Vec<String> },

    #[error("Package not found in any index: {name} (required by {required_by})")]
    PackageNotFound { name: String, required_by: String },

    #[error("Index '{source_name}' failed for {name}: {reason}")]
    IndexQuery {
        source_name: String,
        name: String,
        reason: String,
    },

    #[error("Invalid requirement '{spec}': {reason}")]
    InvalidRequirement { spec: String, reason: String },
}

/// Layout planning failures
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Layout path collision at {path}: {reason}")]
    PathCollision { path: PathBuf, reason: String },

    #[error("Permission denied creating {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Artifact generation failures
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Package {package} is not installed (expected at {path})")]
    MissingArtifact { package: String, path: PathBuf },

    #[error("Failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// External configure step failed
#[derive(Error, Debug)]
#[error("Configure failed ({}):\n{output}", describe_status(.status))]
pub struct ConfigureError {
    /// Exit status of the build-system generator, None if killed by a signal
    pub status: Option<i32>,
    /// Captured tail of the tool's output
    pub output: String,
}

/// External build step failed
#[derive(Error, Debug)]
#[error("Build failed ({}):\n{output}", describe_status(.status))]
pub struct BuildError {
    pub status: Option<i32>,
    pub output: String,
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// All errors that can occur in kiln
#[derive(Error, Debug)]
pub enum KilnError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Configure(#[from] ConfigureError),

    #[error(transparent)]
    Build(#[from] BuildError),

    // Recipe and configuration errors
    #[error("Recipe not found: {0}")]
    RecipeNotFound(PathBuf),

    #[error("Invalid recipe at {path}: {reason}")]
    RecipeInvalid { path: PathBuf, reason: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Unknown settings profile: {0}")]
    ProfileNotFound(String),

    // Process errors
    #[error("Command failed to start: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build tool not found: {0}")]
    ToolNotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl KilnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Process exit code for this failure category
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Settings(_)
            | Self::RecipeNotFound(_)
            | Self::RecipeInvalid { .. }
            | Self::ConfigInvalid { .. }
            | Self::ProfileNotFound(_) => 2,
            Self::Resolve(_) => 3,
            Self::Layout(_) => 4,
            Self::Generate(_) => 5,
            Self::Configure(_) | Self::ToolNotFound(_) => 6,
            Self::Build(_) => 7,
            Self::Cancelled => 130,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Settings(SettingsError::MissingAxis { .. }) => {
                Some("Pass it with -s <axis>=<value> or add it to a profile")
            }
            Self::Resolve(ResolveError::PackageNotFound { .. }) => {
                Some("Check the [index] sources in your config or pass --index")
            }
            Self::Generate(GenerateError::MissingArtifact { .. }) => {
                Some("Install the package into the workspace store before generating")
            }
            Self::RecipeNotFound(_) => Some("Run: kiln init"),
            Self::ToolNotFound(_) => Some("Install CMake or set [cmake] program in config"),
            _ => None,
        }
    }
}
