//! Error types and handling for configuration resolution and file enumeration

use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;

/// Standard Result type for resolver operations
pub type Result<T> = std::result::Result<T, RelintError>;

/// Main error type for configuration resolution and file enumeration
#[derive(Debug, Error)]
pub enum RelintError {
    /// A pattern matched nothing at all
    #[error("{}", no_files_found_message(.pattern, .glob_disabled))]
    NoFilesFound {
        pattern: String,
        glob_disabled: bool,
    },

    /// A pattern matched files, but every one of them was ignored
    #[error("All files matched by '{pattern}' are ignored.")]
    AllFilesIgnored { pattern: String },

    /// Finalization produced an empty configuration chain
    #[error("No relint configuration found on {}.", .directory_path.display())]
    ConfigurationNotFound { directory_path: PathBuf },

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// File system I/O errors
    #[error("IO error for path '{}': {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn no_files_found_message(pattern: &str, glob_disabled: &bool) -> String {
    if *glob_disabled {
        format!("No files matching '{pattern}' were found (glob was disabled).")
    } else {
        format!("No files matching '{pattern}' were found.")
    }
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    AllFilesIgnored,
    NoConfigFound,
    Config,
    Io,
}

impl RelintError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelintError::NoFilesFound { .. } => ErrorKind::FileNotFound,
            RelintError::AllFilesIgnored { .. } => ErrorKind::AllFilesIgnored,
            RelintError::ConfigurationNotFound { .. } => ErrorKind::NoConfigFound,
            RelintError::ConfigError { .. } => ErrorKind::Config,
            RelintError::IoError { .. } => ErrorKind::Io,
        }
    }

    /// Message template identifier for CLI-side rendering, when the error
    /// has a user-facing template.
    pub fn message_template(&self) -> Option<&'static str> {
        match self {
            RelintError::NoFilesFound { .. } => Some("file-not-found"),
            RelintError::AllFilesIgnored { .. } => Some("all-files-ignored"),
            RelintError::ConfigurationNotFound { .. } => Some("no-config-found"),
            _ => None,
        }
    }

    /// Structured data matching [`Self::message_template`].
    pub fn message_data(&self) -> Option<serde_json::Value> {
        match self {
            RelintError::NoFilesFound {
                pattern,
                glob_disabled,
            } => Some(json!({ "pattern": pattern, "globDisabled": glob_disabled })),
            RelintError::AllFilesIgnored { pattern } => Some(json!({ "pattern": pattern })),
            RelintError::ConfigurationNotFound { directory_path } => {
                Some(json!({ "directoryPath": directory_path.to_string_lossy() }))
            }
            _ => None,
        }
    }

    /// Whether this is an access-denied filesystem error. Only this error
    /// class is converted to a base-array fallback by the ancestor walk.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            RelintError::IoError { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied
        )
    }

    /// Create a no-files-found error
    pub fn no_files_found(pattern: impl Into<String>, glob_disabled: bool) -> Self {
        Self::NoFilesFound {
            pattern: pattern.into(),
            glob_disabled,
        }
    }

    /// Create an all-files-ignored error
    pub fn all_files_ignored(pattern: impl Into<String>) -> Self {
        Self::AllFilesIgnored {
            pattern: pattern.into(),
        }
    }

    /// Create a configuration-not-found error
    pub fn configuration_not_found(directory_path: impl Into<PathBuf>) -> Self {
        Self::ConfigurationNotFound {
            directory_path: directory_path.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<std::io::Error> for RelintError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_files_found_message() {
        let err = RelintError::no_files_found("lib/*.js", false);
        assert_eq!(err.to_string(), "No files matching 'lib/*.js' were found.");
        assert_eq!(err.kind(), ErrorKind::FileNotFound);

        let err = RelintError::no_files_found("lib/*.js", true);
        assert_eq!(
            err.to_string(),
            "No files matching 'lib/*.js' were found (glob was disabled)."
        );
    }

    #[test]
    fn test_all_files_ignored_message() {
        let err = RelintError::all_files_ignored("lib/**");
        assert_eq!(err.to_string(), "All files matched by 'lib/**' are ignored.");
        assert_eq!(err.message_template(), Some("all-files-ignored"));
    }

    #[test]
    fn test_configuration_not_found_message() {
        let err = RelintError::configuration_not_found("/work/project");
        assert_eq!(
            err.to_string(),
            "No relint configuration found on /work/project."
        );
        assert_eq!(err.message_template(), Some("no-config-found"));
        let data = err.message_data().unwrap();
        assert_eq!(data["directoryPath"], "/work/project");
    }

    #[test]
    fn test_message_data_shape() {
        let err = RelintError::no_files_found("p", true);
        let data = err.message_data().unwrap();
        assert_eq!(data["pattern"], "p");
        assert_eq!(data["globDisabled"], true);
    }

    #[test]
    fn test_permission_denied_detection() {
        let denied = RelintError::io_error(
            "/root/.relintrc.json",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(denied.is_permission_denied());

        let missing = RelintError::io_error(
            "/none",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(!missing.is_permission_denied());
        assert!(!RelintError::config_error("x").is_permission_denied());
    }
}
