use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while translating a project.
///
/// `Config` is fatal and aborts a run before any task is created. The other
/// variants are local to one (file, language) task.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A resource file exists but is not well-formed
    #[error("Failed to parse {path} (line {line}): {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The completion service failed or returned unusable content
    #[error("Translation service error: {0}")]
    TranslationService(String),

    /// A task panicked or was cancelled before reporting a result
    #[error("Task aborted: {0}")]
    Aborted(String),

    /// Reading or writing the filesystem failed
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn parse(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn service(reason: impl Into<String>) -> Self {
        Self::TranslationService(reason.into())
    }
}

/// Configuration problems detected before dispatching any work.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid config file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_lists_every_key() {
        let err = ConfigError::Missing(vec!["openai_api_key", "model"]);
        assert_eq!(
            err.to_string(),
            "missing required setting(s): openai_api_key, model"
        );
    }

    #[test]
    fn test_parse_error_mentions_path_and_line() {
        let err = Error::parse("locales/en/main.ftl", 7, "expected '='");
        let message = err.to_string();
        assert!(message.contains("locales/en/main.ftl"));
        assert!(message.contains("line 7"));
        assert!(message.contains("expected '='"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::Missing(vec!["base_lang"]).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("base_lang"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io("/tmp/out.ftl", source);
        assert!(err.to_string().contains("/tmp/out.ftl"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
