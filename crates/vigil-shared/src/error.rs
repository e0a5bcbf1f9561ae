//! Error types for Vigil.
//!
//! Failed external commands are NOT errors: they come back as a
//! `CommandOutcome` with `success = false`. Only the conditions below
//! leave the normal result path.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    /// The executor itself could not be used (spawn failure, control
    /// endpoint unreachable at discovery). Fatal for the run.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// A probe's own logic failed. Downgraded to an error row by the registry.
    #[error("Probe '{probe}' failed internally: {message}")]
    InternalProbe { probe: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl VigilError {
    /// Process exit code used by `vigilctl`.
    pub fn exit_code(&self) -> i32 {
        match self {
            VigilError::Infrastructure(_) => 2,
            VigilError::Config(_) | VigilError::Toml(_) => 3,
            VigilError::InternalProbe { .. }
            | VigilError::Report(_)
            | VigilError::Io(_)
            | VigilError::Json(_) => 1,
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, VigilError::Infrastructure(_))
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(VigilError::Infrastructure("x".into()).exit_code(), 2);
        assert_eq!(VigilError::Config("x".into()).exit_code(), 3);
        assert_eq!(VigilError::Report("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_internal_probe_message_names_probe() {
        let err = VigilError::InternalProbe {
            probe: "mtu".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Probe 'mtu' failed internally: boom");
        assert!(!err.is_infrastructure());
    }
}
