//! Docker-specific error types
//!
//! `Build` and `Copy` are the two fatal outcomes of the packaging pipeline.
//! Everything else describes the daemon connection or an individual image or
//! container operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    Connection(String),

    #[error("Docker daemon is not running")]
    NotRunning,

    #[error("Permission denied accessing Docker socket")]
    PermissionDenied,

    #[error("Docker socket not found")]
    SocketNotFound,

    /// The compile/install step of the build stage failed
    #[error("Build failed: {0}")]
    Build(String),

    /// The artifact was missing when the runtime stage tried to copy it
    #[error("Artifact copy failed: {0}")]
    Copy(String),

    #[error("Image operation failed: {0}")]
    Image(String),

    #[error("Container operation failed: {0}")]
    Container(String),

    #[error("Image verification failed: {0}")]
    Verify(String),

    #[error("Docker operation timed out")]
    Timeout,
}

impl From<bollard::errors::Error> for DockerError {
    fn from(err: bollard::errors::Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();

        if lower.contains("permission denied") {
            DockerError::PermissionDenied
        } else if lower.contains("no such file or directory") && lower.contains("sock") {
            DockerError::SocketNotFound
        } else if lower.contains("connection refused")
            || lower.contains("cannot connect")
            || lower.contains("is the docker daemon running")
        {
            DockerError::NotRunning
        } else if lower.contains("timed out") || lower.contains("timeout") {
            DockerError::Timeout
        } else {
            DockerError::Connection(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_messages_are_classified() {
        let err = bollard::errors::Error::IOError {
            err: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(matches!(DockerError::from(err), DockerError::PermissionDenied));

        let err = bollard::errors::Error::IOError {
            err: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
        };
        assert!(matches!(DockerError::from(err), DockerError::NotRunning));
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            DockerError::Copy("missing".to_string()).to_string(),
            "Artifact copy failed: missing"
        );
        assert_eq!(
            DockerError::Build("exit code 101".to_string()).to_string(),
            "Build failed: exit code 101"
        );
    }
}
