//! eps-deploy core library
//!
//! Packages the `eps_server` executable into a minimal container image:
//! the compiled-artifact model, the two-stage Dockerfile recipe, build
//! context packaging, Docker image build and verification, container
//! lifecycle, and configuration.

pub mod artifact;
pub mod config;
pub mod docker;
pub mod pipeline;

pub use artifact::{ARTIFACT_NAME, ArtifactError, CompiledArtifact};
pub use config::{Config, ConfigError, load_config_or_default, save_config};
pub use docker::{DockerClient, DockerError};
pub use pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineOutcome};

// Re-export bollard so callers can use the exact version we depend on
pub use bollard;

/// Version of this library
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
