//! Docker operations module
//!
//! This module provides the Docker side of packaging eps_server:
//! - Docker client wrapper with connection handling
//! - Docker-specific error types
//! - The two-stage Dockerfile recipe and its embedded default
//! - Build context packaging
//! - Progress reporting for builds
//! - Image build, inspection and removal
//! - Post-build image verification
//! - Container lifecycle (create, start, wait, stop, remove)

mod client;
pub mod container;
pub mod context;
mod dockerfile;
mod error;
pub mod image;
pub mod lifecycle;
pub mod progress;
pub mod verify;

// Core types
pub use client::DockerClient;
pub use error::DockerError;
pub use progress::{ProgressMode, ProgressReporter};

// Recipe
pub use dockerfile::{
    BASE_IMAGE_DEFAULT, BUILD_WORKDIR_DEFAULT, BUILDER_IMAGE_DEFAULT, BUILDER_STAGE_NAME,
    BuildStage, DOCKERFILE, IMAGE_NAME_DEFAULT, IMAGE_TAG_DEFAULT, Recipe, RecipeError,
    RuntimeStage,
};

// Build context
pub use context::{BuildContext, ContextError, create_build_context, create_build_context_async};

// Image operations
pub use image::{
    BuildOptions, ImageProcess, ImageRef, build_image, image_exists, inspect_image_process,
    is_valid_repository, is_valid_tag, remove_image,
};

// Verification
pub use verify::{VerificationCheck, VerificationReport, verify_image};

// Container lifecycle
pub use container::{
    CONTAINER_NAME, DEFAULT_STOP_TIMEOUT_SECS, RunOptions, RunOutcome, container_exists,
    container_state, create_container, host_exit_code, remove_container, run_container,
    start_container, stop_container, wait_for_exit,
};
pub use lifecycle::{ContainerState, LifecycleError};

/// Stop a container and optionally remove it
///
/// Missing containers are reported as errors; a container that is already
/// stopped is left as is (and removed if requested).
pub async fn stop_service(
    client: &DockerClient,
    name: &str,
    remove: bool,
    timeout_secs: Option<i64>,
) -> Result<ContainerState, DockerError> {
    let mut state = container::container_state(client, name).await?;
    if state == ContainerState::Removed {
        return Err(DockerError::Container(format!(
            "Container '{name}' does not exist"
        )));
    }

    if state == ContainerState::Running {
        container::stop_container(client, name, timeout_secs).await?;
        state = ContainerState::Stopped;
    }

    if remove {
        container::remove_container(client, name, false).await?;
        state = ContainerState::Removed;
    }

    Ok(state)
}
