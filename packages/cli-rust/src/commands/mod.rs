//! CLI command implementations
//!
//! Each command returns the process exit code on completion. Docker and
//! pipeline failures are rendered here, so the caller only has to exit.

mod build;
mod config;
mod render;
mod run;
mod stop;
mod verify;

pub use build::{BuildArgs, cmd_build};
pub use config::{ConfigArgs, cmd_config, cmd_config_file};
pub use render::{RenderArgs, cmd_render};
pub use run::{RunArgs, cmd_run};
pub use stop::{StopArgs, cmd_stop};
pub use verify::{VerifyArgs, cmd_verify};

use crate::output::format_docker_error_anyhow;
use anyhow::Result;
use console::style;
use eps_deploy_core::config::ValidationError;
use eps_deploy_core::docker::ImageRef;
use eps_deploy_core::{Config, DockerClient};
use std::path::PathBuf;

/// Exit status for invalid configuration or arguments
pub const USAGE_ERROR_EXIT: i32 = 2;

/// Shared state handed to every command
pub struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub quiet: bool,
    pub verbose: u8,
}

impl CommandContext {
    /// Image for this invocation, printing a usage error for a bad `--tag`
    pub(crate) fn image(&self, tag: Option<&str>) -> Result<ImageRef, i32> {
        self.config.checked_image_ref(tag).map_err(|e| {
            show_validation_error(&e);
            USAGE_ERROR_EXIT
        })
    }
}

pub(crate) fn show_validation_error(e: &ValidationError) {
    eprintln!("{} {}: {}", style("Error:").red().bold(), e.field, e.message);
    eprintln!();
    eprintln!("  {} {}", style("Fix:").cyan(), e.fix);
}

/// Connect to Docker with actionable error messages
pub(crate) async fn connect_docker() -> Result<DockerClient> {
    DockerClient::connect()
        .await
        .map_err(|e| format_docker_error_anyhow(&e))
}
