//! Run command implementation
//!
//! Starts the packaged image in the foreground. The entrypoint runs bare
//! unless arguments follow `--`, and the container's exit code becomes ours.

use super::{CommandContext, connect_docker};
use crate::output::{show_docker_error, state_style};
use anyhow::Result;
use clap::Args;
use console::style;
use eps_deploy_core::docker::{
    CONTAINER_NAME, ContainerState, RunOptions, container_state, host_exit_code, image_exists,
    remove_container, run_container,
};
use tracing::debug;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Tag to run (overrides image_tag)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Container name (the one `stop` targets by default)
    #[arg(long, default_value = CONTAINER_NAME)]
    pub name: String,

    /// Remove the container after it exits
    #[arg(long)]
    pub rm: bool,

    /// Don't stream container output
    #[arg(long)]
    pub no_logs: bool,

    /// Graceful stop timeout on Ctrl+C (overrides stop_timeout_secs)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(i64).range(0..))]
    pub stop_timeout: Option<i64>,

    /// Arguments passed to eps_server
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl RunArgs {
    fn run_options(&self, ctx: &CommandContext) -> RunOptions {
        RunOptions {
            name: Some(self.name.clone()),
            args: self.args.clone(),
            remove: self.rm,
            follow_logs: !self.no_logs,
            forward_interrupt: true,
            stop_timeout_secs: self.stop_timeout.unwrap_or(ctx.config.stop_timeout_secs),
        }
    }
}

pub async fn cmd_run(args: &RunArgs, ctx: &CommandContext) -> Result<i32> {
    let image = match ctx.image(args.tag.as_deref()) {
        Ok(image) => image,
        Err(code) => return Ok(code),
    };
    let client = connect_docker().await?;

    if !image_exists(&client, &image).await? {
        eprintln!(
            "{} Image {} not found. Run {} first.",
            style("Error:").red().bold(),
            style(&image).yellow(),
            style("eps-deploy build").green()
        );
        return Ok(1);
    }

    // A leftover container from an earlier run blocks the fixed name
    match container_state(&client, &args.name).await? {
        ContainerState::Running => {
            eprintln!(
                "{} Container '{}' is already running. Stop it with {}.",
                style("Error:").red().bold(),
                args.name,
                style("eps-deploy stop").green()
            );
            return Ok(1);
        }
        ContainerState::Created | ContainerState::Stopped => {
            debug!("Removing leftover container {}", args.name);
            remove_container(&client, &args.name, false).await?;
        }
        ContainerState::Removed => {}
    }

    if !ctx.quiet {
        eprintln!("{} {}", style("Running").cyan().bold(), style(&image).bold());
    }

    match run_container(&client, &image, &args.run_options(ctx)).await {
        Ok(outcome) => {
            if !ctx.quiet {
                eprintln!(
                    "{} exited with code {} ({})",
                    outcome.container_id.get(..12).unwrap_or(&outcome.container_id),
                    outcome.exit_code,
                    state_style(outcome.final_state)
                );
            }
            Ok(host_exit_code(outcome.exit_code))
        }
        Err(e) => {
            show_docker_error(&e);
            Ok(1)
        }
    }
}
