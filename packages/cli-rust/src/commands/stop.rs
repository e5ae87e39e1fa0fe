//! Stop command implementation
//!
//! Stops a running eps_server container with a graceful timeout.

use super::{CommandContext, connect_docker};
use crate::output::{CommandSpinner, show_docker_error, state_style};
use anyhow::Result;
use clap::Args;
use console::style;
use eps_deploy_core::docker::{CONTAINER_NAME, container_exists, stop_service};

/// Arguments for the stop command
#[derive(Args)]
pub struct StopArgs {
    /// Container to stop
    #[arg(long, default_value = CONTAINER_NAME)]
    pub name: String,

    /// Also remove the container
    #[arg(long)]
    pub remove: bool,

    /// Graceful stop timeout (overrides stop_timeout_secs)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(i64).range(0..))]
    pub timeout: Option<i64>,
}

/// Stop the container
///
/// A missing container is reported and exits 0, so repeated stops are safe.
pub async fn cmd_stop(args: &StopArgs, ctx: &CommandContext) -> Result<i32> {
    let client = connect_docker().await?;

    if !container_exists(&client, &args.name).await? {
        if !ctx.quiet {
            println!(
                "{}",
                style(format!("Container '{}' does not exist", args.name)).dim()
            );
        }
        return Ok(0);
    }

    let timeout = args.timeout.unwrap_or(ctx.config.stop_timeout_secs);
    let spinner = CommandSpinner::new_maybe(&format!("Stopping {}...", args.name), ctx.quiet);
    spinner.update(&format!("Stopping {} ({timeout}s timeout)...", args.name));

    match stop_service(&client, &args.name, args.remove, Some(timeout)).await {
        Ok(state) => {
            spinner.success(&format!("{} is {}", args.name, state_style(state)));
            Ok(0)
        }
        Err(e) => {
            spinner.fail("Failed to stop");
            show_docker_error(&e);
            Ok(1)
        }
    }
}
