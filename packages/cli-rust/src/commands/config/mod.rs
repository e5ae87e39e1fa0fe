//! Config subcommand implementations
//!
//! Provides `eps-deploy config` subcommands for viewing and creating the
//! configuration file.

mod init;
mod show;

use super::CommandContext;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::path::Path;

pub use init::cmd_config_init;
pub use show::cmd_config_show;

/// Configuration command arguments
#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON instead of table format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

/// Configuration management subcommands
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show current configuration
    Show {
        /// Output as JSON instead of table format
        #[arg(long)]
        json: bool,
    },
    /// Print the config file path
    Path,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing config file
        #[arg(long, short)]
        force: bool,
    },
}

impl ConfigArgs {
    /// Subcommands that work on the file itself, even when it does not load
    pub fn is_file_only(&self) -> bool {
        matches!(
            self.command,
            Some(ConfigSubcommands::Path | ConfigSubcommands::Init { .. })
        )
    }
}

/// Handle config command
///
/// If no subcommand is given, defaults to Show.
pub fn cmd_config(args: &ConfigArgs, ctx: &CommandContext) -> Result<i32> {
    match &args.command {
        Some(ConfigSubcommands::Show { json }) => cmd_config_show(ctx, *json),
        Some(ConfigSubcommands::Path | ConfigSubcommands::Init { .. }) => {
            cmd_config_file(args, &ctx.config_path, ctx.quiet)
        }
        None => cmd_config_show(ctx, args.json),
    }
}

/// Handle the file-only subcommands against a resolved config path
pub fn cmd_config_file(args: &ConfigArgs, path: &Path, quiet: bool) -> Result<i32> {
    match &args.command {
        Some(ConfigSubcommands::Path) => {
            println!("{}", path.display());
            Ok(0)
        }
        Some(ConfigSubcommands::Init { force }) => cmd_config_init(path, *force, quiet),
        _ => bail!("This config subcommand needs a loaded configuration"),
    }
}
