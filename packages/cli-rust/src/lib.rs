//! eps-deploy CLI
//!
//! Packages eps_server into a minimal container image and runs it.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::CommandContext;
use console::style;
use eps_deploy_core::config::paths::get_config_path;
use eps_deploy_core::{ConfigError, get_version, load_config_or_default};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit status for configuration errors
const CONFIG_ERROR_EXIT: i32 = 2;

/// Package eps_server into a minimal container image
#[derive(Parser)]
#[command(name = "eps-deploy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Package eps_server into a minimal container image", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Increase verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file to use (overrides EPS_DEPLOY_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the two-stage Dockerfile
    Render(commands::RenderArgs),
    /// Build and verify the eps_server image
    Build(commands::BuildArgs),
    /// Verify an existing image
    Verify(commands::VerifyArgs),
    /// Run the image in the foreground
    Run(commands::RunArgs),
    /// Stop a running container
    Stop(commands::StopArgs),
    /// Manage configuration
    Config(commands::ConfigArgs),
}

fn init_tracing(verbose: u8) {
    let default_level = if verbose == 0 { "warn" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "eps_deploy={default_level},eps_deploy_core={default_level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn show_config_error(e: &ConfigError) {
    eprintln!("{} Configuration error", style("Error:").red().bold());
    eprintln!();
    eprintln!("  {e}");
    eprintln!();
    eprintln!(
        "  To start over, run: {}",
        style("eps-deploy config init --force").green()
    );
}

/// Parse arguments, run the command and return the process exit code
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    init_tracing(cli.verbose);

    dispatch(cli)
}

fn dispatch(cli: Cli) -> Result<i32> {
    let Some(command) = cli.command else {
        if !cli.quiet {
            println!(
                "{} {}",
                style("eps-deploy").cyan().bold(),
                style(get_version()).dim()
            );
            println!();
            println!("Run {} for available commands.", style("--help").green());
        }
        return Ok(0);
    };

    // These replace or locate the file, so they must not require it to load
    if let Commands::Config(args) = &command
        && args.is_file_only()
    {
        let path = get_config_path(cli.config).ok_or(ConfigError::NoConfigPath)?;
        return commands::cmd_config_file(args, &path, cli.quiet);
    }

    let (config, config_path, warnings) = match load_config_or_default(cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            show_config_error(&e);
            return Ok(CONFIG_ERROR_EXIT);
        }
    };
    if !cli.quiet {
        for warning in &warnings {
            eprintln!(
                "{} {}: {}",
                style("Warning:").yellow().bold(),
                warning.field,
                warning.message
            );
        }
    }

    debug!("Using config {}", config_path.display());
    let ctx = CommandContext {
        config,
        config_path,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match command {
        Commands::Render(args) => commands::cmd_render(&args, &ctx),
        Commands::Config(args) => commands::cmd_config(&args, &ctx),
        Commands::Build(args) => block_on(commands::cmd_build(&args, &ctx)),
        Commands::Verify(args) => block_on(commands::cmd_verify(&args, &ctx)),
        Commands::Run(args) => block_on(commands::cmd_run(&args, &ctx)),
        Commands::Stop(args) => block_on(commands::cmd_stop(&args, &ctx)),
    }
}

fn block_on<F: std::future::Future<Output = Result<i32>>>(future: F) -> Result<i32> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}
