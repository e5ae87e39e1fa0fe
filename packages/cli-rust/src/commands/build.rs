//! Build command implementation
//!
//! Packages the source tree, builds the two-stage image and verifies it.

use super::{CommandContext, connect_docker};
use crate::output::show_docker_error;
use crate::output::spinner::format_elapsed;
use anyhow::Result;
use clap::Args;
use console::style;
use eps_deploy_core::docker::{BuildOptions, ProgressMode, ProgressReporter};
use eps_deploy_core::{Pipeline, PipelineError, PipelineOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the build command
#[derive(Args)]
pub struct BuildArgs {
    /// Cargo project to package
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub source: PathBuf,

    /// Tag for the built image (overrides image_tag)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Build without using the layer cache
    #[arg(long)]
    pub no_cache: bool,

    /// Build-time variables passed as KEY=VALUE
    #[arg(long = "build-arg", value_name = "KEY=VALUE", value_parser = parse_build_arg)]
    pub build_args: Vec<(String, String)>,

    /// Skip post-build verification
    #[arg(long)]
    pub no_verify: bool,
}

fn parse_build_arg(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn progress_mode(quiet: bool, verbose: u8) -> ProgressMode {
    if quiet {
        ProgressMode::Hidden
    } else if verbose > 0 || !console::Term::stderr().is_term() {
        ProgressMode::Plain
    } else {
        ProgressMode::Interactive
    }
}

/// Build the eps_server image
///
/// Returns 0 on success. Build and copy failures get distinct exit codes
/// so scripts can tell a compile error from a missing artifact.
pub async fn cmd_build(args: &BuildArgs, ctx: &CommandContext) -> Result<i32> {
    let options = PipelineOptions {
        source_root: args.source.clone(),
        tag: args.tag.clone(),
        build: BuildOptions {
            no_cache: args.no_cache,
            build_args: args.build_args.iter().cloned().collect::<HashMap<_, _>>(),
        },
        skip_verify: args.no_verify,
    };
    let pipeline = Pipeline::new(ctx.config.clone(), options);
    let image = match pipeline.image() {
        Ok(image) => image,
        Err(e) => {
            report_failure(&e);
            return Ok(e.exit_code());
        }
    };

    let client = connect_docker().await?;

    if !ctx.quiet {
        eprintln!(
            "{} {} from {}",
            style("Building").cyan().bold(),
            style(&image).bold(),
            args.source.display()
        );
    }

    let started = Instant::now();
    let mut progress = ProgressReporter::new(progress_mode(ctx.quiet, ctx.verbose));
    match pipeline.run(&client, &mut progress).await {
        Ok(outcome) => {
            if !ctx.quiet {
                let verified = if outcome.report.is_some() {
                    " and verified"
                } else {
                    ""
                };
                eprintln!(
                    "{} Built {}{verified} {}",
                    style("✓").green(),
                    style(&outcome.image).bold(),
                    style(format!("({})", format_elapsed(started.elapsed()))).dim()
                );
            }
            println!("{}", outcome.image_id);
            Ok(0)
        }
        Err(e) => {
            report_failure(&e);
            Ok(e.exit_code())
        }
    }
}

fn report_failure(e: &PipelineError) {
    match e {
        PipelineError::Docker(docker) => show_docker_error(docker),
        other => {
            eprintln!();
            eprintln!("{} {other}", style("Error:").red().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_arg_parsing() {
        assert_eq!(
            parse_build_arg("FEATURES=tls").unwrap(),
            ("FEATURES".to_string(), "tls".to_string())
        );
        assert_eq!(
            parse_build_arg("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_build_arg("=value").is_err());
        assert!(parse_build_arg("novalue").is_err());
    }

    #[test]
    fn quiet_hides_progress() {
        assert_eq!(progress_mode(true, 2), ProgressMode::Hidden);
    }
}
