//! Render command implementation
//!
//! Prints the Dockerfile the build would use, or writes it to a file.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::fs;
use std::path::PathBuf;

/// Arguments for the render command
#[derive(Args)]
pub struct RenderArgs {
    /// Write the Dockerfile to this path instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn cmd_render(args: &RenderArgs, ctx: &CommandContext) -> Result<i32> {
    let recipe = ctx.config.recipe();
    recipe.validate()?;
    let dockerfile = recipe.render();

    match &args.output {
        Some(path) => {
            fs::write(path, &dockerfile)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !ctx.quiet {
                eprintln!(
                    "{} Wrote Dockerfile to {}",
                    style("Success:").green().bold(),
                    style(path.display()).cyan()
                );
            }
        }
        None => print!("{dockerfile}"),
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eps_deploy_core::Config;
    use eps_deploy_core::docker::DOCKERFILE;
    use tempfile::TempDir;

    #[test]
    fn writes_rendered_dockerfile() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("Dockerfile");
        let ctx = CommandContext {
            config: Config::default(),
            config_path: dir.path().join("config.json"),
            quiet: true,
            verbose: 0,
        };
        let code = cmd_render(
            &RenderArgs {
                output: Some(output.clone()),
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(output).unwrap(), DOCKERFILE);
    }

    #[test]
    fn invalid_recipe_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = CommandContext {
            config: Config {
                build_workdir: "relative".to_string(),
                ..Config::default()
            },
            config_path: dir.path().join("config.json"),
            quiet: true,
            verbose: 0,
        };
        assert!(cmd_render(&RenderArgs { output: None }, &ctx).is_err());
    }
}
