//! Verify command implementation
//!
//! Checks an already built image against the packaging contract without
//! rebuilding it.

use super::{CommandContext, connect_docker};
use crate::output::{CommandSpinner, check_style, show_docker_error};
use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Table};
use console::style;
use eps_deploy_core::docker::{DockerError, VerificationReport, image_exists, verify_image};

/// Exit status for an image that fails verification
const VERIFY_FAILED_EXIT: i32 = 12;

/// Arguments for the verify command
#[derive(Args)]
pub struct VerifyArgs {
    /// Tag to verify (overrides image_tag)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn cmd_verify(args: &VerifyArgs, ctx: &CommandContext) -> Result<i32> {
    let recipe = ctx.config.recipe();
    recipe.validate()?;
    let image = match ctx.image(args.tag.as_deref()) {
        Ok(image) => image,
        Err(code) => return Ok(code),
    };

    let client = connect_docker().await?;

    if !image_exists(&client, &image).await? {
        let e = DockerError::Image(format!(
            "Image {image} not found. Run 'eps-deploy build' first."
        ));
        show_docker_error(&e);
        return Ok(1);
    }

    let spinner =
        CommandSpinner::new_maybe(&format!("Verifying {image}..."), ctx.quiet || args.json);
    let report = match verify_image(&client, &image, &recipe).await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Verification could not run");
            show_docker_error(&e);
            return Ok(1);
        }
    };
    spinner.clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else if !ctx.quiet || !report.is_ok() {
        println!("{}", report_table(&report));
    }

    if report.is_ok() {
        if !ctx.quiet && !args.json {
            eprintln!(
                "{} {} satisfies the packaging contract",
                style("✓").green(),
                image
            );
        }
        Ok(0)
    } else {
        Ok(VERIFY_FAILED_EXIT)
    }
}

fn report_table(report: &VerificationReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Check", "Result", "Detail"]);
    for check in &report.checks {
        table.add_row(vec![
            Cell::new(&check.name),
            Cell::new(check_style(check.passed).to_string()),
            Cell::new(&check.detail),
        ]);
    }
    table
}

fn report_json(report: &VerificationReport) -> serde_json::Value {
    serde_json::json!({
        "image": report.image,
        "ok": report.is_ok(),
        "checks": report
            .checks
            .iter()
            .map(|c| serde_json::json!({
                "name": c.name,
                "passed": c.passed,
                "detail": c.detail,
            }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eps_deploy_core::docker::VerificationCheck;

    fn sample_report() -> VerificationReport {
        VerificationReport {
            image: "eps_server:latest".to_string(),
            checks: vec![
                VerificationCheck {
                    name: "entrypoint".to_string(),
                    passed: true,
                    detail: "[\"/usr/local/bin/eps_server\"]".to_string(),
                },
                VerificationCheck {
                    name: "toolchain absent".to_string(),
                    passed: false,
                    detail: "/usr/local/cargo present".to_string(),
                },
            ],
        }
    }

    #[test]
    fn json_report_lists_every_check() {
        let value = report_json(&sample_report());
        assert_eq!(value["ok"], false);
        assert_eq!(value["checks"].as_array().unwrap().len(), 2);
        assert_eq!(value["checks"][1]["name"], "toolchain absent");
    }

    #[test]
    fn table_includes_details() {
        let rendered = report_table(&sample_report()).to_string();
        assert!(rendered.contains("/usr/local/cargo present"));
        assert!(rendered.contains("entrypoint"));
    }
}
