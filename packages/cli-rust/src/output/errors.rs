//! Centralized Docker error formatting
//!
//! This module provides consistent, actionable error messages for Docker-related
//! errors across all CLI commands.

use anyhow::anyhow;
use console::style;
use eps_deploy_core::docker::DockerError;

/// Format Docker errors with actionable guidance
///
/// Returns a styled, multi-line error message with troubleshooting steps.
pub fn format_docker_error(e: &DockerError) -> String {
    match e {
        DockerError::NotRunning => {
            format!(
                "{}\n\n  {}\n  {}\n  {}",
                style("Docker is not responding").red().bold(),
                "Start or restart the Docker daemon:",
                style("  Linux:  sudo systemctl start docker").cyan(),
                style("  macOS:  open -a Docker").cyan(),
            )
        }
        DockerError::SocketNotFound => {
            format!(
                "{}\n\n  {}\n  {}\n  {}",
                style("Docker socket not found").red().bold(),
                "Docker may not be installed or the service isn't running.",
                "Verify the socket exists at /var/run/docker.sock (Linux default),",
                "or point DOCKER_HOST at your daemon.",
            )
        }
        DockerError::PermissionDenied => {
            format!(
                "{}\n\n  {}\n  {}\n\n  {}\n  {}\n  {}",
                style("Permission denied accessing Docker").red().bold(),
                "Your user likely lacks access to the Docker socket.",
                style("  Check: ls -l /var/run/docker.sock").cyan(),
                "Fix (Linux):",
                style("  sudo usermod -aG docker $USER").cyan(),
                "Then log out and back in (or run: newgrp docker).",
            )
        }
        DockerError::Connection(msg) => {
            format!(
                "{}\n\n  {}",
                style("Cannot connect to Docker").red().bold(),
                msg
            )
        }
        DockerError::Build(msg) => {
            format!(
                "{}\n\n{}\n\n  {}",
                style("Build stage failed: eps_server did not compile").red().bold(),
                indent(msg),
                style("No image was produced. Fix the build error and run 'eps-deploy build' again.")
                    .dim()
            )
        }
        DockerError::Copy(msg) => {
            format!(
                "{}\n\n{}\n\n  {}\n  {}",
                style("Runtime stage failed: artifact not found in build stage")
                    .red()
                    .bold(),
                indent(msg),
                "The build completed but cargo did not install the executable where expected.",
                style("  Check artifact_name and install_root in your config.").cyan()
            )
        }
        DockerError::Verify(msg) => {
            format!(
                "{}\n\n  {}",
                style("Image does not satisfy the packaging contract").red().bold(),
                msg
            )
        }
        _ => e.to_string(),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format Docker errors as anyhow::Error
pub fn format_docker_error_anyhow(e: &DockerError) -> anyhow::Error {
    anyhow!("{}", format_docker_error(e))
}

/// Show Docker error in a rich format to stderr
///
/// Prints a blank line before the error message for visual separation.
pub fn show_docker_error(e: &DockerError) {
    let msg = format_docker_error(e);
    eprintln!();
    eprintln!("{msg}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_docker_error_not_running() {
        let msg = format_docker_error(&DockerError::NotRunning);
        assert!(msg.contains("Docker is not responding"));
        assert!(msg.contains("systemctl start docker"));
    }

    #[test]
    fn format_docker_error_permission_denied() {
        let msg = format_docker_error(&DockerError::PermissionDenied);
        assert!(msg.contains("Permission denied"));
        assert!(msg.contains("usermod"));
    }

    #[test]
    fn format_docker_error_build_failure() {
        let error = DockerError::Build("exit code: 101\nerror[E0425]".to_string());
        let msg = format_docker_error(&error);
        assert!(msg.contains("Build stage failed"));
        assert!(msg.contains("  error[E0425]"));
        assert!(msg.contains("No image was produced"));
    }

    #[test]
    fn format_docker_error_copy_failure() {
        let error = DockerError::Copy("/usr/local/cargo/bin/eps_server: not found".to_string());
        let msg = format_docker_error(&error);
        assert!(msg.contains("artifact not found"));
        assert!(msg.contains("install_root"));
    }

    #[test]
    fn format_docker_error_anyhow_wraps_correctly() {
        let err_msg = format_docker_error_anyhow(&DockerError::NotRunning).to_string();
        assert!(err_msg.contains("Docker is not responding"));
    }
}
