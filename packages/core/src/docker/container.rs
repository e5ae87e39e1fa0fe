//! Docker container lifecycle management
//!
//! Containers run the packaged image exactly as its entrypoint declares.
//! No command, port, volume or environment is added on the server's behalf;
//! arguments are only passed when the caller supplies them. The process exit
//! code is returned unmodified.

use super::image::{ImageRef, image_exists};
use super::lifecycle::ContainerState;
use super::{DockerClient, DockerError};
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, WaitContainerOptionsBuilder,
};
use futures_util::StreamExt;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Default container name
pub const CONTAINER_NAME: &str = "eps_server";

/// Default graceful shutdown timeout in seconds
pub const DEFAULT_STOP_TIMEOUT_SECS: i64 = 10;

/// Label marking containers created by this tool
pub const MANAGED_LABEL_KEY: &str = "eps-deploy.managed";

/// Options for `run_container`
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Container name; the daemon picks one when `None`
    pub name: Option<String>,
    /// Arguments appended after the entrypoint. Empty runs it bare.
    pub args: Vec<String>,
    /// Remove the container once it has stopped
    pub remove: bool,
    /// Stream the container's stdout/stderr to ours
    pub follow_logs: bool,
    /// Stop the container gracefully on Ctrl+C instead of abandoning it
    pub forward_interrupt: bool,
    /// Graceful stop timeout used when forwarding an interrupt
    pub stop_timeout_secs: i64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            name: None,
            args: Vec::new(),
            remove: false,
            follow_logs: true,
            forward_interrupt: true,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub container_id: String,
    pub exit_code: i64,
    pub final_state: ContainerState,
}

/// Build the create body for a run of `image`
fn container_create_body(image: &ImageRef, args: &[String]) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(image.to_string()),
        // Leave the image's entrypoint untouched; only pass args if given
        cmd: if args.is_empty() {
            None
        } else {
            Some(args.to_vec())
        },
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        labels: Some(HashMap::from([(
            MANAGED_LABEL_KEY.to_string(),
            "true".to_string(),
        )])),
        host_config: Some(HostConfig {
            auto_remove: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create a container from the packaged image
///
/// Does not start the container. Returns the container ID.
pub async fn create_container(
    client: &DockerClient,
    image: &ImageRef,
    name: Option<&str>,
    args: &[String],
) -> Result<String, DockerError> {
    debug!(
        "Creating container {:?} from image {} with {} args",
        name,
        image,
        args.len()
    );

    if !image_exists(client, image).await? {
        return Err(DockerError::Container(format!(
            "Image '{image}' not found. Run 'eps-deploy build' first."
        )));
    }

    if let Some(name) = name
        && container_exists(client, name).await?
    {
        return Err(DockerError::Container(format!(
            "Container '{name}' already exists. Remove it first with 'eps-deploy stop --remove'."
        )));
    }

    let options = CreateContainerOptions {
        name: name.map(str::to_string),
        platform: String::new(),
    };

    let response = client
        .inner()
        .create_container(Some(options), container_create_body(image, args))
        .await
        .map_err(|e| DockerError::Container(format!("Failed to create container: {e}")))?;

    for warning in &response.warnings {
        warn!("Docker: {}", warning);
    }
    debug!("Container created with ID: {}", response.id);
    Ok(response.id)
}

/// Start a created container
pub async fn start_container(client: &DockerClient, name: &str) -> Result<(), DockerError> {
    debug!("Starting container: {}", name);

    client
        .inner()
        .start_container(name, None::<StartContainerOptions>)
        .await
        .map_err(|e| DockerError::Container(format!("Failed to start container {name}: {e}")))?;

    debug!("Container {} started", name);
    Ok(())
}

/// Stop a running container with graceful shutdown
///
/// Stopping a container that is not running is a no-op.
pub async fn stop_container(
    client: &DockerClient,
    name: &str,
    timeout_secs: Option<i64>,
) -> Result<(), DockerError> {
    let timeout = stop_timeout_param(timeout_secs);
    debug!("Stopping container {} with {}s timeout", name, timeout);

    let options = StopContainerOptions {
        signal: None,
        t: Some(timeout),
    };

    match client.inner().stop_container(name, Some(options)).await {
        Ok(()) => {
            debug!("Container {} stopped", name);
            Ok(())
        }
        // 304 Not Modified: already stopped
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        }) => {
            debug!("Container {} was already stopped", name);
            Ok(())
        }
        Err(e) => Err(DockerError::Container(format!(
            "Failed to stop container {name}: {e}"
        ))),
    }
}

/// Daemon stop timeout; negative values mean no grace period
fn stop_timeout_param(timeout_secs: Option<i64>) -> i32 {
    let secs = timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS).max(0);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

/// Remove a container
pub async fn remove_container(
    client: &DockerClient,
    name: &str,
    force: bool,
) -> Result<(), DockerError> {
    debug!("Removing container {} (force={})", name, force);

    let options = RemoveContainerOptions {
        force,
        v: false,
        link: false,
    };

    client
        .inner()
        .remove_container(name, Some(options))
        .await
        .map_err(|e| DockerError::Container(format!("Failed to remove container {name}: {e}")))?;

    debug!("Container {} removed", name);
    Ok(())
}

/// Check if container exists
pub async fn container_exists(client: &DockerClient, name: &str) -> Result<bool, DockerError> {
    Ok(container_state(client, name).await? != ContainerState::Removed)
}

/// Current lifecycle state; a missing container is `Removed`
pub async fn container_state(
    client: &DockerClient,
    name: &str,
) -> Result<ContainerState, DockerError> {
    debug!("Getting container state: {}", name);

    match client.inner().inspect_container(name, None).await {
        Ok(info) => {
            let status = info.state.and_then(|s| s.status).map(|s| s.to_string());
            Ok(ContainerState::from_docker_status(Some(
                status.as_deref().unwrap_or("unknown"),
            )))
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(ContainerState::Removed),
        Err(e) => Err(DockerError::Container(format!(
            "Failed to inspect container {name}: {e}"
        ))),
    }
}

/// Block until the container stops and return its exit code
pub async fn wait_for_exit(client: &DockerClient, name: &str) -> Result<i64, DockerError> {
    debug!("Waiting for container {} to stop", name);

    let options = WaitContainerOptionsBuilder::new()
        .condition("not-running")
        .build();
    let mut stream = client.inner().wait_container(name, Some(options));

    match stream.next().await {
        Some(Ok(response)) => Ok(response.status_code),
        // bollard reports non-zero exits as an error carrying the code
        Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
        Some(Err(e)) => Err(DockerError::Container(format!(
            "Failed waiting for container {name}: {e}"
        ))),
        None => Err(DockerError::Container(format!(
            "Wait stream for container {name} ended without an exit status"
        ))),
    }
}

/// Copy the container's output to our stdout/stderr until it stops
pub async fn stream_logs(client: &DockerClient, name: &str) -> Result<(), DockerError> {
    let options = LogsOptions {
        stdout: true,
        stderr: true,
        follow: true,
        tail: "all".to_string(),
        ..Default::default()
    };

    let mut stream = client.inner().logs(name, Some(options));
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();

    while let Some(result) = stream.next().await {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                debug!("Log stream for {} ended: {}", name, e);
                break;
            }
        };
        let write = match output {
            LogOutput::StdErr { message } => stderr.write_all(&message).await,
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                stdout.write_all(&message).await
            }
            LogOutput::StdIn { .. } => Ok(()),
        };
        if let Err(e) = write {
            debug!("Failed to forward container output: {}", e);
            break;
        }
    }

    let _ = stdout.flush().await;
    let _ = stderr.flush().await;
    Ok(())
}

/// Run the packaged image to completion
///
/// Created -> Running -> Stopped (-> Removed with `remove`). Returns the
/// process exit code unmodified.
pub async fn run_container(
    client: &DockerClient,
    image: &ImageRef,
    options: &RunOptions,
) -> Result<RunOutcome, DockerError> {
    let container_id =
        create_container(client, image, options.name.as_deref(), &options.args).await?;
    let mut state = ContainerState::Created;

    if let Err(e) = start_container(client, &container_id).await {
        // Never started, so it can be discarded straight from Created
        let _ = remove_container(client, &container_id, true).await;
        return Err(e);
    }
    state = advance(state, ContainerState::Running)?;

    let log_task = options.follow_logs.then(|| {
        let client = client.clone();
        let id = container_id.clone();
        tokio::spawn(async move { stream_logs(&client, &id).await })
    });

    let exit_code = if options.forward_interrupt {
        tokio::select! {
            code = wait_for_exit(client, &container_id) => code?,
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupt received, stopping container {}", container_id);
                stop_container(client, &container_id, Some(options.stop_timeout_secs)).await?;
                wait_for_exit(client, &container_id).await?
            }
        }
    } else {
        wait_for_exit(client, &container_id).await?
    };
    state = advance(state, ContainerState::Stopped)?;

    if let Some(task) = log_task
        && let Err(e) = task.await
    {
        debug!("Log forwarding task failed: {}", e);
    }

    if options.remove {
        remove_container(client, &container_id, false).await?;
        state = advance(state, ContainerState::Removed)?;
    }

    debug!(
        "Container {} finished with exit code {} ({})",
        container_id, exit_code, state
    );
    Ok(RunOutcome {
        container_id,
        exit_code,
        final_state: state,
    })
}

fn advance(from: ContainerState, to: ContainerState) -> Result<ContainerState, DockerError> {
    from.transition(to)
        .map_err(|e| DockerError::Container(e.to_string()))
}

/// Clamp a container exit code into the range a host process can return
pub fn host_exit_code(code: i64) -> i32 {
    i32::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_keeps_entrypoint_and_has_no_default_args() {
        let body = container_create_body(&ImageRef::default(), &[]);
        assert_eq!(body.image.as_deref(), Some("eps_server:latest"));
        assert!(body.cmd.is_none());
        assert!(body.entrypoint.is_none());
        assert!(body.env.is_none());
        assert!(body.exposed_ports.is_none());
    }

    #[test]
    fn create_body_passes_invoker_args() {
        let args = vec!["--image-dir".to_string(), "/data".to_string()];
        let body = container_create_body(&ImageRef::default(), &args);
        assert_eq!(body.cmd, Some(args));
        assert!(body.entrypoint.is_none());
    }

    #[test]
    fn create_body_is_labelled() {
        let body = container_create_body(&ImageRef::default(), &[]);
        let labels = body.labels.unwrap();
        assert_eq!(labels.get(MANAGED_LABEL_KEY).map(String::as_str), Some("true"));
    }

    #[test]
    fn default_run_options() {
        let options = RunOptions::default();
        assert!(options.args.is_empty());
        assert!(!options.remove);
        assert!(options.follow_logs);
        assert_eq!(options.stop_timeout_secs, DEFAULT_STOP_TIMEOUT_SECS);
    }

    #[test]
    fn advance_rejects_skipped_states() {
        assert!(advance(ContainerState::Created, ContainerState::Stopped).is_err());
        assert_eq!(
            advance(ContainerState::Running, ContainerState::Stopped).unwrap(),
            ContainerState::Stopped
        );
    }

    #[test]
    fn stop_timeout_is_bounded() {
        assert_eq!(stop_timeout_param(None), 10);
        assert_eq!(stop_timeout_param(Some(30)), 30);
        assert_eq!(stop_timeout_param(Some(-5)), 0);
        assert_eq!(stop_timeout_param(Some(i64::MAX)), i32::MAX);
    }

    #[test]
    fn exit_codes_are_forwarded() {
        assert_eq!(host_exit_code(0), 0);
        assert_eq!(host_exit_code(3), 3);
        assert_eq!(host_exit_code(137), 137);
        assert_eq!(host_exit_code(i64::MAX), 1);
    }
}
