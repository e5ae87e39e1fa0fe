//! Docker image build operations
//!
//! This module uploads a packaged build context to the daemon, streams the
//! BuildKit output into a progress reporter, and classifies failures into
//! the two fatal pipeline outcomes: the build stage failing to compile, or
//! the runtime stage failing to copy the artifact.

use super::context::CONTEXT_DOCKERFILE;
use super::progress::ProgressReporter;
use super::{BuildContext, DockerClient, DockerError, IMAGE_NAME_DEFAULT, IMAGE_TAG_DEFAULT};
use crate::artifact::{CompiledArtifact, container_path};
use bollard::moby::buildkit::v1::StatusResponse as BuildkitStatusResponse;
use bollard::models::BuildInfoAux;
use bollard::query_parameters::{BuildImageOptions, BuilderVersion, RemoveImageOptionsBuilder};
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::{Either, Full};
use std::collections::{HashMap, VecDeque};
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Default number of recent build log lines to capture for error context
const DEFAULT_BUILD_LOG_BUFFER_SIZE: usize = 20;

/// Default number of error lines to capture separately
const DEFAULT_ERROR_LOG_BUFFER_SIZE: usize = 10;

/// Env var overriding the build log tail size
pub const BUILD_LOG_TAIL_ENV: &str = "EPS_DEPLOY_BUILD_LOG_TAIL";

/// Env var overriding the error line tail size
pub const BUILD_ERROR_TAIL_ENV: &str = "EPS_DEPLOY_BUILD_ERROR_TAIL";

/// A local image reference, `name:tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl Default for ImageRef {
    fn default() -> Self {
        Self::new(IMAGE_NAME_DEFAULT, IMAGE_TAG_DEFAULT)
    }
}

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

/// Docker tag grammar: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
pub fn is_valid_tag(tag: &str) -> bool {
    tag.len() <= 128
        && tag
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Docker repository grammar: lowercase path components separated by `/`,
/// optionally preceded by a registry host such as `localhost:5000`
pub fn is_valid_repository(name: &str) -> bool {
    let mut components: Vec<&str> = name.split('/').collect();
    if components.len() > 1 {
        let first = components[0];
        let is_registry = first == "localhost" || first.contains('.') || first.contains(':');
        if is_registry {
            if !first
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'))
            {
                return false;
            }
            components.remove(0);
        }
    }
    !components.is_empty() && components.iter().all(|c| is_valid_path_component(c))
}

fn is_valid_path_component(component: &str) -> bool {
    let is_lower_alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    component.chars().next().is_some_and(is_lower_alnum)
        && component.chars().last().is_some_and(is_lower_alnum)
        && component
            .chars()
            .all(|c| is_lower_alnum(c) || matches!(c, '.' | '_' | '-'))
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = DockerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(DockerError::Image(format!("Invalid image reference '{s}'")));
        }
        // A colon after the last slash separates the tag; one before it is a
        // registry port.
        let name_start = s.rfind('/').map_or(0, |i| i + 1);
        match s[name_start..].rfind(':') {
            Some(i) => {
                let split = name_start + i;
                let (name, tag) = (&s[..split], &s[split + 1..]);
                if name.is_empty() || tag.is_empty() {
                    return Err(DockerError::Image(format!("Invalid image reference '{s}'")));
                }
                Ok(Self::new(name, tag))
            }
            None => Ok(Self::new(s, IMAGE_TAG_DEFAULT)),
        }
    }
}

/// Options for a single image build
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Build without using the layer cache
    pub no_cache: bool,
    /// `--build-arg` values
    pub build_args: HashMap<String, String>,
}

/// Read a log buffer size from env with bounds
fn read_log_buffer_size(var_name: &str, default: usize) -> usize {
    let Ok(value) = env::var(var_name) else {
        return default;
    };
    let Ok(parsed) = value.trim().parse::<usize>() else {
        return default;
    };
    parsed.clamp(5, 500)
}

/// Check if a line looks like an error message
fn is_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error")
        || lower.contains("failed")
        || lower.contains("cannot")
        || lower.contains("unable to")
        || lower.contains("not found")
        || lower.contains("permission denied")
}

/// Check if an image exists locally
pub async fn image_exists(client: &DockerClient, image: &ImageRef) -> Result<bool, DockerError> {
    let full_name = image.to_string();
    debug!("Checking if image exists: {}", full_name);

    match client.inner().inspect_image(&full_name).await {
        Ok(_) => Ok(true),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(false),
        Err(e) => Err(DockerError::from(e)),
    }
}

/// Remove a tagged image, returning false if it was already gone
pub async fn remove_image(
    client: &DockerClient,
    image: &ImageRef,
    force: bool,
) -> Result<bool, DockerError> {
    let full_name = image.to_string();
    debug!("Removing image {} (force={})", full_name, force);

    let options = RemoveImageOptionsBuilder::new().force(force).build();
    match client
        .inner()
        .remove_image(&full_name, Some(options), None)
        .await
    {
        Ok(_) => Ok(true),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            debug!("Image already removed: {}", full_name);
            Ok(false)
        }
        Err(e) => Err(DockerError::Image(format!(
            "Failed to remove image {full_name}: {e}"
        ))),
    }
}

/// Entrypoint and default command recorded in an image's config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageProcess {
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
}

/// Read the entrypoint and default command of an image
pub async fn inspect_image_process(
    client: &DockerClient,
    image: &ImageRef,
) -> Result<ImageProcess, DockerError> {
    let full_name = image.to_string();
    debug!("Inspecting image process: {}", full_name);

    let info = client
        .inner()
        .inspect_image(&full_name)
        .await
        .map_err(|e| match e {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => DockerError::Image(format!("Image '{full_name}' not found")),
            e => DockerError::Image(format!("Failed to inspect image {full_name}: {e}")),
        })?;

    let config = info.config.unwrap_or_default();
    Ok(ImageProcess {
        entrypoint: config.entrypoint.unwrap_or_default(),
        cmd: config.cmd.unwrap_or_default(),
    })
}

/// Build the packaged image from a build context
///
/// Shows real-time build progress and returns the image id on success. The
/// tag is only applied by the daemon once every stage has succeeded, so a
/// failed build never leaves a tagged image behind.
pub async fn build_image(
    client: &DockerClient,
    context: BuildContext,
    image: &ImageRef,
    artifact: &CompiledArtifact,
    options: &BuildOptions,
    progress: &mut ProgressReporter,
) -> Result<String, DockerError> {
    let full_name = image.to_string();
    debug!(
        "Building image: {} (no_cache: {}, context entries: {})",
        full_name, options.no_cache, context.entries
    );

    // BuildKit requires a unique session ID for each build
    let session_id = format!(
        "eps-deploy-build-{}",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    let build_options = BuildImageOptions {
        t: Some(full_name.clone()),
        dockerfile: CONTEXT_DOCKERFILE.to_string(),
        version: BuilderVersion::BuilderBuildKit,
        session: Some(session_id),
        rm: true,
        forcerm: true,
        nocache: options.no_cache,
        buildargs: Some(options.build_args.clone()),
        platform: String::new(),
        target: String::new(),
        ..Default::default()
    };

    let body: Either<Full<Bytes>, _> = Either::Left(Full::new(Bytes::from(context.archive)));
    let mut stream = client
        .inner()
        .build_image(build_options, None, Some(body));

    progress.add_spinner("build", "Initializing...");

    let mut maybe_image_id = None;
    let mut log_state = BuildLogState::new();

    while let Some(result) = stream.next().await {
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                progress.abandon_all("Build failed");
                return Err(classify_build_failure(&e.to_string(), &log_state, artifact));
            }
        };

        handle_stream_message(&info, progress, &mut log_state);

        if let Some(error_detail) = &info.error_detail
            && let Some(error_msg) = &error_detail.message
        {
            progress.abandon_all(error_msg);
            return Err(classify_build_failure(error_msg, &log_state, artifact));
        }

        if let Some(aux) = info.aux {
            match aux {
                BuildInfoAux::Default(image_id) => {
                    if let Some(id) = image_id.id {
                        maybe_image_id = Some(id);
                    }
                }
                BuildInfoAux::BuildKit(status) => {
                    handle_buildkit_status(&status, progress, &mut log_state);
                }
            }
        }
    }

    let image_id = maybe_image_id.unwrap_or_else(|| full_name.clone());
    progress.finish("build", &format!("Build complete: {full_name}"));
    debug!("Built {} ({})", full_name, image_id);

    Ok(image_id)
}

struct BuildLogState {
    recent_logs: VecDeque<String>,
    error_logs: VecDeque<String>,
    build_log_buffer_size: usize,
    error_log_buffer_size: usize,
    last_vertex_name: Option<String>,
    vertex_name_by_vertex_id: HashMap<String, String>,
}

impl BuildLogState {
    fn new() -> Self {
        let build_log_buffer_size =
            read_log_buffer_size(BUILD_LOG_TAIL_ENV, DEFAULT_BUILD_LOG_BUFFER_SIZE);
        let error_log_buffer_size =
            read_log_buffer_size(BUILD_ERROR_TAIL_ENV, DEFAULT_ERROR_LOG_BUFFER_SIZE);
        Self {
            recent_logs: VecDeque::with_capacity(build_log_buffer_size),
            error_logs: VecDeque::with_capacity(error_log_buffer_size),
            build_log_buffer_size,
            error_log_buffer_size,
            last_vertex_name: None,
            vertex_name_by_vertex_id: HashMap::new(),
        }
    }

    fn record(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.recent_logs.len() >= self.build_log_buffer_size {
            self.recent_logs.pop_front();
        }
        self.recent_logs.push_back(line.to_string());

        if is_error_line(line) {
            if self.error_logs.len() >= self.error_log_buffer_size {
                self.error_logs.pop_front();
            }
            self.error_logs.push_back(line.to_string());
        }
    }
}

fn handle_stream_message(
    info: &bollard::models::BuildInfo,
    progress: &mut ProgressReporter,
    state: &mut BuildLogState,
) {
    let Some(stream_msg) = info.stream.as_deref() else {
        return;
    };
    let msg = stream_msg.trim();
    if msg.is_empty() {
        return;
    }

    if progress.is_plain_output() {
        eprint!("{stream_msg}");
    } else {
        progress.update_spinner("build", msg);
    }

    if msg.starts_with("Step ") {
        debug!("Build step: {}", msg);
        state.last_vertex_name = Some(msg.to_string());
    }
    state.record(msg);
}

fn handle_buildkit_status(
    status: &BuildkitStatusResponse,
    progress: &mut ProgressReporter,
    state: &mut BuildLogState,
) {
    for vertex in &status.vertexes {
        if vertex.name.is_empty() {
            continue;
        }
        state
            .vertex_name_by_vertex_id
            .entry(vertex.digest.clone())
            .or_insert_with(|| vertex.name.clone());
        if !vertex.name.starts_with("[internal]") {
            state.last_vertex_name = Some(vertex.name.clone());
        }
        if !vertex.error.is_empty() {
            state.record(&format!("[{}] {}", vertex.name, vertex.error));
        }
    }

    for log in &status.logs {
        let name = state
            .vertex_name_by_vertex_id
            .get(&log.vertex)
            .cloned()
            .unwrap_or_else(|| format_vertex_fallback_label(&log.vertex));
        let message = String::from_utf8_lossy(&log.msg).replace('\r', "");
        for line in message.lines().filter(|l| !l.trim().is_empty()) {
            if progress.is_plain_output() {
                eprintln!("[{name}] {line}");
            }
            state.record(&format!("[{name}] {line}"));
        }
    }

    if !progress.is_plain_output()
        && let Some(name) = state.last_vertex_name.as_deref()
    {
        progress.update_spinner("build", name);
    }
}

fn format_vertex_fallback_label(vertex_id: &str) -> String {
    let short = vertex_id
        .strip_prefix("sha256:")
        .unwrap_or(vertex_id)
        .chars()
        .take(12)
        .collect::<String>();
    format!("vertex {short}")
}

/// Decide whether a failed build is a copy failure or a build failure
///
/// A copy failure is a not-found condition on the artifact path or on the
/// `COPY --from=builder` step. Everything else failed while compiling.
fn classify_build_failure(
    error: &str,
    state: &BuildLogState,
    artifact: &CompiledArtifact,
) -> DockerError {
    let context = format_build_error_with_context(error, &state.recent_logs, &state.error_logs);
    if is_copy_failure(error, state.last_vertex_name.as_deref(), artifact) {
        DockerError::Copy(context)
    } else {
        DockerError::Build(context)
    }
}

fn is_copy_failure(error: &str, last_vertex: Option<&str>, artifact: &CompiledArtifact) -> bool {
    let lower = error.to_lowercase();
    let not_found = lower.contains("not found") || lower.contains("no such file");
    if !not_found {
        return false;
    }
    let build_path = container_path(&artifact.build_path());
    error.contains(&build_path)
        || error.contains("COPY --from")
        || last_vertex.is_some_and(|name| name.contains("COPY --from"))
}

/// Format a build error with recent log context for actionable debugging
fn format_build_error_with_context(
    error: &str,
    recent_logs: &VecDeque<String>,
    error_logs: &VecDeque<String>,
) -> String {
    let mut message = String::new();
    message.push_str(error);

    // Error-like lines that already scrolled out of the recent tail
    let unique_errors: Vec<_> = error_logs
        .iter()
        .filter(|line| !recent_logs.contains(line))
        .collect();
    if !unique_errors.is_empty() {
        message.push_str("\n\nPotential errors detected during build:");
        for line in unique_errors {
            message.push_str("\n  ");
            message.push_str(line);
        }
    }

    if !recent_logs.is_empty() {
        message.push_str("\n\nRecent build output:");
        for line in recent_logs {
            message.push_str("\n  ");
            message.push_str(line);
        }
    } else {
        message.push_str("\n\nNo build output was received from the Docker daemon.");
        message.push_str("\nThis usually means the build failed before any logs were streamed.");
    }

    let error_lower = error.to_lowercase();
    if error_lower.contains("network")
        || error_lower.contains("connection")
        || error_lower.contains("timeout")
    {
        message.push_str("\n\nSuggestion: Check your network connection and Docker's ability to reach the internet.");
    } else if error_lower.contains("disk") || error_lower.contains("no space") {
        message.push_str("\n\nSuggestion: Free up disk space with 'docker system prune' or check available storage.");
    } else if error_lower.contains("permission") || error_lower.contains("denied") {
        message.push_str("\n\nSuggestion: Check Docker permissions. You may need to add your user to the 'docker' group.");
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(lines: &[&str], last_vertex: Option<&str>) -> BuildLogState {
        let mut state = BuildLogState::new();
        for line in lines {
            state.record(line);
        }
        state.last_vertex_name = last_vertex.map(str::to_string);
        state
    }

    #[test]
    fn image_ref_display_and_parse() {
        assert_eq!(ImageRef::default().to_string(), "eps_server:latest");

        let parsed: ImageRef = "eps_server:v2".parse().unwrap();
        assert_eq!(parsed, ImageRef::new("eps_server", "v2"));

        let untagged: ImageRef = "eps_server".parse().unwrap();
        assert_eq!(untagged.tag, "latest");

        let with_port: ImageRef = "localhost:5000/eps_server".parse().unwrap();
        assert_eq!(with_port.name, "localhost:5000/eps_server");
        assert_eq!(with_port.tag, "latest");

        assert!("".parse::<ImageRef>().is_err());
        assert!("eps_server:".parse::<ImageRef>().is_err());
        assert!("eps server".parse::<ImageRef>().is_err());
    }

    #[test]
    fn tag_grammar() {
        assert!(is_valid_tag("latest"));
        assert!(is_valid_tag("v1.2.3-rc_1"));
        assert!(is_valid_tag("_ci"));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag("a:b"));
        assert!(!is_valid_tag("x y"));
        assert!(!is_valid_tag("-dev"));
        assert!(!is_valid_tag(&"a".repeat(129)));
    }

    #[test]
    fn repository_grammar() {
        assert!(is_valid_repository("eps_server"));
        assert!(is_valid_repository("team/eps-server"));
        assert!(is_valid_repository("localhost:5000/eps_server"));
        assert!(is_valid_repository("registry.example.com/team/eps.server"));
        assert!(!is_valid_repository("EPS_Server"));
        assert!(!is_valid_repository("eps_server_"));
        assert!(!is_valid_repository("team//eps"));
        assert!(!is_valid_repository(""));
        assert!(!is_valid_repository("eps server"));
    }

    #[test]
    fn compile_error_is_build_failure() {
        let state = state_with(
            &[
                "[builder 4/4] RUN cargo install --path .",
                "[builder 4/4] error[E0425]: cannot find value `x` in this scope",
            ],
            Some("[builder 4/4] RUN cargo install --path ."),
        );
        let err = classify_build_failure(
            "process \"/bin/sh -c cargo install --path .\" did not complete successfully: exit code: 101",
            &state,
            &CompiledArtifact::default(),
        );
        assert!(matches!(err, DockerError::Build(_)));
    }

    #[test]
    fn missing_artifact_is_copy_failure() {
        let state = state_with(&[], Some("[stage-1 2/2] COPY --from=builder /usr/local/cargo/bin/eps_server /usr/local/bin/eps_server"));
        let err = classify_build_failure(
            "failed to compute cache key: \"/usr/local/cargo/bin/eps_server\": not found",
            &state,
            &CompiledArtifact::default(),
        );
        assert!(matches!(err, DockerError::Copy(_)));
    }

    #[test]
    fn not_found_on_copy_vertex_is_copy_failure() {
        let state = state_with(&[], Some("[stage-1 2/2] COPY --from=builder /x /y"));
        assert!(is_copy_failure(
            "failed to calculate checksum: not found",
            state.last_vertex_name.as_deref(),
            &CompiledArtifact::default()
        ));
    }

    #[test]
    fn not_found_elsewhere_is_not_copy_failure() {
        assert!(!is_copy_failure(
            "rust:9.99: not found",
            Some("[builder 1/4] FROM docker.io/library/rust:9.99"),
            &CompiledArtifact::default()
        ));
    }

    #[test]
    fn format_build_error_includes_recent_logs() {
        let mut logs = VecDeque::new();
        logs.push_back("Step 1/8 : FROM rust:1.89 AS builder".to_string());
        logs.push_back("Step 4/8 : RUN cargo install --path .".to_string());
        logs.push_back("error: could not compile `eps_server`".to_string());

        let result =
            format_build_error_with_context("Build failed: exit code 101", &logs, &VecDeque::new());

        assert!(result.contains("Build failed: exit code 101"));
        assert!(result.contains("Recent build output:"));
        assert!(result.contains("Step 1/8"));
        assert!(result.contains("could not compile"));
    }

    #[test]
    fn format_build_error_handles_empty_logs() {
        let result =
            format_build_error_with_context("Stream error", &VecDeque::new(), &VecDeque::new());
        assert!(result.contains("Stream error"));
        assert!(!result.contains("Recent build output:"));
        assert!(result.contains("No build output was received"));
    }

    #[test]
    fn format_build_error_adds_suggestions() {
        let empty = VecDeque::new();
        assert!(
            format_build_error_with_context("connection timeout", &empty, &empty)
                .contains("Check your network connection")
        );
        assert!(
            format_build_error_with_context("no space left on device", &empty, &empty)
                .contains("Free up disk space")
        );
        assert!(
            format_build_error_with_context("permission denied", &empty, &empty)
                .contains("Check Docker permissions")
        );
    }

    #[test]
    fn format_build_error_shows_error_lines_separately() {
        let mut recent_logs = VecDeque::new();
        recent_logs.push_back("Compiling eps_server v0.1.0".to_string());

        let mut error_logs = VecDeque::new();
        error_logs.push_back("error: failed to compile `eps_server`".to_string());

        let result = format_build_error_with_context("Build failed", &recent_logs, &error_logs);
        assert!(result.contains("Potential errors detected during build:"));
        assert!(result.contains("failed to compile `eps_server`"));
    }

    #[test]
    fn log_state_is_bounded() {
        let mut state = BuildLogState::new();
        for i in 0..100 {
            state.record(&format!("line {i}"));
        }
        assert_eq!(state.recent_logs.len(), state.build_log_buffer_size);
        assert_eq!(state.recent_logs.back().map(String::as_str), Some("line 99"));
    }

    #[test]
    fn is_error_line_detects_errors() {
        assert!(is_error_line("error: could not compile"));
        assert!(is_error_line("Unable to locate package foo"));
        assert!(!is_error_line("Compiling eps_server v0.1.0"));
        assert!(!is_error_line("Installed package `eps_server`"));
    }

    #[test]
    fn vertex_fallback_label_is_short() {
        assert_eq!(
            format_vertex_fallback_label("sha256:0123456789abcdef0123"),
            "vertex 0123456789ab"
        );
    }
}
