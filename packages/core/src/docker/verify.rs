//! Post-build image verification
//!
//! Checks a built image against the packaging contract: the entrypoint is
//! exactly the artifact with no default arguments, the artifact is an
//! executable regular file, and nothing from the build stage leaked in.
//! Paths are checked through a container that is created but never started.

use super::container::{create_container, remove_container};
use super::dockerfile::Recipe;
use super::image::{ImageProcess, ImageRef, inspect_image_process};
use super::{DockerClient, DockerError};
use crate::artifact::container_path;
use bollard::query_parameters::DownloadFromContainerOptionsBuilder;
use futures_util::StreamExt;
use std::io::Read;
use tracing::debug;

/// Paths that only exist in the Rust builder image
const TOOLCHAIN_PATHS: &[&str] = &["/usr/local/cargo", "/usr/local/rustup"];

/// Outcome of one verification check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl VerificationCheck {
    fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// All checks run against one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub image: String,
    pub checks: Vec<VerificationCheck>,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerificationCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Turn a failing report into a `DockerError::Verify`
    pub fn into_result(self) -> Result<Self, DockerError> {
        if self.is_ok() {
            return Ok(self);
        }
        let reasons = self
            .failures()
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect::<Vec<_>>()
            .join("; ");
        Err(DockerError::Verify(format!("{}: {reasons}", self.image)))
    }
}

/// Paths that must be absent from the runtime image
pub fn build_only_paths(recipe: &Recipe) -> Vec<String> {
    let mut paths: Vec<String> = TOOLCHAIN_PATHS.iter().map(|p| p.to_string()).collect();
    let install_root = container_path(recipe.artifact().install_root());
    if !paths.contains(&install_root) {
        paths.push(install_root);
    }
    let workdir = recipe.build.workdir.trim_end_matches('/').to_string();
    if !workdir.is_empty() && !paths.contains(&workdir) {
        paths.push(workdir);
    }
    paths
}

/// Compare the recorded process against the recipe's entrypoint
fn process_checks(process: &ImageProcess, recipe: &Recipe) -> Vec<VerificationCheck> {
    let expected = recipe.runtime.entrypoint();
    let entrypoint = if process.entrypoint == expected {
        VerificationCheck::pass("entrypoint", format!("{expected:?}"))
    } else {
        VerificationCheck::fail(
            "entrypoint",
            format!("expected {expected:?}, found {:?}", process.entrypoint),
        )
    };

    let cmd = if process.cmd.is_empty() {
        VerificationCheck::pass("default arguments", "none")
    } else {
        VerificationCheck::fail(
            "default arguments",
            format!("image declares {:?}", process.cmd),
        )
    };

    vec![entrypoint, cmd]
}

/// Inspect an archive returned for the artifact path
fn artifact_check(path: &str, archive: &[u8]) -> VerificationCheck {
    let name = "artifact present";
    let mut tar = tar::Archive::new(archive);
    let first = tar
        .entries()
        .ok()
        .and_then(|mut entries| entries.next())
        .and_then(Result::ok);

    let Some(mut entry) = first else {
        return VerificationCheck::fail(name, format!("{path}: unreadable archive"));
    };
    let header = entry.header();
    let is_file = header.entry_type().is_file();
    let mode = header.mode().unwrap_or(0);
    let size = header.size().unwrap_or(0);
    // Drain so a truncated body shows up as a failure
    let mut sink = Vec::new();
    let readable = entry.read_to_end(&mut sink).is_ok();

    if !is_file {
        VerificationCheck::fail(name, format!("{path} is not a regular file"))
    } else if mode & 0o111 == 0 {
        VerificationCheck::fail(name, format!("{path} is not executable (mode {mode:o})"))
    } else if !readable || size == 0 {
        VerificationCheck::fail(name, format!("{path} is empty or truncated"))
    } else {
        VerificationCheck::pass(name, format!("{path} ({size} bytes, mode {mode:o})"))
    }
}

/// Fetch a path from the container as a tar stream; `None` when absent
async fn stat_path(
    client: &DockerClient,
    container: &str,
    path: &str,
    read_body: bool,
) -> Result<Option<Vec<u8>>, DockerError> {
    let options = DownloadFromContainerOptionsBuilder::new().path(path).build();
    let mut stream = client
        .inner()
        .download_from_container(container, Some(options));

    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                if !read_body {
                    return Ok(Some(Vec::new()));
                }
                body.extend_from_slice(&bytes);
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(None),
            Err(e) => {
                return Err(DockerError::Verify(format!(
                    "Failed to check {path} in {container}: {e}"
                )));
            }
        }
    }
    Ok(Some(body))
}

async fn filesystem_checks(
    client: &DockerClient,
    container: &str,
    recipe: &Recipe,
) -> Result<Vec<VerificationCheck>, DockerError> {
    let mut checks = Vec::new();

    let artifact_path = container_path(&recipe.artifact().runtime_path());
    match stat_path(client, container, &artifact_path, true).await? {
        Some(archive) => checks.push(artifact_check(&artifact_path, &archive)),
        None => checks.push(VerificationCheck::fail(
            "artifact present",
            format!("{artifact_path} not found"),
        )),
    }

    for path in build_only_paths(recipe) {
        let name = format!("absent {path}");
        match stat_path(client, container, &path, false).await? {
            None => checks.push(VerificationCheck::pass(name, "not present")),
            Some(_) => checks.push(VerificationCheck::fail(
                name,
                "build-stage path leaked into runtime image",
            )),
        }
    }

    Ok(checks)
}

/// Verify an image against the recipe that produced it
pub async fn verify_image(
    client: &DockerClient,
    image: &ImageRef,
    recipe: &Recipe,
) -> Result<VerificationReport, DockerError> {
    debug!("Verifying image {}", image);

    let process = inspect_image_process(client, image).await?;
    let mut checks = process_checks(&process, recipe);

    let scratch_id = create_container(client, image, None, &[]).await?;
    let fs_result = filesystem_checks(client, &scratch_id, recipe).await;
    if let Err(e) = remove_container(client, &scratch_id, true).await {
        debug!("Failed to remove scratch container {}: {}", scratch_id, e);
    }
    checks.extend(fs_result?);

    Ok(VerificationReport {
        image: image.to_string(),
        checks,
    })
}
