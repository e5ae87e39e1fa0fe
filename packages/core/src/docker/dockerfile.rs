//! Two-stage Dockerfile for packaging eps_server
//!
//! The build stage compiles the source tree with `cargo install --path .`.
//! The runtime stage starts from a slim base image, copies only the
//! installed executable and declares it as the entrypoint. The default
//! recipe is also embedded verbatim so it can be shipped alongside sources.

use crate::artifact::{ArtifactError, CompiledArtifact, container_path, validate_container_path};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use thiserror::Error;

/// The default Dockerfile, identical to `Recipe::default().render()`
pub const DOCKERFILE: &str = include_str!("Dockerfile");

// =============================================================================
// Image naming
// =============================================================================
//
// The produced image is referenced as `{name}:{tag}`. Nothing is pushed to a
// registry, so the name carries no registry or namespace prefix by default.
// =============================================================================

/// Default local image repository for the packaged server
pub const IMAGE_NAME_DEFAULT: &str = "eps_server";

/// Default image tag
pub const IMAGE_TAG_DEFAULT: &str = "latest";

/// Default Rust toolchain image used by the build stage
pub const BUILDER_IMAGE_DEFAULT: &str = "rust:1.89";

/// Default working directory the source tree is copied into
pub const BUILD_WORKDIR_DEFAULT: &str = "/usr/src/eps_server";

/// Default minimal base image for the runtime stage
pub const BASE_IMAGE_DEFAULT: &str = "debian:bookworm-slim";

/// Stage name referenced by `COPY --from`
pub const BUILDER_STAGE_NAME: &str = "builder";

const APT_CLEANUP: &str = "rm -rf /var/lib/apt/lists/*";

/// Errors raised when a recipe cannot be rendered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    #[error("{field} must be a non-empty image reference without whitespace, got '{value}'")]
    InvalidImage { field: &'static str, value: String },

    #[error("Invalid build workdir: {0}")]
    Workdir(ArtifactError),

    #[error("Invalid runtime package name '{0}'")]
    InvalidPackage(String),

    #[error("Build and runtime stages reference different artifacts ('{build}' vs '{runtime}')")]
    ArtifactMismatch { build: String, runtime: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Compiles the source tree into the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStage {
    pub builder_image: String,
    pub workdir: String,
    pub artifact: CompiledArtifact,
}

impl Default for BuildStage {
    fn default() -> Self {
        Self {
            builder_image: BUILDER_IMAGE_DEFAULT.to_string(),
            workdir: BUILD_WORKDIR_DEFAULT.to_string(),
            artifact: CompiledArtifact::default(),
        }
    }
}

impl BuildStage {
    fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "FROM {} AS {BUILDER_STAGE_NAME}", self.builder_image);
        let _ = writeln!(out, "WORKDIR {}", self.workdir);
        out.push_str("COPY . .\n");
        out.push_str("RUN cargo install --path .\n");
    }
}

/// Hosts the artifact on a minimal base image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStage {
    pub base_image: String,
    /// Extra OS packages installed before the artifact is copied.
    /// Empty is the common case and renders as a commented placeholder.
    pub runtime_packages: Vec<String>,
    pub artifact: CompiledArtifact,
}

impl Default for RuntimeStage {
    fn default() -> Self {
        Self {
            base_image: BASE_IMAGE_DEFAULT.to_string(),
            runtime_packages: Vec::new(),
            artifact: CompiledArtifact::default(),
        }
    }
}

impl RuntimeStage {
    /// Sorted, de-duplicated package list
    pub fn packages(&self) -> Vec<&str> {
        self.runtime_packages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Exec-form entrypoint, e.g. `["/usr/local/bin/eps_server"]`
    pub fn entrypoint(&self) -> Vec<String> {
        vec![container_path(&self.artifact.runtime_path())]
    }

    fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "FROM {}", self.base_image);

        let packages = self.packages();
        if packages.is_empty() {
            let _ = writeln!(
                out,
                "# RUN apt-get update && apt-get install -y extra-runtime-dependencies && {APT_CLEANUP}"
            );
        } else {
            let _ = writeln!(
                out,
                "RUN apt-get update && apt-get install -y {} && {APT_CLEANUP}",
                packages.join(" ")
            );
        }

        let _ = writeln!(
            out,
            "COPY --from={BUILDER_STAGE_NAME} {} {}",
            container_path(&self.artifact.build_path()),
            container_path(&self.artifact.runtime_path())
        );

        // serde_json gives us correctly escaped exec-form array syntax
        let entrypoint = serde_json::to_string(&self.entrypoint()).unwrap_or_else(|_| {
            format!("[\"{}\"]", container_path(&self.artifact.runtime_path()))
        });
        let _ = writeln!(out, "ENTRYPOINT {entrypoint}");
    }
}

/// The complete two-stage recipe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipe {
    pub build: BuildStage,
    pub runtime: RuntimeStage,
}

impl Recipe {
    /// Build a recipe where both stages share one artifact definition
    pub fn for_artifact(artifact: CompiledArtifact) -> Self {
        Self {
            build: BuildStage {
                artifact: artifact.clone(),
                ..BuildStage::default()
            },
            runtime: RuntimeStage {
                artifact,
                ..RuntimeStage::default()
            },
        }
    }

    pub fn artifact(&self) -> &CompiledArtifact {
        &self.runtime.artifact
    }

    pub fn validate(&self) -> Result<(), RecipeError> {
        if self.build.artifact != self.runtime.artifact {
            return Err(RecipeError::ArtifactMismatch {
                build: container_path(&self.build.artifact.build_path()),
                runtime: container_path(&self.runtime.artifact.build_path()),
            });
        }
        self.build.artifact.validate()?;

        validate_image_ref("builder_image", &self.build.builder_image)?;
        validate_image_ref("base_image", &self.runtime.base_image)?;

        validate_container_path("build_workdir", &self.build.workdir)
            .map_err(RecipeError::Workdir)?;

        for package in &self.runtime.runtime_packages {
            if !is_valid_package_name(package.trim()) {
                return Err(RecipeError::InvalidPackage(package.clone()));
            }
        }

        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.build.render_into(&mut out);
        out.push('\n');
        self.runtime.render_into(&mut out);
        out
    }
}

fn validate_image_ref(field: &'static str, value: &str) -> Result<(), RecipeError> {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RecipeError::InvalidImage {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Debian package names: lowercase alphanumerics plus `+`, `-`, `.`,
/// optionally pinned with `=version`
fn is_valid_package_name(name: &str) -> bool {
    let (pkg, version) = match name.split_once('=') {
        Some((pkg, version)) => (pkg, Some(version)),
        None => (name, None),
    };
    let pkg_ok = pkg.len() >= 2
        && pkg
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && pkg.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.')
        });
    let version_ok = version.is_none_or(|v| {
        !v.is_empty()
            && v.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '~' | ':'))
    });
    pkg_ok && version_ok
}
