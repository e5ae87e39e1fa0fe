//! Configuration schema for eps-deploy
//!
//! Defines the structure and defaults for the config.json file.

use crate::artifact::{ARTIFACT_NAME, CompiledArtifact, DEFAULT_INSTALL_ROOT, DEFAULT_RUNTIME_DIR};
use super::validation::ValidationError;
use crate::docker::{
    BASE_IMAGE_DEFAULT, BUILD_WORKDIR_DEFAULT, BUILDER_IMAGE_DEFAULT, BuildStage,
    DEFAULT_STOP_TIMEOUT_SECS, IMAGE_NAME_DEFAULT, IMAGE_TAG_DEFAULT, ImageRef, Recipe,
    RuntimeStage, is_valid_repository, is_valid_tag,
};
use serde::{Deserialize, Serialize};

/// Main configuration structure for eps-deploy
///
/// Serialized to/from `~/.config/eps-deploy/config.json` (JSONC accepted)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Config file version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Executable produced by `cargo install` (default: "eps_server")
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,

    /// Cargo install root in the builder image (default: "/usr/local/cargo")
    #[serde(default = "default_install_root")]
    pub install_root: String,

    /// Directory the artifact is copied into at runtime (default: "/usr/local/bin")
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: String,

    /// Rust toolchain image for the build stage
    #[serde(default = "default_builder_image")]
    pub builder_image: String,

    /// Working directory the source tree is copied into
    #[serde(default = "default_build_workdir")]
    pub build_workdir: String,

    /// Minimal base image for the runtime stage
    #[serde(default = "default_base_image")]
    pub base_image: String,

    /// Extra OS packages for the runtime stage (default: none)
    #[serde(default)]
    pub runtime_packages: Vec<String>,

    /// Local image repository (default: "eps_server")
    #[serde(default = "default_image_name")]
    pub image_name: String,

    /// Image tag (default: "latest")
    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    /// Top-level source entries left out of the build context (default: none)
    #[serde(default)]
    pub context_excludes: Vec<String>,

    /// Graceful stop timeout in seconds (default: 10)
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: i64,
}

fn default_version() -> u32 {
    1
}

fn default_artifact_name() -> String {
    ARTIFACT_NAME.to_string()
}

fn default_install_root() -> String {
    DEFAULT_INSTALL_ROOT.to_string()
}

fn default_runtime_dir() -> String {
    DEFAULT_RUNTIME_DIR.to_string()
}

fn default_builder_image() -> String {
    BUILDER_IMAGE_DEFAULT.to_string()
}

fn default_build_workdir() -> String {
    BUILD_WORKDIR_DEFAULT.to_string()
}

fn default_base_image() -> String {
    BASE_IMAGE_DEFAULT.to_string()
}

fn default_image_name() -> String {
    IMAGE_NAME_DEFAULT.to_string()
}

fn default_image_tag() -> String {
    IMAGE_TAG_DEFAULT.to_string()
}

fn default_stop_timeout_secs() -> i64 {
    DEFAULT_STOP_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            artifact_name: default_artifact_name(),
            install_root: default_install_root(),
            runtime_dir: default_runtime_dir(),
            builder_image: default_builder_image(),
            build_workdir: default_build_workdir(),
            base_image: default_base_image(),
            runtime_packages: Vec::new(),
            image_name: default_image_name(),
            image_tag: default_image_tag(),
            context_excludes: Vec::new(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifact(&self) -> CompiledArtifact {
        CompiledArtifact::new(&self.artifact_name)
            .with_install_root(&self.install_root)
            .with_runtime_dir(&self.runtime_dir)
    }

    pub fn recipe(&self) -> Recipe {
        let artifact = self.artifact();
        Recipe {
            build: BuildStage {
                builder_image: self.builder_image.clone(),
                workdir: self.build_workdir.clone(),
                artifact: artifact.clone(),
            },
            runtime: RuntimeStage {
                base_image: self.base_image.clone(),
                runtime_packages: self.runtime_packages.clone(),
                artifact,
            },
        }
    }

    /// Image reference, optionally overriding the configured tag
    pub fn image_ref(&self, tag: Option<&str>) -> ImageRef {
        ImageRef::new(&self.image_name, tag.unwrap_or(&self.image_tag))
    }

    /// Like `image_ref`, but rejects names and tags the daemon would refuse
    ///
    /// An override is reported against `--tag` rather than `image_tag`.
    pub fn checked_image_ref(&self, tag: Option<&str>) -> Result<ImageRef, ValidationError> {
        if !is_valid_repository(&self.image_name) {
            return Err(ValidationError {
                field: "image_name".to_string(),
                message: format!(
                    "'{}' is not a valid image repository (lowercase letters and digits, \
                     separated by '.', '_' or '-')",
                    self.image_name
                ),
                fix: "set image_name to e.g. \"eps_server\"".to_string(),
            });
        }

        let (field, value) = match tag {
            Some(tag) => ("--tag", tag),
            None => ("image_tag", self.image_tag.as_str()),
        };
        if !is_valid_tag(value) {
            return Err(ValidationError {
                field: field.to_string(),
                message: format!("'{value}' is not a valid image tag"),
                fix: "use letters, digits, '_', '.' or '-', e.g. \"latest\"".to_string(),
            });
        }

        Ok(self.image_ref(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::DOCKERFILE;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.artifact_name, "eps_server");
        assert_eq!(config.install_root, "/usr/local/cargo");
        assert_eq!(config.runtime_dir, "/usr/local/bin");
        assert!(config.runtime_packages.is_empty());
        assert!(config.context_excludes.is_empty());
        assert_eq!(config.stop_timeout_secs, 10);
    }

    #[test]
    fn test_default_recipe_is_embedded_dockerfile() {
        assert_eq!(Config::default().recipe().render(), DOCKERFILE);
    }

    #[test]
    fn test_deserialize_with_missing_optional_fields() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip_with_overrides() {
        let config = Config {
            runtime_packages: vec!["ca-certificates".to_string()],
            image_tag: "v1".to_string(),
            context_excludes: vec!["target".to_string()],
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<Config, _> = serde_json::from_str(r#"{"port": 3000}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_image_ref_override() {
        let config = Config::default();
        assert_eq!(config.image_ref(None).to_string(), "eps_server:latest");
        assert_eq!(config.image_ref(Some("dev")).to_string(), "eps_server:dev");
    }

    #[test]
    fn test_checked_image_ref_rejects_bad_override() {
        let config = Config::default();
        assert_eq!(
            config.checked_image_ref(Some("ci")).unwrap().to_string(),
            "eps_server:ci"
        );

        let err = config.checked_image_ref(Some("a:b")).unwrap_err();
        assert_eq!(err.field, "--tag");
        let err = config.checked_image_ref(Some("x y")).unwrap_err();
        assert_eq!(err.field, "--tag");
    }

    #[test]
    fn test_checked_image_ref_rejects_uppercase_name() {
        let config = Config {
            image_name: "EPS_Server".to_string(),
            ..Config::default()
        };
        assert_eq!(config.checked_image_ref(None).unwrap_err().field, "image_name");
    }
}
