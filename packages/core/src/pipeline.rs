//! End-to-end packaging pipeline
//!
//! Stages run strictly in order and the first failure aborts the run:
//!
//! ```text
//! validate config -> render recipe -> package context -> build image -> verify image
//! ```
//!
//! A failed build never produces a tagged image. An image that builds but
//! fails verification is removed again, so no run leaves a partial result.

use crate::config::{Config, ValidationError, validate_config};
use crate::docker::{
    BuildOptions, ContextError, DockerClient, DockerError, ImageRef, ProgressReporter, Recipe,
    RecipeError, VerificationReport, build_image, create_build_context_async, remove_image,
    verify_image,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Docker(#[from] DockerError),
}

impl PipelineError {
    /// Process exit status for this failure; always non-zero
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) | PipelineError::Recipe(_) => 2,
            PipelineError::Context(_) => 3,
            PipelineError::Docker(DockerError::Build(_)) => 10,
            PipelineError::Docker(DockerError::Copy(_)) => 11,
            PipelineError::Docker(DockerError::Verify(_)) => 12,
            PipelineError::Docker(_) => 1,
        }
    }
}

/// What a pipeline run should do beyond the config
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Source tree containing the Cargo project
    pub source_root: PathBuf,
    /// Tag override for this run
    pub tag: Option<String>,
    pub build: BuildOptions,
    /// Skip post-build verification
    pub skip_verify: bool,
}

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub image: ImageRef,
    pub image_id: String,
    /// `None` when verification was skipped
    pub report: Option<VerificationReport>,
}

pub struct Pipeline {
    config: Config,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(config: Config, options: PipelineOptions) -> Self {
        Self { config, options }
    }

    /// Target image, with the tag override checked like `image_tag`
    pub fn image(&self) -> Result<ImageRef, PipelineError> {
        Ok(self.config.checked_image_ref(self.options.tag.as_deref())?)
    }

    /// Validate inputs and produce the recipe, without touching Docker
    pub fn prepare(&self) -> Result<Recipe, PipelineError> {
        for warning in validate_config(&self.config)? {
            debug!("Config warning on {}: {}", warning.field, warning.message);
        }
        let recipe = self.config.recipe();
        recipe.validate()?;
        Ok(recipe)
    }

    pub async fn run(
        &self,
        client: &DockerClient,
        progress: &mut ProgressReporter,
    ) -> Result<PipelineOutcome, PipelineError> {
        let recipe = self.prepare()?;
        let image = self.image()?;

        let context = create_build_context_async(
            self.options.source_root.clone(),
            recipe.clone(),
            self.config.context_excludes.clone(),
        )
        .await?;
        info!(
            "Packaged {} entries from {}",
            context.entries,
            self.options.source_root.display()
        );

        let image_id = build_image(
            client,
            context,
            &image,
            recipe.artifact(),
            &self.options.build,
            progress,
        )
        .await?;

        let report = if self.options.skip_verify {
            None
        } else {
            progress.update_spinner("verify", "Verifying image...");
            let report = verify_image(client, &image, &recipe)
                .await
                .and_then(VerificationReport::into_result);
            match report {
                Ok(report) => {
                    progress.finish("verify", "Image verified");
                    Some(report)
                }
                Err(e) => {
                    progress.abandon_all("Verification failed");
                    let removal = remove_image(client, &image, true).await;
                    return Err(discard_unverified(e, &image, removal).into());
                }
            }
        };

        Ok(PipelineOutcome {
            image,
            image_id,
            report,
        })
    }
}

/// Attach the outcome of removing an unverified image to its error
fn discard_unverified(
    err: DockerError,
    image: &ImageRef,
    removal: Result<bool, DockerError>,
) -> DockerError {
    let note = match removal {
        Ok(_) => format!("Image {image} was removed."),
        Err(e) => {
            warn!("Failed to remove unverified image {}: {}", image, e);
            format!("Image {image} could not be removed: {e}")
        }
    };
    match err {
        DockerError::Verify(msg) => DockerError::Verify(format!("{msg}\n{note}")),
        other => {
            debug!("{}", note);
            other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_renders_default_recipe() {
        let pipeline = Pipeline::new(Config::default(), PipelineOptions::default());
        let recipe = pipeline.prepare().unwrap();
        assert_eq!(recipe.render(), crate::docker::DOCKERFILE);
    }

    #[test]
    fn prepare_rejects_invalid_config() {
        let config = Config {
            base_image: String::new(),
            ..Config::default()
        };
        let pipeline = Pipeline::new(config, PipelineOptions::default());
        let err = pipeline.prepare().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn tag_override_applies() {
        let options = PipelineOptions {
            tag: Some("ci".to_string()),
            ..PipelineOptions::default()
        };
        let pipeline = Pipeline::new(Config::default(), options);
        assert_eq!(pipeline.image().unwrap().to_string(), "eps_server:ci");
    }

    #[test]
    fn invalid_tag_override_is_a_usage_error() {
        let options = PipelineOptions {
            tag: Some("a:b".to_string()),
            ..PipelineOptions::default()
        };
        let err = Pipeline::new(Config::default(), options).image().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn failed_verification_reports_removed_image() {
        let image = ImageRef::default();
        let err = discard_unverified(
            DockerError::Verify("absent /usr/local/cargo: leaked".to_string()),
            &image,
            Ok(true),
        );
        let DockerError::Verify(msg) = err else {
            panic!("expected a verify error");
        };
        assert!(msg.contains("absent /usr/local/cargo"));
        assert!(msg.contains("Image eps_server:latest was removed."));
    }

    #[test]
    fn failed_removal_is_reported() {
        let err = discard_unverified(
            DockerError::Verify("entrypoint: mismatch".to_string()),
            &ImageRef::default(),
            Err(DockerError::Image("conflict".to_string())),
        );
        assert!(err.to_string().contains("could not be removed"));
        assert_eq!(PipelineError::from(err).exit_code(), 12);
    }

    #[test]
    fn non_verify_errors_pass_through() {
        let err = discard_unverified(DockerError::NotRunning, &ImageRef::default(), Ok(false));
        assert!(matches!(err, DockerError::NotRunning));
    }

    #[test]
    fn exit_codes_distinguish_failures() {
        let build = PipelineError::Docker(DockerError::Build("x".to_string()));
        let copy = PipelineError::Docker(DockerError::Copy("x".to_string()));
        let verify = PipelineError::Docker(DockerError::Verify("x".to_string()));
        assert_eq!(build.exit_code(), 10);
        assert_eq!(copy.exit_code(), 11);
        assert_eq!(verify.exit_code(), 12);
        assert_eq!(
            PipelineError::Docker(DockerError::NotRunning).exit_code(),
            1
        );
    }

    #[tokio::test]
    async fn missing_source_fails_before_docker() {
        // Packaging the context happens before any daemon call; a bad source
        // root must surface as a context error.
        let options = PipelineOptions {
            source_root: PathBuf::from("/nonexistent/eps_server"),
            ..PipelineOptions::default()
        };
        let pipeline = Pipeline::new(Config::default(), options);
        let recipe = pipeline.prepare().unwrap();
        let err = create_build_context_async(
            pipeline.options.source_root.clone(),
            recipe,
            Vec::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            PipelineError::from(err),
            PipelineError::Context(ContextError::MissingSource(_))
        ));
    }
}
