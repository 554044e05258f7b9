// ABOUTME: Container image builds with single-flight dedup per project.
// ABOUTME: A global weighted semaphore caps concurrent external build commands.

use std::sync::Arc;
use std::time::Instant;

use minijinja::{Environment, context};
use tokio::sync::Semaphore;

use crate::command::CommandRunner;
use crate::config::RendererConfig;
use crate::engine::{ContainerEngine, truncate_digest};
use crate::types::ProjectName;

use super::{BuildError, JobRegistry};

/// Builds container images via an external command, one execution per
/// project name per builder instance.
///
/// Concurrent `build` calls for the same project collapse onto one
/// execution; all callers observe the identical result, failures included.
/// Distinct projects run concurrently up to the configured cap.
pub struct DockerBuilder {
    base_dir: std::path::PathBuf,
    dry_run: bool,
    cmd_template: String,
    runner: Arc<dyn CommandRunner>,
    engine: Arc<dyn ContainerEngine>,
    sem: Semaphore,
    jobs: JobRegistry<ProjectName, String>,
}

impl DockerBuilder {
    pub fn new(
        config: &RendererConfig,
        runner: Arc<dyn CommandRunner>,
        engine: Arc<dyn ContainerEngine>,
    ) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            dry_run: config.dry_run,
            cmd_template: config.docker_cmd_template.clone(),
            runner,
            engine,
            sem: Semaphore::new(config.build_concurrency()),
            jobs: JobRegistry::new(),
        }
    }

    /// Ensure the image for `project` is built and tagged, respecting the
    /// concurrency cap. Blocks until this specific build is complete; other
    /// builds may run concurrently.
    pub async fn build(
        &self,
        project: &ProjectName,
        initial_tag: &str,
    ) -> Result<String, BuildError> {
        let (job, created) = self.jobs.get_or_create(project.clone());

        if created {
            let result = self.execute(project, initial_tag).await;
            job.complete(result.clone());
            result
        } else {
            job.wait().await
        }
    }

    async fn execute(&self, project: &ProjectName, initial_tag: &str) -> Result<String, BuildError> {
        tracing::info!(%project, tag = initial_tag, "image build started");

        if self.dry_run {
            tracing::info!(%project, "dry run: skipping image build");
            return Ok(initial_tag.to_string());
        }

        let _permit = self
            .sem
            .acquire()
            .await
            .map_err(|e| BuildError::Internal(format!("build semaphore closed: {}", e)))?;

        let command = Environment::new()
            .render_str(
                &self.cmd_template,
                context! { project => project.as_str(), tag => initial_tag },
            )
            .map_err(|e| BuildError::CommandTemplate(e.to_string()))?;

        let started = Instant::now();
        let output = self.runner.run(&command, &self.base_dir).await?;
        let duration = started.elapsed();

        if !output.success() {
            tracing::error!(%project, status = output.status, ?duration, "image build failed");
            return Err(BuildError::CommandFailed {
                job: project.to_string(),
                status: output.status,
                output: output.combined(),
            });
        }

        let digest = self
            .engine
            .inspect_image(initial_tag)
            .await
            .map_err(|e| BuildError::Engine {
                message: e.to_string(),
                build_output: output.combined(),
            })?;

        let final_tag = format!("{}:{}", project, truncate_digest(&digest));

        self.engine
            .tag_image(initial_tag, &final_tag)
            .await
            .map_err(|e| BuildError::Engine {
                message: e.to_string(),
                build_output: output.combined(),
            })?;

        tracing::info!(%project, final_tag, ?duration, "image build succeeded");
        Ok(final_tag)
    }
}
