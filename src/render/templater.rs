// ABOUTME: Two-pass template renderer that drives the build actions.
// ABOUTME: Pass one collects jobs behind placeholders; pass two resolves them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};
use parking_lot::Mutex;
use tokio::task::JoinSet;

use crate::build::{
    BuildError, ContractBuilder, DockerBuilder, JobRegistry, PRESTATE_URL_PATH, PrestateBuilder,
    PrestateInfo,
};
use crate::config::RendererConfig;
use crate::types::ProjectName;

use super::error::RenderError;
use super::pass::RenderPass;

/// Produces the URL a path on the content fileserver will be served from.
pub type UrlBuilder = Arc<dyn Fn(&[&str]) -> String + Send + Sync>;

/// Jobs registered by template callbacks, shared across both passes and
/// across every template rendered by one `Templater`.
struct RenderState {
    pass: Mutex<RenderPass>,
    image_jobs: JobRegistry<ProjectName, String>,
    contract_jobs: JobRegistry<(), String>,
    prestate_jobs: JobRegistry<PathBuf, PrestateInfo>,
}

/// Renders documents whose template expressions trigger builds.
///
/// Rendering is a two-pass protocol. The first pass registers one job per
/// distinct build target and substitutes placeholders; the renderer then
/// executes every registered job and waits for all of them. The second pass
/// re-renders with the completed results. A document with no template
/// markers skips all of this and passes through untouched.
pub struct Templater {
    config: RendererConfig,
    docker: Arc<DockerBuilder>,
    contracts: Arc<ContractBuilder>,
    prestate: Arc<PrestateBuilder>,
    build_dir: PathBuf,
    url_builder: UrlBuilder,
    state: Arc<RenderState>,
}

impl Templater {
    pub fn new(
        config: RendererConfig,
        docker: Arc<DockerBuilder>,
        contracts: Arc<ContractBuilder>,
        prestate: Arc<PrestateBuilder>,
        build_dir: &Path,
        url_builder: UrlBuilder,
    ) -> Self {
        Self {
            config,
            docker,
            contracts,
            prestate,
            build_dir: build_dir.to_path_buf(),
            url_builder,
            state: Arc::new(RenderState {
                pass: Mutex::new(RenderPass::Collecting),
                image_jobs: JobRegistry::new(),
                contract_jobs: JobRegistry::new(),
                prestate_jobs: JobRegistry::new(),
            }),
        }
    }

    /// Number of distinct image build jobs registered so far.
    pub fn image_job_count(&self) -> usize {
        self.state.image_jobs.len()
    }

    /// Render `template_path` with optional JSON data.
    ///
    /// With `raw_output` the rendered text is returned verbatim; otherwise it
    /// is parsed as YAML and re-serialized in canonical form.
    pub async fn render(
        &self,
        template_path: &Path,
        data_path: Option<&Path>,
        raw_output: bool,
    ) -> Result<String, RenderError> {
        let source = read_template(template_path)?;

        // Plain documents are passed through byte for byte.
        if !source.contains("{{") && !source.contains("{%") {
            tracing::debug!(template = %template_path.display(), "no template markers, passing through");
            return Ok(source);
        }

        let data = load_data(data_path)?;
        let env = self.environment();

        *self.state.pass.lock() = RenderPass::Collecting;
        env.render_str(&source, &data)
            .map_err(|e| RenderError::Template(render_error_chain(&e)))?;

        self.execute_image_jobs().await?;
        self.await_all_jobs().await?;

        *self.state.pass.lock() = RenderPass::Resolving;
        let rendered = env
            .render_str(&source, &data)
            .map_err(|e| RenderError::Template(render_error_chain(&e)))?;

        if raw_output {
            return Ok(rendered);
        }
        canonicalize(&rendered)
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        // Raw output must match the rendered text byte for byte.
        env.set_keep_trailing_newline(true);

        {
            let state = self.state.clone();
            env.add_function(
                "local_docker_image",
                move |project: String| -> Result<String, minijinja::Error> {
                    let name = ProjectName::new(&project).map_err(|e| {
                        minijinja::Error::new(
                            ErrorKind::InvalidOperation,
                            format!("invalid project name '{}': {}", project, e),
                        )
                    })?;
                    let (job, _) = state.image_jobs.get_or_create(name);
                    match job.try_result() {
                        Some(Ok(tag)) => Ok(tag),
                        Some(Err(e)) => Err(minijinja::Error::new(
                            ErrorKind::InvalidOperation,
                            e.to_string(),
                        )),
                        None => match *state.pass.lock() {
                            RenderPass::Collecting => {
                                Ok(format!("__PLACEHOLDER_DOCKER_IMAGE_{}__", project))
                            }
                            RenderPass::Resolving => Err(minijinja::Error::new(
                                ErrorKind::InvalidOperation,
                                format!("image build for {} did not complete", project),
                            )),
                        },
                    }
                },
            );
        }

        {
            let state = self.state.clone();
            let contracts = self.contracts.clone();
            env.add_function(
                "local_contract_artifacts",
                move |_layer: Option<String>| -> Result<String, minijinja::Error> {
                    let job = state.contract_jobs.get_or_spawn((), {
                        let contracts = contracts.clone();
                        move || async move { contracts.build().await }
                    });
                    match job.try_result() {
                        Some(Ok(url)) => Ok(url),
                        Some(Err(e)) => Err(minijinja::Error::new(
                            ErrorKind::InvalidOperation,
                            e.to_string(),
                        )),
                        // The bundle name is content-derived, so the final
                        // URL is known before the build finishes.
                        None => contracts.artifact_url().map_err(|e| {
                            minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string())
                        }),
                    }
                },
            );
        }

        {
            let state = self.state.clone();
            let prestate = self.prestate.clone();
            let build_dir = self.build_dir.clone();
            let url_builder = self.url_builder.clone();
            env.add_function(
                "local_prestate",
                move || -> Result<Value, minijinja::Error> {
                    let url = url_builder(PRESTATE_URL_PATH);
                    let job = state.prestate_jobs.get_or_spawn(build_dir.clone(), {
                        let prestate = prestate.clone();
                        let dir = build_dir.clone();
                        let url = url.clone();
                        move || async move { prestate.build(&dir, url).await }
                    });
                    match job.try_result() {
                        Some(Ok(info)) => Ok(Value::from_serialize(&info)),
                        Some(Err(e)) => Err(minijinja::Error::new(
                            ErrorKind::InvalidOperation,
                            e.to_string(),
                        )),
                        None => Ok(Value::from_serialize(&PrestateBuilder::placeholder(url))),
                    }
                },
            );
        }

        env
    }

    /// Run every registered image build; collection only registered them.
    async fn execute_image_jobs(&self) -> Result<(), RenderError> {
        let mut set = JoinSet::new();
        for (project, job) in self.state.image_jobs.entries() {
            let docker = self.docker.clone();
            let enclave = self.config.enclave.clone();
            set.spawn(async move {
                let tag = project.image_tag(&enclave);
                let result = docker.build(&project, &tag).await;
                job.complete(result);
            });
        }

        while let Some(joined) = set.join_next().await {
            joined.map_err(|e| RenderError::Build {
                job: "image".to_string(),
                source: BuildError::Internal(format!("build task panicked: {}", e)),
            })?;
        }
        Ok(())
    }

    /// Completion barrier: every job from every category must have finished,
    /// and the first failure aborts the render.
    async fn await_all_jobs(&self) -> Result<(), RenderError> {
        for (project, job) in self.state.image_jobs.entries() {
            job.wait().await.map_err(|e| RenderError::Build {
                job: project.to_string(),
                source: e,
            })?;
        }
        for (_, job) in self.state.contract_jobs.entries() {
            job.wait().await.map_err(|e| RenderError::Build {
                job: "contracts".to_string(),
                source: e,
            })?;
        }
        for (dir, job) in self.state.prestate_jobs.entries() {
            job.wait().await.map_err(|e| RenderError::Build {
                job: format!("prestate({})", dir.display()),
                source: e,
            })?;
        }
        Ok(())
    }
}

fn read_template(path: &Path) -> Result<String, RenderError> {
    if !path.is_file() {
        return Err(RenderError::TemplateNotFound(path.to_path_buf()));
    }
    let source = std::fs::read_to_string(path).map_err(|e| RenderError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if source.trim().is_empty() {
        return Err(RenderError::TemplateEmpty(path.to_path_buf()));
    }
    Ok(source)
}

fn load_data(data_path: Option<&Path>) -> Result<Value, RenderError> {
    let Some(path) = data_path else {
        return Ok(Value::from_serialize(&serde_json::Map::new()));
    };
    let raw = std::fs::read_to_string(path).map_err(|e| RenderError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let data: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| RenderError::Data(e.to_string()))?;
    Ok(Value::from_serialize(&data))
}

/// Parse and re-serialize as YAML so output formatting is independent of the
/// template's whitespace.
fn canonicalize(rendered: &str) -> Result<String, RenderError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(rendered).map_err(|e| RenderError::Canonicalize(e.to_string()))?;
    serde_yaml::to_string(&value).map_err(|e| RenderError::Canonicalize(e.to_string()))
}

/// Template errors bury the interesting cause one level down.
fn render_error_chain(err: &minijinja::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_normalizes_formatting() {
        let out = canonicalize("a:   1\nb:\n  - x\n").unwrap();
        assert_eq!(out, "a: 1\nb:\n- x\n");
    }

    #[test]
    fn canonicalize_rejects_invalid_yaml() {
        assert!(canonicalize("a: [unclosed").is_err());
    }
}
