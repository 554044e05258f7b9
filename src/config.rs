// ABOUTME: Renderer configuration: enclave, directories, dry-run, concurrency.
// ABOUTME: Command templates for each build action are overridable with fixed defaults.

use std::path::{Path, PathBuf};

use crate::retry::RetryPolicy;

/// Default build command for container images.
pub const DEFAULT_DOCKER_CMD_TEMPLATE: &str = "just {{ project }}-image {{ tag }}";

/// Default build command for the contract bundle.
pub const DEFAULT_CONTRACTS_CMD_TEMPLATE: &str = "just {{ contracts_path }}/build-no-tests";

/// Default build command for proof pre-state files.
pub const DEFAULT_PRESTATE_CMD_TEMPLATE: &str = "just {{ build_dir }}/prestate-build";

/// Contracts package location relative to the base directory.
pub const RELATIVE_CONTRACTS_PATH: &str = "packages/contracts-bedrock";

/// Build-cache manifest whose content addresses the contract bundle.
pub const SOLIDITY_CACHE_PATH: &str = "cache/solidity-files-cache.json";

pub const MIN_BUILD_CONCURRENCY: usize = 1;
pub const MAX_BUILD_CONCURRENCY: usize = 32;
pub const DEFAULT_BUILD_CONCURRENCY: usize = 8;

/// Configuration shared by the renderer and the build actions.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Target enclave name; also the tag suffix for freshly built images.
    pub enclave: String,
    /// Directory build commands execute in.
    pub base_dir: PathBuf,
    /// Skip all real execution and return deterministic placeholders.
    pub dry_run: bool,
    pub docker_cmd_template: String,
    pub contracts_cmd_template: String,
    pub prestate_cmd_template: String,
    pub retry: RetryPolicy,
    build_concurrency: usize,
}

impl RendererConfig {
    pub fn new(enclave: &str) -> Self {
        Self {
            enclave: enclave.to_string(),
            base_dir: PathBuf::from("."),
            dry_run: false,
            docker_cmd_template: DEFAULT_DOCKER_CMD_TEMPLATE.to_string(),
            contracts_cmd_template: DEFAULT_CONTRACTS_CMD_TEMPLATE.to_string(),
            prestate_cmd_template: DEFAULT_PRESTATE_CMD_TEMPLATE.to_string(),
            retry: RetryPolicy::default(),
            build_concurrency: DEFAULT_BUILD_CONCURRENCY,
        }
    }

    pub fn with_base_dir(mut self, base_dir: &Path) -> Self {
        self.base_dir = base_dir.to_path_buf();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Cap on concurrently running external build commands, clamped to a
    /// sane range.
    pub fn with_build_concurrency(mut self, limit: usize) -> Self {
        self.build_concurrency = limit.clamp(MIN_BUILD_CONCURRENCY, MAX_BUILD_CONCURRENCY);
        self
    }

    pub fn with_docker_cmd_template(mut self, template: &str) -> Self {
        self.docker_cmd_template = template.to_string();
        self
    }

    pub fn with_contracts_cmd_template(mut self, template: &str) -> Self {
        self.contracts_cmd_template = template.to_string();
        self
    }

    pub fn with_prestate_cmd_template(mut self, template: &str) -> Self {
        self.prestate_cmd_template = template.to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build_concurrency(&self) -> usize {
        self.build_concurrency
    }

    /// Directory holding the contract package sources and build outputs.
    pub fn contracts_dir(&self) -> PathBuf {
        self.base_dir.join(RELATIVE_CONTRACTS_PATH)
    }

    /// The build-cache manifest file used for content addressing.
    pub fn solidity_cache_file(&self) -> PathBuf {
        self.contracts_dir().join(SOLIDITY_CACHE_PATH)
    }
}
