// ABOUTME: Shared test doubles: command runner, container engine, store, deployer.
// ABOUTME: The runner counts calls and tracks peak concurrency for cap tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ergates::command::{CommandError, CommandOutput, CommandRunner};
use ergates::deploy::{DeployError, PackageDeployer};
use ergates::engine::{ContainerEngine, EngineError};
use ergates::store::{Archive, ArtifactStore, FileEntry, StoreError};

/// Command runner that records invocations instead of shelling out.
///
/// Tracks the number of simultaneously running commands so tests can assert
/// on the concurrency cap.
pub struct FakeRunner {
    delay: Duration,
    fail_matching: Option<String>,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            fail_matching: None,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Hold each command open for `delay` so overlap becomes observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail any command containing `needle` with exit status 1.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_matching = Some(needle.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str, _dir: &Path) -> Result<CommandOutput, CommandError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().push(command.to_string());

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let failed = self
            .fail_matching
            .as_deref()
            .is_some_and(|needle| command.contains(needle));

        Ok(CommandOutput {
            status: if failed { 1 } else { 0 },
            stdout: format!("ran: {}\n", command),
            stderr: if failed { "boom\n".to_string() } else { String::new() },
        })
    }
}

/// Engine double that hands out a deterministic digest per image reference.
pub struct FakeEngine {
    tags: Mutex<Vec<(String, String)>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            tags: Mutex::new(Vec::new()),
        }
    }

    pub fn tags(&self) -> Vec<(String, String)> {
        self.tags.lock().clone()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn inspect_image(&self, reference: &str) -> Result<String, EngineError> {
        // Stable per reference so repeated builds agree on the final tag.
        let mut digest = String::new();
        for byte in reference.bytes() {
            digest.push_str(&format!("{:02x}", byte));
        }
        digest.truncate(64);
        while digest.len() < 64 {
            digest.push('0');
        }
        Ok(format!("sha256:{}", digest))
    }

    async fn tag_image(&self, source: &str, target: &str) -> Result<(), EngineError> {
        self.tags.lock().push((source.to_string(), target.to_string()));
        Ok(())
    }
}

/// Artifact store backed by a map, with a put counter for idempotency checks.
pub struct InMemoryStore {
    artifacts: Mutex<HashMap<String, Vec<FileEntry>>>,
    puts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            artifacts: Mutex::new(HashMap::new()),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn insert(&self, name: &str, files: Vec<FileEntry>) {
        self.artifacts.lock().insert(name.to_string(), files);
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn list_artifact_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.artifacts.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_artifact(&self, name: &str) -> Result<Archive, StoreError> {
        let files = self
            .artifacts
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Archive::from_entries(files)
    }

    async fn put_artifact(&self, name: &str, files: Vec<FileEntry>) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.artifacts.lock().insert(name.to_string(), files);
        Ok(())
    }
}

/// Deployer double recording each package and its argument document.
pub struct FakeDeployer {
    deploys: Mutex<Vec<(String, String)>>,
}

impl FakeDeployer {
    pub fn new() -> Self {
        Self {
            deploys: Mutex::new(Vec::new()),
        }
    }

    pub fn deploy_count(&self) -> usize {
        self.deploys.lock().len()
    }

    pub fn deploys(&self) -> Vec<(String, String)> {
        self.deploys.lock().clone()
    }
}

#[async_trait]
impl PackageDeployer for FakeDeployer {
    async fn deploy(&self, package: &str, input: &str) -> Result<(), DeployError> {
        self.deploys
            .lock()
            .push((package.to_string(), input.to_string()));
        Ok(())
    }
}
