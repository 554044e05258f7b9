// ABOUTME: Integration tests for the two-pass renderer: placeholder
// ABOUTME: substitution, job dedup, passthrough and canonical output.

mod support;

use std::path::Path;
use std::sync::Arc;

use ergates::build::{ContractBuilder, DockerBuilder, PrestateBuilder};
use ergates::config::RendererConfig;
use ergates::deploy::FileServer;
use ergates::render::{RenderError, Templater, UrlBuilder};

use support::{FakeEngine, FakeRunner, InMemoryStore};

struct Harness {
    templater: Templater,
    runner: Arc<FakeRunner>,
    _base: tempfile::TempDir,
    _build: tempfile::TempDir,
}

fn harness(configure: impl FnOnce(RendererConfig) -> RendererConfig) -> Harness {
    let base = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();

    let config = configure(RendererConfig::new("e1").with_base_dir(base.path()));
    let runner = Arc::new(FakeRunner::new());
    let engine = Arc::new(FakeEngine::new());
    let store = Arc::new(InMemoryStore::new());

    let docker = Arc::new(DockerBuilder::new(&config, runner.clone(), engine));
    let contracts = Arc::new(ContractBuilder::new(config.clone(), runner.clone(), store));
    let prestate = Arc::new(PrestateBuilder::new(config.clone(), runner.clone()));
    let url_builder: UrlBuilder = Arc::new(|parts| FileServer::url(parts));

    let templater = Templater::new(
        config,
        docker,
        contracts,
        prestate,
        build.path(),
        url_builder,
    );

    Harness {
        templater,
        runner,
        _base: base,
        _build: build,
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn repeated_image_references_collapse_onto_one_job() {
    let h = harness(|c| c.with_dry_run(true));
    let dir = tempfile::tempdir().unwrap();
    let template = write_file(
        dir.path(),
        "devnet.yaml.tmpl",
        concat!(
            "services:\n",
            "  a: {{ local_docker_image(\"svc-a\") }}\n",
            "  b: {{ local_docker_image(\"svc-a\") }}\n",
            "  c: {{ local_docker_image(\"svc-b\") }}\n",
            "  d: {{ local_docker_image(\"svc-a\") }}\n",
        ),
    );

    let out = h.templater.render(&template, None, false).await.unwrap();

    let doc: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
    assert_eq!(doc["services"]["a"], "svc-a:e1");
    assert_eq!(doc["services"]["d"], "svc-a:e1");
    assert_eq!(doc["services"]["c"], "svc-b:e1");
    assert!(!out.contains("__PLACEHOLDER"));
    assert_eq!(h.templater.image_job_count(), 2);
}

#[tokio::test]
async fn plain_documents_pass_through_untouched() {
    let h = harness(|c| c);
    let dir = tempfile::tempdir().unwrap();
    let source = "plainly:   formatted\n# comment survives\n";
    let template = write_file(dir.path(), "plain.yaml", source);

    let out = h.templater.render(&template, None, false).await.unwrap();

    assert_eq!(out, source);
    assert_eq!(h.runner.call_count(), 0);
}

#[tokio::test]
async fn missing_and_empty_templates_are_rejected() {
    let h = harness(|c| c);
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("nope.yaml");
    assert!(matches!(
        h.templater.render(&missing, None, false).await,
        Err(RenderError::TemplateNotFound(_))
    ));

    let empty = write_file(dir.path(), "empty.yaml", "  \n\n");
    assert!(matches!(
        h.templater.render(&empty, None, false).await,
        Err(RenderError::TemplateEmpty(_))
    ));
}

#[tokio::test]
async fn undefined_data_references_fail_the_render() {
    let h = harness(|c| c.with_dry_run(true));
    let dir = tempfile::tempdir().unwrap();
    let template = write_file(dir.path(), "t.yaml", "x: {{ values.missing }}\n");

    let err = h.templater.render(&template, None, false).await.unwrap_err();
    assert!(matches!(err, RenderError::Template(_)));
}

#[tokio::test]
async fn data_file_values_are_exposed_to_the_template() {
    let h = harness(|c| c.with_dry_run(true));
    let dir = tempfile::tempdir().unwrap();
    let template = write_file(dir.path(), "t.yaml", "greeting: hello {{ name }}\n");
    let data = write_file(dir.path(), "data.json", "{\"name\": \"world\"}");

    let out = h
        .templater
        .render(&template, Some(&data), false)
        .await
        .unwrap();
    assert_eq!(out, "greeting: hello world\n");
}

#[tokio::test]
async fn dry_run_contracts_use_the_fixed_url() {
    let h = harness(|c| c.with_dry_run(true));
    let dir = tempfile::tempdir().unwrap();
    let template = write_file(
        dir.path(),
        "t.yaml",
        "url: {{ local_contract_artifacts(\"l1\") }}\n",
    );

    let out = h.templater.render(&template, None, false).await.unwrap();
    assert_eq!(out, "url: artifact://contracts\n");
}

#[tokio::test]
async fn dry_run_prestate_yields_placeholder_hashes() {
    let h = harness(|c| c.with_dry_run(true));
    let dir = tempfile::tempdir().unwrap();
    let template = write_file(
        dir.path(),
        "t.yaml",
        concat!(
            "url: {{ local_prestate().url }}\n",
            "hash: {{ local_prestate().hashes.prestate_mt64 }}\n",
        ),
    );

    let out = h.templater.render(&template, None, false).await.unwrap();

    let doc: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
    assert_eq!(doc["url"], "http://fileserver/proofs/op-program/cannon");
    assert_eq!(doc["hash"], "dry_run_placeholder");
}

#[tokio::test]
async fn contracts_resolve_to_a_content_derived_url() {
    let base = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    let contracts_dir = base.path().join("packages/contracts-bedrock");
    std::fs::create_dir_all(contracts_dir.join("cache")).unwrap();
    std::fs::write(contracts_dir.join("cache/solidity-files-cache.json"), b"{}").unwrap();

    let config = RendererConfig::new("e1").with_base_dir(base.path());
    let runner = Arc::new(FakeRunner::new());
    let store = Arc::new(InMemoryStore::new());
    let docker = Arc::new(DockerBuilder::new(
        &config,
        runner.clone(),
        Arc::new(FakeEngine::new()),
    ));
    let contracts = Arc::new(ContractBuilder::new(config.clone(), runner.clone(), store));
    let prestate = Arc::new(PrestateBuilder::new(config.clone(), runner.clone()));
    let url_builder: UrlBuilder = Arc::new(|parts| FileServer::url(parts));
    let templater = Templater::new(config, docker, contracts, prestate, build.path(), url_builder);

    let dir = tempfile::tempdir().unwrap();
    let template = write_file(dir.path(), "t.yaml", "url: {{ local_contract_artifacts() }}\n");

    let out = templater.render(&template, None, false).await.unwrap();

    let doc: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
    let url = doc["url"].as_str().unwrap();
    let hash = url.strip_prefix("artifact://contracts-").unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn raw_output_skips_canonicalization() {
    let h = harness(|c| c.with_dry_run(true));
    let dir = tempfile::tempdir().unwrap();
    let template = write_file(
        dir.path(),
        "t.conf",
        "image   =   {{ local_docker_image(\"svc-a\") }}\n",
    );

    let out = h.templater.render(&template, None, true).await.unwrap();
    assert_eq!(out, "image   =   svc-a:e1\n");
}

#[tokio::test]
async fn build_failures_abort_before_the_final_pass() {
    let base = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();

    let config = RendererConfig::new("e1").with_base_dir(base.path());
    let runner = Arc::new(FakeRunner::new().failing_on("-image"));
    let store = Arc::new(InMemoryStore::new());
    let docker = Arc::new(DockerBuilder::new(
        &config,
        runner.clone(),
        Arc::new(FakeEngine::new()),
    ));
    let contracts = Arc::new(ContractBuilder::new(config.clone(), runner.clone(), store));
    let prestate = Arc::new(PrestateBuilder::new(config.clone(), runner.clone()));
    let url_builder: UrlBuilder = Arc::new(|parts| FileServer::url(parts));
    let templater = Templater::new(config, docker, contracts, prestate, build.path(), url_builder);

    let dir = tempfile::tempdir().unwrap();
    let template = write_file(
        dir.path(),
        "t.yaml",
        "image: {{ local_docker_image(\"svc-a\") }}\n",
    );

    let err = templater.render(&template, None, false).await.unwrap_err();
    match err {
        RenderError::Build { job, .. } => assert_eq!(job, "svc-a"),
        other => panic!("expected a build error, got {other}"),
    }
}
