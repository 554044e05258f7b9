// ABOUTME: Entry point for the ergates CLI application.
// ABOUTME: Parses arguments, wires the builders together and dispatches.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RenderArgs};
use ergates::build::{ContractBuilder, DockerBuilder, PrestateBuilder};
use ergates::command::ShellRunner;
use ergates::config::RendererConfig;
use ergates::deploy::{CommandPackageDeployer, FileServer};
use ergates::engine::BollardEngine;
use ergates::error::Result;
use ergates::render::{Templater, UrlBuilder};
use ergates::store::{ArtifactStore, DirStore};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render(args) => {
            let wired = wire(&args)?;
            let rendered = wired
                .templater
                .render(&args.template, args.data.as_deref(), args.raw)
                .await?;
            emit(&args, &rendered)
        }
        Commands::Deploy(args) => {
            let wired = wire(&args)?;
            let rendered = wired
                .templater
                .render(&args.template, args.data.as_deref(), args.raw)
                .await?;

            let runner = Arc::new(ShellRunner);
            let deployer = Arc::new(CommandPackageDeployer::new(
                runner,
                &args.base_dir,
                &args.enclave,
            ));
            let fileserver = FileServer::new(
                &args.base_dir,
                args.dry_run,
                wired.config.retry,
                wired.store,
                deployer,
            );

            let previous = fileserver.previous_state().await;
            let deployed = fileserver.deploy(&wired.build_dir, &previous).await?;
            if deployed {
                tracing::info!("fileserver deployed");
            }

            emit(&args, &rendered)
        }
    }
}

struct Wired {
    config: RendererConfig,
    store: Arc<dyn ArtifactStore>,
    build_dir: PathBuf,
    templater: Templater,
}

fn wire(args: &RenderArgs) -> Result<Wired> {
    let mut config = RendererConfig::new(&args.enclave)
        .with_base_dir(&args.base_dir)
        .with_dry_run(args.dry_run);
    if let Some(limit) = args.build_concurrency {
        config = config.with_build_concurrency(limit);
    }

    let build_dir = args
        .build_dir
        .clone()
        .unwrap_or_else(|| args.base_dir.join(".ergates/build"));

    let runner = Arc::new(ShellRunner);
    let engine = Arc::new(BollardEngine::connect()?);
    let store: Arc<dyn ArtifactStore> = Arc::new(DirStore::new(args.store_dir.clone()));

    let docker = Arc::new(DockerBuilder::new(&config, runner.clone(), engine));
    let contracts = Arc::new(ContractBuilder::new(
        config.clone(),
        runner.clone(),
        store.clone(),
    ));
    let prestate = Arc::new(PrestateBuilder::new(config.clone(), runner));

    let url_builder: UrlBuilder = Arc::new(|parts| FileServer::url(parts));
    let templater = Templater::new(
        config.clone(),
        docker,
        contracts,
        prestate,
        &build_dir,
        url_builder,
    );

    Ok(Wired {
        config,
        store,
        build_dir,
        templater,
    })
}

fn emit(args: &RenderArgs, rendered: &str) -> Result<()> {
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            Ok(())
        }
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}
