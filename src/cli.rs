// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ergates")]
#[command(about = "Render devnet templates, building the artifacts they reference")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Template document to render
    #[arg(long)]
    pub template: PathBuf,

    /// Optional JSON data file exposed to the template
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Target enclave name
    #[arg(long, default_value = "devnet")]
    pub enclave: String,

    /// Directory build commands execute in
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Directory build outputs (prestate files) are written to
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Skip all builds and emit deterministic placeholders
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum concurrently running build commands
    #[arg(long)]
    pub build_concurrency: Option<usize>,

    /// Emit the rendered text verbatim instead of canonical YAML
    #[arg(long)]
    pub raw: bool,

    /// Directory backing the local artifact store
    #[arg(long, default_value = ".ergates/artifacts")]
    pub store_dir: PathBuf,

    /// Write the rendered document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template, running the builds it references
    Render(RenderArgs),

    /// Render a template, then deploy the build outputs to the enclave
    Deploy(RenderArgs),
}
