// ABOUTME: Build actions: container images, contract bundles, proof pre-states.
// ABOUTME: All builds flow through single-flight jobs so work runs at most once.

mod contracts;
mod docker;
mod error;
mod job;
mod prestate;

pub use contracts::{ContractBuilder, DRY_RUN_CONTRACTS_URL};
pub use docker::DockerBuilder;
pub use error::BuildError;
pub use job::{Job, JobRegistry};
pub use prestate::{PLACEHOLDER_HASH, PRESTATE_URL_PATH, PrestateBuilder, PrestateInfo};
