//! Core library for the hiveden container lifecycle manager.
//!
//! The crate drives a Docker-compatible runtime through a small capability
//! trait, marks every container it creates with an ownership label, and
//! moves between live state and a declarative YAML manifest: manifests are
//! provisioned in batch and the managed containers can be exported back.

pub mod config;
pub mod docker;
pub mod export;
pub mod logging;
pub mod manager;
pub mod manifest;
pub mod provision;
pub mod runtime;
pub mod test_support;

pub use config::{ConfigError, HivedenConfig};
pub use docker::{DockerRuntime, DockerRuntimeError};
pub use export::{ExportError, StateExporter};
pub use manager::{
    ContainerRecord, LifecycleError, LifecycleManager, OWNERSHIP_LABEL, OWNERSHIP_TOKEN,
    UNKNOWN_OWNER,
};
pub use manifest::{DesiredContainerSpec, EnvVar, Manifest, ManifestError, SpecError};
pub use provision::{
    BatchProvisioner, ProvisionError, ProvisionOutcome, ProvisionPolicy, ProvisionReport,
    ProvisionResult,
};
pub use runtime::{ContainerRuntime, ContainerSummary, CreateRequest};
