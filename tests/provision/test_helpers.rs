//! Shared fixtures and helpers for provisioning BDD scenarios.

use hiveden::test_support::ScriptedRuntime;
use hiveden::{DesiredContainerSpec, ProvisionPolicy, ProvisionReport};
use rstest::fixture;

#[derive(Clone, Debug)]
pub enum BatchOutcome {
    Report(ProvisionReport),
    Invalid { index: usize },
    RolledBack { index: usize, message: String },
    Failure(String),
}

#[derive(Clone, Debug)]
pub struct ProvisionContext {
    pub runtime: ScriptedRuntime,
    pub specs: Vec<DesiredContainerSpec>,
    pub policy: ProvisionPolicy,
    pub outcome: Option<BatchOutcome>,
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    ProvisionContext {
        runtime: ScriptedRuntime::new(),
        specs: Vec::new(),
        policy: ProvisionPolicy::default(),
        outcome: None,
    }
}

/// Splits a comma separated step argument into trimmed names.
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Builds a spec whose image is derived from its name.
pub fn named_spec(name: &str) -> DesiredContainerSpec {
    DesiredContainerSpec::new(format!("image-{name}:latest")).with_name(name)
}
