//! BDD step definitions for batch provisioning.

use hiveden::test_support::RuntimeCall;
use hiveden::{BatchProvisioner, LifecycleManager, ProvisionError, ProvisionPolicy};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{BatchOutcome, ProvisionContext, named_spec, split_names};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a manifest with containers \"{names}\"")]
fn manifest_with_containers(mut provision_context: ProvisionContext, names: String) -> ProvisionContext {
    provision_context.specs = split_names(&names)
        .iter()
        .map(|name| named_spec(name))
        .collect();
    provision_context
}

#[given("creation fails for \"{name}\"")]
fn creation_fails(provision_context: ProvisionContext, name: String) -> ProvisionContext {
    provision_context.runtime.fail_create_for(name.trim());
    provision_context
}

#[given("starting fails for \"{name}\"")]
fn starting_fails(provision_context: ProvisionContext, name: String) -> ProvisionContext {
    provision_context.runtime.fail_start_for(name.trim());
    provision_context
}

#[given("the all-or-nothing policy")]
fn all_or_nothing(mut provision_context: ProvisionContext) -> ProvisionContext {
    provision_context.policy = ProvisionPolicy::AllOrNothing;
    provision_context
}

#[given("entry {position:u32} has no image")]
fn entry_has_no_image(mut provision_context: ProvisionContext, position: u32) -> ProvisionContext {
    let index = to_index(position);
    let Some(spec) = provision_context.specs.get_mut(index) else {
        panic!("test setup requires entry {position}");
    };
    spec.image = String::new();
    provision_context
}

#[when("I provision the manifest")]
fn provision_manifest(mut provision_context: ProvisionContext) -> ProvisionContext {
    let runtime = Runtime::new().unwrap_or_else(|err| panic!("tokio runtime: {err}"));
    let manager = LifecycleManager::new(provision_context.runtime.clone());
    let provisioner = BatchProvisioner::new(&manager).with_policy(provision_context.policy);
    let result = runtime.block_on(provisioner.provision_all(&provision_context.specs));

    provision_context.outcome = Some(match result {
        Ok(report) => BatchOutcome::Report(report),
        Err(ProvisionError::Invalid { index, .. }) => BatchOutcome::Invalid { index },
        Err(ProvisionError::RolledBack { index, message, .. }) => {
            BatchOutcome::RolledBack { index, message }
        }
        Err(other) => BatchOutcome::Failure(other.to_string()),
    });
    provision_context
}

#[then("the report lists {count:u32} results in manifest order")]
fn report_lists_results(provision_context: &ProvisionContext, count: u32) -> Result<(), StepError> {
    let report = report(provision_context)?;
    let names: Vec<&str> = report
        .results()
        .iter()
        .map(|result| result.spec.name.as_str())
        .collect();
    let expected: Vec<&str> = provision_context
        .specs
        .iter()
        .map(|spec| spec.name.as_str())
        .collect();
    if names.len() == count as usize && names == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} results matching {expected:?}, got {names:?}"
        )))
    }
}

#[then("entry {position:u32} reports a creation error")]
fn entry_reports_creation_error(
    provision_context: &ProvisionContext,
    position: u32,
) -> Result<(), StepError> {
    let report = report(provision_context)?;
    let result = report
        .results()
        .get(to_index(position))
        .ok_or_else(|| StepError::Assertion(format!("missing entry {position}")))?;
    if result.create_error().is_some() && result.created_id().is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected creation error, got {:?}",
            result.outcome
        )))
    }
}

#[then("entry {position:u32} reports a start error for a created container")]
fn entry_reports_start_error(
    provision_context: &ProvisionContext,
    position: u32,
) -> Result<(), StepError> {
    let report = report(provision_context)?;
    let result = report
        .results()
        .get(to_index(position))
        .ok_or_else(|| StepError::Assertion(format!("missing entry {position}")))?;
    if result.start_error().is_some() && result.created_id().is_some() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected start error with id, got {:?}",
            result.outcome
        )))
    }
}

#[then("containers \"{names}\" are running")]
fn containers_running(provision_context: &ProvisionContext, names: String) -> Result<(), StepError> {
    let stopped: Vec<String> = split_names(&names)
        .into_iter()
        .filter(|name| !provision_context.runtime.is_running(name))
        .collect();
    if stopped.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("not running: {stopped:?}")))
    }
}

#[then("{count:u32} containers exist")]
fn containers_exist(provision_context: &ProvisionContext, count: u32) -> Result<(), StepError> {
    let actual = provision_context.runtime.container_count();
    if actual == count as usize {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} containers, found {actual}"
        )))
    }
}

#[then("the batch is rolled back at entry {position:u32}")]
fn batch_rolled_back(provision_context: &ProvisionContext, position: u32) -> Result<(), StepError> {
    match provision_context.outcome.as_ref() {
        Some(BatchOutcome::RolledBack { index, .. }) if *index == to_index(position) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected rollback at entry {position}, got {other:?}"
        ))),
    }
}

#[then("the batch is rejected at entry {position:u32}")]
fn batch_rejected(provision_context: &ProvisionContext, position: u32) -> Result<(), StepError> {
    match provision_context.outcome.as_ref() {
        Some(BatchOutcome::Invalid { index }) if *index == to_index(position) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected rejection at entry {position}, got {other:?}"
        ))),
    }
}

#[then("the runtime was never asked to create a container")]
fn no_create_calls(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let creates: Vec<RuntimeCall> = provision_context
        .runtime
        .calls()
        .into_iter()
        .filter(|call| matches!(call, RuntimeCall::Create(_)))
        .collect();
    if creates.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected creates: {creates:?}")))
    }
}

fn report(provision_context: &ProvisionContext) -> Result<&hiveden::ProvisionReport, StepError> {
    match provision_context.outcome.as_ref() {
        Some(BatchOutcome::Report(report)) => Ok(report),
        other => Err(StepError::Assertion(format!(
            "expected a report, got {other:?}"
        ))),
    }
}

fn to_index(position: u32) -> usize {
    (position as usize).saturating_sub(1)
}
