//! BDD scenarios for batch provisioning.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisionContext, provision_context};

#[scenario(
    path = "tests/features/provision.feature",
    name = "Continue past an entry the runtime refuses to create"
)]
fn scenario_continue_past_create_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Leave a container that fails to start in place"
)]
fn scenario_start_failure_left_in_place(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Roll back the batch under all-or-nothing"
)]
fn scenario_all_or_nothing_rollback(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Reject a manifest entry without an image"
)]
fn scenario_reject_missing_image(provision_context: ProvisionContext) {
    let _ = provision_context;
}
