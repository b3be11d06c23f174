//! Applies a manifest of desired containers to the runtime.
//!
//! Entries are processed strictly in input order: each is created and then
//! started. Under the default [`ProvisionPolicy::ContinueOnError`] a failing
//! entry is recorded and the batch moves on, so a run can end partially
//! applied; a container that was created but failed to start is left in
//! place. [`ProvisionPolicy::AllOrNothing`] instead stops at the first
//! failure and removes everything the batch created.

use camino::Utf8Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::manager::{LifecycleManager, short_id};
use crate::manifest::{DesiredContainerSpec, Manifest, ManifestError, SpecError};
use crate::runtime::ContainerRuntime;

/// How a batch reacts to a failing entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProvisionPolicy {
    /// Record the failure and carry on with the next entry. Nothing is
    /// rolled back.
    #[default]
    ContinueOnError,
    /// Stop at the first failure and remove every container created by
    /// this batch.
    AllOrNothing,
}

/// What happened to one manifest entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProvisionOutcome {
    /// The container was created and started.
    Started {
        /// Runtime identifier of the new container.
        id: String,
    },
    /// The runtime refused to create the container.
    CreateFailed {
        /// Rendered creation error.
        error: String,
    },
    /// The container exists but could not be started.
    StartFailed {
        /// Runtime identifier of the created container.
        id: String,
        /// Rendered start error.
        error: String,
    },
}

/// Outcome of one entry, paired with the entry itself.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionResult {
    /// The entry as supplied.
    pub spec: DesiredContainerSpec,
    /// What happened to it.
    pub outcome: ProvisionOutcome,
}

impl ProvisionResult {
    /// Identifier of the container when creation succeeded.
    #[must_use]
    pub fn created_id(&self) -> Option<&str> {
        match &self.outcome {
            ProvisionOutcome::Started { id } | ProvisionOutcome::StartFailed { id, .. } => {
                Some(id)
            }
            ProvisionOutcome::CreateFailed { .. } => None,
        }
    }

    /// Creation error, if creation failed.
    #[must_use]
    pub fn create_error(&self) -> Option<&str> {
        match &self.outcome {
            ProvisionOutcome::CreateFailed { error } => Some(error),
            _ => None,
        }
    }

    /// Start error, if the container was created but not started.
    #[must_use]
    pub fn start_error(&self) -> Option<&str> {
        match &self.outcome {
            ProvisionOutcome::StartFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns `true` when the container is running.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ProvisionOutcome::Started { .. })
    }
}

/// Per-entry results of a batch, in input order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisionReport {
    results: Vec<ProvisionResult>,
}

impl ProvisionReport {
    /// Results in input order.
    #[must_use]
    pub fn results(&self) -> &[ProvisionResult] {
        &self.results
    }

    /// Consumes the report, returning its results.
    #[must_use]
    pub fn into_results(self) -> Vec<ProvisionResult> {
        self.results
    }

    /// Number of entries that ended up running.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|result| result.is_success()).count()
    }

    /// Number of entries that failed to create or start.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Errors that stop a batch as a whole.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Raised before any runtime call when an entry is unusable.
    #[error("container entry {index} is invalid: {source}")]
    Invalid {
        /// Position of the entry.
        index: usize,
        /// Validation failure.
        #[source]
        source: SpecError,
    },
    /// Raised when the manifest cannot be loaded.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// Raised under [`ProvisionPolicy::AllOrNothing`] after rolling back.
    #[error("provisioning aborted at entry {index}: {message}")]
    RolledBack {
        /// Position of the entry that failed.
        index: usize,
        /// Failure description, including any rollback problems.
        message: String,
        /// Rollback steps that failed; the containers they name remain.
        rollback_failures: Vec<String>,
    },
}

/// Drives a [`LifecycleManager`] through a list of desired containers.
#[derive(Debug)]
pub struct BatchProvisioner<'m, R> {
    manager: &'m LifecycleManager<R>,
    policy: ProvisionPolicy,
}

struct Created {
    id: String,
    started: bool,
}

impl<'m, R: ContainerRuntime> BatchProvisioner<'m, R> {
    /// Creates a provisioner with [`ProvisionPolicy::ContinueOnError`].
    #[must_use]
    pub const fn new(manager: &'m LifecycleManager<R>) -> Self {
        Self {
            manager,
            policy: ProvisionPolicy::ContinueOnError,
        }
    }

    /// Overrides the failure policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ProvisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Loads a manifest file and provisions its entries.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Manifest`] when the file cannot be read or
    /// parsed, and otherwise behaves like [`Self::provision_all`].
    pub async fn provision_manifest(&self, path: &Utf8Path) -> Result<ProvisionReport, ProvisionError> {
        let manifest = Manifest::load(path)?;
        info!(path = %path, entries = manifest.containers.len(), "loaded manifest");
        self.provision_all(&manifest.containers).await
    }

    /// Creates and starts every entry in order, returning one result per
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Invalid`] when any entry fails validation;
    /// nothing is created in that case. Under
    /// [`ProvisionPolicy::AllOrNothing`] returns
    /// [`ProvisionError::RolledBack`] after the first failing entry.
    pub async fn provision_all(
        &self,
        specs: &[DesiredContainerSpec],
    ) -> Result<ProvisionReport, ProvisionError> {
        for (index, spec) in specs.iter().enumerate() {
            spec.validate()
                .map_err(|source| ProvisionError::Invalid { index, source })?;
        }

        let mut results = Vec::with_capacity(specs.len());
        let mut created = Vec::new();
        for (index, spec) in specs.iter().enumerate() {
            info!(index, image = %spec.image, name = %spec.name, "provisioning container");
            let outcome = self.provision_one(spec).await;
            match &outcome {
                ProvisionOutcome::Started { id } => created.push(Created {
                    id: id.clone(),
                    started: true,
                }),
                ProvisionOutcome::StartFailed { id, error } => {
                    warn!(index, id = %short_id(id), error = %error, "container created but not started");
                    created.push(Created {
                        id: id.clone(),
                        started: false,
                    });
                }
                ProvisionOutcome::CreateFailed { error } => {
                    warn!(index, error = %error, "container creation failed");
                }
            }

            if self.policy == ProvisionPolicy::AllOrNothing
                && !matches!(outcome, ProvisionOutcome::Started { .. })
            {
                return Err(self.roll_back(index, &outcome, created).await);
            }
            results.push(ProvisionResult {
                spec: spec.clone(),
                outcome,
            });
        }

        let report = ProvisionReport { results };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "provisioning finished"
        );
        Ok(report)
    }

    async fn provision_one(&self, spec: &DesiredContainerSpec) -> ProvisionOutcome {
        let id = match self.manager.create(spec).await {
            Ok(id) => id,
            Err(err) => {
                return ProvisionOutcome::CreateFailed {
                    error: err.to_string(),
                };
            }
        };
        match self.manager.start(&id).await {
            Ok(()) => ProvisionOutcome::Started { id },
            Err(err) => ProvisionOutcome::StartFailed {
                id,
                error: err.to_string(),
            },
        }
    }

    async fn roll_back(
        &self,
        index: usize,
        outcome: &ProvisionOutcome,
        created: Vec<Created>,
    ) -> ProvisionError {
        let mut rollback_failures = Vec::new();
        for container in created.into_iter().rev() {
            if container.started {
                if let Err(err) = self.manager.stop(&container.id).await {
                    rollback_failures.push(err.to_string());
                }
            }
            if let Err(err) = self.manager.remove(&container.id).await {
                rollback_failures.push(err.to_string());
            }
        }

        let failure = match outcome {
            ProvisionOutcome::CreateFailed { error } | ProvisionOutcome::StartFailed { error, .. } => {
                error.clone()
            }
            ProvisionOutcome::Started { .. } => String::from("unexpected success"),
        };
        warn!(index, rollback_failures = rollback_failures.len(), "batch rolled back");
        ProvisionError::RolledBack {
            index,
            message: append_rollback_note(failure, &rollback_failures),
            rollback_failures,
        }
    }
}

fn append_rollback_note(message: String, rollback_failures: &[String]) -> String {
    if rollback_failures.is_empty() {
        message
    } else {
        format!(
            "{message} (rollback also failed: {})",
            rollback_failures.join("; ")
        )
    }
}
