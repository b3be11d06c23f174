//! Container lifecycle manager.
//!
//! The manager wraps a [`ContainerRuntime`] and owns the ownership policy:
//! every container it creates carries the `managed-by=hiveden` label, so the
//! set of containers this tool is responsible for can be recovered from the
//! runtime alone. Listing maps raw runtime summaries into
//! [`ContainerRecord`]s with short identifiers, normalised names and a
//! humanised uptime.

mod uptime;

use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::manifest::{DesiredContainerSpec, SpecError};
use crate::runtime::{ContainerRuntime, ContainerSummary, CreateRequest};

pub use uptime::{UPTIME_UNAVAILABLE, UPTIME_UNDER_A_MINUTE, format_uptime};

/// Label key marking which tool owns a container.
pub const OWNERSHIP_LABEL: &str = "managed-by";

/// Label value identifying containers created by this tool.
pub const OWNERSHIP_TOKEN: &str = "hiveden";

/// Owner reported for containers without an ownership label.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Number of identifier characters shown to users.
pub const SHORT_ID_LEN: usize = 12;

const UNKNOWN_STATE: &str = "unknown";

/// A container as presented to callers, rebuilt on every list call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerRecord {
    /// Identifier truncated to [`SHORT_ID_LEN`] characters.
    pub id: String,
    /// Image reference.
    pub image: String,
    /// Runtime-internal image identifier; may be empty.
    pub image_id: String,
    /// First alias without its leading `/`, or empty when unnamed.
    pub name: String,
    /// Creation time in Unix seconds as reported by the runtime.
    pub created_at: i64,
    /// Humanised time since creation (see [`format_uptime`]).
    pub uptime: String,
    /// Value of the ownership label, or [`UNKNOWN_OWNER`].
    pub managed_by: String,
    /// Runtime state string, or `unknown`.
    pub state: String,
    /// All labels reported by the runtime.
    pub labels: HashMap<String, String>,
}

impl ContainerRecord {
    /// Maps a raw runtime summary, computing uptime relative to `now`.
    #[must_use]
    pub fn from_summary(summary: ContainerSummary, now: SystemTime) -> Self {
        let managed_by = summary
            .labels
            .get(OWNERSHIP_LABEL)
            .cloned()
            .unwrap_or_else(|| String::from(UNKNOWN_OWNER));
        Self {
            id: short_id(&summary.id),
            name: display_name(&summary.names),
            uptime: format_uptime(summary.created, now),
            created_at: summary.created,
            state: summary
                .state
                .filter(|state| !state.is_empty())
                .unwrap_or_else(|| String::from(UNKNOWN_STATE)),
            image: summary.image,
            image_id: summary.image_id,
            managed_by,
            labels: summary.labels,
        }
    }

    /// Returns `true` when this tool owns the container.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.managed_by == OWNERSHIP_TOKEN
    }
}

/// Truncates a runtime identifier to its display form.
#[must_use]
pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Returns the first alias with any leading `/` removed.
#[must_use]
pub fn display_name(names: &[String]) -> String {
    names
        .first()
        .map(|name| name.strip_prefix('/').unwrap_or(name).to_owned())
        .unwrap_or_default()
}

/// Errors surfaced by lifecycle operations.
///
/// Runtime failures are passed through untouched; nothing is retried.
#[derive(Debug, Error)]
pub enum LifecycleError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised before contacting the runtime when a spec is unusable.
    #[error("invalid container spec: {0}")]
    InvalidSpec(#[from] SpecError),
    /// Raised when the runtime rejects a creation request.
    #[error("failed to create container from image {image}: {source}")]
    Create {
        /// Image the container was to be created from.
        image: String,
        /// Requested name, if any.
        name: Option<String>,
        /// Runtime error.
        #[source]
        source: E,
    },
    /// Raised when a container cannot be started.
    #[error("failed to start container {id}: {source}")]
    Start {
        /// Identifier passed by the caller.
        id: String,
        /// Runtime error.
        #[source]
        source: E,
    },
    /// Raised when a container cannot be stopped.
    #[error("failed to stop container {id}: {source}")]
    Stop {
        /// Identifier passed by the caller.
        id: String,
        /// Runtime error.
        #[source]
        source: E,
    },
    /// Raised when a container cannot be removed.
    #[error("failed to remove container {id}: {source}")]
    Remove {
        /// Identifier passed by the caller.
        id: String,
        /// Runtime error.
        #[source]
        source: E,
    },
    /// Raised when the runtime cannot list containers.
    #[error("failed to list containers: {0}")]
    List(#[source] E),
}

/// Drives individual lifecycle transitions against a runtime.
#[derive(Clone, Debug)]
pub struct LifecycleManager<R> {
    runtime: R,
}

impl<R: ContainerRuntime> LifecycleManager<R> {
    /// Wraps an already constructed runtime handle.
    #[must_use]
    pub const fn new(runtime: R) -> Self {
        Self { runtime }
    }

    /// Returns the underlying runtime handle.
    #[must_use]
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Creates a container labelled as owned by this tool.
    ///
    /// The ownership label is always set, whatever else the request holds.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidSpec`] when `spec` fails validation
    /// and [`LifecycleError::Create`] when the runtime rejects the request.
    #[instrument(level = "debug", skip(self, spec), fields(image = %spec.image, name = %spec.name))]
    pub async fn create(&self, spec: &DesiredContainerSpec) -> Result<String, LifecycleError<R::Error>> {
        spec.validate()?;
        let request = owned_create_request(spec);
        match self.runtime.create(&request).await {
            Ok(id) => {
                info!(id = %short_id(&id), "container created");
                Ok(id)
            }
            Err(source) => {
                warn!(error = %source, "container creation rejected");
                Err(LifecycleError::Create {
                    image: request.image,
                    name: request.name,
                    source,
                })
            }
        }
    }

    /// Starts a container.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Start`] when the runtime refuses.
    pub async fn start(&self, id: &str) -> Result<(), LifecycleError<R::Error>> {
        debug!(id, "starting container");
        self.runtime
            .start(id)
            .await
            .map_err(|source| LifecycleError::Start {
                id: id.to_owned(),
                source,
            })?;
        info!(id, "container started");
        Ok(())
    }

    /// Stops a container. Whether stopping a stopped container is an error
    /// is up to the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Stop`] when the runtime refuses.
    pub async fn stop(&self, id: &str) -> Result<(), LifecycleError<R::Error>> {
        debug!(id, "stopping container");
        self.runtime
            .stop(id)
            .await
            .map_err(|source| LifecycleError::Stop {
                id: id.to_owned(),
                source,
            })?;
        info!(id, "container stopped");
        Ok(())
    }

    /// Removes a container.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Remove`] when the runtime refuses.
    pub async fn remove(&self, id: &str) -> Result<(), LifecycleError<R::Error>> {
        debug!(id, "removing container");
        self.runtime
            .remove(id)
            .await
            .map_err(|source| LifecycleError::Remove {
                id: id.to_owned(),
                source,
            })?;
        info!(id, "container removed");
        Ok(())
    }

    /// Lists containers as [`ContainerRecord`]s in the order the runtime
    /// reports them.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::List`] when the runtime cannot be queried.
    pub async fn list(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerRecord>, LifecycleError<R::Error>> {
        let summaries = self
            .runtime
            .list(include_stopped)
            .await
            .map_err(LifecycleError::List)?;
        let now = SystemTime::now();
        debug!(count = summaries.len(), include_stopped, "listed containers");
        Ok(summaries
            .into_iter()
            .map(|summary| ContainerRecord::from_summary(summary, now))
            .collect())
    }

    /// Lists only the containers owned by this tool.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::List`] when the runtime cannot be queried.
    pub async fn list_managed(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerRecord>, LifecycleError<R::Error>> {
        let mut records = self.list(include_stopped).await?;
        records.retain(ContainerRecord::is_managed);
        Ok(records)
    }
}

fn owned_create_request(spec: &DesiredContainerSpec) -> CreateRequest {
    let mut labels = BTreeMap::new();
    labels.insert(String::from(OWNERSHIP_LABEL), String::from(OWNERSHIP_TOKEN));
    CreateRequest {
        name: spec.requested_name().map(str::to_owned),
        image: spec.image.trim().to_owned(),
        env: spec.env.iter().map(crate::manifest::EnvVar::render).collect(),
        labels,
    }
}
