//! Capability interface over a container runtime daemon.
//!
//! The lifecycle manager only ever talks to a runtime through
//! [`ContainerRuntime`]. Production code uses the Docker implementation in
//! [`crate::docker`]; tests substitute [`crate::test_support::ScriptedRuntime`].

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

/// Parameters for a single container creation call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateRequest {
    /// Requested container name. `None` lets the runtime assign one.
    pub name: Option<String>,
    /// Image reference the container is created from.
    pub image: String,
    /// Environment entries rendered as `NAME=value`, in input order.
    pub env: Vec<String>,
    /// Labels attached to the container at creation time.
    pub labels: BTreeMap<String, String>,
}

/// Raw container state as reported by the runtime's list endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContainerSummary {
    /// Full runtime identifier.
    pub id: String,
    /// Aliases reported by the runtime, usually prefixed with `/`.
    pub names: Vec<String>,
    /// Image reference the container was created from.
    pub image: String,
    /// Runtime-internal image identifier; may be empty.
    pub image_id: String,
    /// Creation time in seconds since the Unix epoch. Zero means unset.
    pub created: i64,
    /// Runtime state string (for example `running` or `exited`).
    pub state: Option<String>,
    /// Labels attached to the container.
    pub labels: HashMap<String, String>,
}

/// Future returned by runtime operations.
pub type RuntimeFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal set of lifecycle calls the manager needs from a runtime.
///
/// Implementations must be safe to share between concurrent callers; the
/// daemon behind them serialises the actual side effects.
pub trait ContainerRuntime {
    /// Runtime specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates a container and returns its runtime identifier.
    fn create<'a>(&'a self, request: &'a CreateRequest) -> RuntimeFuture<'a, String, Self::Error>;

    /// Starts an existing container.
    fn start<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error>;

    /// Stops a running container.
    fn stop<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error>;

    /// Removes a container.
    fn remove<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error>;

    /// Lists containers; stopped ones are included only when requested.
    fn list(&self, include_stopped: bool)
    -> RuntimeFuture<'_, Vec<ContainerSummary>, Self::Error>;
}
