//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::runtime::{ContainerRuntime, ContainerSummary, CreateRequest, RuntimeFuture};

/// Errors produced by [`ScriptedRuntime`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedRuntimeError {
    /// No container matches the identifier or name.
    #[error("no such container: {0}")]
    NotFound(String),
    /// A container with the requested name already exists.
    #[error("container name {0} is already in use")]
    Conflict(String),
    /// A failure scripted by the test.
    #[error("scripted {operation} failure for {target}")]
    Injected {
        /// Operation that was told to fail.
        operation: &'static str,
        /// Image, name, or identifier the failure was keyed on.
        target: String,
    },
}

/// One call observed by [`ScriptedRuntime`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RuntimeCall {
    /// `create`, keyed by the requested name or image.
    Create(String),
    /// `start` with the identifier passed in.
    Start(String),
    /// `stop` with the identifier passed in.
    Stop(String),
    /// `remove` with the identifier passed in.
    Remove(String),
    /// `list` with the `include_stopped` flag.
    List(bool),
}

#[derive(Clone, Debug)]
struct StoredContainer {
    id: String,
    name: String,
    image: String,
    created: i64,
    running: bool,
    labels: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<StoredContainer>,
    next_id: u64,
    calls: Vec<RuntimeCall>,
    create_requests: Vec<CreateRequest>,
    fail_create: HashSet<String>,
    fail_start: HashSet<String>,
    fail_stop: bool,
    fail_remove: bool,
    fail_list: bool,
}

/// In-memory runtime that behaves like a small Docker daemon.
///
/// Names must be unique, identifiers may be given in full or as any prefix,
/// and unnamed containers receive a generated name. Failures can be scripted
/// per image or name. Clones share state, so a test can keep a handle while
/// the manager owns another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRuntime {
    state: Arc<Mutex<State>>,
}

impl ScriptedRuntime {
    /// Creates an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `create` fail for requests whose name or image equals `target`.
    pub fn fail_create_for(&self, target: &str) {
        self.state().fail_create.insert(target.to_owned());
    }

    /// Makes `start` fail for the container named `name`.
    pub fn fail_start_for(&self, name: &str) {
        self.state().fail_start.insert(name.to_owned());
    }

    /// Makes every `stop` call fail.
    pub fn fail_stop(&self) {
        self.state().fail_stop = true;
    }

    /// Makes every `remove` call fail.
    pub fn fail_remove(&self) {
        self.state().fail_remove = true;
    }

    /// Makes every `list` call fail.
    pub fn fail_list(&self) {
        self.state().fail_list = true;
    }

    /// Adds a container created by some other actor.
    pub fn seed(&self, summary: ContainerSummary) {
        let name = summary
            .names
            .first()
            .map(|name| name.trim_start_matches('/').to_owned())
            .unwrap_or_default();
        let running = summary.state.as_deref() == Some("running");
        self.state().containers.push(StoredContainer {
            id: summary.id,
            name,
            image: summary.image,
            created: summary.created,
            running,
            labels: summary.labels,
        });
    }

    /// Returns every call observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state().calls.clone()
    }

    /// Returns every creation request received so far, in order.
    #[must_use]
    pub fn create_requests(&self) -> Vec<CreateRequest> {
        self.state().create_requests.clone()
    }

    /// Returns the number of containers currently stored.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.state().containers.len()
    }

    /// Returns `true` when the named container exists and is running.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.state()
            .containers
            .iter()
            .any(|container| container.name == name && container.running)
    }

    fn create_now(&self, request: &CreateRequest) -> Result<String, ScriptedRuntimeError> {
        let mut state = self.state();
        let key = request.name.clone().unwrap_or_else(|| request.image.clone());
        state.calls.push(RuntimeCall::Create(key.clone()));
        state.create_requests.push(request.clone());

        if state.fail_create.contains(&request.image)
            || request
                .name
                .as_ref()
                .is_some_and(|name| state.fail_create.contains(name))
        {
            return Err(ScriptedRuntimeError::Injected {
                operation: "create",
                target: key,
            });
        }

        state.next_id += 1;
        let serial = state.next_id;
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("scripted-{serial}"));
        if state.containers.iter().any(|container| container.name == name) {
            return Err(ScriptedRuntimeError::Conflict(name));
        }

        let id = format!("{serial:064x}");
        state.containers.push(StoredContainer {
            id: id.clone(),
            name,
            image: request.image.clone(),
            created: unix_now(),
            running: false,
            labels: request.labels.clone().into_iter().collect(),
        });
        Ok(id)
    }

    fn transition(
        &self,
        call: RuntimeCall,
        id: &str,
        apply: impl FnOnce(&mut State, usize) -> Result<(), ScriptedRuntimeError>,
    ) -> Result<(), ScriptedRuntimeError> {
        let mut state = self.state();
        state.calls.push(call);
        let index = state
            .containers
            .iter()
            .position(|container| {
                !id.is_empty() && (container.id.starts_with(id) || container.name == id)
            })
            .ok_or_else(|| ScriptedRuntimeError::NotFound(id.to_owned()))?;
        apply(&mut *state, index)
    }

    fn start_now(&self, id: &str) -> Result<(), ScriptedRuntimeError> {
        self.transition(RuntimeCall::Start(id.to_owned()), id, |state, index| {
            let failing = state
                .containers
                .get(index)
                .is_some_and(|container| state.fail_start.contains(&container.name));
            if failing {
                return Err(ScriptedRuntimeError::Injected {
                    operation: "start",
                    target: id.to_owned(),
                });
            }
            if let Some(container) = state.containers.get_mut(index) {
                container.running = true;
            }
            Ok(())
        })
    }

    fn stop_now(&self, id: &str) -> Result<(), ScriptedRuntimeError> {
        self.transition(RuntimeCall::Stop(id.to_owned()), id, |state, index| {
            if state.fail_stop {
                return Err(ScriptedRuntimeError::Injected {
                    operation: "stop",
                    target: id.to_owned(),
                });
            }
            if let Some(container) = state.containers.get_mut(index) {
                container.running = false;
            }
            Ok(())
        })
    }

    fn remove_now(&self, id: &str) -> Result<(), ScriptedRuntimeError> {
        self.transition(RuntimeCall::Remove(id.to_owned()), id, |state, index| {
            if state.fail_remove {
                return Err(ScriptedRuntimeError::Injected {
                    operation: "remove",
                    target: id.to_owned(),
                });
            }
            state.containers.remove(index);
            Ok(())
        })
    }

    fn list_now(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<ContainerSummary>, ScriptedRuntimeError> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::List(include_stopped));
        if state.fail_list {
            return Err(ScriptedRuntimeError::Injected {
                operation: "list",
                target: String::from("containers"),
            });
        }
        Ok(state
            .containers
            .iter()
            .filter(|container| include_stopped || container.running)
            .map(|container| ContainerSummary {
                id: container.id.clone(),
                names: vec![format!("/{}", container.name)],
                image: container.image.clone(),
                image_id: format!("sha256:{}", container.image),
                created: container.created,
                state: Some(String::from(if container.running {
                    "running"
                } else {
                    "exited"
                })),
                labels: container.labels.clone(),
            })
            .collect())
    }
}

impl ContainerRuntime for ScriptedRuntime {
    type Error = ScriptedRuntimeError;

    fn create<'a>(&'a self, request: &'a CreateRequest) -> RuntimeFuture<'a, String, Self::Error> {
        Box::pin(async move { self.create_now(request) })
    }

    fn start<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error> {
        Box::pin(async move { self.start_now(id) })
    }

    fn stop<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error> {
        Box::pin(async move { self.stop_now(id) })
    }

    fn remove<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove_now(id) })
    }

    fn list(
        &self,
        include_stopped: bool,
    ) -> RuntimeFuture<'_, Vec<ContainerSummary>, Self::Error> {
        Box::pin(async move { self.list_now(include_stopped) })
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_secs()).ok())
        .unwrap_or_default()
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
