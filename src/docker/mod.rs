//! Docker Engine implementation of [`ContainerRuntime`].

mod error;

use std::collections::HashMap;
use std::time::Duration;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::models::ContainerSummary as DockerSummary;
use tracing::debug;

use crate::config::HivedenConfig;
use crate::runtime::{ContainerRuntime, ContainerSummary, CreateRequest, RuntimeFuture};

pub use error::DockerRuntimeError;

const LOCAL_DEFAULTS: &str = "local defaults";

/// Runtime that talks to a Docker daemon through its HTTP API.
///
/// The handle is cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to `host`, or to the local daemon when `host` is `None`.
    ///
    /// `unix://` hosts use the socket directly; `tcp://` and `http://` hosts
    /// go over plain HTTP. Local defaults honour `DOCKER_HOST`. No request
    /// is made, so a stopped daemon only shows up on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`DockerRuntimeError::Connect`] when the client cannot be
    /// built for the given address.
    pub fn connect(host: Option<&str>, timeout: Duration) -> Result<Self, DockerRuntimeError> {
        let secs = timeout.as_secs();
        let docker = match host {
            None => Docker::connect_with_local_defaults()
                .map(|docker| docker.with_timeout(timeout)),
            Some(path) if path.starts_with("unix://") => {
                Docker::connect_with_unix(path, secs, bollard::API_DEFAULT_VERSION)
            }
            Some(addr) => Docker::connect_with_http(addr, secs, bollard::API_DEFAULT_VERSION),
        }
        .map_err(|err| DockerRuntimeError::Connect {
            host: host.unwrap_or(LOCAL_DEFAULTS).to_owned(),
            message: err.to_string(),
        })?;
        debug!(host = host.unwrap_or(LOCAL_DEFAULTS), timeout_secs = secs, "docker client ready");
        Ok(Self { docker })
    }

    /// Connects using the host and timeout from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DockerRuntimeError::Connect`] as [`Self::connect`] does.
    pub fn from_config(config: &HivedenConfig) -> Result<Self, DockerRuntimeError> {
        Self::connect(config.docker_host(), config.timeout())
    }
}

fn into_summary(raw: DockerSummary) -> ContainerSummary {
    ContainerSummary {
        id: raw.id.unwrap_or_default(),
        names: raw.names.unwrap_or_default(),
        image: raw.image.unwrap_or_default(),
        image_id: raw.image_id.unwrap_or_default(),
        created: raw.created.unwrap_or_default(),
        state: raw.state,
        labels: raw.labels.unwrap_or_default(),
    }
}

fn container_config(request: &CreateRequest) -> Config<String> {
    let labels: HashMap<String, String> = request
        .labels
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Config {
        image: Some(request.image.clone()),
        env: Some(request.env.clone()),
        labels: Some(labels),
        ..Default::default()
    }
}

impl ContainerRuntime for DockerRuntime {
    type Error = DockerRuntimeError;

    fn create<'a>(&'a self, request: &'a CreateRequest) -> RuntimeFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let options = request.name.as_ref().map(|name| CreateContainerOptions {
                name: name.clone(),
                ..Default::default()
            });
            let response = self
                .docker
                .create_container(options, container_config(request))
                .await?;
            for warning in &response.warnings {
                debug!(warning = %warning, "docker create warning");
            }
            Ok(response.id)
        })
    }

    fn start<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.docker
                .start_container(id, None::<StartContainerOptions<String>>)
                .await?;
            Ok(())
        })
    }

    fn stop<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.docker
                .stop_container(id, None::<StopContainerOptions>)
                .await?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.docker
                .remove_container(id, None::<RemoveContainerOptions>)
                .await?;
            Ok(())
        })
    }

    fn list(
        &self,
        include_stopped: bool,
    ) -> RuntimeFuture<'_, Vec<ContainerSummary>, Self::Error> {
        Box::pin(async move {
            let options = ListContainersOptions::<String> {
                all: include_stopped,
                ..Default::default()
            };
            let raw = self.docker.list_containers(Some(options)).await?;
            Ok(raw.into_iter().map(into_summary).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use rstest::rstest;

    #[rstest]
    fn summary_mapping_fills_missing_fields_with_defaults() {
        let summary = into_summary(DockerSummary {
            id: Some(String::from("abc")),
            ..Default::default()
        });
        assert_eq!(summary.id, "abc");
        assert!(summary.names.is_empty());
        assert_eq!(summary.created, 0);
        assert_eq!(summary.state, None);
        assert!(summary.labels.is_empty());
    }

    #[rstest]
    fn container_config_carries_image_env_and_labels() {
        let mut labels = BTreeMap::new();
        labels.insert(String::from("managed-by"), String::from("hiveden"));
        let config = container_config(&CreateRequest {
            name: Some(String::from("web")),
            image: String::from("nginx"),
            env: vec![String::from("A=1")],
            labels,
        });
        assert_eq!(config.image.as_deref(), Some("nginx"));
        assert_eq!(config.env, Some(vec![String::from("A=1")]));
        assert_eq!(
            config
                .labels
                .as_ref()
                .and_then(|labels| labels.get("managed-by"))
                .map(String::as_str),
            Some("hiveden")
        );
    }

    #[rstest]
    #[tokio::test]
    async fn http_hosts_connect_lazily() {
        let runtime = DockerRuntime::connect(Some("tcp://127.0.0.1:1"), Duration::from_secs(1));
        assert!(runtime.is_ok());
    }
}
