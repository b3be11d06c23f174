//! Snapshots managed containers back into manifest form.
//!
//! Only the name and image of each container are recovered. Environment
//! variables are not read back from the runtime, so an exported manifest
//! re-provisions containers without the environment they were created with.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

use crate::manager::{LifecycleError, LifecycleManager};
use crate::manifest::{DesiredContainerSpec, Manifest, ManifestError, write_file};
use crate::runtime::ContainerRuntime;

/// Errors raised while exporting.
#[derive(Debug, Error)]
pub enum ExportError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the runtime cannot be listed.
    #[error("failed to list containers for export: {0}")]
    List(#[source] LifecycleError<E>),
    /// Raised when the snapshot cannot be rendered as YAML.
    #[error("failed to serialise export: {message}")]
    Serialize {
        /// Serialiser message.
        message: String,
    },
    /// Raised when the destination cannot be written.
    #[error("failed to write export to {path}: {message}")]
    Write {
        /// Destination path.
        path: Utf8PathBuf,
        /// File system message.
        message: String,
    },
}

/// Produces manifests describing the containers this tool owns.
#[derive(Debug)]
pub struct StateExporter<'m, R> {
    manager: &'m LifecycleManager<R>,
}

impl<'m, R: ContainerRuntime> StateExporter<'m, R> {
    /// Creates an exporter over `manager`.
    #[must_use]
    pub const fn new(manager: &'m LifecycleManager<R>) -> Self {
        Self { manager }
    }

    /// Builds a manifest from every managed container, running or not, in
    /// the order the runtime lists them.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::List`] when the runtime cannot be queried.
    pub async fn snapshot(&self) -> Result<Manifest, ExportError<R::Error>> {
        let records = self
            .manager
            .list_managed(true)
            .await
            .map_err(ExportError::List)?;
        let containers = records
            .into_iter()
            .map(|record| DesiredContainerSpec {
                name: record.name,
                image: record.image,
                env: Vec::new(),
            })
            .collect();
        Ok(Manifest { containers })
    }

    /// Writes a snapshot to `path`, replacing any existing file, and returns
    /// the number of containers exported.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::List`], [`ExportError::Serialize`], or
    /// [`ExportError::Write`] depending on the stage that failed.
    pub async fn export_to(&self, path: &Utf8Path) -> Result<usize, ExportError<R::Error>> {
        let manifest = self.snapshot().await?;
        let yaml = manifest.to_yaml_string().map_err(|err| match err {
            ManifestError::Serialize { message } => ExportError::Serialize { message },
            other => ExportError::Serialize {
                message: other.to_string(),
            },
        })?;
        write_file(path, &yaml).map_err(|err| ExportError::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let count = manifest.containers.len();
        info!(path = %path, count, "exported managed containers");
        Ok(count)
    }
}
