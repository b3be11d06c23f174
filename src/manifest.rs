//! Declarative container manifests.
//!
//! A manifest is the YAML document consumed by `run-all` and produced by
//! `export`:
//!
//! ```yaml
//! containers:
//!   - name: web
//!     image: nginx:1.27
//!     env:
//!       - name: MODE
//!         value: production
//! ```

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single `NAME=value` environment entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl EnvVar {
    /// Creates an environment entry.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Renders the entry in the `NAME=value` form runtimes expect.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// One desired container in a manifest.
///
/// Duplicate environment names are passed through untouched; which one wins
/// is up to the runtime.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DesiredContainerSpec {
    /// Container name. Empty lets the runtime assign one.
    #[serde(default)]
    pub name: String,
    /// Image reference. Required.
    pub image: String,
    /// Ordered environment entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

impl DesiredContainerSpec {
    /// Starts a spec for the given image with no name and no environment.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            image: image.into(),
            env: Vec::new(),
        }
    }

    /// Sets the container name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends an environment entry.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar::new(name, value));
        self
    }

    /// Returns the trimmed name, or `None` when the runtime should pick one.
    #[must_use]
    pub fn requested_name(&self) -> Option<&str> {
        let trimmed = self.name.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Checks the fields a runtime cannot do without.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::MissingImage`] when the image is blank and
    /// [`SpecError::EmptyEnvName`] when an environment entry has no name.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.image.trim().is_empty() {
            return Err(SpecError::MissingImage);
        }
        if let Some(index) = self.env.iter().position(|var| var.name.trim().is_empty()) {
            return Err(SpecError::EmptyEnvName { index });
        }
        Ok(())
    }
}

/// Problems with an individual container spec.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SpecError {
    /// The image reference is missing or blank.
    #[error("missing or empty field: image")]
    MissingImage,
    /// An environment entry has a blank name.
    #[error("environment entry {index} has an empty name")]
    EmptyEnvName {
        /// Position of the offending entry.
        index: usize,
    },
}

/// The persisted list of desired containers.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Manifest {
    /// Desired containers in provisioning order.
    #[serde(default)]
    pub containers: Vec<DesiredContainerSpec>,
}

/// Errors raised while reading, parsing, or writing manifests.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ManifestError {
    /// Raised when the file system refuses a read or write.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the document is not a valid manifest.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path of the document, or `<inline>` for in-memory input.
        path: Utf8PathBuf,
        /// Parser error message.
        message: String,
    },
    /// Raised when the manifest cannot be rendered as YAML.
    #[error("failed to serialise manifest: {message}")]
    Serialize {
        /// Serializer error message.
        message: String,
    },
    /// Raised when an entry fails validation.
    #[error("container entry {index} is invalid: {source}")]
    Invalid {
        /// Position of the entry in the manifest.
        index: usize,
        /// Underlying validation failure.
        #[source]
        source: SpecError,
    },
}

const INLINE_SOURCE: &str = "<inline>";

impl Manifest {
    /// Wraps a list of specs.
    #[must_use]
    pub const fn new(containers: Vec<DesiredContainerSpec>) -> Self {
        Self { containers }
    }

    /// Parses a manifest from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] when the text is not a manifest,
    /// including when an entry lacks `image`.
    pub fn from_yaml_str(text: &str) -> Result<Self, ManifestError> {
        parse_yaml(Utf8Path::new(INLINE_SOURCE), text)
    }

    /// Renders the manifest as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Serialize`] when rendering fails.
    pub fn to_yaml_string(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(self).map_err(|err| ManifestError::Serialize {
            message: err.to_string(),
        })
    }

    /// Validates every entry, reporting the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Invalid`] naming the first bad entry.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for (index, spec) in self.containers.iter().enumerate() {
            spec.validate()
                .map_err(|source| ManifestError::Invalid { index, source })?;
        }
        Ok(())
    }

    /// Reads and parses a manifest file. The result is not validated.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] when the file cannot be read and
    /// [`ManifestError::Parse`] when its contents are malformed.
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let (dir, file_name) = open_parent(path)?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|err| io_error(path, &err))?;
        parse_yaml(path, &contents)
    }

    /// Writes the manifest, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Serialize`] when rendering fails and
    /// [`ManifestError::Io`] when the destination cannot be written.
    pub fn save(&self, path: &Utf8Path) -> Result<(), ManifestError> {
        let rendered = self.to_yaml_string()?;
        write_file(path, &rendered)
    }
}

fn parse_yaml(path: &Utf8Path, text: &str) -> Result<Manifest, ManifestError> {
    if text.trim().is_empty() {
        return Ok(Manifest::default());
    }
    serde_yaml::from_str(text).map_err(|err| ManifestError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Writes raw text to `path`, creating the parent directory first.
pub(crate) fn write_file(path: &Utf8Path, contents: &str) -> Result<(), ManifestError> {
    let parent = parent_of(path);
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| io_error(parent, &err))?;
    let (dir, file_name) = open_parent(path)?;
    dir.write(file_name, contents)
        .map_err(|err| io_error(path, &err))
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), ManifestError> {
    let file_name = path.file_name().ok_or_else(|| ManifestError::Io {
        path: path.to_path_buf(),
        message: String::from("manifest path is missing a filename"),
    })?;
    let parent = parent_of(path);
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| io_error(parent, &err))?;
    Ok((dir, file_name))
}

fn parent_of(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

fn io_error(path: &Utf8Path, err: &io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn temp_path(tmp: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().join(name))
            .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()))
    }

    #[rstest]
    fn parses_entries_in_order_with_optional_fields() {
        let text = concat!(
            "containers:\n",
            "  - name: web\n",
            "    image: nginx:1.27\n",
            "    env:\n",
            "      - name: MODE\n",
            "        value: production\n",
            "  - image: redis:7\n",
        );
        let manifest = Manifest::from_yaml_str(text).expect("manifest should parse");

        assert_eq!(
            manifest.containers,
            vec![
                DesiredContainerSpec::new("nginx:1.27")
                    .with_name("web")
                    .with_env("MODE", "production"),
                DesiredContainerSpec::new("redis:7"),
            ]
        );
    }

    #[rstest]
    fn missing_image_is_a_parse_error() {
        let err = Manifest::from_yaml_str("containers:\n  - name: web\n")
            .expect_err("image is required");
        let ManifestError::Parse { message, .. } = err else {
            panic!("expected Parse error, got {err:?}");
        };
        assert!(message.contains("image"), "message: {message}");
    }

    #[rstest]
    fn empty_document_yields_empty_manifest() {
        let manifest = Manifest::from_yaml_str("  \n").expect("blank input is allowed");
        assert!(manifest.containers.is_empty());
    }

    #[rstest]
    #[case(DesiredContainerSpec::new("  "), SpecError::MissingImage)]
    #[case(
        DesiredContainerSpec::new("alpine").with_env("OK", "1").with_env(" ", "2"),
        SpecError::EmptyEnvName { index: 1 }
    )]
    fn validate_rejects_bad_specs(#[case] spec: DesiredContainerSpec, #[case] expected: SpecError) {
        assert_eq!(spec.validate(), Err(expected));
    }

    #[rstest]
    fn manifest_validate_reports_entry_index() {
        let manifest = Manifest::new(vec![
            DesiredContainerSpec::new("alpine"),
            DesiredContainerSpec::new(""),
        ]);
        assert_eq!(
            manifest.validate(),
            Err(ManifestError::Invalid {
                index: 1,
                source: SpecError::MissingImage,
            })
        );
    }

    #[rstest]
    #[case("", None)]
    #[case("  ", None)]
    #[case(" web ", Some("web"))]
    fn requested_name_treats_blank_as_unnamed(#[case] name: &str, #[case] expected: Option<&str>) {
        let spec = DesiredContainerSpec::new("alpine").with_name(name);
        assert_eq!(spec.requested_name(), expected);
    }

    #[rstest]
    fn env_is_omitted_from_yaml_when_empty() {
        let manifest = Manifest::new(vec![DesiredContainerSpec::new("alpine").with_name("a")]);
        let rendered = manifest.to_yaml_string().expect("render");
        assert!(!rendered.contains("env"), "rendered: {rendered}");
        assert!(rendered.contains("image: alpine"), "rendered: {rendered}");
    }

    #[rstest]
    fn save_creates_parent_directories_and_load_reads_back() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = temp_path(&tmp, "nested/dir/containers.yaml");
        let manifest = Manifest::new(vec![
            DesiredContainerSpec::new("nginx").with_name("web"),
        ]);

        manifest.save(&path).expect("save should succeed");
        let loaded = Manifest::load(&path).expect("load should succeed");

        assert_eq!(loaded, manifest);
    }

    #[rstest]
    fn load_reports_missing_file_as_io_error() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = temp_path(&tmp, "absent.yaml");
        let err = Manifest::load(&path).expect_err("missing file should fail");
        assert!(matches!(err, ManifestError::Io { .. }), "got {err:?}");
    }
}
