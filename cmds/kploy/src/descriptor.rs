//! The `Kployfile` deployment descriptor.

use std::{
	io,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::yaml::{self, YamlError};

/// Workspace URL prefixes accepted for registry push/pull.
pub const VALID_WORKSPACE_PREFIXES: &[&str] = &["http://github.com/", "https://github.com/"];

/// Namespace that always exists and is never created or deleted by kploy.
pub const DEFAULT_NAMESPACE: &str = "default";

const PLACEHOLDER: &str = "CHANGE_ME";

#[derive(Debug, Error)]
pub enum DescriptorError {
	#[error(
		"no deployment descriptor found at {}. Use `kploy init` to create one",
		.0.display()
	)]
	NotFound(PathBuf),

	#[error(transparent)]
	Yaml(YamlError),

	#[error(
		"{} already exists. I'm not going to destroy existing work",
		.0.display()
	)]
	AlreadyExists(PathBuf),

	#[error(
		"the `source` field `{0}` is neither a GitHub username nor a repo URL, \
		 for example `https://github.com/mhausenblas`"
	)]
	InvalidWorkspace(String),
}

impl From<YamlError> for DescriptorError {
	fn from(err: YamlError) -> Self {
		match err {
			YamlError::Read { path, source } if source.kind() == io::ErrorKind::NotFound => {
				DescriptorError::NotFound(path)
			}
			other => DescriptorError::Yaml(other),
		}
	}
}

/// Identity of one application, read once per command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
	/// Control-plane endpoint, e.g. `http://localhost:8080`.
	pub apiserver: String,
	pub author: String,
	/// Keep realised remote manifests across runs instead of re-downloading.
	#[serde(default)]
	pub cache_remotes: bool,
	pub name: String,
	#[serde(default = "default_namespace")]
	pub namespace: String,
	/// Workspace URL used by registry push/pull.
	pub source: String,
}

fn default_namespace() -> String {
	DEFAULT_NAMESPACE.to_string()
}

impl Default for Descriptor {
	fn default() -> Self {
		Self {
			apiserver: "http://localhost:8080".to_string(),
			author: PLACEHOLDER.to_string(),
			cache_remotes: false,
			name: PLACEHOLDER.to_string(),
			namespace: default_namespace(),
			source: PLACEHOLDER.to_string(),
		}
	}
}

impl Descriptor {
	pub fn load(path: &Path) -> Result<Self, DescriptorError> {
		Ok(yaml::load(path)?)
	}

	pub fn save(&self, path: &Path) -> Result<(), DescriptorError> {
		Ok(yaml::save(path, self)?)
	}

	/// Write a fresh descriptor, refusing to overwrite an existing one.
	pub fn create(&self, path: &Path) -> Result<(), DescriptorError> {
		if path.exists() {
			return Err(DescriptorError::AlreadyExists(path.to_path_buf()));
		}
		self.save(path)
	}

	/// `namespace/name` as shown to the user.
	pub fn qualified_name(&self) -> String {
		format!("{}/{}", self.namespace, self.name)
	}

	pub fn uses_default_namespace(&self) -> bool {
		self.namespace == DEFAULT_NAMESPACE
	}

	/// The `source` workspace, if it is acceptable for registry push/pull.
	pub fn workspace(&self) -> Result<&str, DescriptorError> {
		if VALID_WORKSPACE_PREFIXES
			.iter()
			.any(|prefix| self.source.starts_with(prefix))
		{
			Ok(&self.source)
		} else {
			Err(DescriptorError::InvalidWorkspace(self.source.clone()))
		}
	}
}
