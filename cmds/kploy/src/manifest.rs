//! Resource manifests and the kinds of resources kploy deploys.

use std::{
	collections::BTreeMap,
	fmt,
	path::{Path, PathBuf},
};

use serde_json::Value;
use thiserror::Error;

use crate::{
	config::{RC_DIR, SVC_DIR},
	error::Error,
	resolver::{CachePolicy, Resolver},
	yaml::{self, YamlError},
};

#[derive(Debug, Error)]
pub enum ManifestError {
	#[error(transparent)]
	Yaml(#[from] YamlError),

	#[error("{kind} manifest {} is missing {field}", path.display())]
	MissingField {
		kind: ResourceKind,
		path: PathBuf,
		field: &'static str,
	},

	#[error("{kind} manifest {} has an invalid {field}: {reason}", path.display())]
	InvalidField {
		kind: ResourceKind,
		path: PathBuf,
		field: &'static str,
		reason: &'static str,
	},
}

/// The kinds of resource a manifest directory can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
	/// A service; has no children.
	Service,

	/// A replication controller; owns the pods matching its selector.
	Controller,
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResourceKind::Service => write!(f, "service"),
			ResourceKind::Controller => write!(f, "RC"),
		}
	}
}

impl ResourceKind {
	/// Collection segment of the core API, e.g. `services`.
	pub fn collection(self) -> &'static str {
		match self {
			ResourceKind::Service => "services",
			ResourceKind::Controller => "replicationcontrollers",
		}
	}

	/// Workspace directory holding manifests of this kind.
	pub fn directory(self) -> &'static str {
		match self {
			ResourceKind::Service => SVC_DIR,
			ResourceKind::Controller => RC_DIR,
		}
	}

	/// Whether the control plane spawns pods for resources of this kind,
	/// which then need owning as well.
	pub fn spawns_pods(self) -> bool {
		matches!(self, ResourceKind::Controller)
	}
}

/// A validated manifest read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
	kind: ResourceKind,
	name: String,
	origin: PathBuf,
	document: Value,
}

impl Manifest {
	/// Read and validate a manifest of the given kind.
	pub fn load(kind: ResourceKind, path: &Path) -> Result<Self, ManifestError> {
		let document: Value = yaml::load(path)?;
		Self::from_document(kind, path, document)
	}

	/// Validate an already-parsed document read from `origin`.
	pub fn from_document(
		kind: ResourceKind,
		origin: &Path,
		document: Value,
	) -> Result<Self, ManifestError> {
		let missing = |field| ManifestError::MissingField {
			kind,
			path: origin.to_path_buf(),
			field,
		};
		let invalid = |field, reason| ManifestError::InvalidField {
			kind,
			path: origin.to_path_buf(),
			field,
			reason,
		};

		let name = document
			.pointer("/metadata/name")
			.ok_or_else(|| missing("metadata.name"))?
			.as_str()
			.filter(|name| !name.is_empty())
			.ok_or_else(|| invalid("metadata.name", "expected a non-empty string"))?
			.to_string();

		if kind == ResourceKind::Controller {
			let selector = document
				.pointer("/spec/selector")
				.ok_or_else(|| missing("spec.selector"))?;
			if parse_selector(selector).is_none() {
				return Err(invalid("spec.selector", "expected a map of string labels"));
			}

			document
				.pointer("/spec/replicas")
				.ok_or_else(|| missing("spec.replicas"))?
				.as_u64()
				.ok_or_else(|| invalid("spec.replicas", "expected a non-negative integer"))?;
		}

		Ok(Self {
			kind,
			name,
			origin: origin.to_path_buf(),
			document,
		})
	}

	pub fn kind(&self) -> ResourceKind {
		self.kind
	}

	/// `metadata.name` of the resource.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// File the manifest was read from.
	pub fn origin(&self) -> &Path {
		&self.origin
	}

	pub fn document(&self) -> &Value {
		&self.document
	}

	/// Declared pod selector of a controller.
	pub fn selector(&self) -> Option<BTreeMap<String, String>> {
		self.document.pointer("/spec/selector").and_then(parse_selector)
	}

	/// Declared replica count of a controller.
	pub fn replicas(&self) -> Option<u64> {
		self.document.pointer("/spec/replicas").and_then(Value::as_u64)
	}
}

/// Resolve the manifest directory of `kind` and load every manifest in it.
pub async fn resolve_and_load(
	resolver: &Resolver,
	kind: ResourceKind,
	dir: &Path,
	policy: CachePolicy,
) -> Result<Vec<Manifest>, Error> {
	let mut manifests = Vec::new();
	for name in resolver.resolve(dir, policy).await? {
		manifests.push(Manifest::load(kind, &dir.join(name))?);
	}
	Ok(manifests)
}

/// Read a `key: value` selector map. `None` if any value is not a string.
pub fn parse_selector(value: &Value) -> Option<BTreeMap<String, String>> {
	value
		.as_object()?
		.iter()
		.map(|(key, value)| Some((key.clone(), value.as_str()?.to_string())))
		.collect()
}
