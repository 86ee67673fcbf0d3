//! Key-ordered YAML documents on disk.
//!
//! Manifests and the deployment descriptor are both stored as YAML. Documents
//! are decoded into `serde_json::Value` (built with `preserve_order`) so the
//! key order of the file survives a load/save cycle.

use std::{
	fs, io,
	path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::instrument;

/// Errors from reading or writing a YAML document.
#[derive(Debug, Error)]
pub enum YamlError {
	#[error("reading {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("parsing {}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("serializing {}", path.display())]
	Serialize {
		path: PathBuf,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("writing {}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

impl YamlError {
	/// Whether the document could not be read because the file does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(self, YamlError::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
	}
}

/// Load a YAML document.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, YamlError> {
	let content = fs::read_to_string(path).map_err(|source| YamlError::Read {
		path: path.to_path_buf(),
		source,
	})?;

	serde_yaml_with_quirks::from_str(&content).map_err(|source| YamlError::Parse {
		path: path.to_path_buf(),
		source,
	})
}

/// Save a document as YAML, replacing any existing file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn save<T: Serialize>(path: &Path, document: &T) -> Result<(), YamlError> {
	let content =
		serde_yaml_with_quirks::to_string(document).map_err(|source| YamlError::Serialize {
			path: path.to_path_buf(),
			source,
		})?;

	fs::write(path, content).map_err(|source| YamlError::Write {
		path: path.to_path_buf(),
		source,
	})
}
