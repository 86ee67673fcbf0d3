//! The per-application secret set.
//!
//! Each `env/<key>.secret` file contributes one entry: the file stem is the
//! key, the trimmed file content (base64-encoded) is the value. All entries
//! go into a single `Secret` named [`SECRET_SET_NAME`].

use std::{
	collections::BTreeMap,
	fs, io,
	path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::SECRETS_FILE_EXT;

/// Name of the secret holding an application's env data.
pub const SECRET_SET_NAME: &str = "kploy-secrets";

#[derive(Debug, Error)]
pub enum SecretsError {
	#[error("listing {}", path.display())]
	Walk {
		path: PathBuf,
		#[source]
		source: walkdir::Error,
	},

	#[error("reading secret source {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Collect key → base64 value pairs from the `*.secret` files of `dir`.
///
/// A missing directory holds no secrets.
pub fn collect(dir: &Path) -> Result<BTreeMap<String, String>, SecretsError> {
	let mut secrets = BTreeMap::new();
	if !dir.is_dir() {
		debug!(dir = %dir.display(), "no env directory");
		return Ok(secrets);
	}

	for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
		let entry = entry.map_err(|source| SecretsError::Walk {
			path: dir.to_path_buf(),
			source,
		})?;
		let path = entry.path();
		if !entry.file_type().is_file()
			|| path.extension().and_then(|ext| ext.to_str()) != Some(SECRETS_FILE_EXT)
		{
			continue;
		}
		let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
			continue;
		};

		let raw = fs::read_to_string(path).map_err(|source| SecretsError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		debug!(%key, "collected secret");
		secrets.insert(key.to_string(), STANDARD.encode(raw.trim()));
	}

	Ok(secrets)
}

/// The `Secret` document carrying already-encoded `data`.
pub fn secret_set(data: &BTreeMap<String, String>) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "Secret",
		"metadata": {"name": SECRET_SET_NAME},
		"type": "Opaque",
		"data": data,
	})
}

/// Decode the `data` of a fetched secret for display. Values that are not
/// valid base64 text are shown as they are.
pub fn decode(secret: &Value) -> BTreeMap<String, String> {
	let Some(data) = secret.get("data").and_then(Value::as_object) else {
		return BTreeMap::new();
	};
	data.iter()
		.filter_map(|(key, value)| {
			let encoded = value.as_str()?;
			let decoded = STANDARD
				.decode(encoded)
				.ok()
				.and_then(|bytes| String::from_utf8(bytes).ok())
				.unwrap_or_else(|| encoded.to_string());
			Some((key.clone(), decoded))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_collect() {
		let temp = TempDir::new().unwrap();
		let dir = temp.path();
		fs::write(dir.join("db-password.secret"), "s3cret\n").unwrap();
		fs::write(dir.join("api-key.secret"), "  abc  ").unwrap();
		fs::write(dir.join("README.md"), "not a secret").unwrap();
		fs::create_dir(dir.join("nested.secret")).unwrap();

		let secrets = collect(dir).unwrap();
		assert_eq!(
			secrets,
			BTreeMap::from([
				("api-key".to_string(), "YWJj".to_string()),
				("db-password".to_string(), "czNjcmV0".to_string()),
			])
		);
	}

	#[test]
	fn test_collect_missing_dir() {
		let temp = TempDir::new().unwrap();
		assert!(collect(&temp.path().join("env")).unwrap().is_empty());
	}

	#[test]
	fn test_secret_set_decodes_back() {
		let data = BTreeMap::from([("token".to_string(), STANDARD.encode("t0k"))]);
		let secret = secret_set(&data);

		assert_eq!(secret["metadata"]["name"], SECRET_SET_NAME);
		assert_eq!(secret["type"], "Opaque");
		assert_eq!(
			decode(&secret),
			BTreeMap::from([("token".to_string(), "t0k".to_string())])
		);
	}

	#[test]
	fn test_decode_without_data() {
		assert!(decode(&json!({"kind": "Secret"})).is_empty());
	}
}
