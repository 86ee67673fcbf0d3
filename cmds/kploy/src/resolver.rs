//! Manifest directory resolution.
//!
//! A manifest directory holds two kinds of entries:
//! - `*.yaml` files, deployed as-is;
//! - `*.yaml.url` remote references, whose only content is the URL of a
//!   manifest hosted elsewhere.
//!
//! Remote references are realised next to themselves (`db.yaml.url` becomes
//! `db.yaml`). The realised file is not part of the result of the walk that
//! downloaded it, only of later walks.

use std::{
	fs, io,
	path::{Path, PathBuf},
	time::Duration,
};

use thiserror::Error;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Suffix of a manifest file.
pub const MANIFEST_SUFFIX: &str = ".yaml";

/// Suffix of a remote reference file.
pub const REMOTE_SUFFIX: &str = ".url";

/// How long a remote manifest download may take.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("manifest directory {} does not exist", .0.display())]
	MissingDirectory(PathBuf),

	#[error("listing {}", path.display())]
	Walk {
		path: PathBuf,
		#[source]
		source: walkdir::Error,
	},

	#[error("reading remote reference {}", path.display())]
	ReadReference {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("remote reference {} is empty", .0.display())]
	EmptyReference(PathBuf),

	#[error("fetching remote manifest {url}")]
	Fetch {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("writing remote manifest to {}", path.display())]
	WriteRealized {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Whether an already realised remote manifest may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
	/// Download every remote reference again.
	#[default]
	AlwaysFetch,

	/// Skip the download when the realised file already exists.
	Reuse,
}

impl CachePolicy {
	/// Policy for the descriptor's `cache_remotes` flag.
	pub fn from_cache_remotes(cache_remotes: bool) -> Self {
		if cache_remotes {
			CachePolicy::Reuse
		} else {
			CachePolicy::AlwaysFetch
		}
	}
}

/// How a directory entry is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
	Manifest(String),
	Remote { reference: PathBuf, realized: PathBuf },
	Ignored(String),
}

fn classify(dir: &Path, file_name: &str) -> Entry {
	if let Some(realized) = file_name.strip_suffix(REMOTE_SUFFIX) {
		Entry::Remote {
			reference: dir.join(file_name),
			realized: dir.join(realized),
		}
	} else if file_name.ends_with(MANIFEST_SUFFIX) {
		Entry::Manifest(file_name.to_string())
	} else {
		Entry::Ignored(file_name.to_string())
	}
}

/// Resolves manifest directories, downloading remote references.
#[derive(Debug, Clone)]
pub struct Resolver {
	http: reqwest::Client,
	fetch_timeout: Duration,
}

impl Default for Resolver {
	fn default() -> Self {
		Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
	}
}

impl Resolver {
	pub fn new() -> Self {
		Self::default()
	}

	/// A resolver giving up on a remote manifest after `fetch_timeout`.
	pub fn with_timeout(fetch_timeout: Duration) -> Self {
		Self {
			http: reqwest::Client::new(),
			fetch_timeout,
		}
	}

	/// Walk `dir` (one level, in file name order) and return the names of the
	/// manifests to deploy.
	///
	/// Every remote reference is realised on disk first; a failed download
	/// fails the whole call.
	#[instrument(skip_all, fields(dir = %dir.display(), ?policy))]
	pub async fn resolve(&self, dir: &Path, policy: CachePolicy) -> Result<Vec<String>, ResolveError> {
		if !dir.is_dir() {
			return Err(ResolveError::MissingDirectory(dir.to_path_buf()));
		}

		// The listing is taken up front so files realised below do not show up.
		let entries = WalkDir::new(dir)
			.min_depth(1)
			.max_depth(1)
			.sort_by_file_name()
			.into_iter()
			.collect::<Result<Vec<_>, _>>()
			.map_err(|source| ResolveError::Walk {
				path: dir.to_path_buf(),
				source,
			})?;

		let mut manifests = Vec::new();
		for entry in entries {
			if !entry.file_type().is_file() {
				continue;
			}
			let file_name = entry.file_name().to_string_lossy();

			match classify(dir, &file_name) {
				Entry::Manifest(name) => {
					debug!(manifest = %name, "found manifest");
					manifests.push(name);
				}
				Entry::Remote {
					reference,
					realized,
				} => self.realize(&reference, &realized, policy).await?,
				Entry::Ignored(name) => debug!(file = %name, "ignoring file"),
			}
		}

		Ok(manifests)
	}

	async fn realize(
		&self,
		reference: &Path,
		realized: &Path,
		policy: CachePolicy,
	) -> Result<(), ResolveError> {
		if policy == CachePolicy::Reuse && realized.exists() {
			debug!(path = %realized.display(), "using cached remote manifest");
			return Ok(());
		}

		let url = fs::read_to_string(reference).map_err(|source| ResolveError::ReadReference {
			path: reference.to_path_buf(),
			source,
		})?;
		let url = url.trim();
		if url.is_empty() {
			return Err(ResolveError::EmptyReference(reference.to_path_buf()));
		}

		info!(%url, path = %realized.display(), "downloading remote manifest");
		let fetch_err = |source| ResolveError::Fetch {
			url: url.to_string(),
			source,
		};
		let body = self
			.http
			.get(url)
			.timeout(self.fetch_timeout)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(fetch_err)?
			.bytes()
			.await
			.map_err(fetch_err)?;

		fs::write(realized, &body).map_err(|source| ResolveError::WriteRealized {
			path: realized.to_path_buf(),
			source,
		})
	}
}
