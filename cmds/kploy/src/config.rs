//! Run settings and the on-disk layout of a kploy application.
//!
//! An application lives in a single directory holding the `Kployfile`
//! deployment descriptor and three sibling directories: controller manifests,
//! service manifests and secret sources.

use std::{
	path::{Path, PathBuf},
	time::Duration,
};

/// Name of the deployment descriptor file.
pub const DEPLOYMENT_DESCRIPTOR: &str = "Kployfile";

/// Directory holding replication controller manifests.
pub const RC_DIR: &str = "rcs";

/// Directory holding service manifests.
pub const SVC_DIR: &str = "services";

/// Directory holding secret sources.
pub const ENV_DIR: &str = "env";

/// Extension marking a file in [`ENV_DIR`] as a secret source.
pub const SECRETS_FILE_EXT: &str = "secret";

/// Default time the control plane gets to spawn a controller's pods before
/// kploy looks for them.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Environment variable overriding [`DEFAULT_SETTLE_DELAY`], in whole seconds.
pub const SETTLE_DELAY_ENV: &str = "KPLOY_SETTLE_SECS";

/// Settings threaded through every engine call of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	/// Emit the extra progress lines the user asked for with `--verbose`.
	pub verbose: bool,

	/// How long to wait after creating or scaling up a controller before
	/// owning its pods.
	pub settle_delay: Duration,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			verbose: false,
			settle_delay: DEFAULT_SETTLE_DELAY,
		}
	}
}

impl Settings {
	/// Build settings from CLI flags, honouring `KPLOY_SETTLE_SECS`.
	pub fn from_env(verbose: bool) -> Self {
		let settle_delay = std::env::var(SETTLE_DELAY_ENV)
			.ok()
			.and_then(|raw| parse_settle_secs(&raw))
			.unwrap_or(DEFAULT_SETTLE_DELAY);

		Self {
			verbose,
			settle_delay,
		}
	}
}

fn parse_settle_secs(raw: &str) -> Option<Duration> {
	match raw.trim().parse::<u64>() {
		Ok(secs) => Some(Duration::from_secs(secs)),
		Err(_) => {
			tracing::warn!(value = %raw, "ignoring invalid {SETTLE_DELAY_ENV}");
			None
		}
	}
}

/// Directory layout of one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
	root: PathBuf,
}

impl Workspace {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Workspace rooted at the current working directory.
	pub fn current() -> std::io::Result<Self> {
		Ok(Self::new(std::env::current_dir()?))
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn descriptor_path(&self) -> PathBuf {
		self.root.join(DEPLOYMENT_DESCRIPTOR)
	}

	pub fn controllers_dir(&self) -> PathBuf {
		self.root.join(RC_DIR)
	}

	pub fn services_dir(&self) -> PathBuf {
		self.root.join(SVC_DIR)
	}

	pub fn secrets_dir(&self) -> PathBuf {
		self.root.join(ENV_DIR)
	}
}
