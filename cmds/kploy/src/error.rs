//! Errors reported to the user.
//!
//! Engines and commands fail with [`Error`]; `main` finds it in the `anyhow`
//! chain and turns it into a diagnostic, guidance and an exit code.

use thiserror::Error;

use crate::{
	descriptor::DescriptorError,
	k8s::{client::GatewayError, deploy::DeployPhase, owner::OwnerError},
	manifest::ManifestError,
	resolver::ResolveError,
	secrets::SecretsError,
};

#[derive(Debug, Error)]
pub enum Error {
	#[error("can't connect to the control plane at {endpoint}")]
	Connectivity {
		endpoint: String,
		#[source]
		source: GatewayError,
	},

	#[error(transparent)]
	Resolution(#[from] ResolveError),

	#[error(transparent)]
	Manifest(#[from] ManifestError),

	#[error(transparent)]
	Secrets(#[from] SecretsError),

	#[error("deployment stopped after {phase}, created so far: {}", created.join(", "))]
	PartialDeployment {
		phase: DeployPhase,
		created: Vec<String>,
		#[source]
		source: Box<Error>,
	},

	#[error(transparent)]
	Gateway(GatewayError),

	#[error(transparent)]
	Ownership(OwnerError),

	#[error(transparent)]
	Descriptor(DescriptorError),

	#[error(transparent)]
	InvalidWorkspace(DescriptorError),

	#[error("{0}")]
	Usage(String),
}

/// Broad class of an [`Error`], deciding guidance and exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Connectivity,
	Resolution,
	PartialDeployment,
	Gateway,
	Descriptor,
	InvalidWorkspace,
	Usage,
}

impl From<GatewayError> for Error {
	fn from(err: GatewayError) -> Self {
		Error::Gateway(err)
	}
}

impl From<OwnerError> for Error {
	fn from(err: OwnerError) -> Self {
		match err {
			OwnerError::Gateway(err) => Error::Gateway(err),
			other => Error::Ownership(other),
		}
	}
}

impl From<DescriptorError> for Error {
	fn from(err: DescriptorError) -> Self {
		match err {
			DescriptorError::InvalidWorkspace(_) => Error::InvalidWorkspace(err),
			other => Error::Descriptor(other),
		}
	}
}

impl Error {
	/// Wrap a failed health probe.
	pub fn connectivity(endpoint: &str, source: GatewayError) -> Self {
		Error::Connectivity {
			endpoint: endpoint.to_string(),
			source,
		}
	}

	pub fn usage(message: impl Into<String>) -> Self {
		Error::Usage(message.into())
	}

	/// The first [`Error`] in an `anyhow` chain.
	pub fn find(err: &anyhow::Error) -> Option<&Error> {
		err.chain().find_map(|cause| cause.downcast_ref::<Error>())
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Connectivity { .. } => ErrorKind::Connectivity,
			Error::Resolution(_) | Error::Manifest(_) | Error::Secrets(_) => ErrorKind::Resolution,
			Error::PartialDeployment { .. } => ErrorKind::PartialDeployment,
			Error::Gateway(_) | Error::Ownership(_) => ErrorKind::Gateway,
			Error::Descriptor(_) => ErrorKind::Descriptor,
			Error::InvalidWorkspace(_) => ErrorKind::InvalidWorkspace,
			Error::Usage(_) => ErrorKind::Usage,
		}
	}

	/// What the user can do about it, if anything useful can be said.
	pub fn guidance(&self) -> Option<&'static str> {
		match self.kind() {
			ErrorKind::Connectivity => {
				Some("Check the `apiserver` in your Kployfile and that the control plane is up.")
			}
			ErrorKind::Resolution => {
				Some("Consider validating your deployment with `kploy dryrun` first!")
			}
			ErrorKind::PartialDeployment => Some(
				"Some resources were created. Check them with `kploy list` and `kploy stats`, \
				 and remove them with `kploy destroy`.",
			),
			ErrorKind::Gateway => None,
			ErrorKind::Descriptor => match self {
				Error::Descriptor(DescriptorError::NotFound(_)) => {
					Some("Run `kploy init` to create one.")
				}
				_ => None,
			},
			ErrorKind::InvalidWorkspace => Some(
				"Set `source` in your Kployfile to a GitHub username or repo URL, \
				 for example `https://github.com/mhausenblas`.",
			),
			ErrorKind::Usage => Some("Use `kploy explain <command>` to learn more."),
		}
	}

	pub fn exit_code(&self) -> u8 {
		match self.kind() {
			ErrorKind::Usage => 2,
			_ => 1,
		}
	}
}
