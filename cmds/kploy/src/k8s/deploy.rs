//! Deployment orchestration.
//!
//! A deployment walks through fixed phases, in order:
//! namespace, secret set, manifest resolution, resource creation, pod
//! ownership and verification. The first failure stops the run. Nothing is
//! rolled back, so a failure after anything was created is reported as a
//! partial deployment listing what exists now.

use std::fmt;

use http::StatusCode;
use tracing::{debug, info, instrument};

use super::{
	client::{Gateway, GatewayError},
	delay::Delay,
	owner,
};
use crate::{
	config::{Settings, Workspace},
	descriptor::Descriptor,
	error::Error,
	manifest::{resolve_and_load, Manifest, ResourceKind},
	resolver::{CachePolicy, Resolver},
	secrets,
};

/// Progress of a deployment. Each phase implies all earlier ones completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeployPhase {
	Init,
	Connected,
	NamespaceEnsured,
	SecretsApplied,
	ManifestsResolved,
	ResourcesCreated,
	OwnershipPropagated,
	Verified,
}

impl fmt::Display for DeployPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let phase = match self {
			DeployPhase::Init => "init",
			DeployPhase::Connected => "connected",
			DeployPhase::NamespaceEnsured => "namespace ensured",
			DeployPhase::SecretsApplied => "secrets applied",
			DeployPhase::ManifestsResolved => "manifests resolved",
			DeployPhase::ResourcesCreated => "resources created",
			DeployPhase::OwnershipPropagated => "ownership propagated",
			DeployPhase::Verified => "verified",
		};
		f.write_str(phase)
	}
}

/// A service or controller created by a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedResource {
	pub kind: ResourceKind,
	pub name: String,
	pub path: String,
	/// Pods owned on behalf of a controller.
	pub owned_pods: Vec<String>,
}

/// Outcome of a complete deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
	pub phase: DeployPhase,
	pub namespace: String,
	/// Whether a namespace was created (as opposed to already existing).
	pub namespace_created: bool,
	/// Keys of the secret set, empty when no secret set was created.
	pub secret_keys: Vec<String>,
	pub resources: Vec<DeployedResource>,
}

impl DeployReport {
	fn new(namespace: &str) -> Self {
		Self {
			phase: DeployPhase::Connected,
			namespace: namespace.to_string(),
			namespace_created: false,
			secret_keys: Vec::new(),
			resources: Vec::new(),
		}
	}

	/// Everything that exists on the control plane because of this run.
	pub fn created(&self) -> Vec<String> {
		let mut created = Vec::new();
		if self.namespace_created {
			created.push(format!("namespace {}", self.namespace));
		}
		if !self.secret_keys.is_empty() {
			created.push(format!("secret {}", secrets::SECRET_SET_NAME));
		}
		for resource in &self.resources {
			created.push(format!("{} {}", resource.kind, resource.name));
		}
		created
	}
}

/// Engine deploying one application.
pub struct DeployEngine<'a, D> {
	gateway: &'a Gateway,
	workspace: &'a Workspace,
	descriptor: &'a Descriptor,
	settings: &'a Settings,
	delay: D,
	resolver: Resolver,
}

impl<'a, D: Delay> DeployEngine<'a, D> {
	/// Create an engine over an already connected gateway.
	pub fn new(
		gateway: &'a Gateway,
		workspace: &'a Workspace,
		descriptor: &'a Descriptor,
		settings: &'a Settings,
		delay: D,
	) -> Self {
		Self {
			gateway,
			workspace,
			descriptor,
			settings,
			delay,
			resolver: Resolver::new(),
		}
	}

	/// Run every phase after [`DeployPhase::Connected`].
	#[instrument(skip_all, fields(app = %self.descriptor.qualified_name()))]
	pub async fn run(&self) -> Result<DeployReport, Error> {
		let mut report = DeployReport::new(&self.descriptor.namespace);
		match self.deploy(&mut report).await {
			Ok(()) => Ok(report),
			Err(err) => {
				let created = report.created();
				if created.is_empty() {
					Err(err)
				} else {
					Err(Error::PartialDeployment {
						phase: report.phase,
						created,
						source: Box::new(err),
					})
				}
			}
		}
	}

	fn progress(&self, message: &str, manifest: &Manifest) {
		let kind = manifest.kind();
		let name = manifest.name();
		// Services carry neither, so both fields stay empty for them.
		let replicas = manifest.replicas();
		let selector = manifest.selector();
		if self.settings.verbose {
			info!(%kind, %name, ?replicas, ?selector, "{message}");
		} else {
			debug!(%kind, %name, ?replicas, ?selector, "{message}");
		}
	}

	async fn deploy(&self, report: &mut DeployReport) -> Result<(), Error> {
		let namespace = self.descriptor.namespace.as_str();

		report.namespace_created = self.ensure_namespace(namespace).await?;
		report.phase = DeployPhase::NamespaceEnsured;

		let data = secrets::collect(&self.workspace.secrets_dir())?;
		if data.is_empty() {
			debug!("no secret sources, skipping secret set");
		} else {
			let secret = secrets::secret_set(&data);
			self.gateway.create_secret(namespace, &secret).await?;
			report.secret_keys = data.into_keys().collect();
		}
		report.phase = DeployPhase::SecretsApplied;

		let manifests = self.resolve_manifests().await?;
		report.phase = DeployPhase::ManifestsResolved;

		for manifest in &manifests {
			self.progress("deploying", manifest);
			let path = self.gateway.create_resource(manifest, namespace).await?;
			report.resources.push(DeployedResource {
				kind: manifest.kind(),
				name: manifest.name().to_string(),
				path: path.clone(),
				owned_pods: Vec::new(),
			});
			owner::own(self.gateway, &path).await?;
		}
		report.phase = DeployPhase::ResourcesCreated;

		for resource in &mut report.resources {
			if !resource.kind.spawns_pods() {
				continue;
			}
			let controller = self.gateway.get_resource(&resource.path).await?;
			resource.owned_pods = owner::own_pods_of_controller(
				self.gateway,
				&controller,
				namespace,
				&self.delay,
				self.settings.settle_delay,
			)
			.await?;
		}
		report.phase = DeployPhase::OwnershipPropagated;

		for resource in &report.resources {
			let described = self.gateway.describe_resource(&resource.path).await?;
			debug!(
				kind = %resource.kind,
				name = %resource.name,
				status = %described.status,
				body = %described.body,
				"verified"
			);
		}
		report.phase = DeployPhase::Verified;

		Ok(())
	}

	/// Create the namespace unless it is `default`. Returns whether it was
	/// created by this call.
	async fn ensure_namespace(&self, namespace: &str) -> Result<bool, Error> {
		if self.descriptor.uses_default_namespace() {
			return Ok(false);
		}
		match self.gateway.create_namespace(namespace).await {
			Ok(_) => {
				info!(%namespace, "created namespace");
				Ok(true)
			}
			Err(GatewayError::Status { status, .. }) if status == StatusCode::CONFLICT => {
				debug!(%namespace, "namespace already exists");
				Ok(false)
			}
			Err(err) => Err(err.into()),
		}
	}

	/// Resolve and load services, then controllers. Every manifest is
	/// validated before anything is created.
	async fn resolve_manifests(&self) -> Result<Vec<Manifest>, Error> {
		let policy = CachePolicy::from_cache_remotes(self.descriptor.cache_remotes);
		let mut manifests = resolve_and_load(
			&self.resolver,
			ResourceKind::Service,
			&self.workspace.services_dir(),
			policy,
		)
		.await?;
		manifests.extend(
			resolve_and_load(
				&self.resolver,
				ResourceKind::Controller,
				&self.workspace.controllers_dir(),
				policy,
			)
			.await?,
		);
		Ok(manifests)
	}
}
