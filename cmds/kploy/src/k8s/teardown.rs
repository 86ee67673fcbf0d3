//! Teardown orchestration.
//!
//! Controllers are drained to zero replicas before they are deleted, so
//! their pods go away with them. A resource that is already gone counts as
//! removed. Other failures on a single resource are collected and the
//! teardown carries on; only losing the control plane stops it.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{
	client::{Gateway, GatewayError},
	paths,
};
use crate::{
	descriptor::Descriptor,
	error::Error,
	manifest::{Manifest, ResourceKind},
	secrets::SECRET_SET_NAME,
};

/// What happened to each resource of a teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
	pub deleted: Vec<String>,
	pub already_absent: Vec<String>,
	/// Resource and failure message.
	pub failed: Vec<(String, String)>,
}

impl TeardownReport {
	pub fn is_clean(&self) -> bool {
		self.failed.is_empty()
	}
}

/// Engine removing one application.
pub struct TeardownEngine<'a> {
	gateway: &'a Gateway,
	descriptor: &'a Descriptor,
}

impl<'a> TeardownEngine<'a> {
	pub fn new(gateway: &'a Gateway, descriptor: &'a Descriptor) -> Self {
		Self {
			gateway,
			descriptor,
		}
	}

	/// Remove the given services and controllers, then the secret set and
	/// the namespace.
	#[instrument(skip_all, fields(app = %self.descriptor.qualified_name()))]
	pub async fn destroy(
		&self,
		services: &[Manifest],
		controllers: &[Manifest],
	) -> Result<TeardownReport, Error> {
		let namespace = self.descriptor.namespace.as_str();
		let mut report = TeardownReport::default();

		for controller in controllers {
			self.drain_and_delete(controller, &mut report).await?;
		}

		for service in services {
			let label = format!("{} {}", service.kind(), service.name());
			let path = paths::of_kind(ResourceKind::Service, namespace, service.name());
			self.delete(label, &path, &mut report).await?;
		}

		let secret = paths::secret(namespace, SECRET_SET_NAME);
		self.delete(format!("secret {SECRET_SET_NAME}"), &secret, &mut report)
			.await?;

		if self.descriptor.uses_default_namespace() {
			debug!("leaving the default namespace in place");
		} else {
			self.delete(
				format!("namespace {namespace}"),
				&paths::namespace(namespace),
				&mut report,
			)
			.await?;
		}

		info!(
			deleted = report.deleted.len(),
			already_absent = report.already_absent.len(),
			failed = report.failed.len(),
			"teardown finished"
		);
		Ok(report)
	}

	async fn drain_and_delete(
		&self,
		controller: &Manifest,
		report: &mut TeardownReport,
	) -> Result<(), Error> {
		let label = format!("{} {}", controller.kind(), controller.name());
		let path = paths::of_kind(
			ResourceKind::Controller,
			&self.descriptor.namespace,
			controller.name(),
		);

		let described = self
			.gateway
			.describe_resource(&path)
			.await
			.map_err(|err| self.fatal(err))?;
		if described.is_not_found() {
			debug!(%label, "already absent");
			report.already_absent.push(label);
			return Ok(());
		}
		if !described.is_success() {
			warn!(%label, status = %described.status, "can't describe");
			report
				.failed
				.push((label, format!("describe returned {}", described.status)));
			return Ok(());
		}

		let mut drained = described.body;
		if let Some(spec) = drained.get_mut("spec").and_then(Value::as_object_mut) {
			spec.insert("replicas".to_string(), Value::from(0));
		}
		if let Err(err) = self.gateway.update_resource(&path, &drained).await {
			if err.is_unreachable() {
				return Err(self.fatal(err));
			}
			warn!(%label, error = %err, "can't scale to zero");
			report.failed.push((label, err.to_string()));
			return Ok(());
		}
		debug!(%label, "scaled to zero");

		self.delete(label, &path, report).await
	}

	async fn delete(
		&self,
		label: String,
		path: &str,
		report: &mut TeardownReport,
	) -> Result<(), Error> {
		match self.gateway.delete_resource(path).await {
			Ok(()) => {
				info!(%label, "deleted");
				report.deleted.push(label);
			}
			Err(err) if err.is_not_found() => {
				debug!(%label, "already absent");
				report.already_absent.push(label);
			}
			Err(err) if err.is_unreachable() => return Err(self.fatal(err)),
			Err(err) => {
				warn!(%label, error = %err, "can't delete");
				report.failed.push((label, err.to_string()));
			}
		}
		Ok(())
	}

	fn fatal(&self, err: GatewayError) -> Error {
		Error::connectivity(self.gateway.endpoint(), err)
	}
}
