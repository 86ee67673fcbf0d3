//! Scaling controllers and taking pods offline.

use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{client::Gateway, delay::Delay, owner, paths};
use crate::{config::Settings, error::Error, manifest::ResourceKind};

/// Result of a scale operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleOutcome {
	pub previous: u64,
	pub target: u64,
	/// Pods owned after a scale-up; always empty on scale-down.
	pub owned_pods: Vec<String>,
}

/// Result of taking a pod offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineOutcome {
	pub controller: String,
	/// Pods of the controller owned afterwards, including the replacement.
	pub owned_pods: Vec<String>,
}

/// Name of the controller that spawned `pod`, by the `<controller>-<suffix>`
/// naming convention of generated pods.
pub fn controller_of_pod(pod: &str) -> Option<&str> {
	pod.rsplit_once('-')
		.map(|(controller, _)| controller)
		.filter(|controller| !controller.is_empty())
}

pub struct ScaleEngine<'a, D> {
	gateway: &'a Gateway,
	namespace: &'a str,
	settings: &'a Settings,
	delay: D,
}

impl<'a, D: Delay> ScaleEngine<'a, D> {
	pub fn new(gateway: &'a Gateway, namespace: &'a str, settings: &'a Settings, delay: D) -> Self {
		Self {
			gateway,
			namespace,
			settings,
			delay,
		}
	}

	/// Set the replica count of `controller` to `target`. New pods spawned by
	/// a scale-up are owned; a scale-down leaves ownership alone.
	#[instrument(skip(self), fields(namespace = %self.namespace))]
	pub async fn scale(&self, controller: &str, target: u64) -> Result<ScaleOutcome, Error> {
		let path = paths::of_kind(ResourceKind::Controller, self.namespace, controller);

		let mut resource = self.gateway.get_resource(&path).await?;
		let previous = resource
			.pointer("/spec/replicas")
			.and_then(Value::as_u64)
			.unwrap_or_default();
		if let Some(spec) = resource.get_mut("spec").and_then(Value::as_object_mut) {
			spec.insert("replicas".to_string(), Value::from(target));
		}

		if self.settings.verbose {
			info!(previous, target, "scaling controller");
		}
		self.gateway.update_resource(&path, &resource).await?;

		let owned_pods = if target > previous {
			debug!("scaling up, owning new pods");
			let resource = self.gateway.get_resource(&path).await?;
			owner::own_pods_of_controller(
				self.gateway,
				&resource,
				self.namespace,
				&self.delay,
				self.settings.settle_delay,
			)
			.await?
		} else {
			Vec::new()
		};

		Ok(ScaleOutcome {
			previous,
			target,
			owned_pods,
		})
	}

	/// Strip the labels of `pod` so it leaves its controller and the owned
	/// set, then own the replacement the controller spawns.
	#[instrument(skip(self), fields(namespace = %self.namespace))]
	pub async fn take_offline(&self, pod: &str) -> Result<OfflineOutcome, Error> {
		let controller = controller_of_pod(pod)
			.ok_or_else(|| {
				Error::usage(format!(
					"can't tell the controller of pod `{pod}`, expected a name like `webserver-42abc`"
				))
			})?
			.to_string();

		owner::disown(self.gateway, &paths::pod(self.namespace, pod)).await?;
		debug!(%controller, "pod labels removed");

		let path = paths::of_kind(ResourceKind::Controller, self.namespace, &controller);
		let resource = self.gateway.get_resource(&path).await?;
		let owned_pods = owner::own_pods_of_controller(
			self.gateway,
			&resource,
			self.namespace,
			&self.delay,
			self.settings.settle_delay,
		)
		.await?;

		Ok(OfflineOutcome {
			controller,
			owned_pods,
		})
	}
}
