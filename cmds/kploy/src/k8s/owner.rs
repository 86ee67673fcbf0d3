//! Ownership marking.
//!
//! Every resource kploy creates carries the label `guard=pyk`. The label is
//! the only way `list` and `stats` find kploy's resources again, so it is
//! merged into whatever labels a resource already has and never replaces
//! them.

use std::{collections::BTreeMap, time::Duration};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::{
	client::{Gateway, GatewayError},
	delay::Delay,
	paths,
};
use crate::manifest::parse_selector;

pub const OWNER_LABEL_KEY: &str = "guard";
pub const OWNER_LABEL_VALUE: &str = "pyk";

#[derive(Debug, Error)]
pub enum OwnerError {
	#[error(transparent)]
	Gateway(#[from] GatewayError),

	#[error("controller {controller} has no usable spec.selector")]
	MissingSelector { controller: String },
}

/// URL-encoded label selector matching every resource kploy owns.
pub fn owned_selector() -> String {
	encode_selector(&BTreeMap::from([(
		OWNER_LABEL_KEY.to_string(),
		OWNER_LABEL_VALUE.to_string(),
	)]))
}

/// URL-encode an equality-based label selector, e.g. `app%3Dweb`.
pub fn encode_selector(selector: &BTreeMap<String, String>) -> String {
	let raw = selector
		.iter()
		.map(|(key, value)| format!("{key}={value}"))
		.collect::<Vec<_>>()
		.join(",");
	urlencoding::encode(&raw).into_owned()
}

fn labels_mut(resource: &mut Value) -> Option<&mut Map<String, Value>> {
	let metadata = resource
		.as_object_mut()?
		.entry("metadata")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()?;
	let labels = metadata
		.entry("labels")
		.or_insert_with(|| Value::Object(Map::new()));
	if labels.is_null() {
		*labels = Value::Object(Map::new());
	}
	labels.as_object_mut()
}

/// Merge the ownership label into a resource document.
pub fn mark_owned(resource: &mut Value) {
	if let Some(labels) = labels_mut(resource) {
		labels.insert(
			OWNER_LABEL_KEY.to_string(),
			Value::String(OWNER_LABEL_VALUE.to_string()),
		);
	}
}

/// Whether the resource carries the ownership label.
pub fn is_owned(resource: &Value) -> bool {
	resource
		.pointer(&format!("/metadata/labels/{OWNER_LABEL_KEY}"))
		.and_then(Value::as_str)
		== Some(OWNER_LABEL_VALUE)
}

/// Label the resource at `path` as owned: fetch it, merge the label and put
/// the whole document back. A resource that already carries the label is
/// left untouched.
#[instrument(skip(gateway))]
pub async fn own(gateway: &Gateway, path: &str) -> Result<(), GatewayError> {
	let mut resource = gateway.get_resource(path).await?;
	if is_owned(&resource) {
		debug!("already owned");
		return Ok(());
	}
	mark_owned(&mut resource);
	gateway.update_resource(path, &resource).await?;
	debug!("owned");
	Ok(())
}

/// Drop every label of the resource at `path`.
///
/// A pod without labels leaves its controller's selector, so the controller
/// replaces it, and it leaves the owned set.
#[instrument(skip(gateway))]
pub async fn disown(gateway: &Gateway, path: &str) -> Result<(), GatewayError> {
	let mut resource = gateway.get_resource(path).await?;
	if let Some(labels) = labels_mut(&mut resource) {
		labels.clear();
	}
	gateway.update_resource(path, &resource).await?;
	Ok(())
}

/// Wait for the control plane to spawn a controller's pods, then own every
/// pod its selector matches. Returns the names of the owned pods.
///
/// Pods spawned after the wait are not owned.
#[instrument(skip_all, fields(namespace = %namespace, ?settle))]
pub async fn own_pods_of_controller<D: Delay>(
	gateway: &Gateway,
	controller: &Value,
	namespace: &str,
	delay: &D,
	settle: Duration,
) -> Result<Vec<String>, OwnerError> {
	let name = controller
		.pointer("/metadata/name")
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string();
	let selector = controller
		.pointer("/spec/selector")
		.and_then(parse_selector)
		.filter(|selector| !selector.is_empty())
		.ok_or_else(|| OwnerError::MissingSelector {
			controller: name.clone(),
		})?;

	delay.wait(settle).await;

	let pods = gateway
		.list_by_selector(&paths::pods(namespace), &encode_selector(&selector))
		.await?;

	let mut owned = Vec::with_capacity(pods.len());
	for pod in pods {
		let Some(pod_name) = pod.pointer("/metadata/name").and_then(Value::as_str) else {
			continue;
		};
		own(gateway, &paths::pod(namespace, pod_name)).await?;
		owned.push(pod_name.to_string());
	}

	info!(controller = %name, pods = owned.len(), "owned controller pods");
	Ok(owned)
}
