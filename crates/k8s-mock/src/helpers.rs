//! Helper functions for the mock control plane.

use std::collections::BTreeMap;

use serde_json::{json, Value};

/// Prefix of every core `v1` API path.
pub const CORE_V1: &str = "/api/v1";

/// Parse a Kubernetes API path into (collection path, resource name).
///
/// Examples:
/// - `/api/v1/namespaces/default/pods/web-1` -> (`/api/v1/namespaces/default/pods`, `web-1`)
/// - `/api/v1/namespaces/shop` -> (`/api/v1/namespaces`, `shop`)
pub fn parse_resource_path(path: &str) -> (String, String) {
	let path = path.trim_end_matches('/');
	match path.rsplit_once('/') {
		Some((collection, name)) => (collection.to_string(), name.to_string()),
		None => (path.to_string(), String::new()),
	}
}

/// Whether a core API path names a collection rather than a single object.
///
/// Below `/api/v1` collections and objects alternate:
/// `namespaces`, `namespaces/{ns}`, `namespaces/{ns}/pods`,
/// `namespaces/{ns}/pods/{name}`.
pub fn is_collection(path: &str) -> bool {
	let Some(rest) = path.trim_end_matches('/').strip_prefix(CORE_V1) else {
		return false;
	};
	let segments = rest.split('/').filter(|s| !s.is_empty()).count();
	segments % 2 == 1
}

/// Namespace a collection or object path lives in, if any.
pub fn namespace_of(path: &str) -> Option<&str> {
	let rest = path.strip_prefix(CORE_V1)?.strip_prefix("/namespaces/")?;
	let (namespace, _) = rest.split_once('/')?;
	Some(namespace)
}

/// Parse an equality-based label selector like `app=web,tier=front`.
pub fn parse_label_selector(selector: &str) -> BTreeMap<String, String> {
	selector
		.split(',')
		.filter_map(|term| {
			let (key, value) = term.split_once("==").or_else(|| term.split_once('='))?;
			Some((key.trim().to_string(), value.trim().to_string()))
		})
		.collect()
}

/// Whether `object` carries every label of `selector`.
pub fn matches_selector(object: &Value, selector: &BTreeMap<String, String>) -> bool {
	let labels = object.pointer("/metadata/labels");
	selector.iter().all(|(key, value)| {
		labels
			.and_then(|labels| labels.get(key))
			.and_then(Value::as_str)
			== Some(value.as_str())
	})
}

/// A `Status` failure body.
pub fn status_body(code: u16, reason: &str, message: &str) -> Value {
	json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}

/// A `List` body.
pub fn list_body(kind: &str, items: Vec<Value>) -> Value {
	json!({
		"kind": kind,
		"apiVersion": "v1",
		"metadata": {"resourceVersion": "1"},
		"items": items
	})
}
