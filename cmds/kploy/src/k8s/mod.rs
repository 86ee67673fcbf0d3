//! Control-plane access and the engines driving it.
//!
//! Everything here talks to the core `v1` API through raw REST calls on the
//! [`client::Gateway`]; resources are handled as plain JSON documents.

pub mod client;
pub mod delay;
pub mod deploy;
pub mod owner;
pub mod scale;
pub mod teardown;

/// Core API paths.
pub mod paths {
	use crate::manifest::ResourceKind;

	/// Root of the core API, used as the health probe.
	pub const API_ROOT: &str = "/api";

	pub const NAMESPACES: &str = "/api/v1/namespaces";

	pub const NODES: &str = "/api/v1/nodes";

	pub fn namespace(namespace: &str) -> String {
		format!("{NAMESPACES}/{namespace}")
	}

	/// Collection of namespaced resources, e.g. `/api/v1/namespaces/shop/pods`.
	pub fn collection(namespace: &str, plural: &str) -> String {
		format!("{NAMESPACES}/{namespace}/{plural}")
	}

	pub fn resource(namespace: &str, plural: &str, name: &str) -> String {
		format!("{NAMESPACES}/{namespace}/{plural}/{name}")
	}

	pub fn of_kind(kind: ResourceKind, namespace: &str, name: &str) -> String {
		resource(namespace, kind.collection(), name)
	}

	pub fn pods(namespace: &str) -> String {
		collection(namespace, "pods")
	}

	pub fn pod(namespace: &str, name: &str) -> String {
		resource(namespace, "pods", name)
	}

	pub fn secret(namespace: &str, name: &str) -> String {
		resource(namespace, "secrets", name)
	}

}
