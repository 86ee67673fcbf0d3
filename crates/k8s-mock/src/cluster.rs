//! In-memory state of the mock control plane.
//!
//! Objects are stored as raw JSON under their collection path and name.
//! Replication controllers are reconciled after every change in their
//! namespace: missing pods are spawned, surplus pods removed. Deleting a
//! controller leaves its pods behind.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, trace};

use super::helpers::{
	is_collection, list_body, matches_selector, namespace_of, parse_label_selector,
	parse_resource_path, status_body, CORE_V1,
};

/// Collection of namespaces.
pub const NAMESPACES: &str = "/api/v1/namespaces";

/// Collection of nodes.
pub const NODES: &str = "/api/v1/nodes";

/// Status code and body answered to a request.
pub type Outcome = (u16, Value);

/// Key of a stored object: (collection path, name).
type Key = (String, String);

pub struct Cluster {
	objects: BTreeMap<Key, Value>,
	nodes: Vec<String>,
	spawn_pods: bool,
	pod_counter: u64,
}

/// Collection path of a core object, derived from its kind.
pub fn collection_for(object: &Value) -> Option<String> {
	let kind = object.get("kind")?.as_str()?;
	let plural = match kind {
		"Namespace" => return Some(NAMESPACES.to_string()),
		"Node" => return Some(NODES.to_string()),
		"Pod" => "pods",
		"Service" => "services",
		"ReplicationController" => "replicationcontrollers",
		"Secret" => "secrets",
		"ConfigMap" => "configmaps",
		_ => return None,
	};
	let namespace = object
		.pointer("/metadata/namespace")
		.and_then(Value::as_str)
		.unwrap_or("default");
	Some(format!("{NAMESPACES}/{namespace}/{plural}"))
}

fn node(name: &str) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "Node",
		"metadata": {
			"name": name,
			"selfLink": format!("{NODES}/{name}"),
		},
		"status": {
			"addresses": [{"type": "InternalIP", "address": name}],
			"capacity": {"cpu": "2", "memory": "4Gi", "pods": "110"},
			"nodeInfo": {
				"architecture": "amd64",
				"bootID": "mock-boot",
				"containerRuntimeVersion": "docker://1.9.1",
				"kernelVersion": "4.2.0",
				"kubeProxyVersion": "v1.1.3",
				"kubeletVersion": "v1.1.3",
				"machineID": "mock-machine",
				"operatingSystem": "linux",
				"osImage": "Debian GNU/Linux 8 (jessie)",
				"systemUUID": "mock-uuid"
			}
		}
	})
}

/// Last segment of a collection path, e.g. `pods`.
fn plural(collection: &str) -> &str {
	collection.rsplit('/').next().unwrap_or(collection)
}

impl Cluster {
	/// A cluster with the `default` namespace and the given nodes.
	pub fn new(nodes: Vec<String>, spawn_pods: bool) -> Self {
		let mut cluster = Self {
			objects: BTreeMap::new(),
			nodes,
			spawn_pods,
			pod_counter: 0,
		};
		cluster.insert_namespace("default");
		for name in cluster.nodes.clone() {
			cluster
				.objects
				.insert((NODES.to_string(), name.clone()), node(&name));
		}
		cluster
	}

	fn insert_namespace(&mut self, name: &str) {
		self.objects
			.entry((NAMESPACES.to_string(), name.to_string()))
			.or_insert_with(|| {
				json!({
					"apiVersion": "v1",
					"kind": "Namespace",
					"metadata": {
						"name": name,
						"selfLink": format!("{NAMESPACES}/{name}"),
					},
					"status": {"phase": "Active"}
				})
			});
	}

	fn namespace_exists(&self, name: &str) -> bool {
		self.objects
			.contains_key(&(NAMESPACES.to_string(), name.to_string()))
	}

	/// Store an object as-is, creating its namespace when needed.
	pub fn seed(&mut self, object: Value) {
		let Some(collection) = collection_for(&object) else {
			debug!(?object, "ignoring seed object of unknown kind");
			return;
		};
		let Some(name) = object.pointer("/metadata/name").and_then(Value::as_str) else {
			return;
		};
		let name = name.to_string();
		let namespace = namespace_of(&collection).map(str::to_string);
		if let Some(namespace) = &namespace {
			self.insert_namespace(namespace);
		}
		trace!(%collection, %name, "seeded object");
		self.objects.insert((collection, name), object);
		if let Some(namespace) = namespace {
			self.reconcile(&namespace);
		}
	}

	/// Stored object at `path`.
	pub fn object(&self, path: &str) -> Option<&Value> {
		let key = parse_resource_path(path);
		self.objects.get(&key)
	}

	/// Stored objects of a collection, in name order.
	pub fn objects(&self, collection: &str) -> Vec<Value> {
		self.objects
			.iter()
			.filter(|((col, _), _)| col == collection)
			.map(|(_, object)| object.clone())
			.collect()
	}

	pub fn get(&self, path: &str, selector: Option<&str>) -> Outcome {
		if is_collection(path) {
			return self.list(path, selector);
		}
		match self.object(path) {
			Some(object) => (200, object.clone()),
			None => not_found(path),
		}
	}

	pub fn list(&self, collection: &str, selector: Option<&str>) -> Outcome {
		let selector = selector.map(parse_label_selector).unwrap_or_default();
		let items = self
			.objects(collection)
			.into_iter()
			.filter(|object| matches_selector(object, &selector))
			.collect();
		(200, list_body("List", items))
	}

	pub fn create(&mut self, collection: &str, mut body: Value) -> Outcome {
		if !is_collection(collection) {
			return (
				405,
				status_body(405, "MethodNotAllowed", "POST is only allowed on collections"),
			);
		}
		let Some(name) = body
			.pointer("/metadata/name")
			.and_then(Value::as_str)
			.filter(|name| !name.is_empty())
			.map(str::to_string)
		else {
			return (422, status_body(422, "Invalid", "metadata.name: Required value"));
		};

		let namespace = namespace_of(collection).map(str::to_string);
		if let Some(namespace) = &namespace {
			if !self.namespace_exists(namespace) {
				return (
					404,
					status_body(
						404,
						"NotFound",
						&format!("namespaces \"{namespace}\" not found"),
					),
				);
			}
		}

		let key = (collection.to_string(), name.clone());
		if self.objects.contains_key(&key) {
			return (
				409,
				status_body(
					409,
					"AlreadyExists",
					&format!("{} \"{name}\" already exists", plural(collection)),
				),
			);
		}

		if let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut) {
			metadata.insert(
				"selfLink".to_string(),
				Value::String(format!("{collection}/{name}")),
			);
			if let Some(namespace) = &namespace {
				metadata.insert("namespace".to_string(), Value::String(namespace.clone()));
			}
		}

		debug!(%collection, %name, "created object");
		self.objects.insert(key.clone(), body);
		if let Some(namespace) = namespace {
			self.reconcile(&namespace);
		}
		(201, self.objects.get(&key).cloned().unwrap_or_default())
	}

	pub fn replace(&mut self, path: &str, mut body: Value) -> Outcome {
		if is_collection(path) {
			return (
				405,
				status_body(405, "MethodNotAllowed", "PUT is only allowed on objects"),
			);
		}
		let key = parse_resource_path(path);
		if !self.objects.contains_key(&key) {
			return not_found(path);
		}
		if let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut) {
			metadata.insert("selfLink".to_string(), Value::String(path.to_string()));
		}

		debug!(%path, "replaced object");
		self.objects.insert(key.clone(), body);
		if let Some(namespace) = namespace_of(path).map(str::to_string) {
			self.reconcile(&namespace);
		}
		(200, self.objects.get(&key).cloned().unwrap_or_default())
	}

	pub fn delete(&mut self, path: &str) -> Outcome {
		let key = parse_resource_path(path);
		let Some(object) = self.objects.remove(&key) else {
			return not_found(path);
		};
		debug!(%path, "deleted object");

		if key.0 == NAMESPACES {
			let prefix = format!("{NAMESPACES}/{}/", key.1);
			self.objects
				.retain(|(collection, _), _| !collection.starts_with(&prefix));
		} else if let Some(namespace) = namespace_of(path).map(str::to_string) {
			self.reconcile(&namespace);
		}
		(200, object)
	}

	/// Bring the pods of every controller in `namespace` to its replica count.
	fn reconcile(&mut self, namespace: &str) {
		if !self.spawn_pods {
			return;
		}
		let controllers = self.objects(&format!(
			"{NAMESPACES}/{namespace}/replicationcontrollers"
		));
		let pods_collection = format!("{NAMESPACES}/{namespace}/pods");

		for controller in controllers {
			let Some(name) = controller.pointer("/metadata/name").and_then(Value::as_str) else {
				continue;
			};
			let desired = controller
				.pointer("/spec/replicas")
				.and_then(Value::as_u64)
				.unwrap_or_default() as usize;
			let selector: BTreeMap<String, String> = controller
				.pointer("/spec/selector")
				.and_then(Value::as_object)
				.map(|selector| {
					selector
						.iter()
						.filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
						.collect()
				})
				.unwrap_or_default();
			if selector.is_empty() {
				continue;
			}

			let running: Vec<String> = self
				.objects(&pods_collection)
				.iter()
				.filter(|pod| matches_selector(pod, &selector))
				.filter_map(|pod| pod.pointer("/metadata/name")?.as_str().map(str::to_string))
				.collect();

			if running.len() > desired {
				for pod in &running[desired..] {
					trace!(controller = %name, %pod, "removing surplus pod");
					self.objects.remove(&(pods_collection.clone(), pod.clone()));
				}
			}
			for _ in running.len()..desired {
				let pod = self.spawn_pod(&controller, name, namespace, &selector);
				trace!(controller = %name, pod = %pod, "spawned pod");
			}
		}
	}

	fn spawn_pod(
		&mut self,
		controller: &Value,
		controller_name: &str,
		namespace: &str,
		selector: &BTreeMap<String, String>,
	) -> String {
		self.pod_counter += 1;
		let name = format!("{controller_name}-{:05x}", self.pod_counter);
		let host = if self.nodes.is_empty() {
			String::new()
		} else {
			self.nodes[(self.pod_counter as usize - 1) % self.nodes.len()].clone()
		};
		let labels = controller
			.pointer("/spec/template/metadata/labels")
			.cloned()
			.unwrap_or_else(|| json!(selector));
		let spec = controller
			.pointer("/spec/template/spec")
			.cloned()
			.unwrap_or_else(|| json!({"containers": []}));
		let collection = format!("{NAMESPACES}/{namespace}/pods");

		let pod = json!({
			"apiVersion": "v1",
			"kind": "Pod",
			"metadata": {
				"name": name,
				"namespace": namespace,
				"labels": labels,
				"selfLink": format!("{collection}/{name}"),
			},
			"spec": spec,
			"status": {
				"phase": "Running",
				"hostIP": host,
			}
		});
		self.objects.insert((collection, name.clone()), pod);
		name
	}
}

fn not_found(path: &str) -> Outcome {
	let (collection, name) = parse_resource_path(path);
	let message = if collection.starts_with(CORE_V1) {
		format!("{} \"{name}\" not found", plural(&collection))
	} else {
		format!("the server could not find the requested resource {path}")
	};
	(404, status_body(404, "NotFound", &message))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn web_controller(replicas: u64) -> Value {
		json!({
			"apiVersion": "v1",
			"kind": "ReplicationController",
			"metadata": {"name": "web"},
			"spec": {
				"replicas": replicas,
				"selector": {"app": "web"},
				"template": {
					"metadata": {"labels": {"app": "web"}},
					"spec": {"containers": [{"name": "web", "image": "nginx"}]}
				}
			}
		})
	}

	const RCS: &str = "/api/v1/namespaces/default/replicationcontrollers";
	const PODS: &str = "/api/v1/namespaces/default/pods";

	#[test]
	fn test_controller_spawns_and_removes_pods() {
		let mut cluster = Cluster::new(vec!["10.0.0.1".to_string()], true);

		let (status, _) = cluster.create(RCS, web_controller(2));
		assert_eq!(status, 201);
		assert_eq!(cluster.objects(PODS).len(), 2);

		let (status, _) = cluster.replace(&format!("{RCS}/web"), web_controller(0));
		assert_eq!(status, 200);
		assert!(cluster.objects(PODS).is_empty());
	}

	#[test]
	fn test_relabeled_pod_is_replaced() {
		let mut cluster = Cluster::new(vec!["10.0.0.1".to_string()], true);
		cluster.create(RCS, web_controller(1));
		let pod = cluster.objects(PODS).remove(0);
		let pod_name = pod["metadata"]["name"].as_str().unwrap().to_string();

		let mut offline = pod.clone();
		offline["metadata"]["labels"] = json!({});
		cluster.replace(&format!("{PODS}/{pod_name}"), offline);

		let pods = cluster.objects(PODS);
		assert_eq!(pods.len(), 2);
	}

	#[test]
	fn test_deleted_controller_orphans_pods() {
		let mut cluster = Cluster::new(vec!["10.0.0.1".to_string()], true);
		cluster.create(RCS, web_controller(2));
		cluster.delete(&format!("{RCS}/web"));
		assert_eq!(cluster.objects(PODS).len(), 2);
	}

	#[test]
	fn test_create_conflicts_and_missing_namespace() {
		let mut cluster = Cluster::new(Vec::new(), false);
		assert_eq!(cluster.create(RCS, web_controller(1)).0, 201);
		assert_eq!(cluster.create(RCS, web_controller(1)).0, 409);
		assert_eq!(
			cluster
				.create(
					"/api/v1/namespaces/shop/replicationcontrollers",
					web_controller(1)
				)
				.0,
			404
		);
		assert!(cluster.objects(PODS).is_empty());
	}

	#[test]
	fn test_namespace_delete_cascades() {
		let mut cluster = Cluster::new(Vec::new(), false);
		cluster.create(NAMESPACES, json!({"metadata": {"name": "shop"}}));
		cluster.create(
			"/api/v1/namespaces/shop/services",
			json!({"metadata": {"name": "web"}}),
		);

		assert_eq!(cluster.delete("/api/v1/namespaces/shop").0, 200);
		assert!(cluster.objects("/api/v1/namespaces/shop/services").is_empty());
		assert_eq!(cluster.get("/api/v1/namespaces/shop/services/web", None).0, 404);
	}

	#[test]
	fn test_list_by_selector() {
		let mut cluster = Cluster::new(vec!["10.0.0.1".to_string()], true);
		cluster.create(RCS, web_controller(2));

		let (_, list) = cluster.get(PODS, Some("app=web"));
		assert_eq!(list["items"].as_array().unwrap().len(), 2);

		let (_, list) = cluster.get(PODS, Some("guard=pyk"));
		assert!(list["items"].as_array().unwrap().is_empty());
	}

	#[test]
	fn test_collection_for() {
		assert_eq!(
			collection_for(&json!({"kind": "Pod", "metadata": {"namespace": "shop"}})),
			Some("/api/v1/namespaces/shop/pods".to_string())
		);
		assert_eq!(
			collection_for(&json!({"kind": "Namespace"})),
			Some(NAMESPACES.to_string())
		);
		assert_eq!(collection_for(&json!({"kind": "Deployment"})), None);
	}
}
