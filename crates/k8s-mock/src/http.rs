//! HTTP-based mock control plane using wiremock.
//!
//! Serves the core `v1` REST hierarchy from a [`Cluster`] shared between the
//! request handlers and the test, so tests can both drive the server over
//! HTTP and inspect what it holds.

use std::sync::{Arc, RwLock};

use bon::Builder;
use serde_json::{json, Value};
use tracing::debug;
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::cluster::{Cluster, Outcome};

/// Node every pod lands on unless other nodes are configured.
pub const DEFAULT_NODE: &str = "10.0.0.1";

/// Type alias for the shared mutable cluster state.
pub type SharedCluster = Arc<RwLock<Cluster>>;

/// Regex matching every path below the core `v1` API.
const CORE_V1_PATHS: &str = r"^/api/v1(/.*)?$";

/// A mock control plane exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Whether replication controllers spawn pods.
	#[builder(default = true)]
	spawn_pods: bool,
	/// Node names (also their IPs) pods are spread over.
	#[builder(default = vec![DEFAULT_NODE.to_string()])]
	nodes: Vec<String>,
	/// Objects present before the first request. Their collection is derived
	/// from `kind` and `metadata.namespace`.
	#[builder(default)]
	resources: Vec<Value>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	cluster: SharedCluster,
}

/// A request the server received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
	pub method: String,
	pub path: String,
	pub query: Option<String>,
	pub body: Option<Value>,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut cluster = Cluster::new(self.nodes, self.spawn_pods);
		for resource in self.resources {
			cluster.seed(resource);
		}
		let cluster = Arc::new(RwLock::new(cluster));

		mount_api_versions(&server).await;
		mount_resources(&server, &cluster).await;

		RunningHttpMockK8sServer { server, cluster }
	}
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// The object stored at an API path.
	pub fn get(&self, path: &str) -> Option<Value> {
		self.cluster.read().unwrap().object(path).cloned()
	}

	/// Objects of a collection, in name order.
	pub fn list(&self, collection: &str) -> Vec<Value> {
		self.cluster.read().unwrap().objects(collection)
	}

	/// Store an object directly, bypassing HTTP.
	pub fn seed(&self, object: Value) {
		self.cluster.write().unwrap().seed(object);
	}

	/// Every request received so far, in order.
	pub async fn requests(&self) -> Vec<RecordedRequest> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.map(|req| RecordedRequest {
				method: req.method.as_str().to_string(),
				path: req.url.path().to_string(),
				query: req.url.query().map(str::to_string),
				body: serde_json::from_slice(&req.body).ok(),
			})
			.collect()
	}
}

fn respond((status, body): Outcome) -> ResponseTemplate {
	ResponseTemplate::new(status).set_body_json(body)
}

fn body_of(req: &Request) -> Value {
	serde_json::from_slice(&req.body).unwrap_or(Value::Null)
}

async fn mount_api_versions(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIVersions",
			"versions": ["v1"],
			"serverAddressByClientCIDRs": [
				{"clientCIDR": "0.0.0.0/0", "serverAddress": "10.0.0.1:6443"}
			]
		})))
		.mount(server)
		.await;
}

async fn mount_resources(server: &MockServer, cluster: &SharedCluster) {
	let get_cluster = Arc::clone(cluster);
	let post_cluster = Arc::clone(cluster);
	let put_cluster = Arc::clone(cluster);
	let delete_cluster = Arc::clone(cluster);

	// GET - single object or a collection, optionally filtered by labelSelector
	Mock::given(method("GET"))
		.and(path_regex(CORE_V1_PATHS))
		.respond_with(move |req: &Request| {
			let selector = req
				.url
				.query_pairs()
				.find(|(key, _)| key == "labelSelector")
				.map(|(_, value)| value.into_owned());
			let cluster = get_cluster.read().unwrap();
			respond(cluster.get(req.url.path(), selector.as_deref()))
		})
		.mount(server)
		.await;

	// POST - create in a collection
	Mock::given(method("POST"))
		.and(path_regex(CORE_V1_PATHS))
		.respond_with(move |req: &Request| {
			let mut cluster = post_cluster.write().unwrap();
			respond(cluster.create(req.url.path(), body_of(req)))
		})
		.mount(server)
		.await;

	// PUT - full replace of an existing object
	Mock::given(method("PUT"))
		.and(path_regex(CORE_V1_PATHS))
		.respond_with(move |req: &Request| {
			let mut cluster = put_cluster.write().unwrap();
			respond(cluster.replace(req.url.path(), body_of(req)))
		})
		.mount(server)
		.await;

	Mock::given(method("DELETE"))
		.and(path_regex(CORE_V1_PATHS))
		.respond_with(move |req: &Request| {
			let mut cluster = delete_cluster.write().unwrap();
			respond(cluster.delete(req.url.path()))
		})
		.mount(server)
		.await;
}
