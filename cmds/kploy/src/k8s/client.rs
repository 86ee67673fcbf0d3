//! Control-plane gateway.
//!
//! A thin envelope over raw REST calls. The gateway never retries: a
//! transport failure or a non-2xx answer goes back to the caller as is, and
//! the caller decides whether it is fatal.

use std::time::Duration;

use http::{
	header::{ACCEPT, CONTENT_TYPE},
	Method, Request, StatusCode, Uri,
};
use http_body_util::BodyExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIVersions;
use kube::{client::Body, Client, Config};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument, trace};

use super::paths;
use crate::manifest::Manifest;

/// Default timeout for control-plane requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("invalid control-plane endpoint `{endpoint}`")]
	InvalidEndpoint {
		endpoint: String,
		#[source]
		source: http::uri::InvalidUri,
	},

	#[error("setting up a client for {endpoint}")]
	Client {
		endpoint: String,
		#[source]
		source: kube::Error,
	},

	#[error("the control plane at {endpoint} answered the health probe with {status}")]
	Unhealthy { endpoint: String, status: StatusCode },

	#[error("{method} {path} failed")]
	Transport {
		method: Method,
		path: String,
		#[source]
		source: kube::Error,
	},

	#[error("{method} {path} returned {status}: {message}")]
	Status {
		method: Method,
		path: String,
		status: StatusCode,
		message: String,
	},

	#[error("building request {method} {path}")]
	Request {
		method: Method,
		path: String,
		#[source]
		source: http::Error,
	},

	#[error("encoding the body of {method} {path}")]
	Encode {
		method: Method,
		path: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("reading the response of {method} {path}: {message}")]
	Body {
		method: Method,
		path: String,
		message: String,
	},

	#[error("{path} returned a document without {field}")]
	UnexpectedBody { path: String, field: &'static str },
}

impl GatewayError {
	/// Whether the control plane answered 404.
	pub fn is_not_found(&self) -> bool {
		matches!(self, GatewayError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
	}

	/// Whether the control plane could not be talked to at all, as opposed to
	/// answering with an error.
	pub fn is_unreachable(&self) -> bool {
		matches!(
			self,
			GatewayError::InvalidEndpoint { .. }
				| GatewayError::Client { .. }
				| GatewayError::Unhealthy { .. }
				| GatewayError::Transport { .. }
				| GatewayError::Body { .. }
		)
	}
}

/// Status code and body of one control-plane call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
	pub status: StatusCode,
	/// Decoded JSON body; `Null` when empty, a string when not JSON.
	pub body: Value,
}

impl ApiResponse {
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	pub fn is_not_found(&self) -> bool {
		self.status == StatusCode::NOT_FOUND
	}

	/// Human-readable failure message of a non-2xx answer.
	fn message(&self) -> String {
		self.body
			.get("message")
			.and_then(Value::as_str)
			.map(str::to_string)
			.unwrap_or_else(|| match &self.body {
				Value::Null => self
					.status
					.canonical_reason()
					.unwrap_or("no details")
					.to_string(),
				Value::String(text) => text.clone(),
				other => other.to_string(),
			})
	}
}

/// Connection to one control plane.
#[derive(Clone)]
pub struct Gateway {
	client: Client,
	endpoint: String,
}

impl std::fmt::Debug for Gateway {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Gateway")
			.field("endpoint", &self.endpoint)
			.finish_non_exhaustive()
	}
}

impl Gateway {
	/// Connect to the control plane at `endpoint` and probe the API root.
	///
	/// Any failure here means nothing may be mutated.
	#[instrument(skip_all, fields(endpoint = %endpoint))]
	pub async fn connect(endpoint: &str) -> Result<Self, GatewayError> {
		let uri: Uri = endpoint
			.parse()
			.map_err(|source| GatewayError::InvalidEndpoint {
				endpoint: endpoint.to_string(),
				source,
			})?;

		let mut config = Config::new(uri);
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config).map_err(|source| GatewayError::Client {
			endpoint: endpoint.to_string(),
			source,
		})?;

		let gateway = Self {
			client,
			endpoint: endpoint.trim_end_matches('/').to_string(),
		};

		let probe = gateway.execute(Method::GET, paths::API_ROOT, None).await?;
		if !probe.is_success() {
			return Err(GatewayError::Unhealthy {
				endpoint: gateway.endpoint.clone(),
				status: probe.status,
			});
		}

		match serde_json::from_value::<APIVersions>(probe.body) {
			Ok(versions) => debug!(versions = ?versions.versions, "connected to control plane"),
			Err(_) => debug!("connected to control plane"),
		}

		Ok(gateway)
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Absolute URL of an API path, for display.
	pub fn url_for(&self, path: &str) -> String {
		format!("{}{}", self.endpoint, path)
	}

	/// Perform one REST call. Non-2xx answers are returned, not raised.
	#[instrument(skip(self, payload), fields(%method, path = %path))]
	pub async fn execute(
		&self,
		method: Method,
		path: &str,
		payload: Option<&Value>,
	) -> Result<ApiResponse, GatewayError> {
		let body = match payload {
			Some(payload) => serde_json::to_vec(payload).map_err(|source| GatewayError::Encode {
				method: method.clone(),
				path: path.to_string(),
				source,
			})?,
			None => Vec::new(),
		};

		let request = Request::builder()
			.method(method.clone())
			.uri(path)
			.header(ACCEPT, "application/json")
			.header(CONTENT_TYPE, "application/json")
			.body(Body::from(body))
			.map_err(|source| GatewayError::Request {
				method: method.clone(),
				path: path.to_string(),
				source,
			})?;

		let response = self
			.client
			.send(request)
			.await
			.map_err(|source| GatewayError::Transport {
				method: method.clone(),
				path: path.to_string(),
				source,
			})?;

		let status = response.status();
		let bytes = response
			.into_body()
			.collect()
			.await
			.map_err(|err| GatewayError::Body {
				method: method.clone(),
				path: path.to_string(),
				message: err.to_string(),
			})?
			.to_bytes();

		let body = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes)
				.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
		};

		trace!(%status, "control plane answered");
		Ok(ApiResponse { status, body })
	}

	/// Like [`Gateway::execute`], but a non-2xx answer becomes an error.
	async fn execute_ok(
		&self,
		method: Method,
		path: &str,
		payload: Option<&Value>,
	) -> Result<Value, GatewayError> {
		let response = self.execute(method.clone(), path, payload).await?;
		if response.is_success() {
			Ok(response.body)
		} else {
			Err(GatewayError::Status {
				message: response.message(),
				method,
				path: path.to_string(),
				status: response.status,
			})
		}
	}

	/// Submit a manifest under the collection of its kind. Returns the path of
	/// the created resource.
	pub async fn create_resource(
		&self,
		manifest: &Manifest,
		namespace: &str,
	) -> Result<String, GatewayError> {
		let collection = paths::collection(namespace, manifest.kind().collection());
		self.execute_ok(Method::POST, &collection, Some(manifest.document()))
			.await?;
		Ok(format!("{collection}/{}", manifest.name()))
	}

	pub async fn create_namespace(&self, name: &str) -> Result<String, GatewayError> {
		let namespace = json!({
			"apiVersion": "v1",
			"kind": "Namespace",
			"metadata": {"name": name},
		});
		self.execute_ok(Method::POST, paths::NAMESPACES, Some(&namespace))
			.await?;
		Ok(paths::namespace(name))
	}

	/// Submit a Secret document into `namespace`. Returns its path.
	pub async fn create_secret(
		&self,
		namespace: &str,
		secret: &Value,
	) -> Result<String, GatewayError> {
		let name = secret
			.pointer("/metadata/name")
			.and_then(Value::as_str)
			.ok_or(GatewayError::UnexpectedBody {
				path: paths::collection(namespace, "secrets"),
				field: "metadata.name",
			})?;
		self.execute_ok(
			Method::POST,
			&paths::collection(namespace, "secrets"),
			Some(secret),
		)
		.await?;
		Ok(paths::secret(namespace, name))
	}

	/// Fetch a resource, whatever the answer.
	pub async fn describe_resource(&self, path: &str) -> Result<ApiResponse, GatewayError> {
		self.execute(Method::GET, path, None).await
	}

	/// Fetch a resource that is expected to exist.
	pub async fn get_resource(&self, path: &str) -> Result<Value, GatewayError> {
		self.execute_ok(Method::GET, path, None).await
	}

	/// Replace a resource with `body`. Any `metadata.resourceVersion` is
	/// dropped, so the replace is unconditional and the last write wins.
	pub async fn update_resource(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
		self.execute_ok(Method::PUT, path, Some(&unconditional(body)))
			.await
	}

	pub async fn delete_resource(&self, path: &str) -> Result<(), GatewayError> {
		self.execute_ok(Method::DELETE, path, None).await?;
		Ok(())
	}

	/// List a collection, filtered by an already URL-encoded label selector.
	pub async fn list_by_selector(
		&self,
		collection: &str,
		selector: &str,
	) -> Result<Vec<Value>, GatewayError> {
		let path = format!("{collection}?labelSelector={selector}");
		let list = self.execute_ok(Method::GET, &path, None).await?;
		items(list, &path)
	}

	/// List a whole collection.
	pub async fn list(&self, collection: &str) -> Result<Vec<Value>, GatewayError> {
		let list = self.execute_ok(Method::GET, collection, None).await?;
		items(list, collection)
	}

	pub async fn list_nodes(&self) -> Result<Vec<Value>, GatewayError> {
		self.list(paths::NODES).await
	}
}

fn unconditional(body: &Value) -> Value {
	let mut body = body.clone();
	if let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut) {
		metadata.remove("resourceVersion");
	}
	body
}

fn items(list: Value, path: &str) -> Result<Vec<Value>, GatewayError> {
	match list {
		Value::Object(mut list) => match list.remove("items") {
			Some(Value::Array(items)) => Ok(items),
			Some(Value::Null) => Ok(Vec::new()),
			_ => Err(GatewayError::UnexpectedBody {
				path: path.to_string(),
				field: "items",
			}),
		},
		_ => Err(GatewayError::UnexpectedBody {
			path: path.to_string(),
			field: "items",
		}),
	}
}
