mod common;

use assert_matches::assert_matches;
use common::{output, App, WEB_RC, WEB_SVC};
use k8s_mock::HttpMockK8sServer;
use kploy::{
	commands::{destroy, run},
	error::Error,
	k8s::delay::RecordingDelay,
};
use serde_json::json;
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
};
use wiremock::{
	matchers::{method, path},
	Mock, MockServer, ResponseTemplate,
};

const SHOP_RC: &str = "/api/v1/namespaces/shop/replicationcontrollers/web";

/// A control plane that answers the health probe and nothing else unless told.
async fn bare_control_plane() -> MockServer {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"versions": ["v1"]})))
		.mount(&server)
		.await;
	server
}

/// Answer one connection per canned response, then stop listening.
async fn serve_then_vanish(responses: Vec<(u16, &'static str)>) -> String {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let uri = format!("http://{}", listener.local_addr().unwrap());
	tokio::spawn(async move {
		for (status, body) in responses {
			let (mut stream, _) = listener.accept().await.unwrap();
			let mut request = [0u8; 4096];
			let _ = stream.read(&mut request).await.unwrap();
			let response = format!(
				"HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
				body.len()
			);
			stream.write_all(response.as_bytes()).await.unwrap();
			stream.shutdown().await.unwrap();
		}
	});
	uri
}

async fn deployed(namespace: &str) -> (k8s_mock::RunningHttpMockK8sServer, App) {
	let cluster = HttpMockK8sServer::builder().build().start().await;
	let app = App::new(&cluster.uri(), namespace);
	app.write("services/web.yaml", WEB_SVC);
	app.write("rcs/web.yaml", WEB_RC);
	app.write("env/token.secret", "s3cret");
	run::execute(&app.ctx, Vec::new(), RecordingDelay::new())
		.await
		.unwrap();
	(cluster, app)
}

#[tokio::test]
async fn test_destroy_removes_everything() {
	let (cluster, app) = deployed("shop").await;
	assert_eq!(cluster.list("/api/v1/namespaces/shop/pods").len(), 2);

	let mut out = Vec::new();
	destroy::execute(&app.ctx, &mut out).await.unwrap();

	assert!(cluster.get("/api/v1/namespaces/shop").is_none());
	assert!(cluster.list("/api/v1/namespaces/shop/pods").is_empty());
	assert!(cluster
		.list("/api/v1/namespaces/shop/replicationcontrollers")
		.is_empty());

	let text = output(out);
	for line in [
		"Deleted RC web",
		"Deleted service web",
		"Deleted secret kploy-secrets",
		"Deleted namespace shop",
		"OK, I've destroyed `shop/webshop`",
	] {
		assert!(text.contains(line), "missing {line:?} in:\n{text}");
	}
}

#[tokio::test]
async fn test_controller_is_drained_before_delete() {
	let (cluster, app) = deployed("shop").await;
	destroy::execute(&app.ctx, Vec::new()).await.unwrap();

	let rc = "/api/v1/namespaces/shop/replicationcontrollers/web";
	let requests = cluster.requests().await;
	let put = requests
		.iter()
		.rposition(|req| req.method == "PUT" && req.path == rc)
		.unwrap();
	let delete = requests
		.iter()
		.position(|req| req.method == "DELETE" && req.path == rc)
		.unwrap();
	assert!(put < delete);
	assert_eq!(
		requests[put].body.as_ref().unwrap()["spec"]["replicas"],
		0
	);

	// Services go after every controller.
	let service = requests
		.iter()
		.position(|req| req.method == "DELETE" && req.path.ends_with("/services/web"))
		.unwrap();
	assert!(delete < service);
}

#[tokio::test]
async fn test_destroy_twice_reports_absent() {
	let (_cluster, app) = deployed("shop").await;
	destroy::execute(&app.ctx, Vec::new()).await.unwrap();

	let mut out = Vec::new();
	destroy::execute(&app.ctx, &mut out).await.unwrap();

	let text = output(out);
	assert!(!text.contains("Deleted"));
	assert!(!text.contains("Failed"));
	assert!(text.contains("Already absent: RC web"));
	assert!(text.contains("Already absent: namespace shop"));
	assert!(text.contains("OK, I've destroyed"));
}

#[tokio::test]
async fn test_default_namespace_survives() {
	let (cluster, app) = deployed("default").await;

	let mut out = Vec::new();
	destroy::execute(&app.ctx, &mut out).await.unwrap();

	assert!(cluster.get("/api/v1/namespaces/default").is_some());
	assert!(cluster
		.get("/api/v1/namespaces/default/secrets/kploy-secrets")
		.is_none());
	assert!(cluster.list("/api/v1/namespaces/default/pods").is_empty());
	assert!(!output(out).contains("namespace"));
}

#[tokio::test]
async fn test_destroy_without_deploy() {
	let cluster = HttpMockK8sServer::builder().build().start().await;
	let app = App::new(&cluster.uri(), "shop");
	app.write("rcs/web.yaml", WEB_RC);

	let mut out = Vec::new();
	destroy::execute(&app.ctx, &mut out).await.unwrap();

	let text = output(out);
	assert!(text.contains("Already absent: RC web"));
	assert!(text.contains("Already absent: secret kploy-secrets"));
	// Nothing to drain, so nothing was written.
	assert!(!cluster
		.requests()
		.await
		.iter()
		.any(|req| req.method == "PUT"));
}

#[tokio::test]
async fn test_failed_delete_does_not_stop_teardown() {
	let server = bare_control_plane().await;
	Mock::given(method("DELETE"))
		.and(path("/api/v1/namespaces/shop/services/web"))
		.respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
		.mount(&server)
		.await;
	for deleted in [
		"/api/v1/namespaces/shop/secrets/kploy-secrets",
		"/api/v1/namespaces/shop",
	] {
		Mock::given(method("DELETE"))
			.and(path(deleted))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
			.expect(1)
			.mount(&server)
			.await;
	}

	let app = App::new(&server.uri(), "shop");
	app.write("services/web.yaml", WEB_SVC);
	app.write("rcs/web.yaml", WEB_RC);

	let mut out = Vec::new();
	destroy::execute(&app.ctx, &mut out).await.unwrap();

	let text = output(out);
	assert!(text.contains("Already absent: RC web"));
	assert!(text.contains("Failed to delete service web"));
	assert!(text.contains("boom"));
	assert!(text.contains("Deleted secret kploy-secrets"));
	assert!(text.contains("Deleted namespace shop"));
	assert!(text.contains(
		"I've destroyed what I could of `shop/webshop`, 1 resource(s) are left"
	));
	assert!(!text.contains("OK, I've destroyed"));
}

#[tokio::test]
async fn test_failed_drain_keeps_controller() {
	let server = bare_control_plane().await;
	let rc = json!({
		"apiVersion": "v1",
		"kind": "ReplicationController",
		"metadata": {"name": "web", "namespace": "shop", "resourceVersion": "7"},
		"spec": {"replicas": 2, "selector": {"app": "web"}}
	});
	Mock::given(method("GET"))
		.and(path(SHOP_RC))
		.respond_with(ResponseTemplate::new(200).set_body_json(&rc))
		.mount(&server)
		.await;
	Mock::given(method("PUT"))
		.and(path(SHOP_RC))
		.respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "etcd is down"})))
		.expect(1)
		.mount(&server)
		.await;

	let app = App::new(&server.uri(), "shop");
	app.write("rcs/web.yaml", WEB_RC);

	let mut out = Vec::new();
	destroy::execute(&app.ctx, &mut out).await.unwrap();

	let requests = server.received_requests().await.unwrap();
	assert!(!requests
		.iter()
		.any(|req| req.method.as_str() == "DELETE" && req.url.path() == SHOP_RC));
	let put = requests
		.iter()
		.find(|req| req.method.as_str() == "PUT")
		.unwrap();
	let drained: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
	assert_eq!(drained["spec"]["replicas"], 0);

	let text = output(out);
	assert!(text.contains("Failed to delete RC web"));
	assert!(text.contains("etcd is down"));
	// Later resources are still attempted.
	assert!(text.contains("Already absent: secret kploy-secrets"));
	assert!(text.contains("Already absent: namespace shop"));
	assert!(text.contains("1 resource(s) are left"));
}

#[tokio::test]
async fn test_lost_control_plane_stops_teardown() {
	// Health probe, then the controller lookup; the service delete finds
	// nobody listening.
	let uri = serve_then_vanish(vec![(200, "{}"), (404, "{}")]).await;
	let app = App::new(&uri, "shop");
	app.write("services/web.yaml", WEB_SVC);
	app.write("rcs/web.yaml", WEB_RC);

	let mut out = Vec::new();
	let err = destroy::execute(&app.ctx, &mut out).await.unwrap_err();

	let found = Error::find(&err).unwrap();
	assert_matches!(found, Error::Connectivity { source, .. } if source.is_unreachable());
	assert!(!output(out).contains("OK, I've destroyed"));
}
