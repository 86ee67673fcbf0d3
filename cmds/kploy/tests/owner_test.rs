mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{is_owned, labels};
use k8s_mock::HttpMockK8sServer;
use kploy::k8s::{
	client::Gateway,
	delay::RecordingDelay,
	owner::{self, OwnerError},
};
use serde_json::json;
use wiremock::{
	matchers::{method, path},
	Mock, MockServer, ResponseTemplate,
};

const WEB: &str = "/api/v1/namespaces/default/replicationcontrollers/web";
const PODS: &str = "/api/v1/namespaces/default/pods";

fn web_controller(replicas: u64) -> serde_json::Value {
	json!({
		"apiVersion": "v1",
		"kind": "ReplicationController",
		"metadata": {
			"name": "web",
			"namespace": "default",
			"labels": {"tier": "frontend"}
		},
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

#[tokio::test]
async fn test_own_is_idempotent_and_keeps_labels() {
	let cluster = HttpMockK8sServer::builder()
		.resources(vec![web_controller(1)])
		.build()
		.start()
		.await;
	let gateway = Gateway::connect(&cluster.uri()).await.unwrap();

	owner::own(&gateway, WEB).await.unwrap();
	let once = cluster.get(WEB).unwrap();
	owner::own(&gateway, WEB).await.unwrap();
	let twice = cluster.get(WEB).unwrap();

	assert_eq!(labels(&once), labels(&twice));
	assert_eq!(labels(&twice)["tier"], "frontend");
	assert!(is_owned(&twice));
}

#[tokio::test]
async fn test_own_pods_of_controller() {
	let cluster = HttpMockK8sServer::builder()
		.resources(vec![web_controller(3)])
		.build()
		.start()
		.await;
	let gateway = Gateway::connect(&cluster.uri()).await.unwrap();
	let controller = gateway.get_resource(WEB).await.unwrap();

	let delay = RecordingDelay::new();
	let owned = owner::own_pods_of_controller(
		&gateway,
		&controller,
		"default",
		&delay,
		Duration::from_secs(2),
	)
	.await
	.unwrap();

	assert_eq!(owned.len(), 3);
	assert!(cluster.list(PODS).iter().all(is_owned));
	assert_eq!(delay.waits(), [Duration::from_secs(2)]);

	// Only pods matching the selector are listed.
	let request = cluster
		.requests()
		.await
		.into_iter()
		.find(|req| req.method == "GET" && req.path == PODS)
		.unwrap();
	assert_eq!(request.query.as_deref(), Some("labelSelector=app%3Dweb"));
}

#[tokio::test]
async fn test_pods_not_yet_spawned_are_not_owned() {
	let cluster = HttpMockK8sServer::builder()
		.spawn_pods(false)
		.resources(vec![web_controller(2)])
		.build()
		.start()
		.await;
	let gateway = Gateway::connect(&cluster.uri()).await.unwrap();
	let controller = gateway.get_resource(WEB).await.unwrap();

	let owned = owner::own_pods_of_controller(
		&gateway,
		&controller,
		"default",
		&RecordingDelay::new(),
		Duration::ZERO,
	)
	.await
	.unwrap();
	assert!(owned.is_empty());
}

#[tokio::test]
async fn test_controller_without_selector() {
	let cluster = HttpMockK8sServer::builder().build().start().await;
	let gateway = Gateway::connect(&cluster.uri()).await.unwrap();
	let delay = RecordingDelay::new();

	let result = owner::own_pods_of_controller(
		&gateway,
		&json!({"metadata": {"name": "web"}, "spec": {"replicas": 1}}),
		"default",
		&delay,
		Duration::from_secs(5),
	)
	.await;

	assert_matches!(result, Err(OwnerError::MissingSelector { controller }) if controller == "web");
	assert!(delay.waits().is_empty());
}

#[tokio::test]
async fn test_disown_clears_labels() {
	let cluster = HttpMockK8sServer::builder()
		.resources(vec![web_controller(1)])
		.build()
		.start()
		.await;
	let gateway = Gateway::connect(&cluster.uri()).await.unwrap();
	let pod = cluster.list(PODS).remove(0);
	let name = pod["metadata"]["name"].as_str().unwrap();
	let path = format!("{PODS}/{name}");

	owner::own(&gateway, &path).await.unwrap();
	owner::disown(&gateway, &path).await.unwrap();

	let offline = cluster.get(&path).unwrap();
	assert!(!is_owned(&offline));
	assert_eq!(labels(&offline), &json!({}));
	// The controller replaced the pod that left its selector.
	assert_eq!(cluster.list(PODS).len(), 2);
}

#[tokio::test]
async fn test_own_replaces_without_resource_version() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"versions": ["v1"]})))
		.mount(&server)
		.await;
	let mut fetched = web_controller(2);
	fetched["metadata"]["resourceVersion"] = json!("42");
	Mock::given(method("GET"))
		.and(path(WEB))
		.respond_with(ResponseTemplate::new(200).set_body_json(&fetched))
		.mount(&server)
		.await;
	Mock::given(method("PUT"))
		.and(path(WEB))
		.respond_with(ResponseTemplate::new(200).set_body_json(&fetched))
		.expect(1)
		.mount(&server)
		.await;

	let gateway = Gateway::connect(&server.uri()).await.unwrap();
	owner::own(&gateway, WEB).await.unwrap();

	let requests = server.received_requests().await.unwrap();
	let put = requests
		.iter()
		.find(|req| req.method.as_str() == "PUT")
		.unwrap();
	let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
	assert!(body["metadata"].get("resourceVersion").is_none());
	assert!(is_owned(&body));
	assert_eq!(labels(&body)["tier"], "frontend");
}

#[tokio::test]
async fn test_own_skips_owned_resource() {
	let mut owned = web_controller(0);
	owned["metadata"]["labels"]["guard"] = json!("pyk");
	let cluster = HttpMockK8sServer::builder()
		.resources(vec![owned])
		.build()
		.start()
		.await;
	let gateway = Gateway::connect(&cluster.uri()).await.unwrap();

	owner::own(&gateway, WEB).await.unwrap();

	assert!(!cluster
		.requests()
		.await
		.iter()
		.any(|req| req.method == "PUT"));
}
