mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{is_owned, labels, names, output, App, WEB_RC};
use k8s_mock::{HttpMockK8sServer, RunningHttpMockK8sServer};
use kploy::{
	commands::{debug, run, scale},
	error::Error,
	k8s::{client::GatewayError, delay::RecordingDelay},
};

const PODS: &str = "/api/v1/namespaces/shop/pods";
const WEB: &str = "/api/v1/namespaces/shop/replicationcontrollers/web";

async fn deployed() -> (RunningHttpMockK8sServer, App) {
	let cluster = HttpMockK8sServer::builder().build().start().await;
	let app = App::new(&cluster.uri(), "shop");
	app.write("rcs/web.yaml", WEB_RC);
	run::execute(&app.ctx, Vec::new(), RecordingDelay::new())
		.await
		.unwrap();
	(cluster, app)
}

#[tokio::test]
async fn test_scale_up_owns_new_pods() {
	let (cluster, app) = deployed().await;

	let delay = RecordingDelay::new();
	let mut out = Vec::new();
	scale::execute(&app.ctx, "web", 4, &mut out, delay.clone())
		.await
		.unwrap();

	assert_eq!(cluster.get(WEB).unwrap()["spec"]["replicas"], 4);
	let pods = cluster.list(PODS);
	assert_eq!(pods.len(), 4);
	assert!(pods.iter().all(is_owned));
	assert_eq!(delay.waits(), [Duration::from_secs(5)]);

	let text = output(out);
	assert!(text.contains("from 2 to 4 replicas"));
	for pod in names(&pods) {
		assert!(text.contains(&pod), "{pod} not reported in:\n{text}");
	}
}

#[tokio::test]
async fn test_scale_down_keeps_marker() {
	let (cluster, app) = deployed().await;

	let delay = RecordingDelay::new();
	let mut out = Vec::new();
	scale::execute(&app.ctx, "web", 1, &mut out, delay.clone())
		.await
		.unwrap();

	let web = cluster.get(WEB).unwrap();
	assert_eq!(web["spec"]["replicas"], 1);
	assert!(is_owned(&web));
	let pods = cluster.list(PODS);
	assert_eq!(pods.len(), 1);
	assert!(is_owned(&pods[0]));
	assert!(delay.waits().is_empty());
	assert!(!output(out).contains("Owned pods"));
}

#[tokio::test]
async fn test_scale_missing_controller() {
	let (_cluster, app) = deployed().await;

	let err = scale::execute(&app.ctx, "api", 3, Vec::new(), RecordingDelay::new())
		.await
		.unwrap_err();
	assert_matches!(
		Error::find(&err),
		Some(Error::Gateway(source)) if source.is_not_found()
	);
}

#[tokio::test]
async fn test_debug_takes_pod_offline() {
	let (cluster, app) = deployed().await;
	let before = names(&cluster.list(PODS));
	let target = before[0].clone();

	let delay = RecordingDelay::new();
	let mut out = Vec::new();
	debug::execute(&app.ctx, &target, &mut out, delay.clone())
		.await
		.unwrap();

	// The pod keeps running without labels.
	let offline = cluster.get(&format!("{PODS}/{target}")).unwrap();
	assert!(labels(&offline)
		.as_object()
		.map_or(true, |labels| labels.is_empty()));

	// The controller spawned a replacement, which is owned.
	let owned: Vec<_> = cluster
		.list(PODS)
		.into_iter()
		.filter(|pod| labels(pod)["app"] == "web")
		.collect();
	assert_eq!(owned.len(), 2);
	assert!(owned.iter().all(is_owned));
	assert!(!names(&owned).contains(&target));
	assert_eq!(delay.waits().len(), 1);

	let text = output(out);
	assert!(text.contains(&format!("the Pod {target} is offline")));
	assert!(text.contains("RC web now owns"));
}

#[tokio::test]
async fn test_debug_rejects_unrecognised_pod_name() {
	let (_cluster, app) = deployed().await;

	let err = debug::execute(&app.ctx, "standalone", Vec::new(), RecordingDelay::new())
		.await
		.unwrap_err();
	let found = Error::find(&err).unwrap();
	assert_matches!(found, Error::Usage(_));
	assert_eq!(found.exit_code(), 2);
}

#[tokio::test]
async fn test_debug_missing_pod() {
	let (_cluster, app) = deployed().await;

	let err = debug::execute(&app.ctx, "web-fffff", Vec::new(), RecordingDelay::new())
		.await
		.unwrap_err();
	assert_matches!(
		Error::find(&err),
		Some(Error::Gateway(GatewayError::Status { status, .. })) if status.as_u16() == 404
	);
}
