//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::{fs, path::Path};

use indoc::indoc;
use kploy::{
	commands::Context,
	config::{Settings, Workspace},
	descriptor::Descriptor,
};
use serde_json::Value;
use tempfile::TempDir;

pub const WEB_RC: &str = indoc! {"
	apiVersion: v1
	kind: ReplicationController
	metadata:
	  name: web
	  labels:
	    tier: frontend
	spec:
	  replicas: 2
	  selector:
	    app: web
	  template:
	    metadata:
	      labels:
	        app: web
	    spec:
	      containers:
	        - name: web
	          image: nginx
	          ports:
	            - containerPort: 80
"};

pub const WEB_SVC: &str = indoc! {"
	apiVersion: v1
	kind: Service
	metadata:
	  name: web
	  labels:
	    tier: frontend
	spec:
	  selector:
	    app: web
	  ports:
	    - port: 80
"};

pub const DB_RC: &str = indoc! {"
	apiVersion: v1
	kind: ReplicationController
	metadata:
	  name: db
	spec:
	  replicas: 1
	  selector:
	    app: db
	  template:
	    metadata:
	      labels:
	        app: db
	    spec:
	      containers:
	        - name: db
	          image: redis
"};

/// An application directory in a temp dir.
pub struct App {
	_dir: TempDir,
	pub ctx: Context,
	pub descriptor: Descriptor,
}

impl App {
	/// A workspace with empty manifest directories whose `Kployfile` points at
	/// `apiserver` and deploys into `namespace`.
	pub fn new(apiserver: &str, namespace: &str) -> Self {
		let dir = TempDir::new().unwrap();
		let workspace = Workspace::new(dir.path());
		fs::create_dir(workspace.controllers_dir()).unwrap();
		fs::create_dir(workspace.services_dir()).unwrap();

		let descriptor = Descriptor {
			apiserver: apiserver.to_string(),
			author: "Jane Doe".to_string(),
			cache_remotes: false,
			name: "webshop".to_string(),
			namespace: namespace.to_string(),
			source: "https://github.com/example/webshop".to_string(),
		};
		descriptor.save(&workspace.descriptor_path()).unwrap();

		Self {
			_dir: dir,
			ctx: Context::new(workspace, Settings::default()),
			descriptor,
		}
	}

	pub fn root(&self) -> &Path {
		self.ctx.workspace.root()
	}

	/// Write a file relative to the workspace root, creating parent dirs.
	pub fn write(&self, relative: &str, content: &str) {
		let path = self.root().join(relative);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(path, content).unwrap();
	}

	pub fn update_descriptor(&mut self, update: impl FnOnce(&mut Descriptor)) {
		update(&mut self.descriptor);
		self.descriptor
			.save(&self.ctx.workspace.descriptor_path())
			.unwrap();
	}
}

pub fn labels(object: &Value) -> &Value {
	&object["metadata"]["labels"]
}

pub fn is_owned(object: &Value) -> bool {
	labels(object)["guard"] == "pyk"
}

pub fn names(objects: &[Value]) -> Vec<String> {
	objects
		.iter()
		.map(|object| object["metadata"]["name"].as_str().unwrap().to_string())
		.collect()
}

pub fn output(buffer: Vec<u8>) -> String {
	String::from_utf8(buffer).unwrap()
}
