//! Mock Kubernetes control plane for testing.
//!
//! Provides an HTTP server speaking the core `v1` REST API, backed by an
//! in-memory cluster that reconciles replication controllers into pods.

pub mod cluster;
mod helpers;
pub mod http;

pub use cluster::Cluster;
pub use http::{HttpMockK8sServer, RecordedRequest, RunningHttpMockK8sServer, DEFAULT_NODE};
