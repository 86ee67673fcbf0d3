pub mod commands;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod k8s;
pub mod manifest;
pub mod resolver;
pub mod secrets;
pub mod telemetry;
pub mod yaml;
