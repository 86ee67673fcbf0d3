//! Stats command handler.
//!
//! Shows the pods kploy owns in the application's namespace and the nodes
//! they run on.

use std::{collections::BTreeSet, io::Write};

use anyhow::{Context as _, Result};
use clap::Args;
use k8s_openapi::api::core::v1::{Node, Pod};
use tabwriter::TabWriter;
use tracing::instrument;

use super::{
	util::{self, separator},
	Context,
};
use crate::{
	error::Error,
	k8s::{owner, paths},
};

#[derive(Args)]
pub struct StatsArgs {}

/// Run the stats command.
pub fn run<W: Write>(_args: StatsArgs, ctx: &Context, writer: W) -> Result<()> {
	util::block_on(execute(ctx, writer))
}

fn decode<T: serde::de::DeserializeOwned>(items: Vec<serde_json::Value>) -> Result<Vec<T>> {
	items
		.into_iter()
		.map(|item| serde_json::from_value(item).context("decoding control-plane object"))
		.collect()
}

#[instrument(skip_all)]
pub async fn execute<W: Write>(ctx: &Context, mut writer: W) -> Result<()> {
	let descriptor = util::load_descriptor(&ctx.workspace)?;
	writeln!(
		writer,
		"Runtime stats for app `{}`:",
		descriptor.qualified_name()
	)?;
	let gateway = util::connect(&descriptor).await?;

	writeln!(writer, "\n[Your app's pods]\n")?;
	let pods: Vec<Pod> = decode(
		gateway
			.list_by_selector(
				&paths::pods(&descriptor.namespace),
				&owner::owned_selector(),
			)
			.await
			.map_err(Error::from)?,
	)?;
	if pods.is_empty() {
		writeln!(writer, "No pods are online.")?;
		return Ok(());
	}

	let mut used_nodes = BTreeSet::new();
	let mut table = TabWriter::new(&mut writer).padding(2);
	writeln!(table, "NAME\tHOST\tSTATUS\tURL")?;
	for pod in &pods {
		let name = pod.metadata.name.as_deref().unwrap_or_default();
		let status = pod.status.as_ref();
		let host = status
			.and_then(|status| status.host_ip.as_deref())
			.unwrap_or_default();
		let phase = status
			.and_then(|status| status.phase.as_deref())
			.unwrap_or("Unknown");
		if !host.is_empty() {
			used_nodes.insert(host.to_string());
		}
		writeln!(
			table,
			"{name}\t{host}\t{phase}\t{}",
			gateway.url_for(&paths::pod(&descriptor.namespace, name))
		)?;
	}
	table.flush()?;
	drop(table);

	writeln!(writer)?;
	separator(&mut writer)?;
	writeln!(writer, "[Nodes used by your app]\n")?;
	let nodes: Vec<Node> = decode(gateway.list_nodes().await.map_err(Error::from)?)?;
	let mut table = TabWriter::new(&mut writer).padding(2);
	writeln!(
		table,
		"IP\tHOST OS\tCONTAINER RUNTIME\tCAPACITY (PODS, CPU, MEM)\tURL"
	)?;
	for node in &nodes {
		let Some(name) = node.metadata.name.as_deref() else {
			continue;
		};
		if !used_nodes.contains(name) {
			continue;
		}
		let status = node.status.as_ref();
		let info = status.and_then(|status| status.node_info.as_ref());
		let capacity = ["pods", "cpu", "memory"]
			.iter()
			.map(|resource| {
				status
					.and_then(|status| status.capacity.as_ref())
					.and_then(|capacity| capacity.get(*resource))
					.map(|quantity| quantity.0.as_str())
					.unwrap_or("?")
			})
			.collect::<Vec<_>>()
			.join(", ");
		writeln!(
			table,
			"{name}\t{}\t{}\t{capacity}\t{}",
			info.map(|info| info.os_image.as_str()).unwrap_or_default(),
			info.map(|info| info.container_runtime_version.as_str())
				.unwrap_or_default(),
			gateway.url_for(&format!("{}/{name}", paths::NODES))
		)?;
	}
	table.flush()?;
	drop(table);

	writeln!(writer)?;
	separator(&mut writer)?;
	Ok(())
}
