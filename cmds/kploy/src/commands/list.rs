//! List command handler.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use http::StatusCode;
use tabwriter::TabWriter;
use tracing::instrument;

use super::{
	util::{self, separator},
	Context,
};
use crate::{
	error::Error,
	k8s::paths,
	manifest::{resolve_and_load, ResourceKind},
	resolver::{CachePolicy, Resolver},
	secrets::{self, SECRET_SET_NAME},
};

#[derive(Args)]
pub struct ListArgs {}

/// Run the list command.
pub fn run<W: Write>(_args: ListArgs, ctx: &Context, writer: W) -> Result<()> {
	util::block_on(execute(ctx, writer))
}

/// Status column of a resource, from the answer to describing it.
pub fn status_label(status: StatusCode) -> String {
	match status {
		StatusCode::OK => "online".to_string(),
		StatusCode::NOT_FOUND => "offline".to_string(),
		other => other.as_u16().to_string(),
	}
}

/// Print the status of every resource of the application and its env data.
#[instrument(skip_all)]
pub async fn execute<W: Write>(ctx: &Context, mut writer: W) -> Result<()> {
	let descriptor = util::load_descriptor(&ctx.workspace)?;
	writeln!(writer, "Resources of app `{}`:\n", descriptor.qualified_name())?;
	let gateway = util::connect(&descriptor).await?;
	let namespace = descriptor.namespace.as_str();

	writeln!(writer, "[Services and RCs]\n")?;
	let resolver = Resolver::new();
	let mut table = TabWriter::new(&mut writer).padding(2);
	writeln!(table, "NAME\tMANIFEST\tTYPE\tSTATUS\tURL")?;
	for kind in [ResourceKind::Service, ResourceKind::Controller] {
		let dir = ctx.workspace.root().join(kind.directory());
		for manifest in resolve_and_load(&resolver, kind, &dir, CachePolicy::Reuse).await? {
			let path = paths::of_kind(kind, namespace, manifest.name());
			let described = gateway
				.describe_resource(&path)
				.await
				.map_err(Error::from)?;
			writeln!(
				table,
				"{}\t{}\t{kind}\t{}\t{}",
				manifest.name(),
				manifest
					.origin()
					.strip_prefix(ctx.workspace.root())
					.unwrap_or(manifest.origin())
					.display(),
				status_label(described.status),
				gateway.url_for(&path)
			)?;
		}
	}
	table.flush()?;
	drop(table);

	writeln!(writer)?;
	separator(&mut writer)?;
	writeln!(writer, "[Secrets]")?;
	let secret_path = paths::secret(namespace, SECRET_SET_NAME);
	let secret = gateway
		.describe_resource(&secret_path)
		.await
		.map_err(Error::from)?;
	if secret.status == StatusCode::OK {
		writeln!(writer, "URL: {}", gateway.url_for(&secret_path))?;
		let mut table = TabWriter::new(&mut writer).padding(2);
		writeln!(table, "KEY\tVALUE")?;
		for (key, value) in secrets::decode(&secret.body) {
			writeln!(table, "{key}\t{value}")?;
		}
		table.flush()?;
	} else {
		writeln!(writer, "No env data deployed.")?;
	}
	writeln!(writer)?;
	separator(&mut writer)?;
	Ok(())
}
