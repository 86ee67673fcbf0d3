//! Dryrun command handler.
//!
//! Validates an application without changing anything on the control plane.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tracing::{info, instrument};

use super::{
	util::{self, separator},
	Context,
};
use crate::{
	error::Error,
	manifest::{resolve_and_load, ResourceKind},
	resolver::{CachePolicy, ResolveError, Resolver},
};

#[derive(Args)]
pub struct DryrunArgs {}

/// Run the dryrun command.
pub fn run<W: Write>(_args: DryrunArgs, ctx: &Context, writer: W) -> Result<()> {
	util::block_on(execute(ctx, writer))
}

/// Check the control plane, the manifest directories and every manifest.
#[instrument(skip_all)]
pub async fn execute<W: Write>(ctx: &Context, mut writer: W) -> Result<()> {
	let descriptor = util::load_descriptor(&ctx.workspace)?;
	writeln!(
		writer,
		"Validating application `{}` ...",
		descriptor.qualified_name()
	)?;

	writeln!(
		writer,
		"\n  CHECK: Is the Kubernetes cluster up & running and accessible via `{}`?",
		descriptor.apiserver
	)?;
	let gateway = util::connect(&descriptor).await?;
	let nodes = gateway.list_nodes().await.map_err(Error::from)?;
	writeln!(
		writer,
		"  \\o/ ... I found {} node(s) to deploy your wonderful app onto.",
		nodes.len()
	)?;

	writeln!(
		writer,
		"\n  CHECK: Are there RC and service manifests available around here?"
	)?;
	let policy = CachePolicy::from_cache_remotes(descriptor.cache_remotes);
	let resolver = Resolver::new();
	for kind in [ResourceKind::Controller, ResourceKind::Service] {
		let dir = ctx.workspace.root().join(kind.directory());
		if !dir.is_dir() {
			writeln!(
				writer,
				"No RC and/or service manifests found to deploy your app. You can use `kploy init` to create missing artefacts."
			)?;
			return Err(Error::from(ResolveError::MissingDirectory(dir)).into());
		}

		let manifests = resolve_and_load(&resolver, kind, &dir, policy).await?;
		writeln!(
			writer,
			"         I found {} {kind} manifest(s) in {}",
			manifests.len(),
			dir.display()
		)?;
		if ctx.settings.verbose {
			for manifest in &manifests {
				info!(
					%kind,
					name = manifest.name(),
					replicas = ?manifest.replicas(),
					selector = ?manifest.selector(),
					"-> manifest"
				);
			}
		}
	}
	writeln!(
		writer,
		"  \\o/ ... I found both RC and service manifests to deploy your wonderful app!"
	)?;

	writeln!(
		writer,
		"\n  CHECK: Can the app be pushed to and pulled from `{}`?",
		descriptor.source
	)?;
	match descriptor.workspace() {
		Ok(workspace) => writeln!(writer, "  \\o/ ... `{workspace}` is a valid workspace.")?,
		Err(err) => writeln!(writer, "         Not quite: {err}")?,
	}

	separator(&mut writer)?;
	writeln!(
		writer,
		"\nOK, we're looking good! You're ready to deploy your app with `kploy run` now :)\n"
	)?;
	Ok(())
}
