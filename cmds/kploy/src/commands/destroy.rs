//! Destroy command handler.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tracing::{info, instrument};

use super::{
	util::{self, separator},
	Context,
};
use crate::{
	k8s::teardown::TeardownEngine,
	manifest::{resolve_and_load, ResourceKind},
	resolver::{CachePolicy, Resolver},
};

#[derive(Args)]
pub struct DestroyArgs {}

/// Run the destroy command.
pub fn run<W: Write>(_args: DestroyArgs, ctx: &Context, writer: W) -> Result<()> {
	util::block_on(execute(ctx, writer))
}

/// Remove every resource of the workspace's application.
#[instrument(skip_all)]
pub async fn execute<W: Write>(ctx: &Context, mut writer: W) -> Result<()> {
	let descriptor = util::load_descriptor(&ctx.workspace)?;
	if ctx.settings.verbose {
		info!(descriptor = %ctx.workspace.descriptor_path().display(), "trying to destroy app");
	}
	let gateway = util::connect(&descriptor).await?;

	let resolver = Resolver::new();
	let services = resolve_and_load(
		&resolver,
		ResourceKind::Service,
		&ctx.workspace.services_dir(),
		CachePolicy::Reuse,
	)
	.await?;
	let controllers = resolve_and_load(
		&resolver,
		ResourceKind::Controller,
		&ctx.workspace.controllers_dir(),
		CachePolicy::Reuse,
	)
	.await?;

	let report = TeardownEngine::new(&gateway, &descriptor)
		.destroy(&services, &controllers)
		.await?;

	for resource in &report.deleted {
		writeln!(writer, "Deleted {resource}")?;
	}
	for resource in &report.already_absent {
		writeln!(writer, "Already absent: {resource}")?;
	}
	for (resource, reason) in &report.failed {
		writeln!(writer, "Failed to delete {resource}: {reason}")?;
	}

	separator(&mut writer)?;
	if report.is_clean() {
		writeln!(
			writer,
			"\nOK, I've destroyed `{}`\n",
			descriptor.qualified_name()
		)?;
	} else {
		writeln!(
			writer,
			"\nI've destroyed what I could of `{}`, {} resource(s) are left. Check them with `kploy list`.\n",
			descriptor.qualified_name(),
			report.failed.len()
		)?;
	}
	Ok(())
}
