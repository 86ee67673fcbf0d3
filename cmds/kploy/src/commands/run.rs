//! Run command handler.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tracing::{info, instrument};

use super::{
	util::{self, separator},
	Context,
};
use crate::k8s::{
	delay::{Delay, TokioDelay},
	deploy::DeployEngine,
};

#[derive(Args)]
pub struct RunArgs {}

/// Run the run command.
pub fn run<W: Write>(_args: RunArgs, ctx: &Context, writer: W) -> Result<()> {
	util::block_on(execute(ctx, writer, TokioDelay))
}

/// Deploy the application of the workspace.
#[instrument(skip_all)]
pub async fn execute<W: Write, D: Delay>(ctx: &Context, mut writer: W, delay: D) -> Result<()> {
	let descriptor = util::load_descriptor(&ctx.workspace)?;
	if ctx.settings.verbose {
		info!(descriptor = %ctx.workspace.descriptor_path().display(), "trying to run");
	}

	let gateway = util::connect(&descriptor).await?;
	let report = DeployEngine::new(
		&gateway,
		&ctx.workspace,
		&descriptor,
		&ctx.settings,
		delay,
	)
	.run()
	.await?;

	for resource in &report.resources {
		writeln!(
			writer,
			"Deployed {} {} ({})",
			resource.kind,
			resource.name,
			gateway.url_for(&resource.path)
		)?;
		for pod in &resource.owned_pods {
			writeln!(writer, "  owns pod {pod}")?;
		}
	}

	separator(&mut writer)?;
	writeln!(
		writer,
		"\nOK, I've deployed `{}`.\nUse `kploy list` and `kploy stats` to check how it's doing.",
		descriptor.qualified_name()
	)?;
	Ok(())
}
