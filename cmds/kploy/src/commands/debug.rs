//! Debug command handler.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tracing::instrument;

use super::{
	util::{self, separator},
	Context,
};
use crate::k8s::{
	delay::{Delay, TokioDelay},
	scale::ScaleEngine,
};

#[derive(Args)]
pub struct DebugArgs {
	/// Pod to take offline, for example `webserver-42abc` (see `kploy stats`)
	pub pod: String,
}

/// Run the debug command.
pub fn run<W: Write>(args: DebugArgs, ctx: &Context, writer: W) -> Result<()> {
	util::block_on(execute(ctx, &args.pod, writer, TokioDelay))
}

/// Take `pod` offline: it keeps running, but leaves its controller and the
/// set of pods kploy owns.
#[instrument(skip(ctx, writer, delay))]
pub async fn execute<W: Write, D: Delay>(
	ctx: &Context,
	pod: &str,
	mut writer: W,
	delay: D,
) -> Result<()> {
	let descriptor = util::load_descriptor(&ctx.workspace)?;
	writeln!(writer, "Trying to take Pod {pod} offline for debugging ...")?;
	let gateway = util::connect(&descriptor).await?;

	let outcome = ScaleEngine::new(&gateway, &descriptor.namespace, &ctx.settings, delay)
		.take_offline(pod)
		.await?;
	writeln!(
		writer,
		"RC {} now owns: {}",
		outcome.controller,
		outcome.owned_pods.join(", ")
	)?;

	separator(&mut writer)?;
	writeln!(
		writer,
		"\nOK, the Pod {pod} is offline. Now you can, for example, use `kubectl exec` to debug it."
	)?;
	Ok(())
}
