//! Scale command handler.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tracing::instrument;

use super::{
	util::{self, separator},
	Context,
};
use crate::{
	error::Error,
	k8s::{
		delay::{Delay, TokioDelay},
		scale::ScaleEngine,
	},
};

#[derive(Args)]
pub struct ScaleArgs {
	/// Scale definition `<rc>=<replicas>`, for example `webserver-rc=10`
	pub definition: String,
}

/// Run the scale command.
pub fn run<W: Write>(args: ScaleArgs, ctx: &Context, writer: W) -> Result<()> {
	let (controller, replicas) = parse_definition(&args.definition)?;
	util::block_on(execute(ctx, &controller, replicas, writer, TokioDelay))
}

/// Split `<rc>=<replicas>`.
pub fn parse_definition(definition: &str) -> Result<(String, u64), Error> {
	let malformed = |reason: &str| {
		Error::usage(format!(
			"can't parse scale definition `{definition}`: {reason}. \
			 It should look like `rc=replica_count`, for example `webserver-rc=10`"
		))
	};

	let (controller, replicas) = definition
		.split_once('=')
		.ok_or_else(|| malformed("missing `=`"))?;
	let controller = controller.trim();
	if controller.is_empty() {
		return Err(malformed("missing RC name"));
	}
	let replicas = replicas
		.trim()
		.parse::<u64>()
		.map_err(|_| malformed("replica count is not a non-negative integer"))?;

	Ok((controller.to_string(), replicas))
}

/// Scale `controller` of the workspace's application to `replicas`.
#[instrument(skip(ctx, writer, delay))]
pub async fn execute<W: Write, D: Delay>(
	ctx: &Context,
	controller: &str,
	replicas: u64,
	mut writer: W,
	delay: D,
) -> Result<()> {
	let descriptor = util::load_descriptor(&ctx.workspace)?;
	writeln!(
		writer,
		"Trying to scale RC {controller} to {replicas} replicas"
	)?;
	let gateway = util::connect(&descriptor).await?;

	let outcome = ScaleEngine::new(&gateway, &descriptor.namespace, &ctx.settings, delay)
		.scale(controller, replicas)
		.await?;
	if !outcome.owned_pods.is_empty() {
		writeln!(writer, "Owned pods: {}", outcome.owned_pods.join(", "))?;
	}

	separator(&mut writer)?;
	writeln!(
		writer,
		"OK, I've scaled RC {controller} from {} to {} replicas. You can do a `kploy stats` now to verify it.",
		outcome.previous, outcome.target
	)?;
	Ok(())
}
