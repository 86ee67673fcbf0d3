//! Init command handler.

use std::{fs, io::Write};

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use super::{util::separator, Context};
use crate::{
	config::DEPLOYMENT_DESCRIPTOR,
	descriptor::{Descriptor, DescriptorError},
	error::Error,
};

#[derive(Args)]
pub struct InitArgs {}

/// Run the init command.
pub fn run<W: Write>(_args: InitArgs, ctx: &Context, writer: W) -> Result<()> {
	execute(ctx, writer)
}

/// Create the descriptor and manifest directories of a new application.
pub fn execute<W: Write>(ctx: &Context, mut writer: W) -> Result<()> {
	let workspace = &ctx.workspace;
	let descriptor_path = workspace.descriptor_path();
	if descriptor_path.exists() {
		return Err(Error::from(DescriptorError::AlreadyExists(descriptor_path)).into());
	}

	for dir in [workspace.services_dir(), workspace.controllers_dir()] {
		fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
	}

	let descriptor = Descriptor::default();
	descriptor.create(&descriptor_path).map_err(Error::from)?;
	if ctx.settings.verbose {
		info!(?descriptor, "set up application");
	}

	separator(&mut writer)?;
	writeln!(
		writer,
		"\nOK, I've set up the `{DEPLOYMENT_DESCRIPTOR}`, the app deployment descriptor from scratch and created necessary directories."
	)?;
	writeln!(
		writer,
		"Now edit the app deployment descriptor and copy manifests into the respective directories.\n"
	)?;
	Ok(())
}
