//! Utilities for command handlers.

use std::{
	future::Future,
	io::{self, ErrorKind, Write},
};

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::{
	config::Workspace,
	descriptor::Descriptor,
	error::Error,
	k8s::client::Gateway,
};

/// Width of the separator line between output sections.
const SEPARATOR_WIDTH: usize = 80;

/// Drive an async command to completion on a fresh tokio runtime.
pub fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;

	runtime.block_on(future)
}

/// Read the workspace's `Kployfile`.
pub fn load_descriptor(workspace: &Workspace) -> Result<Descriptor, Error> {
	let descriptor = Descriptor::load(&workspace.descriptor_path())?;
	debug!(?descriptor, "loaded deployment descriptor");
	Ok(descriptor)
}

/// Connect to the control plane named in the descriptor.
pub async fn connect(descriptor: &Descriptor) -> Result<Gateway, Error> {
	Gateway::connect(&descriptor.apiserver)
		.await
		.map_err(|err| Error::connectivity(&descriptor.apiserver, err))
}

/// Print a separator line between output sections.
pub fn separator<W: Write>(writer: &mut W) -> io::Result<()> {
	writeln!(writer, "{}", "=".repeat(SEPARATOR_WIDTH))
}

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write. This allows commands to exit cleanly when
/// output is piped to a process that closes early (e.g., `kploy list | head -1`).
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}
