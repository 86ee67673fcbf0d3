use crate::config::{Settings, Workspace};

pub mod debug;
pub mod destroy;
pub mod dryrun;
pub mod init;
pub mod list;
pub mod run;
pub mod scale;
pub mod stats;

pub mod util;

/// Where a command runs and how.
#[derive(Debug, Clone)]
pub struct Context {
	pub workspace: Workspace,
	pub settings: Settings,
}

impl Context {
	pub fn new(workspace: Workspace, settings: Settings) -> Self {
		Self {
			workspace,
			settings,
		}
	}
}
