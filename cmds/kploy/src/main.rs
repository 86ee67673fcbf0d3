use std::{io::Write, process::ExitCode};

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser, Subcommand};
use kploy::{
	commands::{self, util::BrokenPipeGuard, Context},
	config::{Settings, Workspace},
	error::Error,
	telemetry,
};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "kploy")]
#[command(about = "kploy is an opinionated Kubernetes deployment system for appops", long_about = None)]
#[command(after_help = "Examples: `kploy init`, `kploy run`, `kploy list`, or to learn its usage: `kploy explain run`, `kploy explain list`, etc.")]
#[command(version = env!("KPLOY_VERSION"))]
struct Cli {
	/// Let me tell you every little dirty secret
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Validate the app without deploying it
	///
	/// Looks for a `Kployfile` in the current directory and validates it: checks
	/// that the cluster is reachable, that RC and service manifests exist and
	/// are well-formed, and whether `source` is a valid workspace.
	Dryrun(commands::dryrun::DryrunArgs),

	/// Deploy the app
	///
	/// Looks for a `Kployfile` in the current directory and deploys it: sets up
	/// the namespace and the `kploy-secrets` secret from `env/*.secret`, then
	/// creates services and RCs and marks them, and the pods of the RCs, with
	/// `guard=pyk`.
	Run(commands::run::RunArgs),

	/// List app resources and their status
	///
	/// Shows every service and RC of the app with its manifest, status and URL,
	/// followed by the env data deployed with it.
	List(commands::list::ListArgs),

	/// Create a Kployfile and the manifest directories
	///
	/// Creates a `Kployfile` with default values in the current directory and
	/// sets up the `rcs/` and `services/` directories. Refuses to overwrite an
	/// existing `Kployfile`.
	Init(commands::init::InitArgs),

	/// Destroy the app, removing all of its resources
	///
	/// Scales every RC down to zero replicas before deleting it, then deletes
	/// the services, the env data and the namespace. Resources that are already
	/// gone are skipped.
	Destroy(commands::destroy::DestroyArgs),

	/// Show the app's pods and the nodes they run on
	///
	/// Shows cluster utilization and a summary of the pods' state, from the point
	/// of view of your app.
	Stats(commands::stats::StatsArgs),

	/// Take a pod offline for debugging
	///
	/// Removes all labels of the pod, including `guard=pyk`, so it leaves its RC
	/// and the app. The RC starts a replacement, which is owned by the app.
	/// Usage: `debug pod`, for example `debug webserver-42abc`.
	Debug(commands::debug::DebugArgs),

	/// Scale an RC up or down
	///
	/// Sets the number of replicas of an RC. New pods of a scale-up are owned by
	/// the app. Usage: `scale rc=replica_count`, for example
	/// `scale webserver-rc=10`.
	Scale(commands::scale::ScaleArgs),

	/// Learn what a command does
	Explain {
		/// Command to explain, for example `run`
		command: String,
	},
}

fn explain<W: Write>(command: &str, mut writer: W) -> Result<()> {
	let mut cli = Cli::command();
	let subcommand = cli
		.find_subcommand_mut(command)
		.ok_or_else(|| Error::usage(format!("there is no command `{command}`")))?;
	write!(writer, "{}", subcommand.render_long_help())?;
	Ok(())
}

fn dispatch(cli: Cli) -> Result<()> {
	let stdout = BrokenPipeGuard::new(std::io::stdout());
	let workspace = Workspace::current().context("finding the current directory")?;
	let ctx = Context::new(workspace, Settings::from_env(cli.verbose));

	match cli.command {
		Commands::Dryrun(args) => commands::dryrun::run(args, &ctx, stdout),
		Commands::Run(args) => commands::run::run(args, &ctx, stdout),
		Commands::List(args) => commands::list::run(args, &ctx, stdout),
		Commands::Init(args) => commands::init::run(args, &ctx, stdout),
		Commands::Destroy(args) => commands::destroy::run(args, &ctx, stdout),
		Commands::Stats(args) => commands::stats::run(args, &ctx, stdout),
		Commands::Debug(args) => commands::debug::run(args, &ctx, stdout),
		Commands::Scale(args) => commands::scale::run(args, &ctx, stdout),
		Commands::Explain { command } => explain(&command, stdout),
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	telemetry::init(cli.verbose);

	match dispatch(cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => ExitCode::from(report(&err, BrokenPipeGuard::new(std::io::stdout()))),
	}
}

/// Print a fatal error with guidance for the user, and return the exit code.
///
/// The diagnostic is part of the command's output, so it goes to the same
/// writer; logs stay on stderr.
fn report<W: Write>(err: &anyhow::Error, mut writer: W) -> u8 {
	// Nothing useful is left to do if even this can't be written.
	let _ = writeln!(writer, "Something went wrong:\n{err:#}");
	match Error::find(err) {
		Some(known) => {
			if let Some(guidance) = known.guidance() {
				let _ = writeln!(writer, "{guidance}");
			}
			known.exit_code()
		}
		None => 1,
	}
}
