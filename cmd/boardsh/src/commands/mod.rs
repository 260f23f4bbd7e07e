//! A thin module wrapper that contains all the different files that each
//! handle one command, plus the `LineCommand` grammar every line typed at
//! the prompt is parsed into.

mod cat;
mod cd;
mod connect;
mod cp;
mod edit;
mod exit;
mod help;
mod ls;
mod mkdir;
mod repl;
mod rm;
mod rsync;

pub use cat::handle_cat;
pub use cd::handle_cd;
pub use connect::{handle_connect, handle_disconnect};
pub use cp::handle_cp;
pub use edit::handle_edit;
pub use exit::handle_exit;
pub use help::handle_help;
pub use ls::handle_ls;
pub use mkdir::handle_mkdir;
pub use repl::handle_repl;
pub use rm::handle_rm;
pub use rsync::handle_rsync;

use clap::Parser;

/// spec.md §7: `LinkLost`, `ProtocolTimeout`, `ReplNotReady` and
/// `ExecRejected` always tear the owning session down. Every command
/// handler's error branch calls this before reporting the failure, so a
/// dead link never lingers as the current device for the next command to
/// try and reuse.
pub(crate) fn detach_if_fatal(cause: &raw_repl::ReftError) {
	if cause.is_fatal() {
		raw_repl::session::detach();
	}
}

/// One line of interactive input, tokenized by [`crate::utils::split_line`]
/// and parsed with this grammar (spec.md §1 leaves parsing itself out of
/// scope; this is the minimum `clap` needs to dispatch).
#[derive(Parser, Debug)]
#[command(
	name = "",
	no_binary_name = true,
	disable_help_flag = true,
	disable_help_subcommand = true
)]
pub struct LineCommand {
	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Parser, Debug)]
pub enum Commands {
	/// List a directory's contents.
	Ls { path: Option<String> },
	/// Print a file's contents to stdout.
	Cat { path: String },
	/// Copy a file, possibly crossing the host/device boundary.
	Cp { source: String, destination: String },
	/// Remove a file or directory.
	Rm { path: String },
	/// Create a directory.
	Mkdir { path: String },
	/// Mirror a local directory onto the device (or vice versa).
	Rsync {
		source: String,
		destination: String,
		#[arg(long = "dry-run")]
		dry_run: bool,
		/// Delete destination entries that are no longer present in the source.
		#[arg(short = 'm', long = "mirror")]
		mirror: bool,
	},
	/// Download a file, run `$EDITOR` on it, and write it back.
	Edit { path: String },
	/// Change the shell's notion of current directory.
	Cd { path: Option<String> },
	/// Enter a passthrough terminal connected straight to the device.
	Repl {},
	/// Attach to a serial port.
	Connect {
		port: Option<String>,
		#[arg(short = 'b', long = "baud")]
		baud: Option<u32>,
	},
	/// Detach from the current device, staying in the shell.
	Disconnect {},
	/// Leave the shell, detaching from any attached device first.
	Exit {},
	/// Print the list of available commands.
	Help {},
}

/// Run one parsed [`Commands`] variant. This is `boardsh`'s entire command
/// loop body; everything else in `main.rs` is just reading lines and
/// feeding them here.
pub async fn dispatch(command: Commands, use_json: bool) -> bool {
	match command {
		Commands::Ls { path } => handle_ls(path, use_json).await,
		Commands::Cat { path } => handle_cat(path, use_json).await,
		Commands::Cp { source, destination } => handle_cp(source, destination, use_json).await,
		Commands::Rm { path } => handle_rm(path, use_json).await,
		Commands::Mkdir { path } => handle_mkdir(path, use_json).await,
		Commands::Rsync {
			source,
			destination,
			dry_run,
			mirror,
		} => handle_rsync(source, destination, dry_run, mirror, use_json).await,
		Commands::Edit { path } => handle_edit(path, use_json).await,
		Commands::Cd { path } => handle_cd(path, use_json),
		Commands::Repl {} => handle_repl(use_json).await,
		Commands::Connect { port, baud } => handle_connect(port, baud, use_json).await,
		Commands::Disconnect {} => handle_disconnect(use_json),
		Commands::Exit {} => {
			handle_exit(use_json);
			return false;
		}
		Commands::Help {} => handle_help(use_json),
	}
	true
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	fn parse(tokens: &[&str]) -> Commands {
		LineCommand::try_parse_from(tokens).expect("valid line").command
	}

	#[test]
	pub fn parses_ls_with_no_path_as_cwd_listing() {
		assert!(matches!(parse(&["ls"]), Commands::Ls { path: None }));
	}

	#[test]
	pub fn parses_ls_with_a_path() {
		let Commands::Ls { path } = parse(&["ls", "/flash"]) else {
			panic!("expected Ls");
		};
		assert_eq!(path.as_deref(), Some("/flash"));
	}

	#[test]
	pub fn parses_rsync_dry_run_flag() {
		let Commands::Rsync { dry_run, .. } = parse(&["rsync", "a", "b", "--dry-run"]) else {
			panic!("expected Rsync");
		};
		assert!(dry_run);
	}

	#[test]
	pub fn parses_rsync_mirror_flag() {
		let Commands::Rsync { mirror, .. } = parse(&["rsync", "a", "b", "-m"]) else {
			panic!("expected Rsync");
		};
		assert!(mirror);
	}

	#[test]
	pub fn disconnect_and_exit_are_distinct_commands() {
		assert!(matches!(parse(&["disconnect"]), Commands::Disconnect {}));
		assert!(matches!(parse(&["exit"]), Commands::Exit {}));
	}

	#[test]
	pub fn connect_takes_an_optional_port_and_baud() {
		let Commands::Connect { port, baud } = parse(&["connect", "/dev/ttyACM0", "-b", "9600"]) else {
			panic!("expected Connect");
		};
		assert_eq!(port.as_deref(), Some("/dev/ttyACM0"));
		assert_eq!(baud, Some(9600));
	}

	#[tokio::test]
	pub async fn exit_tells_the_loop_to_stop() {
		assert!(!dispatch(Commands::Exit {}, false).await);
	}

	#[tokio::test]
	pub async fn help_tells_the_loop_to_continue() {
		assert!(dispatch(Commands::Help {}, false).await);
	}
}
