//! Top-level flags, parsed once at process start (spec.md §6's CLI-flag
//! layer). Per-line commands (`ls`, `cp`, …) are a separate, smaller
//! `clap::Parser` defined in [`crate::commands`], re-parsed out of each
//! line the operator types.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, author, name = "boardsh", version)]
pub struct CliArguments {
	/// Serial port to connect to at startup; if omitted, `boardsh` starts
	/// with no device attached until `connect` is typed.
	#[arg(short = 'p', long = "port")]
	pub port: Option<String>,
	/// Baud rate for the initial connection.
	#[arg(short = 'b', long = "baud", default_value_t = 115_200)]
	pub baud: u32,
	/// Seconds to wait for the port to enumerate before giving up.
	#[arg(short = 'w', long = "wait", default_value_t = 0.0)]
	pub wait: f64,
	/// Raw bytes per file-transfer window (doubled on the wire as hex).
	#[arg(long = "buffer-size", default_value_t = raw_repl::helpers::DEFAULT_BUFFER_SIZE)]
	pub buffer_size: usize,
	/// Bytes per paced chunk when shipping snippet source.
	#[arg(long = "chunk-size", default_value_t = raw_repl::exec::DEFAULT_CHUNK_SIZE)]
	pub chunk_size: usize,
	/// Seconds to pause between paced source chunks.
	#[arg(long = "chunk-wait", default_value_t = 0.5)]
	pub chunk_wait: f64,
	/// Watch for the first enumerated adapter and connect automatically.
	#[arg(short = 'a', long = "autoconnect")]
	pub autoconnect: bool,
	/// Locale tag selecting the soft-reboot banner (spec.md §4.2, §9(a)).
	#[arg(long = "locale")]
	pub locale: Option<String>,
	/// Push the host's clock to the device's RTC once attached.
	#[arg(long = "sync-time")]
	pub sync_time: bool,
	/// Switch all logging and output to JSON for machine-parsable output.
	#[arg(short = 'j', long = "json")]
	pub json: bool,
	/// Raise the log level to debug.
	#[arg(long = "debug")]
	pub debug: bool,
}
