//! The series of knobs you can use to configure `boardsh`.

pub mod cli;
pub mod env;

use cli::CliArguments;
use once_cell::sync::OnceCell;
use raw_repl::session::Config;
use std::time::Duration;

/// The config resolved once at startup from defaults/env/CLI, stashed here
/// so the `connect` command can reuse it (locale, buffer size, …) when the
/// operator reconnects mid-session to a different port.
static ACTIVE_CONFIG: OnceCell<Config> = OnceCell::new();

/// Stash the startup config. Called once, from `main`.
pub fn set_active_config(config: Config) {
	let _ = ACTIVE_CONFIG.set(config);
}

/// The active config, or `Config::default()` if `main` never set one (unit
/// tests, mainly).
#[must_use]
pub fn active_config() -> Config {
	ACTIVE_CONFIG.get().cloned().unwrap_or_default()
}

/// Layer `Config::default()` under the environment-variable overrides under
/// the CLI-flag overrides, in that order (spec.md §6).
#[must_use]
pub fn resolve_config(args: &CliArguments) -> Config {
	let mut config = Config::default();

	if let Some(port) = env::SERIAL_PORT.clone() {
		config.port = Some(port);
	}
	if let Some(baud) = *env::BAUD_RATE {
		config.baud = baud;
	}
	config.autoconnect = *env::AUTOCONNECT;
	if let Some(locale) = env::LOCALE.clone() {
		config.locale = Some(locale);
	}
	config.sync_time = *env::SYNC_TIME;

	if args.port.is_some() {
		config.port = args.port.clone();
	}
	config.baud = args.baud;
	config.wait = Duration::from_secs_f64(args.wait.max(0.0));
	config.buffer_size = args.buffer_size;
	config.chunk_size = args.chunk_size;
	config.chunk_wait = Duration::from_secs_f64(args.chunk_wait.max(0.0));
	config.autoconnect = config.autoconnect || args.autoconnect;
	if args.locale.is_some() {
		config.locale = args.locale.clone();
	}
	config.sync_time = config.sync_time || args.sync_time;
	config.debug = args.debug;

	config
}

/// Whether to use JSON output, per spec.md §6's layering for that one flag.
#[must_use]
pub fn use_json_output(args: &CliArguments) -> bool {
	*env::USE_JSON_OUTPUT || args.json
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use clap::Parser;

	fn parse(argv: &[&str]) -> CliArguments {
		CliArguments::try_parse_from(std::iter::once(&"boardsh").chain(argv)).expect("valid args")
	}

	#[test]
	pub fn resolve_config_applies_cli_wait_in_seconds() {
		let args = parse(&["--wait", "2.5"]);
		let config = resolve_config(&args);
		assert_eq!(config.wait, Duration::from_millis(2500));
	}

	#[test]
	pub fn resolve_config_leaves_locale_unset_when_cli_omits_it() {
		let args = parse(&[]);
		let config = resolve_config(&args);
		assert_eq!(config.locale, None);
	}

	#[test]
	pub fn resolve_config_takes_cli_locale_over_default() {
		let args = parse(&["--locale", "ja"]);
		let config = resolve_config(&args);
		assert_eq!(config.locale.as_deref(), Some("ja"));
	}

	#[test]
	pub fn resolve_config_ors_autoconnect_instead_of_overwriting() {
		let args = parse(&["--autoconnect"]);
		let config = resolve_config(&args);
		assert!(config.autoconnect);
	}

	#[test]
	pub fn active_config_falls_back_to_default_before_main_sets_one() {
		// Can't assert `ACTIVE_CONFIG` is empty here since other tests in this
		// binary may have already set it; just check the fallback shape holds
		// when nothing has been stashed, which is the common case in a
		// freshly spawned unit-test process.
		let config = active_config();
		assert!(config.baud > 0);
	}
}
