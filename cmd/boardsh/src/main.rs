#![allow(
	// I've always disliked this rule, most of the time imports are used WITHOUT
	// the module name, and the module name is only used in the top level import.
	//
	// Where this becomes significantly more helpful to read as it's out of
	// context.
	clippy::module_name_repetitions,
)]

pub mod commands;
pub mod exit_codes;
pub mod knobs;
pub mod utils;

use crate::{
	exit_codes::{ARGUMENT_PARSING_FAILURE, INITIAL_CONNECT_FAILURE, LOGGING_HANDLER_INSTALL_FAILURE},
	knobs::{cli::CliArguments, resolve_config, set_active_config, use_json_output},
};
use clap::Parser;
use log::install_logging_handlers;
use miette::miette;
use raw_repl::{discovery, session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};

#[tokio::main]
async fn main() {
	let (argv, use_json) = bootstrap_cli();
	let config = resolve_config(&argv);
	set_active_config(config.clone());

	if let Some(port) = config.port.clone() {
		if let Err(cause) = session::attach(&port, config.baud, config.wait, &config).await {
			report_connect_failure(use_json, &port, &cause);
			std::process::exit(INITIAL_CONNECT_FAILURE);
		}
	} else if config.autoconnect {
		// Startup autoconnect is best-effort: if nothing answers, fall through
		// into the shell with no device attached instead of refusing to start.
		if let Err(cause) = discovery::autoscan(config.baud, config.wait, &config).await {
			if use_json {
				warn!(id = "boardsh::autoconnect::nothing_found", cause = %cause);
			} else {
				warn!("autoscan at startup found nothing to attach to: {cause}");
			}
		}
	}

	run_shell(use_json).await;
}

/// The interactive read loop: print a prompt, read one line, tokenize it,
/// re-parse it with [`commands::LineCommand`], and dispatch. Runs until
/// stdin closes or a command signals the shell should exit.
async fn run_shell(use_json: bool) {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();

	loop {
		print_prompt();
		let next = lines.next_line().await;
		let line = match next {
			Ok(Some(line)) => line,
			Ok(Option::None) | Err(_) => break,
		};

		let tokens = utils::split_line(&line);
		if tokens.is_empty() {
			continue;
		}

		match commands::LineCommand::try_parse_from(tokens) {
			Ok(parsed) => {
				if !commands::dispatch(parsed.command, use_json).await {
					break;
				}
			}
			Err(cause) => println!("{cause}"),
		}
	}
}

fn print_prompt() {
	use std::io::Write;
	let name = session::Session::with_current(|s| Ok(s.name.clone())).unwrap_or_else(|_| "boardsh".to_owned());
	print!("{name}> ");
	let _ = std::io::stdout().flush();
}

fn report_connect_failure(use_json: bool, port: &str, cause: &raw_repl::ReftError) {
	if use_json {
		error!(id = "boardsh::connect::initial_failure", port = %port, cause = %cause);
	} else {
		error!("\n{:?}", miette!("could not connect to `{port}` at startup: {cause}"));
	}
}

fn bootstrap_cli() -> (CliArguments, bool) {
	let args_opt = CliArguments::try_parse();

	let use_json = args_opt.as_ref().map_or_else(
		|_error| {
			std::env::args().any(|arg| arg == "-j" || arg == "--json")
		},
		use_json_output,
	);

	if let Err(cause) = install_logging_handlers(use_json) {
		if use_json {
			println!(
				r#"{{"id": "boardsh::logging::install_failure", "inner_display_error": "{}", "message": "Failed to install the logging handlers!"}}"#,
				format!("{cause:?}").replace('"', "\\\"")
			);
		} else {
			println!("Failed to install the logging handler to setup logging:\n{cause:?}");
		}
		std::process::exit(LOGGING_HANDLER_INSTALL_FAILURE);
	}

	match args_opt {
		Ok(args) => (args, use_json),
		Err(cause) => {
			if use_json {
				error!(
					id = "boardsh::cli::arg_parse_failure",
					error.kind = %cause.kind(),
					error.rendered = %cause.render(),
					"Failed parsing CLI arguments"
				);
			} else {
				error!(
					"\n{:?}",
					miette!("Failed parsing CLI arguments!").wrap_err(cause),
				);
			}

			std::process::exit(ARGUMENT_PARSING_FAILURE);
		}
	}
}
