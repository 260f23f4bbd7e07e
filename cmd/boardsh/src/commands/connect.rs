//! `connect`/`disconnect`: attach to or detach from a serial port mid-shell
//! (spec.md §4.7).

use crate::knobs;
use miette::miette;
use raw_repl::{discovery, session};
use tracing::{error, info};

pub async fn handle_connect(port: Option<String>, baud: Option<u32>, use_json: bool) {
	let mut config = knobs::active_config();
	if let Some(baud) = baud {
		config.baud = baud;
	}

	let result = match port.clone() {
		Some(port) => session::attach(&port, config.baud, config.wait, &config).await,
		Option::None => discovery::autoscan(config.baud, config.wait, &config).await,
	};

	match result {
		Ok(()) => {
			let name = session::Session::with_current(|s| Ok(s.name.clone())).unwrap_or_default();
			if use_json {
				info!(id = "boardsh::connect::attached", port = %name);
			} else {
				println!("connected to {name}");
			}
		}
		Err(cause) => {
			let target = port.unwrap_or_else(|| "<autoscan>".to_owned());
			if use_json {
				error!(id = "boardsh::connect::failed", port = %target, cause = %cause);
			} else {
				error!("\n{:?}", miette!("could not connect to `{target}`: {cause}"));
			}
		}
	}
}

pub fn handle_disconnect(use_json: bool) {
	let was_attached = session::Session::is_attached();
	session::detach();
	if use_json {
		info!(id = "boardsh::disconnect::detached", was_attached);
	} else if was_attached {
		println!("disconnected");
	} else {
		println!("no device was attached");
	}
}
