//! `cat`: print a file's contents, locally or on the device.

use crate::utils::resolve_relative;
use miette::miette;
use raw_repl::{helpers, router, session::Session};
use std::fs;
use tracing::{error, info};

pub async fn handle_cat(path: String, use_json: bool) {
	let resolved = resolve_relative(&path);

	let result = if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(&resolved);
			let buf_size = session.buffer_size;
			let bytes = if routed.device {
				helpers::read_device_file_to_vec(session.repl_mut(), &routed.relative, buf_size).await
			} else {
				fs::read(&routed.relative).map_err(|e| raw_repl::ReftError::HostIoError(routed.relative.clone().into(), e))
			};
			(session, bytes)
		})
		.await
	} else {
		let routed = router::route(&resolved, &[], None);
		fs::read(&routed.relative).map_err(|e| raw_repl::ReftError::HostIoError(routed.relative.clone().into(), e))
	};

	match result {
		Ok(bytes) => {
			if use_json {
				info!(id = "boardsh::cat::read", path = %resolved, bytes = bytes.len());
			}
			use std::io::Write;
			let _ = std::io::stdout().write_all(&bytes);
		}
		Err(cause) => {
			super::detach_if_fatal(&cause);
			if use_json {
				error!(id = "boardsh::cat::failed", path = %resolved, cause = %cause);
			} else {
				error!("\n{:?}", miette!("could not read `{resolved}`: {cause}"));
			}
		}
	}
}
