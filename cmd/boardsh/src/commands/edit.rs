//! `edit`: download a file, run `$EDITOR` on a local temp copy, and write
//! the result back to wherever the path routed to.

use crate::utils::resolve_relative;
use miette::miette;
use raw_repl::{helpers, router, session::Session};
use std::{fs, io::Cursor};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

pub async fn handle_edit(path: String, use_json: bool) {
	let resolved = resolve_relative(&path);

	let Some(temp) = NamedTempFile::new().ok() else {
		error!("\n{:?}", miette!("could not create a local temp file to edit `{resolved}` in"));
		return;
	};

	match edit_inner(&resolved, temp).await {
		Ok(()) => {
			if use_json {
				info!(id = "boardsh::edit::written_back", path = %resolved);
			} else {
				println!("wrote back {resolved}");
			}
		}
		Err(cause) => {
			super::detach_if_fatal(&cause);
			if use_json {
				error!(id = "boardsh::edit::failed", path = %resolved, cause = %cause);
			} else {
				error!("\n{:?}", miette!("could not edit `{resolved}`: {cause}"));
			}
		}
	}
}

async fn edit_inner(resolved: &str, temp: NamedTempFile) -> Result<(), raw_repl::ReftError> {
	let temp_path = temp.path().to_path_buf();

	let original = read_routed(resolved).await?;
	fs::write(&temp_path, &original).map_err(|e| raw_repl::ReftError::HostIoError(temp_path.clone(), e))?;

	let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_owned());
	let status = tokio::process::Command::new(&editor)
		.arg(&temp_path)
		.status()
		.await
		.map_err(|e| raw_repl::ReftError::HostIoError(temp_path.clone(), e))?;
	if !status.success() {
		warn!(editor, ?status, "editor exited non-zero, writing back its output anyway");
	}

	let edited = fs::read(&temp_path).map_err(|e| raw_repl::ReftError::HostIoError(temp_path.clone(), e))?;
	if edited == original {
		return Ok(());
	}
	write_routed(resolved, edited).await
}

async fn read_routed(resolved: &str) -> Result<Vec<u8>, raw_repl::ReftError> {
	if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(resolved);
			let buf_size = session.buffer_size;
			let bytes = if routed.device {
				helpers::read_device_file_to_vec(session.repl_mut(), &routed.relative, buf_size).await
			} else {
				fs::read(&routed.relative).map_err(|e| raw_repl::ReftError::HostIoError(routed.relative.into(), e))
			};
			(session, bytes)
		})
		.await
	} else {
		let routed = router::route(resolved, &[], None);
		fs::read(&routed.relative).map_err(|e| raw_repl::ReftError::HostIoError(routed.relative.into(), e))
	}
}

async fn write_routed(resolved: &str, bytes: Vec<u8>) -> Result<(), raw_repl::ReftError> {
	if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(resolved);
			let buf_size = session.buffer_size;
			let result = if routed.device {
				let total = bytes.len() as u64;
				let mut cursor = Cursor::new(bytes);
				helpers::write_file_to_device(session.repl_mut(), &routed.relative, &mut cursor, total, buf_size).await
			} else {
				fs::write(&routed.relative, &bytes).map_err(|e| raw_repl::ReftError::HostIoError(routed.relative.into(), e))
			};
			(session, result)
		})
		.await
	} else {
		let routed = router::route(resolved, &[], None);
		fs::write(&routed.relative, &bytes).map_err(|e| raw_repl::ReftError::HostIoError(routed.relative.into(), e))
	}
}
