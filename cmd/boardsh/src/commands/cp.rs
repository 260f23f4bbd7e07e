//! `cp`: copy a file, possibly crossing the host/device boundary (spec.md
//! §4.5). Which of the four directions applies is decided per-path by
//! [`raw_repl::session::Session::route`]; with no device attached every
//! path routes local and this degrades to a plain host-to-host copy.

use crate::utils::resolve_relative;
use miette::miette;
use raw_repl::{helpers, router, session::Session};
use std::{fs, io::Cursor};
use tracing::{error, info};

pub async fn handle_cp(source: String, destination: String, use_json: bool) {
	let source = resolve_relative(&source);
	let destination = resolve_relative(&destination);

	let result = copy_path(&source, &destination).await;

	match result {
		Ok(()) => {
			if use_json {
				info!(id = "boardsh::cp::copied", source = %source, destination = %destination);
			} else {
				println!("{source} -> {destination}");
			}
		}
		Err(cause) => {
			super::detach_if_fatal(&cause);
			if use_json {
				error!(id = "boardsh::cp::failed", source = %source, destination = %destination, cause = %cause);
			} else {
				error!("\n{:?}", miette!("could not copy `{source}` to `{destination}`: {cause}"));
			}
		}
	}
}

/// Copy `source` to `destination`, routing each path independently so
/// either side (or both) can land on the device. Shared between `cp` and
/// `rsync`, which is just this applied to every stale entry in a
/// directory.
pub(crate) async fn copy_path(source: &str, destination: &str) -> Result<(), raw_repl::ReftError> {
	if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let result = copy_with_device(&mut session, source, destination).await;
			(session, result)
		})
		.await
	} else {
		let src = router::route(source, &[], None);
		let dst = router::route(destination, &[], None);
		fs::copy(&src.relative, &dst.relative)
			.map(|_| ())
			.map_err(|e| raw_repl::ReftError::HostIoError(dst.relative.into(), e))
	}
}

async fn copy_with_device(
	session: &mut raw_repl::session::Session,
	source: &str,
	destination: &str,
) -> Result<(), raw_repl::ReftError> {
	let src = session.route(source);
	let dst = session.route(destination);
	let buf_size = session.buffer_size;

	match (src.device, dst.device) {
		(false, false) => fs::copy(&src.relative, &dst.relative)
			.map(|_| ())
			.map_err(|e| raw_repl::ReftError::HostIoError(dst.relative.into(), e)),
		(false, true) => {
			let mut file = fs::File::open(&src.relative).map_err(|e| raw_repl::ReftError::HostIoError(src.relative.clone().into(), e))?;
			let total = file
				.metadata()
				.map_err(|e| raw_repl::ReftError::HostIoError(src.relative.clone().into(), e))?
				.len();
			helpers::write_file_to_device(session.repl_mut(), &dst.relative, &mut file, total, buf_size).await
		}
		(true, false) => {
			let bytes = helpers::read_device_file_to_vec(session.repl_mut(), &src.relative, buf_size).await?;
			fs::write(&dst.relative, &bytes).map_err(|e| raw_repl::ReftError::HostIoError(dst.relative.into(), e))
		}
		(true, true) => {
			let bytes = helpers::read_device_file_to_vec(session.repl_mut(), &src.relative, buf_size).await?;
			let total = bytes.len() as u64;
			let mut cursor = Cursor::new(bytes);
			helpers::write_file_to_device(session.repl_mut(), &dst.relative, &mut cursor, total, buf_size).await
		}
	}
}
