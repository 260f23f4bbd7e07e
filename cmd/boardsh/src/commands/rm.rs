//! `rm`: remove a file or directory, locally or on the device.

use crate::utils::resolve_relative;
use miette::miette;
use raw_repl::{
	helpers::{remove_local, REMOVE},
	router,
	session::Session,
};
use tracing::{error, info};

pub async fn handle_rm(path: String, use_json: bool) {
	let resolved = resolve_relative(&path);

	let result = if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(&resolved);
			let value = router::auto(session.repl_mut(), &routed, &REMOVE, remove_local, &[]).await;
			(session, value)
		})
		.await
	} else {
		let routed = router::route(&resolved, &[], None);
		remove_local(&routed.relative)
	};

	match result {
		Ok(_) => {
			if use_json {
				info!(id = "boardsh::rm::removed", path = %resolved);
			} else {
				println!("removed {resolved}");
			}
		}
		Err(cause) => {
			super::detach_if_fatal(&cause);
			if use_json {
				error!(id = "boardsh::rm::failed", path = %resolved, cause = %cause);
			} else {
				error!("\n{:?}", miette!("could not remove `{resolved}`: {cause}"));
			}
		}
	}
}
