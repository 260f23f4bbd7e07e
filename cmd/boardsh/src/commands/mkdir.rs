//! `mkdir`: create a directory, locally or on the device.

use crate::utils::resolve_relative;
use miette::miette;
use raw_repl::{
	helpers::{mkdir_local, MKDIR},
	router,
	session::Session,
};
use tracing::{error, info};

pub async fn handle_mkdir(path: String, use_json: bool) {
	let resolved = resolve_relative(&path);

	let result = if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(&resolved);
			let value = router::auto(session.repl_mut(), &routed, &MKDIR, mkdir_local, &[]).await;
			(session, value)
		})
		.await
	} else {
		let routed = router::route(&resolved, &[], None);
		mkdir_local(&routed.relative)
	};

	match result {
		Ok(_) => {
			if use_json {
				info!(id = "boardsh::mkdir::created", path = %resolved);
			} else {
				println!("created {resolved}");
			}
		}
		Err(cause) => {
			super::detach_if_fatal(&cause);
			if use_json {
				error!(id = "boardsh::mkdir::failed", path = %resolved, cause = %cause);
			} else {
				error!("\n{:?}", miette!("could not create `{resolved}`: {cause}"));
			}
		}
	}
}
