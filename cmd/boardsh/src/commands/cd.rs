//! `cd`: change the shell's own notion of current directory. REFTE's path
//! router never tracks this itself (spec.md §1 leaves it to the
//! interactive loop); `boardsh` keeps it in [`crate::utils::CURRENT_DIR`].

use crate::utils::{current_dir, resolve_relative, set_current_dir};
use tracing::info;

pub fn handle_cd(path: Option<String>, use_json: bool) {
	let target = match path {
		Some(path) => resolve_relative(&path),
		Option::None => "/".to_owned(),
	};
	set_current_dir(target.clone());

	if use_json {
		info!(id = "boardsh::cd::changed", path = %target);
	} else {
		println!("{}", current_dir());
	}
}
