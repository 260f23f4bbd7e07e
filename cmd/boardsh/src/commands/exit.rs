//! `exit`: leave the shell, detaching from any attached device first.

use raw_repl::session;
use tracing::info;

pub fn handle_exit(use_json: bool) {
	if session::Session::is_attached() {
		session::detach();
	}
	if use_json {
		info!(id = "boardsh::exit::leaving");
	} else {
		println!("bye");
	}
}
