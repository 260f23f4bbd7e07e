//! `rsync`: mirror one directory's contents onto another, copying entries
//! that are missing on the destination or newer on the source, and (with
//! `--mirror`) deleting destination entries absent from the source. One
//! level deep only — matching the depth `listdir_stat` itself returns;
//! a recursive mirror would need its own tree walk on the device side,
//! which spec.md's filesystem primitives don't provide.

use super::{cp::copy_path, ls::stat_entries};
use crate::utils::resolve_relative;
use miette::miette;
use raw_repl::{
	helpers::{remove_local, REMOVE},
	router,
	session::Session,
	value::Literal,
};
use std::collections::{HashMap, HashSet};
use tracing::{error, info};

pub async fn handle_rsync(source: String, destination: String, dry_run: bool, mirror: bool, use_json: bool) {
	let source = resolve_relative(&source);
	let destination = resolve_relative(&destination);

	match plan_and_run(&source, &destination, dry_run, mirror).await {
		Ok(copied) => {
			if use_json {
				info!(id = "boardsh::rsync::done", source = %source, destination = %destination, planned = copied.len(), dry_run, mirror);
			} else if copied.is_empty() {
				println!("nothing to do, {destination} is up to date");
			} else {
				for line in &copied {
					println!("{line}");
				}
			}
		}
		Err(cause) => {
			super::detach_if_fatal(&cause);
			if use_json {
				error!(id = "boardsh::rsync::failed", source = %source, destination = %destination, cause = %cause);
			} else {
				error!("\n{:?}", miette!("could not mirror `{source}` onto `{destination}`: {cause}"));
			}
		}
	}
}

async fn plan_and_run(source: &str, destination: &str, dry_run: bool, mirror: bool) -> Result<Vec<String>, raw_repl::ReftError> {
	let src_entries = stat_entries(source).await?;
	let dst_entries = stat_entries(destination).await.unwrap_or_default();
	let dst_mtimes: HashMap<String, i64> = dst_entries
		.iter()
		.filter_map(|(name, stat)| mtime_of(stat).map(|mtime| (name.clone(), mtime)))
		.collect();

	let mut lines = Vec::new();
	let src_names: HashSet<&str> = src_entries.iter().map(|(name, _)| name.as_str()).collect();

	for (name, stat) in &src_entries {
		let Some(src_mtime) = mtime_of(stat) else { continue };
		let stale = match dst_mtimes.get(name) {
			Some(dst_mtime) => src_mtime > *dst_mtime,
			None => true,
		};
		if !stale {
			continue;
		}

		let src_path = join(source, name);
		let dst_path = join(destination, name);
		if !dry_run {
			copy_path(&src_path, &dst_path).await?;
		}
		lines.push(format!("{src_path} -> {dst_path}"));
	}

	if mirror {
		for (name, _) in &dst_entries {
			if src_names.contains(name.as_str()) {
				continue;
			}
			let dst_path = join(destination, name);
			if !dry_run {
				remove_path(&dst_path).await?;
			}
			lines.push(format!("removed {dst_path}"));
		}
	}

	Ok(lines)
}

/// Remove one entry on either side of the host/device boundary, the same
/// way `rm` does, for the destination-only entries `--mirror` deletes.
async fn remove_path(path: &str) -> Result<(), raw_repl::ReftError> {
	if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(path);
			let value = router::auto(session.repl_mut(), &routed, &REMOVE, remove_local, &[]).await;
			(session, value.map(|_| ()))
		})
		.await
	} else {
		let routed = router::route(path, &[], None);
		remove_local(&routed.relative).map(|_| ())
	}
}

fn mtime_of(stat: &Literal) -> Option<i64> {
	let Literal::Tuple(fields) = stat else { return None };
	match fields.get(2) {
		Some(Literal::Int(mtime)) => Some(*mtime),
		_ => None,
	}
}

fn join(dir: &str, name: &str) -> String {
	format!("{}/{name}", dir.trim_end_matches('/'))
}
