//! `ls`: list a directory's contents, locally or on the device, depending
//! on how the path routes (spec.md §4.6).

use crate::utils::{current_dir, display_literal, resolve_relative};
use miette::miette;
use raw_repl::{
	helpers::{listdir_local, listdir_stat_local, LISTDIR},
	router,
	session::Session,
	value::Literal,
};
use tracing::{error, field::valuable, info};

pub async fn handle_ls(path: Option<String>, use_json: bool) {
	let resolved = resolve_relative(&path.unwrap_or_else(current_dir));

	let result = if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(&resolved);
			let value = router::auto(session.repl_mut(), &routed, &LISTDIR, listdir_local, &[]).await;
			(session, value)
		})
		.await
	} else {
		let routed = router::route(&resolved, &[], None);
		listdir_local(&routed.relative)
	};

	match result {
		Ok(Literal::List(entries)) => {
			let mut names: Vec<String> = entries.iter().map(display_literal).collect();
			names.sort();
			if use_json {
				info!(id = "boardsh::ls::listed", path = %resolved, entries = valuable(&names));
			} else {
				for name in names {
					println!("{name}");
				}
			}
		}
		Ok(other) => {
			error!(
				"\n{:?}",
				miette!("listdir('{resolved}') did not return a list: {}", display_literal(&other))
			);
		}
		Err(cause) => report_error(use_json, &resolved, &cause),
	}
}

fn report_error(use_json: bool, path: &str, cause: &raw_repl::ReftError) {
	super::detach_if_fatal(cause);
	if use_json {
		error!(id = "boardsh::ls::failed", path = %path, cause = %cause);
	} else {
		error!("\n{:?}", miette!("could not list `{path}`: {cause}"));
	}
}

/// `listdir_stat` for one directory, local or remote depending on routing;
/// `rsync` uses this to diff a local directory's contents against a
/// device directory's.
pub(crate) async fn stat_entries(path: &str) -> Result<Vec<(String, Literal)>, raw_repl::ReftError> {
	use raw_repl::helpers::LISTDIR_STAT;

	let resolved = resolve_relative(path);
	let value = if Session::is_attached() {
		Session::with_current_async(|mut session| async move {
			let routed = session.route(&resolved);
			let value = router::auto(
				session.repl_mut(),
				&routed,
				&LISTDIR_STAT,
				listdir_stat_local,
				&[],
			)
			.await;
			(session, value)
		})
		.await?
	} else {
		let routed = router::route(&resolved, &[], None);
		listdir_stat_local(&routed.relative)?
	};

	let Literal::List(entries) = value else {
		return Err(raw_repl::ReftError::ValueMarshalling(format!(
			"listdir_stat did not return a list: {value:?}"
		)));
	};
	let mut out = Vec::with_capacity(entries.len());
	for entry in entries {
		let Literal::Tuple(mut pair) = entry else { continue };
		if pair.len() != 2 {
			continue;
		}
		let stat = pair.pop().unwrap();
		let Literal::Str(name) = pair.pop().unwrap() else {
			continue;
		};
		out.push((name, stat));
	}
	Ok(out)
}
