//! C6: the Path Router.
//!
//! Classifies a path the operator typed as local or remote and produces the
//! single relative path every filesystem helper is written against
//! (spec.md §4.6). `auto` is the one entry point the command layer above
//! this crate needs: it either calls a helper's host body directly or
//! ships it to the device through [`crate::remote`].

use crate::{
	errors::ReftError,
	line::Link,
	remote::{self, RemoteHelper},
	repl::Repl,
	value::Literal,
};
use std::path::PathBuf;

/// Result of routing one path: whether it resolved to the device, and the
/// path relative to whatever root it resolved against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutedPath {
	pub device: bool,
	pub relative: String,
}

/// Route `path` against a session's enumerated root directories and
/// `name_path` (spec.md §3's Path shapes a–d).
///
/// `root_dirs` and `name_path` are `None` when no device is attached, which
/// collapses every path to local — matching "otherwise, no device, path
/// unchanged" when there simply is no device to route to.
#[must_use]
pub fn route(path: &str, root_dirs: &[String], name_path: Option<&str>) -> RoutedPath {
	if let Some(rest) = path.strip_prefix(':') {
		return RoutedPath {
			device: true,
			relative: normalise(rest),
		};
	}

	let with_trailing_slash = format!("{}/", path.trim_end_matches('/'));
	for root in root_dirs {
		if with_trailing_slash.starts_with(root.as_str()) || path == root.trim_end_matches('/') {
			return RoutedPath {
				device: true,
				relative: normalise(path),
			};
		}
	}

	if let Some(name_path) = name_path {
		if let Some(rest) = path.strip_prefix(name_path) {
			let relative = if rest.is_empty() {
				"/".to_owned()
			} else {
				format!("/{rest}")
			};
			return RoutedPath {
				device: true,
				relative: normalise(&relative),
			};
		}
	}

	RoutedPath {
		device: false,
		relative: expand_home(path),
	}
}

/// Expand a leading `~` to the host's home directory. Local paths only —
/// the device filesystem has no notion of a home directory.
fn expand_home(path: &str) -> String {
	if let Some(rest) = path.strip_prefix('~') {
		if let Some(home) = dirs_home() {
			let rest = rest.strip_prefix('/').unwrap_or(rest);
			return PathBuf::from(home).join(rest).to_string_lossy().into_owned();
		}
	}
	path.to_owned()
}

fn dirs_home() -> Option<String> {
	std::env::var("HOME").ok()
}

/// Normalise `.`/`..` segments and collapse repeated `/`, preserving a
/// leading `/` and a lone `/` (spec.md §3/§6). Idempotent: normalising an
/// already-normal path returns it unchanged.
#[must_use]
pub fn normalise(path: &str) -> String {
	let absolute = path.starts_with('/');
	let trailing_slash = path.len() > 1 && path.ends_with('/');

	let mut stack: Vec<&str> = Vec::new();
	for segment in path.split('/') {
		match segment {
			"" | "." => {}
			".." => {
				if stack.last().is_some_and(|s| *s != "..") {
					stack.pop();
				} else if !absolute {
					stack.push("..");
				}
			}
			other => stack.push(other),
		}
	}

	let mut out = String::new();
	if absolute {
		out.push('/');
	}
	out.push_str(&stack.join("/"));
	if trailing_slash && !out.ends_with('/') {
		out.push('/');
	}
	if out.is_empty() {
		out.push_str(if absolute { "/" } else { "." });
	}
	out
}

/// Reject path patterns this router cannot express: only `{…}` brace
/// expansions are explicitly unsupported (spec.md §7).
pub fn validate(path: &str) -> Result<(), ReftError> {
	if path.contains('{') || path.contains('}') {
		return Err(ReftError::InvalidPath(
			PathBuf::from(path),
			"brace expansion patterns are unsupported",
		));
	}
	Ok(())
}

/// Run a zero-argument-beyond-`relative` filesystem helper against whatever
/// `routed` resolved to: locally via `local`, or on the device via C4.
///
/// This is the shape every helper in [`crate::helpers`] is driven through;
/// `local` is that helper's host body, `helper` its device counterpart.
pub async fn auto<L: Link>(
	repl: &mut Repl<L>,
	routed: &RoutedPath,
	helper: &RemoteHelper,
	local: impl FnOnce(&str) -> Result<Literal, ReftError>,
	extra_args: &[Literal],
) -> Result<Literal, ReftError> {
	if routed.device {
		let mut args = vec![Literal::str(routed.relative.clone())];
		args.extend_from_slice(extra_args);
		remote::invoke_and_eval(repl, helper, &args, &[]).await
	} else {
		local(&routed.relative)
	}
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn colon_prefix_forces_remote() {
		let routed = route(":a/b.txt", &[], None);
		assert_eq!(
			routed,
			RoutedPath {
				device: true,
				relative: "a/b.txt".to_owned()
			}
		);
	}

	#[test]
	pub fn root_dir_membership_routes_remote_unchanged() {
		let roots = vec!["/flash/".to_owned(), "/sd/".to_owned()];
		let routed = route("/flash/boot.py", &roots, None);
		assert!(routed.device);
		assert_eq!(routed.relative, "/flash/boot.py");
	}

	#[test]
	pub fn name_path_prefix_strips_to_relative() {
		let routed = route("/usbmodem1/lib/x.py", &[], Some("/usbmodem1/"));
		assert_eq!(
			routed,
			RoutedPath {
				device: true,
				relative: "/lib/x.py".to_owned()
			}
		);
	}

	#[test]
	pub fn name_path_alone_becomes_root() {
		let routed = route("/usbmodem1/", &[], Some("/usbmodem1/"));
		assert_eq!(routed.relative, "/");
	}

	#[test]
	pub fn unrelated_path_is_local() {
		let routed = route("/home/user/file.py", &["/flash/".to_owned()], Some("/usb/"));
		assert!(!routed.device);
		assert_eq!(routed.relative, "/home/user/file.py");
	}

	#[test]
	pub fn normalisation_collapses_dots_and_slashes() {
		assert_eq!(normalise("a/./b"), "a/b");
		assert_eq!(normalise("a//b"), "a/b");
		assert_eq!(normalise("a/b/"), "a/b/");
		assert_eq!(normalise("/a/../b"), "/b");
		assert_eq!(normalise("/"), "/");
	}

	#[test]
	pub fn normalisation_is_idempotent() {
		for path in ["a/./b", "a//b", "a/b/", "/a/../b", "/", "."] {
			let once = normalise(path);
			let twice = normalise(&once);
			assert_eq!(once, twice);
		}
	}

	#[test]
	pub fn brace_expansion_is_rejected() {
		assert!(validate("a/{b,c}.txt").is_err());
	}
}
