//! Utility functions that don't have one place that they should live.

use raw_repl::value::Literal;
use std::sync::Mutex;

/// Split a line of shell input into tokens, honouring single/double quotes
/// so a quoted path with a space in it survives as one token. This is the
/// one sliver of "line-editing"/"argument splitting" boardsh has to do
/// itself, since REFTE explicitly leaves command-line parsing out of scope
/// (spec.md §1) — it only has to be good enough to feed `clap`.
#[must_use]
pub fn split_line(line: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut current = String::new();
	let mut quote: Option<char> = None;
	let mut in_token = false;

	for ch in line.chars() {
		match quote {
			Some(q) if ch == q => quote = None,
			Some(_) => current.push(ch),
			Option::None => {
				if ch == '\'' || ch == '"' {
					quote = Some(ch);
					in_token = true;
				} else if ch.is_whitespace() {
					if in_token {
						tokens.push(std::mem::take(&mut current));
						in_token = false;
					}
				} else {
					current.push(ch);
					in_token = true;
				}
			}
		}
	}
	if in_token || quote.is_some() {
		tokens.push(current);
	}
	tokens
}

/// Render a [`Literal`] the way an operator would want to see it printed
/// back, e.g. after `stat`: Python-repr-shaped, same as what the device
/// itself would have printed.
#[must_use]
pub fn display_literal(value: &Literal) -> String {
	value.encode()
}

/// The shell's notion of "where am I", used to resolve a relative path an
/// operator typed before handing it to `raw_repl::router::route`. REFTE's
/// path router only ever classifies already-resolved paths (spec.md §4.6);
/// tracking a current directory across commands is the interactive-loop
/// job spec.md §1 names as out of scope, so it lives here instead.
static CURRENT_DIR: Mutex<Option<String>> = Mutex::new(None);

/// Get the current working directory, defaulting to `/` the first time
/// it's asked (before any `cd`).
#[must_use]
pub fn current_dir() -> String {
	let mut guard = CURRENT_DIR.lock().expect("current dir mutex poisoned");
	guard.get_or_insert_with(|| "/".to_owned()).clone()
}

/// Set the current working directory, e.g. from the `cd` command.
pub fn set_current_dir(path: String) {
	*CURRENT_DIR.lock().expect("current dir mutex poisoned") = Some(path);
}

/// Resolve `path` against [`current_dir`] if it's relative; absolute paths
/// (device or host alike) and `:`-prefixed paths pass through unchanged.
#[must_use]
pub fn resolve_relative(path: &str) -> String {
	if path.starts_with('/') || path.starts_with(':') || path.starts_with('~') {
		return path.to_owned();
	}
	let cwd = current_dir();
	let base = cwd.trim_end_matches('/');
	format!("{base}/{path}")
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn splits_plain_tokens() {
		assert_eq!(split_line("cp a.txt b.txt"), vec!["cp", "a.txt", "b.txt"]);
	}

	#[test]
	pub fn keeps_quoted_spaces_together() {
		assert_eq!(
			split_line("cp 'my file.txt' dest"),
			vec!["cp".to_owned(), "my file.txt".to_owned(), "dest".to_owned()]
		);
	}

	#[test]
	pub fn resolves_relative_against_current_dir() {
		set_current_dir("/flash/lib".to_owned());
		assert_eq!(resolve_relative("boot.py"), "/flash/lib/boot.py");
		assert_eq!(resolve_relative("/sd/x.py"), "/sd/x.py");
		assert_eq!(resolve_relative(":a.py"), ":a.py");
		set_current_dir("/".to_owned());
	}
}
