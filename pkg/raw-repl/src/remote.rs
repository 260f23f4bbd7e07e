//! C4: the Remote Callable.
//!
//! A [`RemoteHelper`] is host-defined interpreter source for a single
//! function, captured once as a string literal and never retained as a
//! session's state: every call re-synthesises a fresh snippet from it
//! (spec.md §4.4) and hands that straight to [`crate::exec`]. The
//! filesystem primitives in [`crate::helpers`] are all `RemoteHelper`s;
//! this module is just the call machinery they share.

use crate::{
	errors::ReftError,
	exec::{self, Snippet},
	line::Link,
	repl::Repl,
	value::Literal,
};

/// A procedure the device can run, captured as source text.
///
/// `extras` are other helpers the primary body calls into; their source is
/// spliced in ahead of the primary body so the device sees one self
/// contained snippet with every name it needs already defined.
pub struct RemoteHelper {
	pub name: &'static str,
	pub source: &'static str,
	pub extras: &'static [RemoteHelper],
}

impl RemoteHelper {
	/// Build the source text for one call: extras, then the primary body
	/// with its decorator stripped, then the fixed trailer that calls it
	/// and prints whatever it returns (spec.md §4.4, `Device.remote()`).
	fn synthesize(&self, args: &[Literal], kwargs: &[(&str, Literal)]) -> String {
		let mut source = String::new();
		for extra in self.extras {
			source.push_str(&strip_noise(extra.source));
			source.push('\n');
		}
		source.push_str(&strip_noise(strip_decorators(self.source)));
		source.push('\n');
		source.push_str(&trailer(self.name, args, kwargs));
		source
	}
}

/// `try: output = NAME(...) except Exception as ex: print(ex); output =
/// None` then print `output`, or the literal string `"None"` (spec.md
/// §4.4's trailer template, verbatim down to the `print("None")` special
/// case — a bare `print(None)` and `print("None")` render identically on
/// CircuitPython's stdout, but keeping the string literal matches the
/// source shell exactly).
fn trailer(name: &str, args: &[Literal], kwargs: &[(&str, Literal)]) -> String {
	let mut call_args = Vec::with_capacity(args.len() + kwargs.len());
	call_args.extend(args.iter().map(Literal::encode));
	call_args.extend(kwargs.iter().map(|(k, v)| format!("{k}={}", v.encode())));
	let call = format!("{name}({})", call_args.join(", "));
	format!(
		"try:\n  output = {call}\nexcept Exception as ex:\n  print(ex)\n  output = None\nif output is None:\n  print(\"None\")\nelse:\n  print(output)\n"
	)
}

/// Drop any `@decorator` lines before the first `def`/statement line, since
/// the device never sees the host-side decorator this function was
/// annotated with on our end.
fn strip_decorators(source: &str) -> String {
	source
		.lines()
		.filter(|line| !line.trim_start().starts_with('@'))
		.collect::<Vec<_>>()
		.join("\n")
}

/// Strip full-line and trailing `#` comments and triple-quoted docstrings,
/// keeping every line's leading indentation intact (spec.md §4.4: "while
/// preserving indentation").
fn strip_noise(source: &str) -> String {
	let mut out = String::new();
	let mut in_docstring: Option<&str> = None;
	for line in source.lines() {
		let trimmed = line.trim_start();
		let indent = &line[..line.len() - trimmed.len()];

		if let Some(quote) = in_docstring {
			if let Some(end) = trimmed.find(quote) {
				let rest = &trimmed[end + quote.len()..];
				in_docstring = None;
				if !rest.trim().is_empty() {
					out.push_str(indent);
					out.push_str(rest.trim_end());
					out.push('\n');
				}
			}
			continue;
		}

		if trimmed.starts_with("#") {
			continue;
		}

		for quote in ["\"\"\"", "'''"] {
			if let Some(after_open) = trimmed.strip_prefix(quote) {
				if let Some(end) = after_open.find(quote) {
					// Single-line docstring/triple-quoted comment.
					let _ = end;
					continue;
				}
				in_docstring = Some(quote);
				break;
			}
		}
		if in_docstring.is_some() {
			continue;
		}

		let code = strip_trailing_comment(trimmed);
		if code.trim().is_empty() {
			continue;
		}
		out.push_str(indent);
		out.push_str(code.trim_end());
		out.push('\n');
	}
	out
}

/// Strip a trailing `# comment`, respecting quotes so a `#` inside a string
/// literal isn't mistaken for one.
fn strip_trailing_comment(line: &str) -> &str {
	let mut in_single = false;
	let mut in_double = false;
	for (idx, ch) in line.char_indices() {
		match ch {
			'\'' if !in_double => in_single = !in_single,
			'"' if !in_single => in_double = !in_double,
			'#' if !in_single && !in_double => return &line[..idx],
			_ => {}
		}
	}
	line
}

/// Run `helper` with the given arguments and return its raw stdout bytes.
pub async fn invoke<L: Link>(
	repl: &mut Repl<L>,
	helper: &RemoteHelper,
	args: &[Literal],
	kwargs: &[(&str, Literal)],
) -> Result<Vec<u8>, ReftError> {
	let source = helper.synthesize(args, kwargs);
	let snippet = Snippet::new(source);
	let (stdout, stderr) = exec::run(repl, &snippet).await?;
	if !stderr.is_empty() {
		return Err(ReftError::RemoteException {
			stdout,
			stderr: String::from_utf8_lossy(&stderr).into_owned(),
		});
	}
	Ok(stdout)
}

/// Like [`invoke`], but parses stdout back into a [`Literal`] via the
/// device's own value syntax.
pub async fn invoke_and_eval<L: Link>(
	repl: &mut Repl<L>,
	helper: &RemoteHelper,
	args: &[Literal],
	kwargs: &[(&str, Literal)],
) -> Result<Literal, ReftError> {
	let stdout = invoke(repl, helper, args, kwargs).await?;
	let text = String::from_utf8_lossy(&stdout);
	Literal::parse(text.trim())
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use crate::{line::LineDriver, repl::ReplState, testutil::ScriptedLink};

	const ECHO: RemoteHelper = RemoteHelper {
		name: "echo",
		source: "def echo(x):\n    # a comment\n    \"\"\"docstring\"\"\"\n    return x\n",
		extras: &[],
	};

	#[test]
	pub fn synthesize_strips_comments_and_builds_trailer() {
		let source = ECHO.synthesize(&[Literal::Int(5)], &[]);
		assert!(!source.contains('#'));
		assert!(!source.contains("docstring"));
		assert!(source.contains("def echo(x):"));
		assert!(source.contains("output = echo(5)"));
		assert!(source.ends_with("print(output)\n"));
	}

	#[test]
	pub fn synthesize_includes_keyword_arguments() {
		const HELPER: RemoteHelper = RemoteHelper {
			name: "mkdir",
			source: "def mkdir(path):\n    return path\n",
			extras: &[],
		};
		let source = HELPER.synthesize(&[], &[("path", Literal::str("/sd/x"))]);
		assert!(source.contains("mkdir(path='/sd/x')"));
	}

	#[test]
	pub fn synthesize_prepends_extras() {
		const HELPER: RemoteHelper = RemoteHelper {
			name: "combined",
			source: "def combined():\n    return helper_fn()\n",
			extras: &[RemoteHelper {
				name: "helper_fn",
				source: "def helper_fn():\n    return 1\n",
				extras: &[],
			}],
		};
		let source = HELPER.synthesize(&[], &[]);
		assert!(source.find("def helper_fn").unwrap() < source.find("def combined").unwrap());
	}

	#[tokio::test(start_paused = true)]
	pub async fn invoke_returns_raw_stdout() {
		let link = ScriptedLink::new(vec![b">".to_vec(), b"OK5\x04\x04".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		let stdout = invoke(&mut repl, &ECHO, &[Literal::Int(5)], &[]).await.unwrap();
		assert_eq!(stdout, b"5");
	}

	#[tokio::test(start_paused = true)]
	pub async fn invoke_and_eval_parses_the_result() {
		let link = ScriptedLink::new(vec![b">".to_vec(), b"OK5\x04\x04".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		let value = invoke_and_eval(&mut repl, &ECHO, &[Literal::Int(5)], &[])
			.await
			.unwrap();
		assert_eq!(value, Literal::Int(5));
	}

	#[tokio::test(start_paused = true)]
	pub async fn nonempty_stderr_surfaces_as_remote_exception() {
		let link = ScriptedLink::new(vec![b">".to_vec(), b"OKNone\x04boom\x04".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		let err = invoke(&mut repl, &ECHO, &[Literal::Int(5)], &[])
			.await
			.unwrap_err();
		assert!(matches!(err, ReftError::RemoteException { stderr, .. } if stderr == "boom"));
	}
}
