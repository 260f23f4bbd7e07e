//! C3: the Snippet Executor.
//!
//! Ships a UTF-8 source string to the device in paced chunks, starts it,
//! and streams back stdout/stderr (spec.md §4.3). The file-transport
//! sub-protocols in [`crate::transport`] reuse [`send_and_start`] for their
//! preamble (the device-side transfer helper is itself just a snippet) and
//! then drive their own hex loop instead of calling [`drain_output`].

use crate::{
	errors::ReftError,
	line::{Link, LineDriver},
	repl::{Repl, ReplState},
};
use std::time::Duration;
use tokio::time::sleep;

/// Default per-chunk pause between writes of source to the device.
pub const DEFAULT_CHUNK_WAIT: Duration = Duration::from_millis(500);
/// Default chunk size, in bytes, source is split into before each write.
pub const DEFAULT_CHUNK_SIZE: usize = 64;
/// Default timeout waiting for the `OK` handshake after sending a snippet.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(10);
/// Default timeout waiting for a `0x04` terminator while draining output.
pub const DEFAULT_FOLLOW_TIMEOUT: Duration = Duration::from_secs(20);

/// A runnable unit of interpreter source plus the pacing parameters to ship
/// it with. Created per remote call; never retained (spec.md §3).
pub struct Snippet {
	pub source: Vec<u8>,
	pub chunk_size: usize,
	pub chunk_wait: Duration,
	pub exec_timeout: Duration,
	pub follow_timeout: Duration,
}

impl Snippet {
	#[must_use]
	pub fn new(source: impl Into<Vec<u8>>) -> Self {
		Self {
			source: source.into(),
			chunk_size: DEFAULT_CHUNK_SIZE,
			chunk_wait: DEFAULT_CHUNK_WAIT,
			exec_timeout: DEFAULT_EXEC_TIMEOUT,
			follow_timeout: DEFAULT_FOLLOW_TIMEOUT,
		}
	}
}

/// Ensure `RAW`, ship `snippet.source` in chunks, and wait for the `OK`
/// handshake. Leaves the REPL in [`ReplState::Running`] on success.
///
/// This is the shared preamble between an ordinary remote call
/// ([`run`]) and a file transfer (`crate::transport`): both start the same
/// way, they only differ in what they do with the link once the device has
/// started executing.
pub async fn send_and_start<L: Link>(
	repl: &mut Repl<L>,
	snippet: &Snippet,
) -> Result<(), ReftError> {
	if repl.state() != ReplState::Raw {
		repl.enter_raw(snippet.exec_timeout).await?;
	}

	// The device re-prints its raw-mode `>` prompt before each snippet; wait
	// for it so we don't race a prompt that hasn't arrived yet.
	let prompt = repl
		.line_mut()
		.read_until(1, b">", snippet.exec_timeout, None)
		.await?;
	if !prompt.ends_with(b">") {
		repl.mark_lost();
		return Err(ReftError::ProtocolTimeout(">", snippet.exec_timeout.as_secs_f64()));
	}

	for chunk in snippet.source.chunks(snippet.chunk_size.max(1)) {
		repl.line_mut().write(chunk)?;
		if !snippet.chunk_wait.is_zero() {
			sleep(snippet.chunk_wait).await;
		}
	}
	repl.line_mut().write(&[crate::repl::control::EOT])?;

	let ack = repl
		.line_mut()
		.read_exact(2, snippet.exec_timeout)
		.await?;
	if ack != b"OK" {
		let _ = repl.exit_raw();
		return Err(ReftError::ExecRejected(ack));
	}

	repl.set_state(ReplState::Running);
	Ok(())
}

/// Drain stdout until the first `0x04`, then stderr until the second,
/// stripping both terminators. Leaves the REPL in [`ReplState::Raw`].
pub async fn drain_output<L: Link>(
	repl: &mut Repl<L>,
	follow_timeout: Duration,
) -> Result<(Vec<u8>, Vec<u8>), ReftError> {
	repl.set_state(ReplState::DrainStdout);
	let mut stdout = repl
		.line_mut()
		.read_until(1, &[crate::repl::control::EOT], follow_timeout, None)
		.await?;
	if stdout.last() != Some(&crate::repl::control::EOT) {
		repl.mark_lost();
		return Err(ReftError::ProtocolTimeout("stdout terminator", follow_timeout.as_secs_f64()));
	}
	stdout.pop();

	repl.set_state(ReplState::DrainStderr);
	let mut stderr = repl
		.line_mut()
		.read_until(1, &[crate::repl::control::EOT], follow_timeout, None)
		.await?;
	if stderr.last() != Some(&crate::repl::control::EOT) {
		repl.mark_lost();
		return Err(ReftError::ProtocolTimeout("stderr terminator", follow_timeout.as_secs_f64()));
	}
	stderr.pop();

	repl.set_state(ReplState::Raw);
	Ok((stdout, stderr))
}

/// Run a snippet with no file transfer attached: the ordinary remote-call
/// path used by [`crate::remote`].
///
/// On any failure this attempts [`Repl::exit_raw`] before propagating the
/// error, per spec.md §4.3's "on any failure the engine attempts `exit_raw`
/// then closes the session" — session teardown itself is
/// [`crate::session::Session`]'s job, driven by [`ReftError::is_fatal`].
pub async fn run<L: Link>(
	repl: &mut Repl<L>,
	snippet: &Snippet,
) -> Result<(Vec<u8>, Vec<u8>), ReftError> {
	send_and_start(repl, snippet).await?;
	match drain_output(repl, snippet.follow_timeout).await {
		Ok(result) => Ok(result),
		Err(err) => {
			let _ = repl.exit_raw();
			Err(err)
		}
	}
}

/// Like [`run`], but invokes `xfer` once the `OK` handshake has arrived and
/// before stdout/stderr are drained — the hook [`crate::transport`] uses to
/// pour or pull hex-encoded file bytes while the device-side transfer
/// helper is blocked on its own stdin/stdout (spec.md §4.3: "if an
/// xfer-hook is supplied, invoke it now").
pub async fn run_with_xfer<L, F, Fut>(
	repl: &mut Repl<L>,
	snippet: &Snippet,
	xfer: F,
) -> Result<(Vec<u8>, Vec<u8>), ReftError>
where
	L: Link,
	F: FnOnce(&mut Repl<L>) -> Fut,
	Fut: std::future::Future<Output = Result<u64, ReftError>>,
{
	send_and_start(repl, snippet).await?;
	if let Err(err) = xfer(repl).await {
		let _ = repl.exit_raw();
		return Err(err);
	}
	match drain_output(repl, snippet.follow_timeout).await {
		Ok(result) => Ok(result),
		Err(err) => {
			let _ = repl.exit_raw();
			Err(err)
		}
	}
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use crate::testutil::ScriptedLink;

	#[tokio::test(start_paused = true)]
	pub async fn runs_a_snippet_and_collects_both_streams() {
		let link = ScriptedLink::new(vec![b">".to_vec(), b"OKhello\x04err\x04".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		let snippet = Snippet::new("print('hello')");
		let (stdout, stderr) = run(&mut repl, &snippet).await.unwrap();
		assert_eq!(stdout, b"hello");
		assert_eq!(stderr, b"err");
		assert_eq!(repl.state(), ReplState::Raw);
	}

	#[tokio::test(start_paused = true)]
	pub async fn missing_ok_is_exec_rejected() {
		let link = ScriptedLink::new(vec![b">".to_vec(), b"XXhello\x04\x04".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		let snippet = Snippet::new("1/0");
		let err = run(&mut repl, &snippet).await.unwrap_err();
		assert!(matches!(err, ReftError::ExecRejected(bytes) if bytes == b"XX"));
	}

	#[tokio::test(start_paused = true)]
	pub async fn empty_stdout_and_stderr_round_trip() {
		let link = ScriptedLink::new(vec![b">".to_vec(), b"OK\x04\x04".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		let snippet = Snippet::new("pass");
		let (stdout, stderr) = run(&mut repl, &snippet).await.unwrap();
		assert!(stdout.is_empty());
		assert!(stderr.is_empty());
	}

	#[tokio::test(start_paused = true)]
	pub async fn xfer_hook_runs_between_handshake_and_drain() {
		let link = ScriptedLink::new(vec![b">".to_vec(), b"OK\x04\x04".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		let snippet = Snippet::new("transfer()");
		let mut hook_ran = false;
		let (stdout, stderr) = run_with_xfer(&mut repl, &snippet, |_repl| {
			hook_ran = true;
			async { Ok(0) }
		})
		.await
		.unwrap();
		assert!(hook_ran);
		assert!(stdout.is_empty());
		assert!(stderr.is_empty());
	}
}
