//! C2: the REPL State Machine.
//!
//! Moves the device between `UNKNOWN`, `FRIENDLY`, `RAW`, `RUNNING`,
//! `DRAIN_STDOUT` and `DRAIN_STDERR` (spec.md §4.2). This module owns the
//! state field and the two handshakes that don't involve streaming a
//! snippet (`wake`, `enter_raw`, `exit_raw`); the snippet-streaming
//! transitions (`RAW` → `RUNNING` → `DRAIN_STDOUT` → `DRAIN_STDERR` → `RAW`)
//! are driven by [`crate::exec`], which holds the `&mut Repl` for the
//! duration of a call and updates the state field directly once each step
//! of spec.md §4.3's procedure completes.

use crate::{errors::ReftError, line::Link, line::LineDriver};
use std::time::Duration;

/// Control bytes the device's interpreter recognises (spec.md §6).
pub mod control {
	/// Enter raw REPL.
	pub const ENTER_RAW: u8 = 0x01;
	/// Exit raw REPL back to friendly.
	pub const EXIT_RAW: u8 = 0x02;
	/// Interrupt whatever is running (`KeyboardInterrupt`).
	pub const INTERRUPT: u8 = 0x03;
	/// End-of-transmission: execute what was sent, or soft-reset.
	pub const EOT: u8 = 0x04;
	/// Flow-control ACK used by the file-transfer sub-protocol.
	pub const ACK: u8 = 0x06;
}

const FRIENDLY_PROMPT: &[u8] = b">>> ";
const RAW_READY_PROMPT: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";
const RAW_AFTER_RESET: &[u8] = b"raw REPL; CTRL-B to exit\r\n";

/// Where the device currently is, mirroring spec.md §4.2's state diagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplState {
	Unknown,
	Friendly,
	Raw,
	Running,
	DrainStdout,
	DrainStderr,
}

/// The REPL state machine for one attached device.
pub struct Repl<L: Link> {
	line: LineDriver<L>,
	state: ReplState,
	banner: &'static [u8],
}

impl<L: Link> Repl<L> {
	#[must_use]
	pub const fn new(line: LineDriver<L>, banner: &'static [u8]) -> Self {
		Self {
			line,
			state: ReplState::Unknown,
			banner,
		}
	}

	#[must_use]
	pub const fn state(&self) -> ReplState {
		self.state
	}

	pub fn line_mut(&mut self) -> &mut LineDriver<L> {
		&mut self.line
	}

	pub(crate) fn set_state(&mut self, state: ReplState) {
		self.state = state;
	}

	/// Drop to `UNKNOWN`, the state any fatal error leaves the session in
	/// before teardown.
	pub fn mark_lost(&mut self) {
		self.state = ReplState::Unknown;
	}

	/// Try up to `tries` times (spec.md §4.2: "up to K tries (K≥2)") to get
	/// a friendly-REPL prompt out of the device: interrupt, carriage return,
	/// and look for `>>> ` within `banner_timeout`.
	pub async fn wake(&mut self, tries: u32, banner_timeout: Duration) -> Result<(), ReftError> {
		for _attempt in 0..tries.max(2) {
			self.line
				.write(&[control::INTERRUPT, control::INTERRUPT, b'\r'])?;
			let response = self
				.line
				.read_until(1, FRIENDLY_PROMPT, banner_timeout, None)
				.await?;
			if ends_with(&response, FRIENDLY_PROMPT) {
				self.state = ReplState::Friendly;
				return Ok(());
			}
		}
		self.state = ReplState::Unknown;
		Err(ReftError::ReplNotReady(tries.max(2)))
	}

	/// `FRIENDLY` → `RAW`: double interrupt, drain, enter raw, soft reset,
	/// await the locale banner then the post-reset raw prompt.
	pub async fn enter_raw(&mut self, timeout: Duration) -> Result<(), ReftError> {
		self.line
			.write(&[b'\r', control::INTERRUPT, control::INTERRUPT])?;
		// Drain whatever the double interrupt echoed back before switching
		// to raw mode; there's no sentinel to wait for here.
		let _ = self.line.drain_available()?;

		self.line.write(&[b'\r', control::ENTER_RAW])?;
		let response = self.line.read_until(1, RAW_READY_PROMPT, timeout, None).await?;
		if !ends_with(&response, RAW_READY_PROMPT) {
			self.state = ReplState::Unknown;
			return Err(ReftError::ProtocolTimeout(
				"raw REPL; CTRL-B to exit\\r\\n>",
				timeout.as_secs_f64(),
			));
		}

		self.line.write(&[control::EOT])?;
		// Two separate awaits, not one combined sentinel: this is the gap
		// `boot.py` prints into on a soft reboot, and folding the banner and
		// the post-reset raw-REPL line into a single substring match would
		// make any chatter in that gap break the match.
		let banner = self.line.read_until(1, self.banner, timeout, None).await?;
		if !ends_with(&banner, self.banner) {
			self.state = ReplState::Unknown;
			return Err(ReftError::ProtocolTimeout(
				"soft reboot banner",
				timeout.as_secs_f64(),
			));
		}
		let response = self.line.read_until(1, RAW_AFTER_RESET, timeout, None).await?;
		if !ends_with(&response, RAW_AFTER_RESET) {
			self.state = ReplState::Unknown;
			return Err(ReftError::ProtocolTimeout(
				"raw REPL; CTRL-B to exit\\r\\n",
				timeout.as_secs_f64(),
			));
		}
		self.state = ReplState::Raw;
		Ok(())
	}

	/// `RAW` → `FRIENDLY`: no wait, per spec.md §4.2.
	pub fn exit_raw(&mut self) -> Result<(), ReftError> {
		self.line.write(&[b'\r', control::EXIT_RAW])?;
		self.state = ReplState::Friendly;
		Ok(())
	}
}

fn ends_with(haystack: &[u8], needle: &[u8]) -> bool {
	if needle.is_empty() {
		return true;
	}
	haystack.len() >= needle.len() && &haystack[haystack.len() - needle.len()..] == needle
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use crate::{line::LineDriver, testutil::ScriptedLink};

	#[tokio::test(start_paused = true)]
	pub async fn wake_reaches_friendly_on_first_try() {
		let link = ScriptedLink::new(vec![b">>> ".to_vec()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.wake(2, Duration::from_millis(100)).await.unwrap();
		assert_eq!(repl.state(), ReplState::Friendly);
	}

	#[tokio::test(start_paused = true)]
	pub async fn wake_fails_after_exhausting_tries() {
		let link = ScriptedLink::empty();
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		let err = repl.wake(2, Duration::from_millis(10)).await.unwrap_err();
		assert!(matches!(err, ReftError::ReplNotReady(2)));
		assert_eq!(repl.state(), ReplState::Unknown);
	}

	#[tokio::test(start_paused = true)]
	pub async fn enter_raw_walks_the_full_handshake() {
		let link = ScriptedLink::new(vec![
			Vec::new(),
			b"raw REPL; CTRL-B to exit\r\n>".to_vec(),
			b"soft reboot\r\nraw REPL; CTRL-B to exit\r\n".to_vec(),
		]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Friendly);
		repl.enter_raw(Duration::from_secs(1)).await.unwrap();
		assert_eq!(repl.state(), ReplState::Raw);
	}

	#[test]
	pub fn exit_raw_returns_to_friendly_without_waiting() {
		let link = ScriptedLink::empty();
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		repl.set_state(ReplState::Raw);
		repl.exit_raw().unwrap();
		assert_eq!(repl.state(), ReplState::Friendly);
	}
}
