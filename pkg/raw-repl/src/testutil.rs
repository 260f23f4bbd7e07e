//! In-memory stand-in for a serial link, shared by every module's test
//! suite. There is no hardware, and no toolchain run in this environment to
//! talk to any, so every test here scripts a fake device's replies the way
//! spec.md §8's concrete scenarios are written: a fixed sequence of byte
//! chunks "the device" produces, delivered one per poll.

use crate::{errors::ReftError, line::Link};
use std::{collections::VecDeque, time::Duration};

/// A [`Link`] whose "device" side is a scripted sequence of byte chunks.
///
/// Each call to [`Link::read_available`] pops the next scripted chunk (or
/// part of it, if the caller's buffer is smaller). Once the script is
/// exhausted, reads return `0` forever, simulating a device that has gone
/// quiet — which is exactly what the `ProtocolTimeout`/`TransferDesync`
/// tests need.
pub struct ScriptedLink {
	responses: VecDeque<Vec<u8>>,
	/// Everything the code under test has written, in order, for assertions.
	pub written: Vec<u8>,
	timeout: Duration,
}

impl ScriptedLink {
	#[must_use]
	pub fn new(responses: Vec<Vec<u8>>) -> Self {
		Self {
			responses: responses.into_iter().collect(),
			written: Vec::new(),
			timeout: crate::line::DEFAULT_TIMEOUT,
		}
	}

	#[must_use]
	pub fn empty() -> Self {
		Self::new(Vec::new())
	}

	/// Queue one more chunk to be handed back on a future read.
	pub fn push_response(&mut self, chunk: Vec<u8>) {
		self.responses.push_back(chunk);
	}
}

impl Link for ScriptedLink {
	fn write_all(&mut self, buf: &[u8]) -> Result<(), ReftError> {
		self.written.extend_from_slice(buf);
		Ok(())
	}

	fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, ReftError> {
		let Some(mut chunk) = self.responses.pop_front() else {
			return Ok(0);
		};
		if chunk.is_empty() {
			return Ok(0);
		}
		let n = chunk.len().min(buf.len());
		buf[..n].copy_from_slice(&chunk[..n]);
		if n < chunk.len() {
			let remainder = chunk.split_off(n);
			self.responses.push_front(remainder);
		}
		Ok(n)
	}

	fn set_timeout(&mut self, timeout: Duration) -> Result<(), ReftError> {
		self.timeout = timeout;
		Ok(())
	}

	fn get_timeout(&self) -> Duration {
		self.timeout
	}
}
