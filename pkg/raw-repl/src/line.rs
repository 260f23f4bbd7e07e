//! C1: the Line Driver.
//!
//! Owns the serial port: open, close, timed read-until-sentinel, write,
//! drain (spec.md §4.1). The polling loop underneath `read_until` is the one
//! piece of the engine that has to watch a clock, so it runs on `tokio` and
//! sleeps between polls rather than busy-spinning, the way the rest of this
//! workspace leans on `tokio::time` instead of hand-rolled spin loops.
//!
//! The actual byte-shuffling with the OS is behind the small [`Link`] trait
//! rather than a hand-rolled termios binding: the engine only ever needs
//! "write these bytes", "hand me whatever arrived since last time, don't
//! block", and "change the read timeout" — exactly the surface the
//! `serialport` crate already exposes safely on every supported OS. Tests
//! swap in [`crate::testutil::ScriptedLink`] for the real port.

use crate::errors::ReftError;
use serialport::SerialPort;
use std::{collections::VecDeque, time::Duration};
use tokio::time::sleep;

/// Default inter-byte timeout applied to a freshly opened port, before any
/// call overrides it for a specific read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// How often `read_until` polls for new bytes while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How often `open` retries a failed port open while waiting for the device
/// to enumerate.
const OPEN_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// The minimal surface the line driver needs from whatever is on the other
/// end of the wire — a real serial port, or a script in tests.
pub trait Link: Send {
	/// Write the full buffer, blocking (from the caller's perspective) until
	/// it's gone out.
	fn write_all(&mut self, buf: &[u8]) -> Result<(), ReftError>;

	/// Copy whatever bytes are currently available into `buf` without
	/// blocking, returning how many were copied. Zero means "nothing right
	/// now", not EOF.
	fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, ReftError>;

	fn set_timeout(&mut self, timeout: Duration) -> Result<(), ReftError>;

	fn get_timeout(&self) -> Duration;
}

/// [`Link`] backed by a real OS serial port via the `serialport` crate.
pub struct SerialLink {
	port: Box<dyn SerialPort>,
	timeout: Duration,
}

impl SerialLink {
	fn try_open(path: &str, baud: u32) -> Result<Self, ReftError> {
		let port = serialport::new(path, baud)
			.timeout(DEFAULT_TIMEOUT)
			.open()
			.map_err(|e| ReftError::LinkLost(std::io::Error::other(e)))?;
		Ok(Self {
			port,
			timeout: DEFAULT_TIMEOUT,
		})
	}

	/// Duplicate the underlying OS handle so a second owner can read it on
	/// its own thread while this one keeps writing (spec.md §5's
	/// passthrough reader/writer split) — safe because reads and writes are
	/// independent syscalls on the same descriptor.
	pub fn try_clone(&self) -> Result<Self, ReftError> {
		let port = self
			.port
			.try_clone()
			.map_err(|e| ReftError::LinkLost(std::io::Error::other(e)))?;
		Ok(Self {
			port,
			timeout: self.timeout,
		})
	}

	/// Block for up to this link's configured timeout waiting for the next
	/// chunk, for a dedicated reader thread outside the engine's own
	/// non-blocking poll loop. Returns an empty chunk on a plain timeout,
	/// the same way [`Link::read_available`] reports "nothing right now".
	pub fn blocking_read_chunk(&mut self) -> Result<Vec<u8>, ReftError> {
		let mut buf = [0_u8; 256];
		match self.port.read(&mut buf) {
			Ok(n) => Ok(buf[..n].to_vec()),
			Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(Vec::new()),
			Err(e) => Err(ReftError::LinkLost(e)),
		}
	}
}

impl Link for SerialLink {
	fn write_all(&mut self, buf: &[u8]) -> Result<(), ReftError> {
		self.port.write_all(buf)?;
		Ok(())
	}

	fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, ReftError> {
		match self.port.bytes_to_read() {
			Ok(0) => Ok(0),
			Ok(_) => match self.port.read(buf) {
				Ok(n) => Ok(n),
				Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
				Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
				Err(e) => Err(ReftError::LinkLost(e)),
			},
			Err(e) => Err(ReftError::LinkLost(std::io::Error::other(e))),
		}
	}

	fn set_timeout(&mut self, timeout: Duration) -> Result<(), ReftError> {
		self.port
			.set_timeout(timeout)
			.map_err(|e| ReftError::LinkLost(std::io::Error::other(e)))?;
		self.timeout = timeout;
		Ok(())
	}

	fn get_timeout(&self) -> Duration {
		self.timeout
	}
}

/// The Line Driver itself: a [`Link`] plus the read-until-sentinel state
/// machine spec.md §4.1 describes.
///
/// `pending` holds bytes that arrived in a single poll but belong to the
/// *next* logical frame: a real port (and the in-memory test double alike)
/// can hand back more than one frame's worth of bytes in one read, so
/// whatever comes after the sentinel a caller was waiting for has to be
/// held somewhere rather than discarded.
pub struct LineDriver<L: Link> {
	link: L,
	pending: VecDeque<u8>,
}

impl LineDriver<SerialLink> {
	/// Opens `port` at `baud`, retrying once per second up to `wait` before
	/// giving up with [`ReftError::TransportUnavailable`].
	pub async fn open(port: &str, baud: u32, wait: Duration) -> Result<Self, ReftError> {
		let deadline = tokio::time::Instant::now() + wait;
		loop {
			match SerialLink::try_open(port, baud) {
				Ok(link) => {
					return Ok(Self {
						link,
						pending: VecDeque::new(),
					})
				}
				Err(err) => {
					if tokio::time::Instant::now() >= deadline {
						return Err(ReftError::TransportUnavailable(
							port.to_owned(),
							wait.as_secs_f64(),
						));
					}
					let _ = err;
					sleep(OPEN_RETRY_INTERVAL.min(wait)).await;
				}
			}
		}
	}

	/// Hand a passthrough session a second handle onto the same serial
	/// port, for a dedicated reader thread (spec.md §5). Any bytes already
	/// sitting in `pending` stay with this driver; the clone only sees what
	/// arrives on the wire from here on.
	pub fn try_clone_link(&self) -> Result<SerialLink, ReftError> {
		self.link.try_clone()
	}
}

impl<L: Link> LineDriver<L> {
	/// Wrap an already-open link. Used directly by tests with a scripted
	/// link, and by [`LineDriver::open`] for the real port.
	pub const fn from_link(link: L) -> Self {
		Self {
			link,
			pending: VecDeque::new(),
		}
	}

	/// Copy up to `scratch.len()` bytes into `scratch`, preferring whatever
	/// is already buffered in `pending` over a fresh read from the link.
	fn pull(&mut self, scratch: &mut [u8]) -> Result<usize, ReftError> {
		if self.pending.is_empty() {
			return self.link.read_available(scratch);
		}
		let n = self.pending.len().min(scratch.len());
		for slot in scratch.iter_mut().take(n) {
			*slot = self.pending.pop_front().expect("checked len above");
		}
		Ok(n)
	}

	/// Push bytes read past a sentinel back to the front of the queue so
	/// the next call sees them first.
	fn stash(&mut self, overflow: Vec<u8>) {
		for byte in overflow.into_iter().rev() {
			self.pending.push_front(byte);
		}
	}

	pub fn write(&mut self, bytes: &[u8]) -> Result<(), ReftError> {
		self.link.write_all(bytes)
	}

	pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ReftError> {
		self.link.set_timeout(timeout)
	}

	#[must_use]
	pub fn get_timeout(&self) -> Duration {
		self.link.get_timeout()
	}

	/// Poll in 10ms slices, accumulating bytes, until at least `min_bytes`
	/// have arrived AND `sentinel` has appeared somewhere in them, or idle
	/// time reaches `timeout` — whichever comes first. Every polled byte is
	/// also pushed to `sink` if given.
	///
	/// Returns only up to and including the first occurrence of `sentinel`;
	/// anything read past that point belongs to the next logical frame and
	/// is stashed for the next call, since a single poll can return more
	/// than one frame's worth of bytes at once.
	///
	/// A read yielding no bytes increments the idle counter; a read
	/// yielding any byte resets it (spec.md §4.1 edge case). This idle
	/// budget bounds the whole call, including the wait for `min_bytes` —
	/// a device that never answers at all must still time out.
	pub async fn read_until(
		&mut self,
		min_bytes: usize,
		sentinel: &[u8],
		timeout: Duration,
		mut sink: Option<&mut Vec<u8>>,
	) -> Result<Vec<u8>, ReftError> {
		let mut buf = Vec::new();
		let mut scratch = [0_u8; 256];
		let mut idle = Duration::ZERO;

		loop {
			let satisfied = buf.len() >= min_bytes
				&& (sentinel.is_empty() || find_subsequence(&buf, sentinel).is_some());
			if satisfied || idle >= timeout {
				break;
			}
			let n = self.pull(&mut scratch)?;
			if n == 0 {
				sleep(POLL_INTERVAL).await;
				idle += POLL_INTERVAL;
				continue;
			}
			idle = Duration::ZERO;
			buf.extend_from_slice(&scratch[..n]);
			if let Some(sink) = sink.as_deref_mut() {
				sink.extend_from_slice(&scratch[..n]);
			}
		}

		if !sentinel.is_empty() {
			if let Some(pos) = find_subsequence(&buf, sentinel) {
				let boundary = pos + sentinel.len();
				if boundary < buf.len() {
					let overflow = buf.split_off(boundary);
					self.stash(overflow);
				}
			}
		}

		Ok(buf)
	}

	/// Read whatever is immediately available, with no waiting: one pass of
	/// "is anything buffered right now?" Used to flush the echo of a control
	/// sequence (like the double interrupt before entering raw mode) before
	/// waiting on the next real prompt.
	pub fn drain_available(&mut self) -> Result<Vec<u8>, ReftError> {
		let mut buf = Vec::new();
		let mut scratch = [0_u8; 256];
		loop {
			let n = self.pull(&mut scratch)?;
			if n == 0 {
				break;
			}
			buf.extend_from_slice(&scratch[..n]);
		}
		Ok(buf)
	}

	/// Read exactly `n` bytes, polling in 10ms slices, failing with
	/// [`ReftError::ProtocolTimeout`] if `timeout` idle time elapses first.
	///
	/// Used for fixed-length reads that have no sentinel of their own: the
	/// two-byte `OK`/error handshake, single ACK bytes, and hex-encoded file
	/// windows of a known size.
	pub async fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, ReftError> {
		let mut buf = Vec::with_capacity(n);
		let mut scratch = [0_u8; 256];
		let mut idle = Duration::ZERO;
		while buf.len() < n {
			let want = (n - buf.len()).min(scratch.len());
			let read = self.pull(&mut scratch[..want])?;
			if read == 0 {
				if idle >= timeout {
					return Err(ReftError::ProtocolTimeout("exact byte count", timeout.as_secs_f64()));
				}
				sleep(POLL_INTERVAL).await;
				idle += POLL_INTERVAL;
				continue;
			}
			idle = Duration::ZERO;
			buf.extend_from_slice(&scratch[..read]);
		}
		Ok(buf)
	}

	pub fn close(self) {
		drop(self.link);
	}
}

/// Index of the first occurrence of `needle` in `haystack`, if any.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	if needle.is_empty() || needle.len() > haystack.len() {
		return None;
	}
	haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use crate::testutil::ScriptedLink;

	#[tokio::test(start_paused = true)]
	pub async fn reads_until_sentinel_across_several_polls() {
		let link = ScriptedLink::new(vec![b">>".to_vec(), b"> ".to_vec()]);
		let mut driver = LineDriver::from_link(link);
		let out = driver
			.read_until(1, b">>> ", Duration::from_secs(1), None)
			.await
			.unwrap();
		assert_eq!(out, b">>> ");
	}

	#[tokio::test(start_paused = true)]
	pub async fn idle_counter_resets_on_new_bytes() {
		let link = ScriptedLink::new(vec![Vec::new(), Vec::new(), b"OK".to_vec()]);
		let mut driver = LineDriver::from_link(link);
		let out = driver
			.read_until(1, b"OK", Duration::from_millis(500), None)
			.await
			.unwrap();
		assert_eq!(out, b"OK");
	}

	#[tokio::test(start_paused = true)]
	pub async fn gives_up_after_idle_timeout_without_sentinel() {
		let link = ScriptedLink::new(vec![b"part".to_vec()]);
		let mut driver = LineDriver::from_link(link);
		let out = driver
			.read_until(1, b"never", Duration::from_millis(50), None)
			.await
			.unwrap();
		assert_eq!(out, b"part");
	}

	#[tokio::test(start_paused = true)]
	pub async fn sink_receives_every_polled_byte() {
		let link = ScriptedLink::new(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
		let mut driver = LineDriver::from_link(link);
		let mut sink = Vec::new();
		let _ = driver
			.read_until(3, b"ignored", Duration::from_millis(10), Some(&mut sink))
			.await
			.unwrap();
		assert_eq!(sink, b"abc");
	}

	#[tokio::test(start_paused = true)]
	pub async fn read_exact_collects_precisely_n_bytes() {
		let link = ScriptedLink::new(vec![b"O".to_vec(), b"K".to_vec(), b"garbage".to_vec()]);
		let mut driver = LineDriver::from_link(link);
		let out = driver.read_exact(2, Duration::from_secs(1)).await.unwrap();
		assert_eq!(out, b"OK");
	}

	#[tokio::test(start_paused = true)]
	pub async fn overflow_past_sentinel_is_stashed_for_the_next_read() {
		// One poll hands back a whole frame plus the start of the next one —
		// read_until must stop at the first sentinel, not swallow the rest.
		let link = ScriptedLink::new(vec![b"hello\x04world\x04".to_vec()]);
		let mut driver = LineDriver::from_link(link);
		let first = driver
			.read_until(1, &[0x04], Duration::from_millis(50), None)
			.await
			.unwrap();
		assert_eq!(first, b"hello\x04");
		let second = driver
			.read_until(1, &[0x04], Duration::from_millis(50), None)
			.await
			.unwrap();
		assert_eq!(second, b"world\x04");
	}

	#[tokio::test(start_paused = true)]
	pub async fn read_exact_times_out_if_never_enough_bytes() {
		let link = ScriptedLink::new(vec![b"O".to_vec()]);
		let mut driver = LineDriver::from_link(link);
		let err = driver
			.read_exact(2, Duration::from_millis(30))
			.await
			.unwrap_err();
		assert!(matches!(err, ReftError::ProtocolTimeout(_, _)));
	}
}
