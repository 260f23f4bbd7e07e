//! C5: File Transport.
//!
//! Two hex-framed, ACK-paced byte pipes layered on top of a snippet that's
//! already running on the device (spec.md §4.5). By the time either
//! function here is called, [`crate::exec::send_and_start`] has already
//! shipped the device-side helper (`recv_file_from_host`/`send_file_to_host`
//! in [`crate::helpers`]) and read back its `OK`; the device is blocked
//! reading from or writing to its own stdin/stdout, and these functions
//! drive the other end of that pipe.
//!
//! Every raw file byte crosses the wire as two ASCII hex characters — there
//! is no binary-safe stdin on the device side (spec.md §1), so doubling the
//! byte count is the price of using the interpreter's own stdio for file
//! bytes instead of a side channel.

use crate::{
	errors::ReftError,
	line::Link,
	repl::{control, Repl},
};
use std::time::Duration;

/// Link timeout applied while a transfer is in flight (spec.md §4.5: "Both
/// set the link timeout to 2s while active and restore the previous
/// timeout on exit").
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(2);

/// Ship `total` bytes read from `source` to the device, half a `buf_size`
/// window at a time, paced by the device's `0x06` ACK.
///
/// Returns the number of bytes actually sent (always `total` on success —
/// `Err` otherwise).
pub async fn send_to_device<L: Link>(
	repl: &mut Repl<L>,
	source: &mut dyn std::io::Read,
	total: u64,
	buf_size: usize,
) -> Result<u64, ReftError> {
	let previous_timeout = repl.line_mut().get_timeout();
	repl.line_mut().set_timeout(TRANSFER_TIMEOUT)?;
	let result = send_to_device_inner(repl, source, total, buf_size).await;
	repl.line_mut().set_timeout(previous_timeout)?;
	result
}

async fn send_to_device_inner<L: Link>(
	repl: &mut Repl<L>,
	source: &mut dyn std::io::Read,
	total: u64,
	buf_size: usize,
) -> Result<u64, ReftError> {
	let window_size = (buf_size / 2).max(1);
	let mut sent: u64 = 0;
	let mut raw = vec![0_u8; window_size];

	while sent < total {
		let ack = repl.line_mut().read_exact(1, TRANSFER_TIMEOUT).await?;
		if ack.first() != Some(&control::ACK) {
			return Err(ReftError::TransferDesync(sent, ack.first().copied()));
		}

		let window = usize::try_from(total - sent)
			.unwrap_or(usize::MAX)
			.min(window_size);
		source
			.read_exact(&mut raw[..window])
			.map_err(ReftError::LinkLost)?;
		let hex_text = hex::encode(&raw[..window]);
		repl.line_mut().write(hex_text.as_bytes())?;
		sent += window as u64;
	}

	Ok(sent)
}

/// Receive `total` bytes from the device into `dest`, ACK-ing every window.
pub async fn recv_from_device<L: Link>(
	repl: &mut Repl<L>,
	dest: &mut dyn std::io::Write,
	total: u64,
	buf_size: usize,
) -> Result<u64, ReftError> {
	let previous_timeout = repl.line_mut().get_timeout();
	repl.line_mut().set_timeout(TRANSFER_TIMEOUT)?;
	let result = recv_from_device_inner(repl, dest, total, buf_size).await;
	repl.line_mut().set_timeout(previous_timeout)?;
	result
}

async fn recv_from_device_inner<L: Link>(
	repl: &mut Repl<L>,
	dest: &mut dyn std::io::Write,
	total: u64,
	buf_size: usize,
) -> Result<u64, ReftError> {
	let window_size = (buf_size / 2).max(1);
	let mut received: u64 = 0;

	while received < total {
		let window = usize::try_from(total - received)
			.unwrap_or(usize::MAX)
			.min(window_size);
		let hex_text = repl.line_mut().read_exact(window * 2, TRANSFER_TIMEOUT).await?;
		let raw = hex::decode(&hex_text).map_err(|e| {
			tracing::warn!(error = %e, "device sent malformed hex during file transfer");
			ReftError::TransferDesync(received, None)
		})?;
		dest.write_all(&raw).map_err(ReftError::LinkLost)?;
		repl.line_mut().write(&[control::ACK])?;
		received += window as u64;
	}

	Ok(received)
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use crate::{line::LineDriver, testutil::ScriptedLink};
	use std::io::Cursor;

	#[tokio::test(start_paused = true)]
	pub async fn sends_a_small_file_in_one_window() {
		let link = ScriptedLink::new(vec![vec![control::ACK]]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		let payload = b"hello\r\n".to_vec();
		let mut source = Cursor::new(payload.clone());
		let sent = send_to_device(&mut repl, &mut source, payload.len() as u64, 32)
			.await
			.unwrap();
		assert_eq!(sent, payload.len() as u64);
	}

	#[tokio::test(start_paused = true)]
	pub async fn send_fails_on_missing_ack() {
		let link = ScriptedLink::new(vec![vec![b'Z']]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		let mut source = Cursor::new(b"x".to_vec());
		let err = send_to_device(&mut repl, &mut source, 1, 32).await.unwrap_err();
		assert!(matches!(err, ReftError::TransferDesync(0, Some(b'Z'))));
	}

	#[tokio::test(start_paused = true)]
	pub async fn receives_a_small_file_and_acks_it() {
		let hex_payload = hex::encode(b"hello\r\n");
		let link = ScriptedLink::new(vec![hex_payload.into_bytes()]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		let mut dest = Vec::new();
		let received = recv_from_device(&mut repl, &mut dest, 7, 32).await.unwrap();
		assert_eq!(received, 7);
		assert_eq!(dest, b"hello\r\n");
	}

	#[tokio::test(start_paused = true)]
	pub async fn multi_window_transfer_round_trips() {
		// buf_size 4 -> window 2 raw bytes per round; 5 bytes total -> 3 rounds.
		let link = ScriptedLink::new(vec![
			vec![control::ACK],
			vec![control::ACK],
			vec![control::ACK],
		]);
		let mut repl = Repl::new(LineDriver::from_link(link), b"soft reboot\r\n");
		let payload = b"abcde".to_vec();
		let mut source = Cursor::new(payload.clone());
		let sent = send_to_device(&mut repl, &mut source, payload.len() as u64, 4)
			.await
			.unwrap();
		assert_eq!(sent, 5);
	}
}
