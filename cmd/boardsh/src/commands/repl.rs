//! `repl`: a passthrough terminal straight onto the attached device's raw
//! REPL (spec.md §8 scenario 5). Keystrokes go to the device byte-for-byte;
//! whatever it prints comes straight back to this terminal. Ctrl-X (0x18)
//! leaves the passthrough and returns to the `boardsh` prompt.
//!
//! A dedicated thread owns a cloned handle onto the serial port and blocks
//! on reads from it, copying whatever arrives straight to the terminal
//! (spec.md §5's reader task); the foreground reads keystrokes off stdin
//! and writes them to the device. Leaving passthrough writes a single
//! space to the device to unblock the reader thread's in-flight blocking
//! read, then joins it before returning — `crossterm` supplies the
//! raw-mode toggle (grounded in the terminal-UI examples in the retrieval
//! pack, since the teacher itself never puts a terminal in raw mode).

use miette::miette;
use raw_repl::{line::SerialLink, session::Session};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use std::time::Duration;
use tracing::{error, info};

const LEAVE_PASSTHROUGH: u8 = 0x18;
const UNBLOCK_BYTE: u8 = b' ';
/// Bound on how long the reader thread's blocking read can sit before it
/// notices the stop flag (spec.md §8 scenario 5: "observes stop flag
/// within 1.0s").
const READER_POLL_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn handle_repl(use_json: bool) {
	let Ok(timeout) = Session::with_current(|s| Ok(s.timeout)) else {
		report_error(use_json, &raw_repl::ReftError::NoDeviceAttached);
		return;
	};

	if use_json {
		info!(id = "boardsh::repl::entered");
	} else {
		println!("entering passthrough terminal, Ctrl-X to leave");
	}

	// spec.md §9(b): if the device stays silent for one full read timeout
	// right after entering, leave the passthrough immediately rather than
	// sitting in raw terminal mode in front of a dead link.
	match saw_output_within(timeout).await {
		Ok(true) => {
			if let Err(cause) = run_passthrough().await {
				fail(use_json, &cause);
			}
		}
		Ok(false) => {
			if !use_json {
				println!("device produced no output within {:.1}s, leaving", timeout.as_secs_f64());
			}
		}
		Err(cause) => fail(use_json, &cause),
	}

	if use_json {
		info!(id = "boardsh::repl::left");
	} else {
		println!("left passthrough terminal");
	}
}

/// Poll for device output for up to `timeout`, printing whatever arrives.
/// Returns whether anything showed up at all.
async fn saw_output_within(timeout: Duration) -> Result<bool, raw_repl::ReftError> {
	let deadline = tokio::time::Instant::now() + timeout;
	let mut saw_any = false;
	while tokio::time::Instant::now() < deadline {
		let bytes = Session::with_current_async(|mut session| async move {
			let result = session.repl_mut().line_mut().drain_available();
			(session, result)
		})
		.await?;
		if !bytes.is_empty() {
			saw_any = true;
			use std::io::Write;
			let _ = std::io::stdout().write_all(&bytes);
			let _ = std::io::stdout().flush();
		}
		tokio::time::sleep(Duration::from_millis(50)).await;
	}
	Ok(saw_any)
}

/// spec.md §7: `LinkLost`/`ProtocolTimeout`/`ReplNotReady`/`ExecRejected`
/// always tear the session down, so a fatal error from the passthrough
/// detaches before reporting it.
fn fail(use_json: bool, cause: &raw_repl::ReftError) {
	if cause.is_fatal() {
		raw_repl::session::detach();
	}
	report_error(use_json, cause);
}

fn report_error(use_json: bool, cause: &raw_repl::ReftError) {
	if use_json {
		error!(id = "boardsh::repl::failed", cause = %cause);
	} else {
		error!("\n{:?}", miette!("passthrough terminal failed: {cause}"));
	}
}

async fn run_passthrough() -> Result<(), raw_repl::ReftError> {
	crossterm::terminal::enable_raw_mode()
		.map_err(|cause| raw_repl::ReftError::HostIoError(std::path::PathBuf::from("<tty>"), cause))?;

	let reader_link = Session::with_current_async(|mut session| {
		let cloned = session.repl_mut().line_mut().try_clone_link().and_then(|mut link| {
			link.set_timeout(READER_POLL_TIMEOUT)?;
			Ok(link)
		});
		async move { (session, cloned) }
	})
	.await?;

	let stop = Arc::new(AtomicBool::new(false));
	let reader_stop = Arc::clone(&stop);
	let reader = std::thread::spawn(move || read_device_until_stopped(reader_link, &reader_stop));

	let result = pump_stdin().await;

	stop.store(true, Ordering::Relaxed);
	// Unblock the reader thread's in-flight blocking read, then wait for
	// it to actually notice the stop flag and return.
	let _ = send_to_device(UNBLOCK_BYTE).await;
	let _ = reader.join();

	let _ = crossterm::terminal::disable_raw_mode();
	result
}

/// Dedicated reader: blocks on the cloned link, copying whatever arrives
/// straight to the terminal, until `stop` is set.
fn read_device_until_stopped(mut link: SerialLink, stop: &AtomicBool) {
	use std::io::Write;
	while !stop.load(Ordering::Relaxed) {
		match link.blocking_read_chunk() {
			Ok(bytes) if !bytes.is_empty() => {
				let mut stdout = std::io::stdout();
				let _ = stdout.write_all(&bytes);
				let _ = stdout.flush();
			}
			Ok(_) => {}
			Err(_) => break,
		}
	}
}

/// Foreground: read keystrokes off stdin one byte at a time and write each
/// one to the device, until Ctrl-X or EOF.
async fn pump_stdin() -> Result<(), raw_repl::ReftError> {
	use tokio::io::AsyncReadExt;
	let mut stdin = tokio::io::stdin();
	let mut byte = [0_u8; 1];
	loop {
		match stdin.read(&mut byte).await {
			Ok(0) | Err(_) => return Ok(()),
			Ok(_) => {
				if byte[0] == LEAVE_PASSTHROUGH {
					return Ok(());
				}
				send_to_device(byte[0]).await?;
			}
		}
	}
}

async fn send_to_device(byte: u8) -> Result<(), raw_repl::ReftError> {
	Session::with_current_async(|mut session| async move {
		let result = session.repl_mut().line_mut().write(&[byte]);
		(session, result)
	})
	.await
}
