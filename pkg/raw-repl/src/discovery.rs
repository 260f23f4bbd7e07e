//! C8: the Hot-plug Supervisor.
//!
//! Enumerates serial adapters at startup and, optionally, watches for them
//! coming and going so a session can auto-attach/detach without an operator
//! re-running `connect` by hand (spec.md §4.8).
//!
//! There is no portable kernel-USB-event API in this workspace's dependency
//! stack (the teacher's own `cat-dev` serial layer doesn't subscribe to one
//! either — `list_serial_ports` just enumerates once per invocation), so
//! the watcher here polls [`list_ports`] on an interval and diffs
//! successive snapshots instead of subscribing to udev/IOKit/SetupDi
//! events directly. See `DESIGN.md` for this deviation.

use crate::{errors::ReftError, session};
use std::{collections::HashSet, time::Duration};
use tokio::time::sleep;

/// How many times `autoconnect` retries `attach` after a newly enumerated
/// port appears (spec.md §4.8: "retries `attach` up to 8 times").
const ATTACH_RETRIES: u32 = 8;
/// Backoff between `attach` retries (spec.md §4.8: "250 ms backoff").
const ATTACH_BACKOFF: Duration = Duration::from_millis(250);
/// How often the polling watcher re-enumerates ports.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// List every serial adapter the OS currently reports, mirroring
/// `cmd/bridgectl/src/commands/list_serial_ports.rs`'s
/// `SyncSerialPort::available_ports` call, but against `serialport`'s own
/// enumeration.
pub fn list_ports() -> Result<Vec<String>, ReftError> {
	let ports = serialport::available_ports()
		.map_err(|e| ReftError::LinkLost(std::io::Error::other(e)))?;
	Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Connect to the first adapter [`list_ports`] enumerates (spec.md §4.8:
/// "connect to the first adapter enumerated").
pub async fn autoscan(baud: u32, wait: Duration, config: &session::Config) -> Result<(), ReftError> {
	let ports = list_ports()?;
	let Some(first) = ports.first() else {
		return Err(ReftError::TransportUnavailable(
			"<no serial adapters enumerated>".to_owned(),
			wait.as_secs_f64(),
		));
	};
	session::attach(first, baud, wait, config).await
}

/// Background task: poll [`list_ports`] every second, diffing against the
/// previous snapshot. A newly appeared port triggers up to
/// [`ATTACH_RETRIES`] `attach` attempts, [`ATTACH_BACKOFF`] apart; a port
/// that disappears and matches the current session's port triggers
/// [`session::detach`] (spec.md §4.8).
///
/// Runs until `stop` resolves. Errors from individual `attach` attempts are
/// logged and swallowed — a watcher that dies on the first flaky port is
/// worse than one that keeps polling.
pub async fn autoconnect(baud: u32, config: session::Config, stop: impl std::future::Future<Output = ()>) {
	tokio::pin!(stop);
	let mut known: HashSet<String> = list_ports().unwrap_or_default().into_iter().collect();

	loop {
		tokio::select! {
			() = &mut stop => return,
			() = sleep(POLL_INTERVAL) => {}
		}

		let current: HashSet<String> = match list_ports() {
			Ok(ports) => ports.into_iter().collect(),
			Err(err) => {
				tracing::warn!(error = %err, "failed to enumerate serial ports while watching for hot-plug");
				continue;
			}
		};

		for added in current.difference(&known) {
			try_attach_with_retries(added, baud, &config).await;
		}
		for removed in known.difference(&current) {
			let matches_current =
				session::Session::with_current(|s| Ok(s.port.to_string_lossy() == removed.as_str()))
					.unwrap_or(false);
			if matches_current {
				tracing::info!(port = %removed, "attached device unplugged, detaching");
				session::detach();
			}
		}

		known = current;
	}
}

async fn try_attach_with_retries(port: &str, baud: u32, config: &session::Config) {
	for attempt in 1..=ATTACH_RETRIES {
		match session::attach(port, baud, Duration::ZERO, config).await {
			Ok(()) => {
				tracing::info!(port, attempt, "auto-attached to newly enumerated device");
				return;
			}
			Err(err) if attempt == ATTACH_RETRIES => {
				tracing::warn!(port, attempt, error = %err, "giving up auto-attaching to device");
			}
			Err(err) => {
				tracing::debug!(port, attempt, error = %err, "auto-attach attempt failed, retrying");
				sleep(ATTACH_BACKOFF).await;
			}
		}
	}
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn list_ports_does_not_panic_with_no_hardware() {
		// `serialport::available_ports` on a CI/container box with no serial
		// hardware returns `Ok(vec![])`, not an error; this just pins that we
		// surface it as an empty list rather than treating it as failure.
		let _ = list_ports();
	}
}
