//! The single error type for the `raw-repl` engine.
//!
//! Every component (line driver, REPL state machine, snippet executor,
//! remote callable, file transport, path router, session) returns
//! [`ReftError`]. There is no inner per-module separation: the taxonomy in
//! this file is the complete list of ways the engine can fail.

use miette::Diagnostic;
use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// The top-level error type for the whole `raw-repl` crate.
#[derive(Error, Diagnostic, Debug)]
pub enum ReftError {
	/// The serial port could not be opened within the configured wait window.
	#[error("serial port `{0}` did not become available within {1:.1}s")]
	#[diagnostic(code(raw_repl::transport_unavailable))]
	TransportUnavailable(String, f64),
	/// A read or write on an already-open port failed; the session this
	/// happened under must be torn down.
	#[error("lost the serial link: {0}")]
	#[diagnostic(code(raw_repl::link_lost))]
	LinkLost(#[from] IoError),
	/// A sentinel we were waiting for (a prompt, an `OK`, a `0x04` terminator)
	/// never showed up within its timeout.
	#[error("timed out waiting for `{0}` ({1:.1}s elapsed)")]
	#[diagnostic(code(raw_repl::protocol_timeout))]
	ProtocolTimeout(&'static str, f64),
	/// Repeated `wake()` attempts never produced a friendly-REPL prompt.
	#[error("device did not respond to {0} wake attempt(s); is it plugged in and not stuck in a program?")]
	#[diagnostic(code(raw_repl::repl_not_ready))]
	ReplNotReady(u32),
	/// The raw-mode execute handshake did not reply with `OK`.
	#[error("device rejected the raw-mode execute handshake (no `OK`, got {0:02x?})")]
	#[diagnostic(code(raw_repl::exec_rejected))]
	ExecRejected(Vec<u8>),
	/// The snippet ran to completion but printed to stderr.
	#[error("remote snippet raised an exception:\n{stderr}")]
	#[diagnostic(code(raw_repl::remote_exception))]
	RemoteException {
		/// Whatever the snippet printed to stdout before failing.
		stdout: Vec<u8>,
		/// The device-side traceback, as text.
		stderr: String,
	},
	/// A file-transfer window did not observe the expected `0x06` ACK byte.
	#[error("file transfer desynchronised after {0} bytes (expected ACK, got {1:?})")]
	#[diagnostic(code(raw_repl::transfer_desync))]
	TransferDesync(u64, Option<u8>),
	/// The path router was handed something it can't make sense of.
	#[error("invalid path `{0}`: {1}")]
	#[diagnostic(code(raw_repl::invalid_path))]
	InvalidPath(PathBuf, &'static str),
	/// The host filesystem rejected an operation.
	#[error("host filesystem error on `{0}`: {1}")]
	#[diagnostic(code(raw_repl::host_io_error))]
	HostIoError(PathBuf, #[source] IoError),
	/// A value we tried to marshal to/from the device's literal syntax could
	/// not be encoded or decoded.
	#[error("could not marshal value: {0}")]
	#[diagnostic(code(raw_repl::value_marshalling))]
	ValueMarshalling(String),
	/// There is no attached device, but the operation required one.
	#[error("no device is attached")]
	#[diagnostic(code(raw_repl::no_device_attached))]
	NoDeviceAttached,
}

impl ReftError {
	/// Whether this error, per spec.md's propagation policy, must tear the
	/// owning session down.
	///
	/// `LinkLost`, `ProtocolTimeout`, `ReplNotReady` and `ExecRejected` are
	/// always fatal. `RemoteException` carries both streams so the caller can
	/// show the traceback and keep going. `TransferDesync` only aborts the
	/// transfer in progress. Everything else is a local/host error that never
	/// touched the session at all.
	#[must_use]
	pub const fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::LinkLost(_)
				| Self::ProtocolTimeout(_, _)
				| Self::ReplNotReady(_)
				| Self::ExecRejected(_)
		)
	}
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn fatal_classification_matches_propagation_policy() {
		assert!(ReftError::ProtocolTimeout("OK", 1.0).is_fatal());
		assert!(ReftError::ReplNotReady(2).is_fatal());
		assert!(ReftError::ExecRejected(vec![0x4f]).is_fatal());
		assert!(!ReftError::TransferDesync(128, None).is_fatal());
		assert!(!ReftError::NoDeviceAttached.is_fatal());
		assert!(!ReftError::RemoteException {
			stdout: Vec::new(),
			stderr: "boom".to_owned(),
		}
		.is_fatal());
	}
}
