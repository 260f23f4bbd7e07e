//! Host-side driver for the raw REPL and hex file transport spoken by
//! CircuitPython/MicroPython boards.
//!
//! This crate is the engine: it owns the serial byte stream, the REPL
//! state machine, and every wire-level protocol (remote calls, file
//! transfer, path routing) a shell built on top of it needs. It has no
//! opinion on commands, prompts, or argument parsing — that's `boardsh`.
//!
//! Module map, matching the component letters used throughout doc
//! comments in this crate:
//!
//! - [`line`] — C1, the byte-level link to the device.
//! - [`repl`] — C2, the REPL state machine.
//! - [`exec`] — C3, the snippet executor.
//! - [`remote`] — C4, the remote callable.
//! - [`transport`] — C5, the file transport.
//! - [`router`] — C6, the path router.
//! - [`session`] — C7, the device session and its process-wide slot.
//! - [`discovery`] — C8, the hot-plug supervisor.
//! - [`helpers`] — the filesystem primitives built out of C4/C5/C6.
//! - [`value`] — the `Literal` marshalling type C4 sends/receives.
//! - [`locale`] — soft-reboot banner variants C2 recognises.
//! - [`errors`] — the single [`errors::ReftError`] type every component returns.

pub mod discovery;
pub mod errors;
pub mod exec;
pub mod helpers;
pub mod line;
pub mod locale;
pub mod remote;
pub mod repl;
pub mod router;
pub mod session;
pub mod transport;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::ReftError;
