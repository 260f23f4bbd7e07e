//! The ten filesystem primitives spec.md §4.6 lists, each expressed as a
//! [`RemoteHelper`] (the device body) paired with a host body of the same
//! shape, so [`crate::router::auto`] can run either one transparently.
//!
//! Device bodies are grounded directly in `utils.py`'s `stat`/`listdir`/
//! `recv_file_from_host`/`send_file_to_host` family; host bodies do the
//! same work with `std::fs`.

use crate::{
	errors::ReftError,
	exec::{self, Snippet},
	line::Link,
	remote::{self, RemoteHelper},
	repl::Repl,
	transport,
	value::Literal,
};
use std::{
	fs,
	io::{Read, Write},
	path::Path,
	time::Duration,
};

/// `os.stat()`-shaped tuple, index 0 mode / index 6 size / index 8 mtime —
/// the only three fields this workspace's commands actually consult.
pub const STAT: RemoteHelper = RemoteHelper {
	name: "stat",
	source: "def stat(path):\n    import os\n    s = os.stat(path)\n    return (s[0], s[6], s[8])\n",
	extras: &[],
};

/// Just the mode word of `stat`, matching `utils.py`'s `stat_mode`.
pub const MODE: RemoteHelper = RemoteHelper {
	name: "mode",
	source: "def mode(path):\n    import os\n    return os.stat(path)[0]\n",
	extras: &[],
};

pub const LISTDIR: RemoteHelper = RemoteHelper {
	name: "listdir",
	source: "def listdir(path):\n    import os\n    return os.listdir(path)\n",
	extras: &[],
};

pub const MKDIR: RemoteHelper = RemoteHelper {
	name: "mkdir",
	source: "def mkdir(path):\n    import os\n    os.mkdir(path)\n    return None\n",
	extras: &[],
};

pub const REMOVE: RemoteHelper = RemoteHelper {
	name: "remove",
	source: concat!(
		"def remove(path):\n",
		"    import os\n",
		"    try:\n",
		"        os.remove(path)\n",
		"    except OSError:\n",
		"        os.rmdir(path)\n",
		"    return None\n",
	),
	extras: &[],
};

/// One `(name, stat_tuple)` pair per directory entry, matching `utils.py`'s
/// `listdir_stat`.
pub const LISTDIR_STAT: RemoteHelper = RemoteHelper {
	name: "listdir_stat",
	source: concat!(
		"def listdir_stat(path):\n",
		"    import os\n",
		"    names = os.listdir(path)\n",
		"    base = path if path.endswith('/') else path + '/'\n",
		"    out = []\n",
		"    for name in names:\n",
		"        s = os.stat(base + name)\n",
		"        out.append((name, (s[0], s[6], s[8])))\n",
		"    return out\n",
	),
	extras: &[],
};

pub const GET_FILESIZE: RemoteHelper = RemoteHelper {
	name: "get_filesize",
	source: "def get_filesize(path):\n    import os\n    return os.stat(path)[6]\n",
	extras: &[],
};

/// `rtc_time` is a 9-tuple in `time.struct_time` order (spec.md §4.4,
/// `utils.py::set_time`).
pub const SET_DEVICE_TIME: RemoteHelper = RemoteHelper {
	name: "set_device_time",
	source: concat!(
		"def set_device_time(rtc_time):\n",
		"    import rtc\n",
		"    import time\n",
		"    rtc.RTC().datetime = time.struct_time(rtc_time)\n",
		"    return None\n",
	),
	extras: &[],
};

/// Device body for a host→device write, matching `utils.py`'s
/// `recv_file_from_host`: allocate, ACK each window, read the hex bytes,
/// write them out.
const RECV_FILE_FROM_HOST: RemoteHelper = RemoteHelper {
	name: "recv_file_from_host",
	source: concat!(
		"def recv_file_from_host(path, filesize, buf_size):\n",
		"    import sys\n",
		"    import binascii\n",
		"    with open(path, 'wb') as dst:\n",
		"        remaining = filesize * 2\n",
		"        while remaining > 0:\n",
		"            sys.stdout.write('\\x06')\n",
		"            window = min(remaining, buf_size)\n",
		"            hexed = sys.stdin.read(window)\n",
		"            dst.write(binascii.unhexlify(hexed))\n",
		"            remaining -= window\n",
		"    return None\n",
	),
	extras: &[],
};

/// Device body for a device→host read, matching `utils.py`'s
/// `send_file_to_host`.
const SEND_FILE_TO_HOST: RemoteHelper = RemoteHelper {
	name: "send_file_to_host",
	source: concat!(
		"def send_file_to_host(path, filesize, buf_size):\n",
		"    import sys\n",
		"    import binascii\n",
		"    with open(path, 'rb') as src:\n",
		"        remaining = filesize\n",
		"        window = buf_size // 2\n",
		"        while remaining > 0:\n",
		"            n = min(remaining, window)\n",
		"            sys.stdout.write(binascii.hexlify(src.read(n)))\n",
		"            remaining -= n\n",
		"            while sys.stdin.read(1) != '\\x06':\n",
		"                pass\n",
		"    return None\n",
	),
	extras: &[],
};

/// Default buffer size used by the transfer helpers when a caller doesn't
/// override it (spec.md §6: `buffer_size`, default 32).
pub const DEFAULT_BUFFER_SIZE: usize = 32;

fn host_io_err(path: &str, err: std::io::Error) -> ReftError {
	ReftError::HostIoError(Path::new(path).to_path_buf(), err)
}

fn stat_tuple(path: &Path) -> std::io::Result<Literal> {
	let metadata = fs::metadata(path)?;
	let mode = if metadata.is_dir() { 0x4000 } else { 0x8000 };
	let size = metadata.len() as i64;
	let mtime = metadata
		.modified()
		.ok()
		.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
		.map_or(0, |d| d.as_secs() as i64);
	Ok(Literal::Tuple(vec![
		Literal::Int(mode),
		Literal::Int(size),
		Literal::Int(mtime),
	]))
}

/// Host body for `stat`.
pub fn stat_local(path: &str) -> Result<Literal, ReftError> {
	stat_tuple(Path::new(path)).map_err(|e| host_io_err(path, e))
}

/// Host body for `mode`.
pub fn mode_local(path: &str) -> Result<Literal, ReftError> {
	let metadata = fs::metadata(path).map_err(|e| host_io_err(path, e))?;
	Ok(Literal::Int(if metadata.is_dir() { 0x4000 } else { 0x8000 }))
}

/// Host body for `listdir`.
pub fn listdir_local(path: &str) -> Result<Literal, ReftError> {
	let entries = fs::read_dir(path).map_err(|e| host_io_err(path, e))?;
	let mut names = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|e| host_io_err(path, e))?;
		names.push(Literal::str(entry.file_name().to_string_lossy().into_owned()));
	}
	Ok(Literal::List(names))
}

/// Host body for `mkdir`.
pub fn mkdir_local(path: &str) -> Result<Literal, ReftError> {
	fs::create_dir(path).map_err(|e| host_io_err(path, e))?;
	Ok(Literal::None)
}

/// Host body for `remove`; removes a file, or a directory recursively.
pub fn remove_local(path: &str) -> Result<Literal, ReftError> {
	let metadata = fs::metadata(path).map_err(|e| host_io_err(path, e))?;
	if metadata.is_dir() {
		fs::remove_dir_all(path).map_err(|e| host_io_err(path, e))?;
	} else {
		fs::remove_file(path).map_err(|e| host_io_err(path, e))?;
	}
	Ok(Literal::None)
}

/// Host body for `listdir_stat`.
pub fn listdir_stat_local(path: &str) -> Result<Literal, ReftError> {
	let entries = fs::read_dir(path).map_err(|e| host_io_err(path, e))?;
	let mut out = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|e| host_io_err(path, e))?;
		let stat = stat_tuple(&entry.path()).map_err(|e| host_io_err(path, e))?;
		out.push(Literal::Tuple(vec![
			Literal::str(entry.file_name().to_string_lossy().into_owned()),
			stat,
		]));
	}
	Ok(Literal::List(out))
}

/// Host body for `get_filesize`.
pub fn get_filesize_local(path: &str) -> Result<Literal, ReftError> {
	let metadata = fs::metadata(path).map_err(|e| host_io_err(path, e))?;
	Ok(Literal::Int(metadata.len() as i64))
}

/// Host body for `set_device_time`: a no-op locally, since the host clock
/// isn't something this command resets.
pub fn set_device_time_local(_path: &str) -> Result<Literal, ReftError> {
	Ok(Literal::None)
}

/// Ship `source` (a host file already opened for reading) to `device_path`
/// on the device, `total` bytes, via the hex-framed ACK pipe (spec.md
/// §4.5). The device-side `recv_file_from_host` helper is started through
/// [`exec::run_with_xfer`]; the hex shuffling itself is
/// [`transport::send_to_device`].
pub async fn write_file_to_device<L: Link>(
	repl: &mut Repl<L>,
	device_path: &str,
	source: &mut dyn Read,
	total: u64,
	buf_size: usize,
) -> Result<(), ReftError> {
	let call = format!(
		"recv_file_from_host({}, {total}, {buf_size})",
		Literal::str(device_path).encode()
	);
	let snippet = Snippet::new(wrap_call(&RECV_FILE_FROM_HOST, &call));
	exec::run_with_xfer(repl, &snippet, |repl| {
		transport::send_to_device(repl, source, total, buf_size)
	})
	.await?;
	Ok(())
}

/// Pull `total` bytes of `device_path` off the device into `dest` (spec.md
/// §4.5, device→host direction).
pub async fn read_file_from_device<L: Link>(
	repl: &mut Repl<L>,
	device_path: &str,
	dest: &mut dyn Write,
	total: u64,
	buf_size: usize,
) -> Result<(), ReftError> {
	let call = format!(
		"send_file_to_host({}, {total}, {buf_size})",
		Literal::str(device_path).encode()
	);
	let snippet = Snippet::new(wrap_call(&SEND_FILE_TO_HOST, &call));
	exec::run_with_xfer(repl, &snippet, |repl| {
		transport::recv_from_device(repl, dest, total, buf_size)
	})
	.await?;
	Ok(())
}

/// Splice a helper's own source ahead of a bare call expression, the same
/// way [`RemoteHelper::synthesize`] would if the trailer were just the
/// call with no result handling (file transfers don't print anything back
/// through the value channel — the bytes themselves are the result).
fn wrap_call(helper: &RemoteHelper, call: &str) -> String {
	format!("{}\n{call}\n", helper.source)
}

/// Read `device_path` from an attached device into an in-memory buffer, for
/// callers that don't need streaming (e.g. `cat`). Looks up the size first
/// via [`GET_FILESIZE`].
pub async fn read_device_file_to_vec<L: Link>(
	repl: &mut Repl<L>,
	device_path: &str,
	buf_size: usize,
) -> Result<Vec<u8>, ReftError> {
	let size = remote::invoke_and_eval(repl, &GET_FILESIZE, &[Literal::str(device_path)], &[]).await?;
	let Literal::Int(total) = size else {
		return Err(ReftError::ValueMarshalling(format!(
			"get_filesize returned a non-integer: {size:?}"
		)));
	};
	let mut out = Vec::with_capacity(total.max(0) as usize);
	read_file_from_device(repl, device_path, &mut out, total.max(0) as u64, buf_size).await?;
	Ok(out)
}

/// Unused in the current transfer path, but kept as the shared idle budget
/// file-transfer helpers apply before giving up on a device gone quiet.
pub const FILESIZE_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(test)]
mod unit_tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	pub fn stat_local_reports_size_and_kind() {
		let dir = tempdir().unwrap();
		let file_path = dir.path().join("a.txt");
		fs::write(&file_path, b"hello").unwrap();
		let value = stat_local(file_path.to_str().unwrap()).unwrap();
		match value {
			Literal::Tuple(fields) => {
				assert_eq!(fields[0], Literal::Int(0x8000));
				assert_eq!(fields[1], Literal::Int(5));
			}
			other => panic!("expected tuple, got {other:?}"),
		}
	}

	#[test]
	pub fn listdir_local_lists_entries() {
		let dir = tempdir().unwrap();
		fs::write(dir.path().join("a.txt"), b"x").unwrap();
		fs::write(dir.path().join("b.txt"), b"y").unwrap();
		let value = listdir_local(dir.path().to_str().unwrap()).unwrap();
		let Literal::List(mut names) = value else {
			panic!("expected list")
		};
		names.sort_by(|a, b| a.encode().cmp(&b.encode()));
		assert_eq!(names, vec![Literal::str("a.txt"), Literal::str("b.txt")]);
	}

	#[test]
	pub fn mkdir_then_remove_round_trips() {
		let dir = tempdir().unwrap();
		let sub = dir.path().join("sub");
		mkdir_local(sub.to_str().unwrap()).unwrap();
		assert!(sub.is_dir());
		remove_local(sub.to_str().unwrap()).unwrap();
		assert!(!sub.exists());
	}

	#[test]
	pub fn remove_missing_path_is_host_io_error() {
		let err = remove_local("/nonexistent/path/for/sure").unwrap_err();
		assert!(matches!(err, ReftError::HostIoError(_, _)));
	}

	#[test]
	pub fn listdir_stat_local_pairs_names_with_stats() {
		let dir = tempdir().unwrap();
		fs::write(dir.path().join("a.txt"), b"hello").unwrap();
		let value = listdir_stat_local(dir.path().to_str().unwrap()).unwrap();
		let Literal::List(entries) = value else {
			panic!("expected list")
		};
		assert_eq!(entries.len(), 1);
		let Literal::Tuple(pair) = &entries[0] else {
			panic!("expected tuple")
		};
		assert_eq!(pair[0], Literal::str("a.txt"));
	}
}
