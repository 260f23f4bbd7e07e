//! C7: the Device Session.
//!
//! Owns everything C1–C6 need to talk to one attached device, and the
//! process-wide "current device" slot spec.md §5 describes as a
//! single-slot atomic cell: at most one [`Session`] exists at a time, and
//! [`attach`] replaces whatever was there, closing it first.

use crate::{
	errors::ReftError,
	helpers::{self, DEFAULT_BUFFER_SIZE},
	line::{LineDriver, SerialLink},
	locale,
	remote::{self},
	repl::Repl,
	router::{self, RoutedPath},
	value::Literal,
};
use once_cell::sync::Lazy;
use std::{
	collections::HashSet,
	path::PathBuf,
	sync::Mutex,
	time::Duration,
};

/// How many `wake()` attempts `attach` allows before giving up (spec.md
/// §4.7: "up to 2 attempts").
const WAKE_TRIES: u32 = 2;
/// Banner timeout applied to each wake attempt (spec.md §4.7: "100 ms
/// banner timeout").
const WAKE_BANNER_TIMEOUT: Duration = Duration::from_millis(100);

/// The three-layer configuration every field of a [`Session`] is seeded
/// from (spec.md §6): `Config::default()`, overridden by environment
/// variables, overridden by CLI flags. This struct itself only holds the
/// final, resolved values — layering happens above it, in `boardsh`.
#[derive(Clone, Debug)]
pub struct Config {
	pub port: Option<String>,
	pub baud: u32,
	pub wait: Duration,
	pub buffer_size: usize,
	pub chunk_size: usize,
	pub chunk_wait: Duration,
	pub autoconnect: bool,
	pub locale: Option<String>,
	pub sync_time: bool,
	pub debug: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			port: None,
			baud: 115_200,
			wait: Duration::ZERO,
			buffer_size: DEFAULT_BUFFER_SIZE,
			chunk_size: crate::exec::DEFAULT_CHUNK_SIZE,
			chunk_wait: crate::exec::DEFAULT_CHUNK_WAIT,
			autoconnect: false,
			locale: None,
			sync_time: false,
			debug: false,
		}
	}
}

/// One attached device and everything known about it (spec.md §3's
/// `Session`). `root_dirs` and `name_path` are fixed at [`attach`] time and
/// never change for the life of the session.
pub struct Session {
	pub port: PathBuf,
	pub baud: u32,
	repl: Repl<SerialLink>,
	pub name: String,
	pub root_dirs: HashSet<String>,
	pub name_path: String,
	pub timeout: Duration,
	pub buffer_size: usize,
}

/// The single-slot current-device cell (spec.md §5), guarded the same way
/// the teacher's own long-lived host state is: a plain `Mutex`, since there
/// is at most one device and no call here is hot enough to need anything
/// fancier.
static CURRENT_DEVICE: Lazy<Mutex<Option<Session>>> = Lazy::new(|| Mutex::new(None));

fn slot() -> &'static Mutex<Option<Session>> {
	&CURRENT_DEVICE
}

impl Session {
	/// Run `f` against the currently attached device, or
	/// [`ReftError::NoDeviceAttached`] if the slot is empty.
	pub fn with_current<T>(f: impl FnOnce(&mut Session) -> Result<T, ReftError>) -> Result<T, ReftError> {
		let mut guard = slot().lock().expect("current-device slot poisoned");
		match guard.as_mut() {
			Some(session) => f(session),
			Option::None => Err(ReftError::NoDeviceAttached),
		}
	}

	/// Whether a device is currently attached.
	#[must_use]
	pub fn is_attached() -> bool {
		slot().lock().expect("current-device slot poisoned").is_some()
	}

	/// Unconditionally clear the current-device slot, dropping (and so
	/// closing) whatever [`Session`] was installed. Called on a fatal
	/// [`ReftError`] as well as on an explicit `detach`.
	pub fn clear_slot() {
		*slot().lock().expect("current-device slot poisoned") = None;
	}

	/// Run an async `f` against the currently attached device.
	///
	/// [`with_current`] can't be used for this: its closure is synchronous,
	/// so nothing inside it can `.await` a call into C1-C6 without holding
	/// the slot's `MutexGuard` across the await point. Instead this takes
	/// the [`Session`] out of the slot entirely, hands it to `f` by value,
	/// and puts whatever `f` hands back into the slot once it resolves —
	/// safe here because `boardsh`'s command loop only ever has one command
	/// in flight at a time.
	pub async fn with_current_async<T, Func, Fut>(f: Func) -> Result<T, ReftError>
	where
		Func: FnOnce(Session) -> Fut,
		Fut: std::future::Future<Output = (Session, Result<T, ReftError>)>,
	{
		let session = slot().lock().expect("current-device slot poisoned").take();
		let Some(session) = session else {
			return Err(ReftError::NoDeviceAttached);
		};
		let (session, result) = f(session).await;
		*slot().lock().expect("current-device slot poisoned") = Some(session);
		result
	}

	#[must_use]
	pub const fn repl(&self) -> &Repl<SerialLink> {
		&self.repl
	}

	pub fn repl_mut(&mut self) -> &mut Repl<SerialLink> {
		&mut self.repl
	}

	/// Route `path` against this session's enumerated roots and
	/// `name_path` (spec.md §4.6); the one thing every command handler
	/// needs before it can call a [`crate::helpers`] primitive.
	#[must_use]
	pub fn route(&self, path: &str) -> RoutedPath {
		let roots: Vec<String> = self.root_dirs.iter().cloned().collect();
		router::route(path, &roots, Some(&self.name_path))
	}
}

/// Open `port` at `baud`, wake the device, enumerate its root directories,
/// and install the result as the current device (spec.md §4.7's five-step
/// procedure). Replaces any previously attached session.
///
/// `config` supplies the locale (for the soft-reboot banner C2 expects)
/// and the `sync_time` flag, which if set invokes the device's
/// `set_device_time` helper once attach otherwise succeeds.
pub async fn attach(port: &str, baud: u32, wait: Duration, config: &Config) -> Result<(), ReftError> {
	let banner = locale::banner_for(config.locale.as_deref());
	let line = LineDriver::<SerialLink>::open(port, baud, wait).await?;
	let mut repl = Repl::new(line, banner);

	repl.wake(WAKE_TRIES, WAKE_BANNER_TIMEOUT).await?;
	repl.enter_raw(crate::exec::DEFAULT_EXEC_TIMEOUT).await?;

	let listing = remote::invoke_and_eval(&mut repl, &helpers::LISTDIR, &[Literal::str("/")], &[]).await?;
	let Literal::List(entries) = listing else {
		return Err(ReftError::ValueMarshalling(format!(
			"listdir('/') did not return a list: {listing:?}"
		)));
	};
	let mut root_dirs = HashSet::new();
	for entry in entries {
		if let Literal::Str(name) = entry {
			root_dirs.insert(format!("/{name}/"));
		}
	}

	let name = PathBuf::from(port)
		.file_name()
		.map_or_else(|| port.to_owned(), |n| n.to_string_lossy().into_owned());
	let name_path = format!("/{name}/");

	if config.sync_time {
		if let Err(err) = sync_device_time(&mut repl).await {
			tracing::warn!(error = %err, "failed to sync device time during attach");
		}
	}

	let timeout = repl.line_mut().get_timeout();
	let session = Session {
		port: PathBuf::from(port),
		baud,
		repl,
		name,
		root_dirs,
		name_path,
		timeout,
		buffer_size: config.buffer_size,
	};

	*slot().lock().expect("current-device slot poisoned") = Some(session);
	Ok(())
}

async fn sync_device_time(repl: &mut Repl<SerialLink>) -> Result<(), ReftError> {
	let now = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default();
	let offset = time::OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(now.as_secs() as i64);
	let struct_time = Literal::Tuple(vec![
		Literal::Int(offset.year() as i64),
		Literal::Int(i64::from(u8::from(offset.month()))),
		Literal::Int(i64::from(offset.day())),
		Literal::Int(i64::from(offset.hour())),
		Literal::Int(i64::from(offset.minute())),
		Literal::Int(i64::from(offset.second())),
		Literal::Int(i64::from(offset.weekday().number_days_from_monday())),
		Literal::Int(i64::from(offset.ordinal())),
		Literal::Int(-1),
	]);
	remote::invoke_and_eval(repl, &helpers::SET_DEVICE_TIME, &[struct_time], &[]).await?;
	Ok(())
}

/// Close the current device, if any: drop its link and clear the slot
/// (spec.md §4.7: "close C1; clear the current-device slot").
pub fn detach() {
	Session::clear_slot();
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn default_config_matches_spec_defaults() {
		let config = Config::default();
		assert_eq!(config.baud, 115_200);
		assert_eq!(config.buffer_size, 32);
		assert_eq!(config.chunk_size, 64);
		assert_eq!(config.chunk_wait, Duration::from_millis(500));
		assert!(!config.autoconnect);
		assert!(!config.sync_time);
	}

	#[test]
	pub fn with_current_reports_no_device_attached_when_empty() {
		Session::clear_slot();
		let err = Session::with_current(|_session| Ok(())).unwrap_err();
		assert!(matches!(err, ReftError::NoDeviceAttached));
	}

	#[tokio::test(start_paused = true)]
	pub async fn with_current_async_reports_no_device_attached_when_empty() {
		Session::clear_slot();
		let err = Session::with_current_async(|session| async move { (session, Ok(())) })
			.await
			.unwrap_err();
		assert!(matches!(err, ReftError::NoDeviceAttached));
	}
}
