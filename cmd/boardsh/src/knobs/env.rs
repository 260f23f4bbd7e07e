//! The environment variables that influence `boardsh`'s configuration, read
//! once into `Lazy` statics the same way `bridgectl`'s own `knobs::env`
//! does (spec.md §6's configuration table, env-override layer).

use once_cell::sync::Lazy;
use std::env::var as env_var;
use tracing::warn;

/// Environment Variable Name: `BOARDSH_OUTPUT_JSON`
pub static USE_JSON_OUTPUT: Lazy<bool> =
	Lazy::new(|| env_var("BOARDSH_OUTPUT_JSON").map_or(false, |var| var == "1" || var == "true"));

/// Environment Variable Name: `BOARDSH_SERIAL_PORT`
pub static SERIAL_PORT: Lazy<Option<String>> = Lazy::new(|| env_var("BOARDSH_SERIAL_PORT").ok());

/// Environment Variable Name: `BOARDSH_BAUD_RATE`
pub static BAUD_RATE: Lazy<Option<u32>> = Lazy::new(|| {
	env_var("BOARDSH_BAUD_RATE").ok().and_then(|val| match val.parse() {
		Ok(baud) => Some(baud),
		Err(cause) => {
			warn!(?cause, "not honoring BOARDSH_BAUD_RATE, not a valid number");
			None
		}
	})
});

/// Environment Variable Name: `BOARDSH_AUTOCONNECT`
pub static AUTOCONNECT: Lazy<bool> =
	Lazy::new(|| env_var("BOARDSH_AUTOCONNECT").map_or(false, |var| var == "1" || var == "true"));

/// Environment Variable Name: `BOARDSH_LOCALE`
pub static LOCALE: Lazy<Option<String>> = Lazy::new(|| env_var("BOARDSH_LOCALE").ok());

/// Environment Variable Name: `BOARDSH_SYNC_TIME`
pub static SYNC_TIME: Lazy<bool> =
	Lazy::new(|| env_var("BOARDSH_SYNC_TIME").map_or(false, |var| var == "1" || var == "true"));
