//! The locale-specific "soft reboot" banner table (spec.md §4.2, §9 Open
//! Question (a)).
//!
//! The banner the device prints after a soft reset (`0x04` during raw-mode
//! entry) depends on the locale baked into the *device's* firmware, not the
//! host's. This table is taken verbatim from `cplocale.py`'s `CP_LOCALE`
//! map. An unrecognised or unset locale tag falls back to the English
//! default, which that source only expressed implicitly as its hardcoded
//! wait string.

/// Default English banner, used when no locale is configured or the
/// configured tag isn't in [`banner_for`]'s table.
pub const DEFAULT_BANNER: &[u8] = b"soft reboot\r\n";

/// Look up the soft-reboot banner bytes for a short locale tag.
///
/// Returns [`DEFAULT_BANNER`] for an unknown tag, per spec.md §4.2: "If the
/// configured locale is unknown, the engine falls back to the English
/// banner."
#[must_use]
pub fn banner_for(locale: Option<&str>) -> &'static [u8] {
	match locale {
		Some("ID") => "memulai ulang software(soft reboot)\r\n".as_bytes(),
		Some("de") => "weicher reboot\r\n".as_bytes(),
		Some("es") => "reinicio suave\r\n".as_bytes(),
		Some("fil") => "malambot na reboot\r\n".as_bytes(),
		Some("fr") => "redémarrage logiciel\r\n".as_bytes(),
		Some("ja") => "ソフトリブート\r\n".as_bytes(),
		Some("nl") => "zachte herstart\r\n".as_bytes(),
		Some("pl") => "programowy reset\r\n".as_bytes(),
		Some("pt") => "reinicialização soft\r\n".as_bytes(),
		Some("ru") => "Мягкая перезагрузка\r\n".as_bytes(),
		Some("sv") => "mjuk omstart\r\n".as_bytes(),
		Some("zh_Latn_pinyin") => "ruǎn chóngqǐ\r\n".as_bytes(),
		_ => DEFAULT_BANNER,
	}
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn known_locale_resolves() {
		assert_eq!(banner_for(Some("de")), "weicher reboot\r\n".as_bytes());
	}

	#[test]
	pub fn unknown_locale_falls_back_to_english() {
		assert_eq!(banner_for(Some("xx")), DEFAULT_BANNER);
		assert_eq!(banner_for(None), DEFAULT_BANNER);
	}
}
