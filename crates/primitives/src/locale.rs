//! Locale fallback chains.
//!
//! A locale string such as `en_US.UTF-8` expands into the ordered list of
//! locales to try when resolving localized data, most specific first and
//! always ending in `C`. Colon-separated lists (`de_DE:fr`) expand each
//! member in turn.

use std::ops::Deref;
use std::sync::Arc;

/// The locale every chain falls back to.
pub const C_LOCALE: &str = "C";

/// Immutable, cheaply cloned locale fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleList(Arc<[String]>);

impl LocaleList {
	/// Computes the chain for `locale`.
	pub fn for_locale(locale: &str) -> Self {
		Self(locale_chain(locale).into())
	}

	/// Chain containing only `C`.
	pub fn c() -> Self {
		Self(Arc::from(vec![C_LOCALE.to_owned()]))
	}

	/// Most specific locale of the chain.
	pub fn primary(&self) -> &str {
		self.0.first().map_or(C_LOCALE, String::as_str)
	}
}

impl Default for LocaleList {
	fn default() -> Self {
		Self::c()
	}
}

impl Deref for LocaleList {
	type Target = [String];

	fn deref(&self) -> &[String] {
		&self.0
	}
}

impl From<Vec<String>> for LocaleList {
	fn from(list: Vec<String>) -> Self {
		Self(list.into())
	}
}

/// Expands `locale` into its fallback chain.
pub fn locale_chain(locale: &str) -> Vec<String> {
	let mut chain: Vec<String> = Vec::new();
	for part in locale.split(':').map(str::trim).filter(|p| !p.is_empty()) {
		let part = if part == "POSIX" { C_LOCALE } else { part };
		for variant in explode(part) {
			if !chain.contains(&variant) {
				chain.push(variant);
			}
		}
	}
	if !chain.iter().any(|l| l == C_LOCALE) {
		chain.push(C_LOCALE.to_owned());
	}
	chain
}

const CODESET: u8 = 1 << 0;
const TERRITORY: u8 = 1 << 1;
const MODIFIER: u8 = 1 << 2;

/// Splits `language[_territory][.codeset][@modifier]` and emits every
/// combination of present components, most specific first.
fn explode(locale: &str) -> Vec<String> {
	let (rest, modifier) = match locale.split_once('@') {
		Some((rest, m)) => (rest, Some(m)),
		None => (locale, None),
	};
	let (rest, codeset) = match rest.split_once('.') {
		Some((rest, c)) => (rest, Some(c)),
		None => (rest, None),
	};
	let (language, territory) = match rest.split_once('_') {
		Some((l, t)) => (l, Some(t)),
		None => (rest, None),
	};

	let mut mask = 0;
	if codeset.is_some() {
		mask |= CODESET;
	}
	if territory.is_some() {
		mask |= TERRITORY;
	}
	if modifier.is_some() {
		mask |= MODIFIER;
	}

	(0..=mask)
		.rev()
		.filter(|i| i & !mask == 0)
		.map(|i| {
			let mut out = language.to_owned();
			if let Some(t) = territory.filter(|_| i & TERRITORY != 0) {
				out.push('_');
				out.push_str(t);
			}
			if let Some(c) = codeset.filter(|_| i & CODESET != 0) {
				out.push('.');
				out.push_str(c);
			}
			if let Some(m) = modifier.filter(|_| i & MODIFIER != 0) {
				out.push('@');
				out.push_str(m);
			}
			out
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn full_locale_expands_most_specific_first() {
		assert_eq!(
			locale_chain("en_US.UTF-8"),
			vec!["en_US.UTF-8", "en_US", "en.UTF-8", "en", "C"]
		);
	}

	#[test]
	fn modifier_variants_precede_plain_ones() {
		let chain = locale_chain("de_DE@euro");
		assert_eq!(chain, vec!["de_DE@euro", "de@euro", "de_DE", "de", "C"]);
	}

	#[test]
	fn colon_lists_expand_in_order_without_duplicates() {
		assert_eq!(
			locale_chain("fr_FR:fr:en"),
			vec!["fr_FR", "fr", "en", "C"]
		);
	}

	#[test]
	fn c_and_posix_collapse() {
		assert_eq!(locale_chain("C"), vec!["C"]);
		assert_eq!(locale_chain("POSIX"), vec!["C"]);
		assert_eq!(locale_chain(""), vec!["C"]);
	}

	#[test]
	fn list_derefs_to_slice() {
		let list = LocaleList::for_locale("en");
		assert_eq!(list.primary(), "en");
		assert_eq!(&list[..], ["en".to_owned(), "C".to_owned()]);
	}
}
