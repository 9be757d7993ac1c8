//! Common types and functions.

// ----------

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use percent_encoding::percent_decode_str;

// ----------

pub use restive_core::BoxedError;

// --------------------------------------------------

#[macro_use]
pub(crate) mod macros;

pub(crate) mod header_utils;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// IntoArray trait

#[doc(hidden)]
pub trait IntoArray<T, const N: usize> {
	fn into_array(self) -> [T; N];
}

impl<T, const N: usize> IntoArray<T, N> for [T; N]
where
	T: IntoArray<T, 1>,
{
	fn into_array(self) -> [T; N] {
		self
	}
}

// --------------------------------------------------

// Used when expecting a valid value in Options or Results.
pub(crate) const SCOPE_VALIDITY: &str = "scope validity";

// --------------------------------------------------------------------------------
// Registry

// A copy-on-write holder of configuration state. Readers get the current snapshot
// without blocking. Writers are serialized and publish a new snapshot only when
// the modification succeeds.
pub(crate) struct Registry<T> {
	current: ArcSwap<T>,
	writer: Mutex<()>,
}

impl<T: Clone> Registry<T> {
	pub(crate) fn new(value: T) -> Self {
		Self {
			current: ArcSwap::from_pointee(value),
			writer: Mutex::new(()),
		}
	}

	#[inline(always)]
	pub(crate) fn load(&self) -> Arc<T> {
		self.current.load_full()
	}

	pub(crate) fn update<R, E, Func>(&self, func: Func) -> Result<R, E>
	where
		Func: FnOnce(&mut T) -> Result<R, E>,
	{
		let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

		let mut next = T::clone(&self.current.load());
		let result = func(&mut next)?;
		self.current.store(Arc::new(next));

		Ok(result)
	}
}

impl<T: Clone + Default> Default for Registry<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

// --------------------------------------------------------------------------------

// Splits an `application/x-www-form-urlencoded` string into name-value pairs.
// Empty pairs are skipped. When `decode` is true, '+' is treated as a space and
// percent-encoded octets are decoded.
pub(crate) fn parse_urlencoded(source: &str, decode: bool) -> Vec<(String, String)> {
	if decode {
		// Decoding is lossy, so string pairs never fail to deserialize.
		return serde_urlencoded::from_str(source).unwrap_or_default();
	}

	source
		.split('&')
		.filter(|pair| !pair.is_empty())
		.map(|pair| {
			let (name, value) = pair.split_once('=').unwrap_or((pair, ""));

			(name.to_owned(), value.to_owned())
		})
		.collect()
}

#[inline]
pub(crate) fn decode_path_component(component: &str) -> String {
	percent_decode_str(component).decode_utf8_lossy().into_owned()
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn parse_urlencoded() {
		let cases = [
			("a=1&b=2", true, vec![("a", "1"), ("b", "2")]),
			("a=1&&a=2", true, vec![("a", "1"), ("a", "2")]),
			("a=x+y&b=%23z", true, vec![("a", "x y"), ("b", "#z")]),
			("a=x+y&b=%23z", false, vec![("a", "x+y"), ("b", "%23z")]),
			("flag&b=", true, vec![("flag", ""), ("b", "")]),
			("a=%E2%82%AC+1&%C3%A9=%FF", true, vec![("a", "\u{20ac} 1"), ("\u{e9}", "\u{fffd}")]),
			("a=%E2%82%AC+1", false, vec![("a", "%E2%82%AC+1")]),
			("", true, vec![]),
		];

		for (source, decode, expected) in cases {
			dbg!(source);

			let pairs = super::parse_urlencoded(source, decode);
			let pairs = pairs
				.iter()
				.map(|(name, value)| (name.as_str(), value.as_str()))
				.collect::<Vec<_>>();

			assert_eq!(pairs, expected);
		}
	}

	#[test]
	fn registry() {
		let registry = Registry::new(vec![1]);
		let snapshot = registry.load();

		registry
			.update(|values| {
				values.push(2);

				Ok::<_, ()>(())
			})
			.unwrap();

		assert_eq!(*snapshot, vec![1]);
		assert_eq!(*registry.load(), vec![1, 2]);

		let result = registry.update(|values| {
			values.push(3);

			Err::<(), _>("rejected")
		});

		assert_eq!(result, Err("rejected"));
		assert_eq!(*registry.load(), vec![1, 2]);
	}
}
