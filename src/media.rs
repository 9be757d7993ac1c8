//! Media-type compatibility, specificity, and quality-value negotiation.

// ----------

use std::cmp::Ordering;

use http::{header::ACCEPT, HeaderMap};
use mime::Mime;

use crate::common::{header_utils::split_header_value, SCOPE_VALIDITY};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// AcceptMediaType

/// A media range from the `Accept` header with its quality value.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptMediaType {
	media_type: Mime,
	quality: f32,
}

impl AcceptMediaType {
	#[inline(always)]
	pub fn new(media_type: Mime, quality: f32) -> Self {
		Self {
			media_type,
			quality,
		}
	}

	#[inline(always)]
	pub fn media_type(&self) -> &Mime {
		&self.media_type
	}

	#[inline(always)]
	pub fn quality(&self) -> f32 {
		self.quality
	}

	// Parses a single media range. The `q` parameter is removed from the media type.
	fn parse(value: &str) -> Option<Self> {
		let media_type = value.parse::<Mime>().ok()?;

		let quality = match media_type.get_param("q") {
			Some(quality) => quality
				.as_str()
				.parse::<f32>()
				.ok()
				.filter(|quality| (0.0..=1.0).contains(quality))?,
			None => return Some(Self::new(media_type, 1.0)),
		};

		let mut essence = media_type.essence_str().to_owned();
		for (name, value) in media_type.params() {
			if name != "q" {
				essence.push_str("; ");
				essence.push_str(name.as_str());
				essence.push('=');
				essence.push_str(value.as_str());
			}
		}

		Some(Self::new(essence.parse().ok()?, quality))
	}
}

// --------------------------------------------------------------------------------

/// Returns the acceptable media types of the request in descending quality order.
///
/// A missing `Accept` header is treated as `*/*` with the quality 1.0. Malformed
/// media ranges are ignored. If none of the ranges are valid, the header is treated
/// as missing.
pub fn acceptable_media_types(headers: &HeaderMap) -> Vec<AcceptMediaType> {
	let mut media_types = headers
		.get_all(ACCEPT)
		.iter()
		.filter_map(|header_value| split_header_value(header_value).ok())
		.flatten()
		.filter_map(AcceptMediaType::parse)
		.collect::<Vec<_>>();

	if media_types.is_empty() {
		return vec![AcceptMediaType::new(mime::STAR_STAR, 1.0)];
	}

	// Stable sort, so ranges with equal quality keep their order of appearance,
	// more specific ranges first.
	media_types.sort_by(|a, b| {
		b.quality
			.partial_cmp(&a.quality)
			.expect(SCOPE_VALIDITY)
			.then_with(|| compare_specificity(&a.media_type, &b.media_type))
	});

	media_types
}

// --------------------------------------------------------------------------------

#[inline]
pub(crate) fn is_wildcard_type(media_type: &Mime) -> bool {
	media_type.type_() == mime::STAR
}

#[inline]
pub(crate) fn is_wildcard_subtype(media_type: &Mime) -> bool {
	media_type.subtype() == mime::STAR
}

#[inline]
pub(crate) fn is_concrete(media_type: &Mime) -> bool {
	!is_wildcard_type(media_type) && !is_wildcard_subtype(media_type)
}

/// Checks whether two media types are compatible. Media types are compatible when
/// either of them is `*/*`, or their types are equal and either their subtypes are
/// equal or one of them is a wildcard.
pub fn is_compatible(a: &Mime, b: &Mime) -> bool {
	if is_wildcard_type(a) || is_wildcard_type(b) {
		return true;
	}

	if a.type_() != b.type_() {
		return false;
	}

	is_wildcard_subtype(a) || is_wildcard_subtype(b) || a.subtype() == b.subtype()
}

/// Orders media types by specificity. An explicit media type comes before a media
/// type with a wildcard subtype, which comes before the full wildcard.
pub fn compare_specificity(a: &Mime, b: &Mime) -> Ordering {
	specificity_rank(a).cmp(&specificity_rank(b))
}

#[inline]
fn specificity_rank(media_type: &Mime) -> u8 {
	if is_wildcard_type(media_type) {
		2
	} else if is_wildcard_subtype(media_type) {
		1
	} else {
		0
	}
}

/// Sorts the media types by specificity, keeping the declaration order of the
/// equally specific ones.
pub(crate) fn sort_by_specificity(media_types: &mut [Mime]) {
	media_types.sort_by(compare_specificity);
}

// --------------------------------------------------------------------------------

/// Returns the quality with which the `produces` media types are acceptable.
///
/// The `accept` list must be in descending quality order. A `*/*` range matches any
/// produced media type. Otherwise, the quality of the first range compatible with
/// any of the `produces` is returned. Returns 0.0 when nothing is acceptable.
pub fn best_quality(accept: &[AcceptMediaType], produces: &[Mime]) -> f32 {
	for accept_media_type in accept {
		if is_wildcard_type(&accept_media_type.media_type) {
			return accept_media_type.quality;
		}

		if produces
			.iter()
			.any(|media_type| is_compatible(&accept_media_type.media_type, media_type))
		{
			return accept_media_type.quality;
		}
	}

	0.0
}

/// Returns the most specific media type that is both acceptable and produced.
///
/// Ranges with the quality 0 are skipped. The returned media type may still be a
/// wildcard when both the acceptable range and the produced media type are wildcards.
pub fn acceptable_media_type(accept: &[AcceptMediaType], produces: &[Mime]) -> Option<Mime> {
	for accept_media_type in accept.iter().filter(|media_type| media_type.quality > 0.0) {
		for media_type in produces {
			if !is_compatible(&accept_media_type.media_type, media_type) {
				continue;
			}

			return Some(
				match compare_specificity(media_type, &accept_media_type.media_type) {
					Ordering::Greater => accept_media_type.media_type.clone(),
					_ => media_type.clone(),
				},
			);
		}
	}

	None
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use http::HeaderValue;

	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	fn accept(value: &'static str) -> Vec<AcceptMediaType> {
		let mut headers = HeaderMap::new();
		headers.insert(ACCEPT, HeaderValue::from_static(value));

		super::acceptable_media_types(&headers)
	}

	fn media_types(values: &[&str]) -> Vec<Mime> {
		values.iter().map(|value| value.parse().unwrap()).collect()
	}

	// --------------------------------------------------

	#[test]
	fn acceptable_media_types() {
		let media_types = super::acceptable_media_types(&HeaderMap::new());
		assert_eq!(media_types, [AcceptMediaType::new(mime::STAR_STAR, 1.0)]);

		let media_types = accept("text/*;q=0.3, text/html;q=0.7, text/html;level=1, */*;q=0.5");
		let essences = media_types
			.iter()
			.map(|media_type| (media_type.media_type().essence_str(), media_type.quality()))
			.collect::<Vec<_>>();

		assert_eq!(
			essences,
			[
				("text/html", 1.0),
				("text/html", 0.7),
				("*/*", 0.5),
				("text/*", 0.3),
			]
		);

		assert!(media_types[0].media_type().get_param("level").is_some());
		assert!(media_types[1].media_type().get_param("q").is_none());

		let media_types = accept("bad, also-bad;q=2");
		assert_eq!(media_types, [AcceptMediaType::new(mime::STAR_STAR, 1.0)]);
	}

	#[test]
	fn is_compatible() {
		let cases = [
			("*/*", "text/plain", true),
			("text/plain", "*/*", true),
			("text/*", "text/plain", true),
			("text/plain", "text/*", true),
			("text/plain", "text/plain", true),
			("text/plain", "text/html", false),
			("text/*", "application/json", false),
		];

		for (a, b, compatible) in cases {
			dbg!((a, b));

			let a = a.parse::<Mime>().unwrap();
			let b = b.parse::<Mime>().unwrap();
			assert_eq!(super::is_compatible(&a, &b), compatible);
		}
	}

	#[test]
	fn sort_by_specificity() {
		let mut media_types = media_types(&["*/*", "text/*", "application/json", "text/plain"]);
		super::sort_by_specificity(&mut media_types);

		assert_eq!(
			media_types,
			super::test::media_types(&["application/json", "text/plain", "text/*", "*/*"]),
		);
	}

	#[test]
	fn best_quality() {
		let produces = media_types(&["application/json"]);

		assert_eq!(super::best_quality(&accept("*/*"), &produces), 1.0);
		assert_eq!(
			super::best_quality(&accept("text/plain, */*;q=0.2"), &produces),
			0.2
		);
		assert_eq!(
			super::best_quality(&accept("application/*;q=0.8, text/plain"), &produces),
			0.8
		);
		assert_eq!(super::best_quality(&accept("text/plain"), &produces), 0.0);

		let produces = media_types(&["*/*"]);
		assert_eq!(super::best_quality(&accept("text/plain;q=0.4"), &produces), 0.4);
	}

	#[test]
	fn acceptable_media_type() {
		let produces = media_types(&["application/json", "text/plain"]);

		assert_eq!(
			super::acceptable_media_type(&accept("*/*"), &produces),
			Some(mime::APPLICATION_JSON)
		);
		assert_eq!(
			super::acceptable_media_type(&accept("text/*"), &produces),
			Some(mime::TEXT_PLAIN)
		);
		assert_eq!(
			super::acceptable_media_type(&accept("application/json;q=0, text/plain;q=0.1"), &produces),
			Some(mime::TEXT_PLAIN)
		);
		assert_eq!(
			super::acceptable_media_type(&accept("image/png"), &produces),
			None
		);

		let produces = media_types(&["*/*"]);
		assert_eq!(
			super::acceptable_media_type(&accept("text/html"), &produces),
			Some(mime::TEXT_HTML)
		);
		assert_eq!(
			super::acceptable_media_type(&accept("*/*"), &produces),
			Some(mime::STAR_STAR)
		);
	}
}
