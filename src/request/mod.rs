//! The request type the dispatcher works on.

// ----------

use std::borrow::Cow;

use bytes::Bytes;
use http::{
	header::{ACCEPT_CHARSET, ACCEPT_LANGUAGE},
	Extensions, HeaderMap, HeaderName, Method, Uri,
};
use mime::Mime;

#[cfg(feature = "cookies")]
use cookie::Cookie;

#[cfg(feature = "cookies")]
use http::header::COOKIE;

use crate::{
	common::{
		decode_path_component,
		header_utils::{content_type, split_header_value_with_weights},
		parse_urlencoded,
	},
	media::{acceptable_media_types, AcceptMediaType},
};

// ----------

pub use restive_core::request::*;

pub use crate::common::header_utils::ContentTypeError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ContainerRequest

/// An inbound request with a fully buffered body.
///
/// Request filters may change the method and the path before the request is
/// dispatched. Extensions hold the per-request attributes.
#[derive(Debug, Clone)]
pub struct ContainerRequest {
	method: Method,
	uri: Uri,
	path: String,
	headers: HeaderMap,
	extensions: Extensions,
	body: Bytes,
}

impl ContainerRequest {
	pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
		let path = uri.path().to_owned();

		Self {
			method,
			uri,
			path,
			headers,
			extensions: Extensions::new(),
			body,
		}
	}

	pub fn from_http(request: Request<Bytes>) -> Self {
		let (head, body) = request.into_parts();

		let mut container_request = Self::new(head.method, head.uri, head.headers, body);
		container_request.extensions = head.extensions;

		container_request
	}

	#[inline(always)]
	pub fn method(&self) -> &Method {
		&self.method
	}

	#[inline(always)]
	pub fn set_method(&mut self, method: Method) {
		self.method = method;
	}

	#[inline(always)]
	pub fn uri(&self) -> &Uri {
		&self.uri
	}

	/// Returns the raw (percent-encoded) path, including the matrix parameters.
	#[inline(always)]
	pub fn path(&self) -> &str {
		&self.path
	}

	#[inline(always)]
	pub fn set_path<P: Into<String>>(&mut self, path: P) {
		self.path = path.into();
	}

	#[inline(always)]
	pub fn query(&self) -> Option<&str> {
		self.uri.query()
	}

	#[inline(always)]
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	#[inline(always)]
	pub fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	#[inline(always)]
	pub fn extensions(&self) -> &Extensions {
		&self.extensions
	}

	#[inline(always)]
	pub fn extensions_mut(&mut self) -> &mut Extensions {
		&mut self.extensions
	}

	#[inline(always)]
	pub fn body(&self) -> &Bytes {
		&self.body
	}

	#[inline(always)]
	pub fn set_body(&mut self, body: Bytes) {
		self.body = body;
	}

	/// Returns the values of the header in the order of their appearance.
	pub fn header_values(&self, name: &HeaderName) -> Vec<String> {
		self
			.headers
			.get_all(name)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.map(ToOwned::to_owned)
			.collect()
	}

	pub fn content_type(&self) -> Result<Option<Mime>, ContentTypeError> {
		content_type(&self.headers)
	}

	pub fn acceptable_media_types(&self) -> Vec<AcceptMediaType> {
		acceptable_media_types(&self.headers)
	}

	/// Returns the languages from the `Accept-Language` header in descending quality
	/// order. A malformed header is ignored.
	pub fn acceptable_languages(&self) -> Vec<(String, f32)> {
		weighted_values(&self.headers, &ACCEPT_LANGUAGE)
	}

	/// Returns the charsets from the `Accept-Charset` header in descending quality
	/// order. A malformed header is ignored.
	pub fn acceptable_charsets(&self) -> Vec<(String, f32)> {
		weighted_values(&self.headers, &ACCEPT_CHARSET)
	}

	// The path without the matrix parameters. Used for matching.
	pub(crate) fn matching_path(&self) -> Cow<'_, str> {
		if !self.path.contains(';') {
			return Cow::Borrowed(&self.path);
		}

		let path = self
			.path
			.split('/')
			.map(|segment| segment.split_once(';').map_or(segment, |(segment, _)| segment))
			.collect::<Vec<_>>()
			.join("/");

		Cow::Owned(path)
	}

	pub fn path_segments(&self, decode: bool) -> Vec<PathSegment> {
		self
			.path
			.split('/')
			.skip(1)
			.map(|segment| PathSegment::parse(segment, decode))
			.collect()
	}

	pub fn query_parameters(&self, decode: bool) -> Vec<(String, String)> {
		self
			.query()
			.map(|query| parse_urlencoded(query, decode))
			.unwrap_or_default()
	}

	/// Returns the cookies of the `Cookie` header. Malformed cookies are skipped.
	#[cfg(feature = "cookies")]
	pub fn cookies(&self) -> Vec<(String, String)> {
		self
			.headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.flat_map(Cookie::split_parse_encoded)
			.filter_map(Result::ok)
			.map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
			.collect()
	}
}

fn weighted_values(headers: &HeaderMap, name: &HeaderName) -> Vec<(String, f32)> {
	let Some(header_value) = headers.get(name) else {
		return Vec::new();
	};

	split_header_value_with_weights(header_value)
		.map(|values| {
			values
				.into_iter()
				.map(|(value, weight)| (value.to_owned(), weight))
				.collect()
		})
		.unwrap_or_default()
}

// --------------------------------------------------
// PathSegment

/// A path segment with its matrix parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
	path: String,
	matrix_parameters: Vec<(String, String)>,
}

impl PathSegment {
	fn parse(segment: &str, decode: bool) -> Self {
		let decode = |component: &str| {
			if decode {
				decode_path_component(component)
			} else {
				component.to_owned()
			}
		};

		let mut parts = segment.split(';');
		let path = decode(parts.next().unwrap_or_default());

		let matrix_parameters = parts
			.filter(|parameter| !parameter.is_empty())
			.map(|parameter| {
				let (name, value) = parameter.split_once('=').unwrap_or((parameter, ""));

				(decode(name), decode(value))
			})
			.collect();

		Self {
			path,
			matrix_parameters,
		}
	}

	#[inline(always)]
	pub fn path(&self) -> &str {
		&self.path
	}

	#[inline(always)]
	pub fn matrix_parameters(&self) -> &[(String, String)] {
		&self.matrix_parameters
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use http::HeaderValue;

	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	fn request(uri: &'static str) -> ContainerRequest {
		ContainerRequest::new(
			Method::GET,
			Uri::from_static(uri),
			HeaderMap::new(),
			Bytes::new(),
		)
	}

	// --------------------------------------------------

	#[test]
	fn matching_path() {
		let request = super::test::request("/a/b;x=1;y=2/c;z");
		assert_eq!(request.matching_path(), "/a/b/c");

		let request = super::test::request("/a/b/c");
		assert!(matches!(request.matching_path(), Cow::Borrowed("/a/b/c")));
	}

	#[test]
	fn path_segments() {
		let request = super::test::request("/a%20b/c;x=1%232;flag");

		let segments = request.path_segments(true);
		assert_eq!(segments.len(), 2);
		assert_eq!(segments[0].path(), "a b");
		assert_eq!(segments[1].path(), "c");
		assert_eq!(
			segments[1].matrix_parameters(),
			[
				("x".to_owned(), "1#2".to_owned()),
				("flag".to_owned(), String::new())
			]
		);

		let segments = request.path_segments(false);
		assert_eq!(segments[0].path(), "a%20b");
		assert_eq!(segments[1].matrix_parameters()[0].1, "1%232");
	}

	#[test]
	fn query_parameters() {
		let request = super::test::request("/a?x=1&y=a+b&x=2");

		assert_eq!(
			request.query_parameters(true),
			[
				("x".to_owned(), "1".to_owned()),
				("y".to_owned(), "a b".to_owned()),
				("x".to_owned(), "2".to_owned()),
			]
		);

		assert_eq!(request.query_parameters(false)[1].1, "a+b");
	}

	#[test]
	fn acceptable_languages() {
		let mut request = super::test::request("/");
		assert!(request.acceptable_languages().is_empty());

		request.headers_mut().insert(
			ACCEPT_LANGUAGE,
			HeaderValue::from_static("en;q=0.5, fr, de;q=0.7"),
		);

		assert_eq!(
			request.acceptable_languages(),
			[
				("fr".to_owned(), 1.0),
				("de".to_owned(), 0.7),
				("en".to_owned(), 0.5),
			]
		);
	}

	#[cfg(feature = "cookies")]
	#[test]
	fn cookies() {
		let mut request = super::test::request("/");
		request
			.headers_mut()
			.insert(COOKIE, HeaderValue::from_static("a=1; b=x%20y"));

		assert_eq!(
			request.cookies(),
			[
				("a".to_owned(), "1".to_owned()),
				("b".to_owned(), "x y".to_owned()),
			]
		);
	}
}
