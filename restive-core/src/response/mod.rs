//! Response types and conversion traits into them.

// ----------

use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};

use crate::body::{Body, Bytes};

// ----------

pub use http::response::Builder;

// --------------------------------------------------

mod error;
pub use error::ResponseError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub type Response<B = Body> = http::response::Response<B>;
pub type ResponseHeadParts = http::response::Parts;

// --------------------------------------------------------------------------------

// --------------------------------------------------
// IntoResponse trait

/// Implemented by types that can be converted into the [Response] type.
pub trait IntoResponse {
	fn into_response(self) -> Response;
}

impl IntoResponse for Response {
	fn into_response(self) -> Response {
		self
	}
}

// --------------------------------------------------
// StatusCode

impl IntoResponse for StatusCode {
	#[inline]
	fn into_response(self) -> Response {
		let mut response = Response::default();
		*response.status_mut() = self;

		response
	}
}

// --------------------------------------------------
// Unit ()

impl IntoResponse for () {
	#[inline]
	fn into_response(self) -> Response {
		Response::default()
	}
}

// --------------------------------------------------
// String

impl IntoResponse for String {
	#[inline]
	fn into_response(self) -> Response {
		let mut response = Response::new(Body::from(self));
		response.headers_mut().insert(
			CONTENT_TYPE,
			HeaderValue::from_static(mime::TEXT_PLAIN_UTF_8.as_ref()),
		);

		response
	}
}

// --------------------------------------------------
// Bytes

impl IntoResponse for Bytes {
	#[inline]
	fn into_response(self) -> Response {
		let mut response = Response::new(Body::from(self));
		response.headers_mut().insert(
			CONTENT_TYPE,
			HeaderValue::from_static(mime::APPLICATION_OCTET_STREAM.as_ref()),
		);

		response
	}
}

// --------------------------------------------------
// (StatusCode, T)

impl<T: IntoResponse> IntoResponse for (StatusCode, T) {
	#[inline]
	fn into_response(self) -> Response {
		let (status_code, value) = self;

		let mut response = value.into_response();
		*response.status_mut() = status_code;

		response
	}
}

// --------------------------------------------------------------------------------
