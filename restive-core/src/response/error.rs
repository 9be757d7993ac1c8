use std::fmt::{self, Display, Formatter};

use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};

use crate::{
	body::{Body, BodyError},
	BoxedError, StdError,
};

use super::{IntoResponse, Response};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ResponseError

/// A transport level failure that is answered before the request reaches the
/// dispatcher, e.g. a body that exceeds the size limit.
///
/// The error message, if any, becomes the `text/plain` body of the response.
#[derive(Debug)]
pub struct ResponseError {
	status_code: StatusCode,
	some_boxed_error: Option<BoxedError>,
}

impl ResponseError {
	pub fn new<E>(status_code: StatusCode, error: E) -> Self
	where
		E: Into<BoxedError>,
	{
		ResponseError {
			status_code,
			some_boxed_error: Some(error.into()),
		}
	}

	#[inline(always)]
	pub fn status_code(&self) -> StatusCode {
		self.status_code
	}
}

impl From<StatusCode> for ResponseError {
	fn from(status_code: StatusCode) -> Self {
		ResponseError {
			status_code,
			some_boxed_error: None,
		}
	}
}

impl From<BodyError> for ResponseError {
	fn from(body_error: BodyError) -> Self {
		match body_error {
			BodyError::ContentTooLarge => ResponseError::new(StatusCode::PAYLOAD_TOO_LARGE, body_error),
			BodyError::BufferingFailure(_) => ResponseError::new(StatusCode::BAD_REQUEST, body_error),
		}
	}
}

impl Display for ResponseError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "[{}]", self.status_code)?;

		if let Some(boxed_error) = self.some_boxed_error.as_ref() {
			write!(f, " {}", boxed_error)?
		}

		Ok(())
	}
}

impl StdError for ResponseError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self
			.some_boxed_error
			.as_ref()
			.map(|boxed_error| boxed_error.as_ref() as &(dyn StdError + 'static))
	}
}

impl IntoResponse for ResponseError {
	fn into_response(self) -> Response {
		let mut response = self.status_code.into_response();

		if let Some(boxed_error) = self.some_boxed_error {
			*response.body_mut() = Body::from(boxed_error.to_string());
			response.headers_mut().insert(
				CONTENT_TYPE,
				HeaderValue::from_static(mime::TEXT_PLAIN_UTF_8.as_ref()),
			);
		}

		response
	}
}

// --------------------------------------------------------------------------------


// --------------------------------------------------------------------------------
