use std::fmt::{self, Display, Formatter};

use http::StatusCode;

use crate::{common::BoxedError, StdError};

use super::ContainerResponse;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// WebApplicationError

/// An error that carries the response to answer the request with.
///
/// Returned from resource methods, filters, and entity providers to respond early.
/// A response with a status below 500 is always honored. A response with a status of
/// 500 or above and without an entity may be replaced by an exception mapper.
#[derive(Debug)]
pub struct WebApplicationError {
	response: ContainerResponse,
	some_cause: Option<BoxedError>,
}

impl WebApplicationError {
	pub fn new(response: ContainerResponse) -> Self {
		Self {
			response,
			some_cause: None,
		}
	}

	pub fn with_cause<E: Into<BoxedError>>(response: ContainerResponse, cause: E) -> Self {
		Self {
			response,
			some_cause: Some(cause.into()),
		}
	}

	#[inline(always)]
	pub fn status(&self) -> StatusCode {
		self.response.status()
	}

	#[inline(always)]
	pub fn response(&self) -> &ContainerResponse {
		&self.response
	}

	#[inline(always)]
	pub fn into_response(self) -> ContainerResponse {
		self.response
	}
}

impl From<StatusCode> for WebApplicationError {
	fn from(status: StatusCode) -> Self {
		Self::new(ContainerResponse::new(status))
	}
}

impl From<ContainerResponse> for WebApplicationError {
	fn from(response: ContainerResponse) -> Self {
		Self::new(response)
	}
}

impl Display for WebApplicationError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "[{}]", self.response.status())?;

		if let Some(cause) = self.some_cause.as_ref() {
			write!(f, " {}", cause)?
		}

		Ok(())
	}
}

impl StdError for WebApplicationError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self
			.some_cause
			.as_ref()
			.map(|cause| cause.as_ref() as &(dyn StdError + 'static))
	}
}

// --------------------------------------------------
// Failure

// A failed request processing step, either an early response or a genuine fault.
#[derive(Debug)]
pub(crate) enum Failure {
	Respond(WebApplicationError),
	Fault(BoxedError),
}

impl From<BoxedError> for Failure {
	fn from(error: BoxedError) -> Self {
		match error.downcast::<WebApplicationError>() {
			Ok(web_application_error) => Failure::Respond(*web_application_error),
			Err(error) => Failure::Fault(error),
		}
	}
}

impl From<WebApplicationError> for Failure {
	#[inline(always)]
	fn from(error: WebApplicationError) -> Self {
		Failure::Respond(error)
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
