//! The response type the dispatcher produces and the conversions into it.

// ----------

use bytes::Bytes;
use http::{
	header::{ALLOW, CONTENT_TYPE},
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
};
use mime::Mime;

use restive_core::body::Body;

use crate::{common::BoxedError, data::entity::Entity};

// ----------

pub use restive_core::response::*;

// --------------------------------------------------

mod error;
pub use error::WebApplicationError;

pub(crate) use error::Failure;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ContainerResponse

/// An outgoing response with an optional, not yet written entity.
///
/// The entity is written by an entity writer after the response filters run.
#[derive(Debug)]
pub struct ContainerResponse {
	status: StatusCode,
	headers: HeaderMap,
	some_entity: Option<Entity>,
}

impl ContainerResponse {
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			some_entity: None,
		}
	}

	#[inline(always)]
	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	#[inline(always)]
	pub fn no_content() -> Self {
		Self::new(StatusCode::NO_CONTENT)
	}

	pub fn with_entity<E: Into<Entity>>(mut self, entity: E) -> Self {
		self.some_entity = Some(entity.into());

		self
	}

	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	pub fn with_content_type(mut self, media_type: &Mime) -> Self {
		self.set_content_type(media_type);

		self
	}

	#[inline(always)]
	pub fn status(&self) -> StatusCode {
		self.status
	}

	#[inline(always)]
	pub fn set_status(&mut self, status: StatusCode) {
		self.status = status;
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
	pub fn entity(&self) -> Option<&Entity> {
		self.some_entity.as_ref()
	}

	#[inline(always)]
	pub fn has_entity(&self) -> bool {
		self.some_entity.is_some()
	}

	#[inline(always)]
	pub fn set_entity(&mut self, some_entity: Option<Entity>) {
		self.some_entity = some_entity;
	}

	#[inline(always)]
	pub fn take_entity(&mut self) -> Option<Entity> {
		self.some_entity.take()
	}

	/// Returns the `Content-Type` of the response. A malformed value is ignored.
	pub fn content_type(&self) -> Option<Mime> {
		self
			.headers
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.parse().ok())
	}

	pub fn set_content_type(&mut self, media_type: &Mime) {
		if let Ok(value) = HeaderValue::from_str(media_type.as_ref()) {
			self.headers.insert(CONTENT_TYPE, value);
		}
	}

	/// Returns the written body. It's available after the request was processed.
	pub fn body(&self) -> Option<&Bytes> {
		self
			.some_entity
			.as_ref()
			.and_then(|entity| entity.downcast_ref::<Bytes>())
	}

	pub(crate) fn set_allow<'m, M>(&mut self, methods: M)
	where
		M: IntoIterator<Item = &'m Method>,
	{
		let allow = methods
			.into_iter()
			.map(Method::as_str)
			.collect::<Vec<_>>()
			.join(", ");

		if let Ok(value) = HeaderValue::from_str(&allow) {
			self.headers.insert(ALLOW, value);
		}
	}
}

impl IntoResponse for ContainerResponse {
	fn into_response(self) -> Response {
		let ContainerResponse {
			status,
			headers,
			some_entity,
		} = self;

		let body = match some_entity.map(|entity| entity.downcast::<Bytes>()) {
			Some(Ok(bytes)) => Body::from(bytes),
			Some(Err(entity)) => {
				tracing::warn!("unwritten {} entity dropped", entity.type_name());

				Body::empty()
			}
			None => Body::empty(),
		};

		let mut response = Response::new(body);
		*response.status_mut() = status;
		*response.headers_mut() = headers;

		response
	}
}

// --------------------------------------------------------------------------------

// --------------------------------------------------
// MethodResult

/// The outcome of a successfully invoked resource method.
#[derive(Debug)]
pub enum MethodResult {
	/// Answered with `204 No Content`.
	NoContent,
	/// Answered with `200 OK` and the entity written in the negotiated media type.
	Entity(Entity),
	/// Answered as is. A missing `Content-Type` is set to the negotiated media type.
	Response(ContainerResponse),
}

// --------------------------------------------------
// IntoMethodResult trait

/// Implemented by the return types of resource methods.
pub trait IntoMethodResult {
	fn into_method_result(self) -> Result<MethodResult, BoxedError>;
}

impl IntoMethodResult for MethodResult {
	#[inline(always)]
	fn into_method_result(self) -> Result<MethodResult, BoxedError> {
		Ok(self)
	}
}

impl IntoMethodResult for () {
	#[inline(always)]
	fn into_method_result(self) -> Result<MethodResult, BoxedError> {
		Ok(MethodResult::NoContent)
	}
}

impl IntoMethodResult for Entity {
	#[inline(always)]
	fn into_method_result(self) -> Result<MethodResult, BoxedError> {
		Ok(MethodResult::Entity(self))
	}
}

impl IntoMethodResult for ContainerResponse {
	#[inline(always)]
	fn into_method_result(self) -> Result<MethodResult, BoxedError> {
		Ok(MethodResult::Response(self))
	}
}

macro_rules! impl_into_method_result_for_entity {
	($($type:ty),+) => {
		$(
			impl IntoMethodResult for $type {
				#[inline]
				fn into_method_result(self) -> Result<MethodResult, BoxedError> {
					Ok(MethodResult::Entity(Entity::new(self)))
				}
			}
		)+
	};
}

impl_into_method_result_for_entity!(String, &'static str, Vec<u8>, Bytes);

impl<T: IntoMethodResult> IntoMethodResult for Option<T> {
	fn into_method_result(self) -> Result<MethodResult, BoxedError> {
		match self {
			Some(value) => value.into_method_result(),
			None => Ok(MethodResult::NoContent),
		}
	}
}

impl<T, E> IntoMethodResult for Result<T, E>
where
	T: IntoMethodResult,
	E: Into<BoxedError>,
{
	fn into_method_result(self) -> Result<MethodResult, BoxedError> {
		self.map_err(Into::into)?.into_method_result()
	}
}

impl<T: IntoMethodResult> IntoMethodResult for (StatusCode, T) {
	fn into_method_result(self) -> Result<MethodResult, BoxedError> {
		let (status, value) = self;

		let response = match value.into_method_result()? {
			MethodResult::NoContent => ContainerResponse::new(status),
			MethodResult::Entity(entity) => ContainerResponse::new(status).with_entity(entity),
			MethodResult::Response(mut response) => {
				response.set_status(status);

				response
			}
		};

		Ok(MethodResult::Response(response))
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
