//! Types and traits for request and response bodies.

// ----------

use std::{
	pin::{pin, Pin},
	task::{Context, Poll},
};

use http_body_util::{BodyExt, Empty, Full, LengthLimitError, Limited};

use crate::{BoxedError, ImplError};

// ----------

pub use bytes::*;
pub use http_body::Body as HttpBody;
pub use http_body::{Frame, SizeHint};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

type BoxedBody = http_body_util::combinators::BoxBody<Bytes, BoxedError>;

// --------------------------------------------------
// Body

/// An [`HttpBody`] type used in outgoing responses.
#[derive(Debug, Default)]
pub struct Body(BoxedBody);

impl Body {
	#[inline(always)]
	pub fn new<B>(body: B) -> Self
	where
		B: HttpBody<Data = Bytes> + Sized + Send + Sync + 'static,
		B::Error: Into<BoxedError>,
	{
		Self(BoxedBody::new(body.map_err(Into::into)))
	}

	#[inline(always)]
	pub fn empty() -> Self {
		Self::new(Empty::<Bytes>::new())
	}
}

impl HttpBody for Body {
	type Data = Bytes;
	type Error = BoxedError;

	#[inline(always)]
	fn poll_frame(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
	) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
		pin!(&mut self.0).poll_frame(cx)
	}

	#[inline(always)]
	fn size_hint(&self) -> SizeHint {
		self.0.size_hint()
	}
}

// -------------------------

impl From<()> for Body {
	#[inline]
	fn from(_value: ()) -> Self {
		Self::default()
	}
}

impl From<Bytes> for Body {
	#[inline]
	fn from(bytes: Bytes) -> Self {
		Self::new(Full::from(bytes))
	}
}

impl From<String> for Body {
	#[inline]
	fn from(string_body: String) -> Self {
		Self::new(Full::from(string_body))
	}
}

impl From<&'static str> for Body {
	#[inline]
	fn from(str_body: &'static str) -> Self {
		Self::new(Full::from(str_body))
	}
}

impl From<Vec<u8>> for Body {
	#[inline]
	fn from(vec_body: Vec<u8>) -> Self {
		Self::new(Full::from(vec_body))
	}
}

// --------------------------------------------------------------------------------

/// Collects all the frames of the `body` into a single [`Bytes`] buffer.
///
/// Fails with [`BodyError::ContentTooLarge`] when the body exceeds the `size_limit`.
pub async fn collect_limited<B>(body: B, size_limit: usize) -> Result<Bytes, BodyError>
where
	B: HttpBody,
	B::Error: Into<BoxedError>,
{
	match Limited::new(body, size_limit).collect().await {
		Ok(collected) => Ok(collected.to_bytes()),
		Err(error) => {
			if error.is::<LengthLimitError>() {
				Err(BodyError::ContentTooLarge)
			} else {
				Err(BodyError::BufferingFailure(error))
			}
		}
	}
}

/// An error returned when collecting the body frames fails.
#[derive(Debug, ImplError)]
pub enum BodyError {
	#[error("content too large")]
	ContentTooLarge,
	#[error("buffering failure: {0}")]
	BufferingFailure(BoxedError),
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------


// --------------------------------------------------------------------------------
