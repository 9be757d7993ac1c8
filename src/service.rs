//! The HTTP adapter of the request handler.

// ----------

use std::{
	convert::Infallible,
	sync::Arc,
	task::{Context, Poll},
};

use futures_util::future::BoxFuture;
use restive_core::body::{collect_limited, HttpBody};

use crate::{
	common::BoxedError,
	handler::RequestHandler,
	request::{ContainerRequest, Request},
	response::{IntoResponse, Response, ResponseError},
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// RestService

/// A service that buffers the request body and passes the request to the
/// [`RequestHandler`].
///
/// The service implements both hyper's and tower's `Service` traits. Bodies larger
/// than the handler's size limit are answered with `413 Payload Too Large`.
#[derive(Clone)]
pub struct RestService {
	handler: Arc<RequestHandler>,
}

impl RestService {
	pub fn new(handler: RequestHandler) -> Self {
		Self {
			handler: Arc::new(handler),
		}
	}

	#[inline(always)]
	pub fn handler(&self) -> &RequestHandler {
		&self.handler
	}

	async fn handle<B>(handler: Arc<RequestHandler>, request: Request<B>) -> Response
	where
		B: HttpBody,
		B::Error: Into<BoxedError>,
	{
		let (head, body) = request.into_parts();

		let body = match collect_limited(body, handler.body_size_limit()).await {
			Ok(body) => body,
			Err(error) => {
				tracing::debug!("{} {}: {}", head.method, head.uri, error);

				return ResponseError::from(error).into_response();
			}
		};

		let request = ContainerRequest::from_http(Request::from_parts(head, body));

		handler.process(request).into_response()
	}
}

impl From<RequestHandler> for RestService {
	#[inline(always)]
	fn from(handler: RequestHandler) -> Self {
		Self::new(handler)
	}
}

impl<B> hyper::service::Service<Request<B>> for RestService
where
	B: HttpBody + Send + 'static,
	B::Data: Send,
	B::Error: Into<BoxedError>,
{
	type Response = Response;
	type Error = Infallible;
	type Future = BoxFuture<'static, Result<Response, Infallible>>;

	fn call(&self, request: Request<B>) -> Self::Future {
		let handler = self.handler.clone();

		Box::pin(async move { Ok(Self::handle(handler, request).await) })
	}
}

impl<B> tower_service::Service<Request<B>> for RestService
where
	B: HttpBody + Send + 'static,
	B::Data: Send,
	B::Error: Into<BoxedError>,
{
	type Response = Response;
	type Error = Infallible;
	type Future = BoxFuture<'static, Result<Response, Infallible>>;

	#[inline(always)]
	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	#[inline(always)]
	fn call(&mut self, request: Request<B>) -> Self::Future {
		<Self as hyper::service::Service<Request<B>>>::call(self, request)
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
