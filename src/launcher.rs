//! Synchronous request processing without a transport.

// ----------

use std::str::FromStr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};

use crate::{
	handler::RequestHandler,
	request::ContainerRequest,
	response::ContainerResponse,
	ImplError,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ResourceLauncher

/// Builds requests from their parts and processes them with a [`RequestHandler`].
///
/// ```ignore
/// let response = launcher
/// 	.request("POST", "/books?sorted")
/// 	.header("content-type", "application/json")
/// 	.body(r#"{"title":"Hamlet"}"#)
/// 	.send()?;
/// ```
pub struct ResourceLauncher {
	handler: RequestHandler,
}

impl ResourceLauncher {
	pub fn new(handler: RequestHandler) -> Self {
		Self { handler }
	}

	#[inline(always)]
	pub fn handler(&self) -> &RequestHandler {
		&self.handler
	}

	#[inline(always)]
	pub fn handler_mut(&mut self) -> &mut RequestHandler {
		&mut self.handler
	}

	pub fn request<'l>(&'l self, method: &str, path_and_query: &str) -> LaunchRequest<'l> {
		let some_method = Method::from_str(method)
			.map_err(|_| LaunchError::InvalidMethod(method.into()));

		let some_uri = Uri::from_str(path_and_query)
			.map_err(|_| LaunchError::InvalidUri(path_and_query.into()));

		let result = some_method.and_then(|method| some_uri.map(|uri| (method, uri)));

		LaunchRequest {
			launcher: self,
			result: result.map(|(method, uri)| (method, uri, HeaderMap::new())),
			body: Bytes::new(),
		}
	}

	/// Processes the request with an empty body and no headers.
	pub fn service(
		&self,
		method: &str,
		path_and_query: &str,
	) -> Result<ContainerResponse, LaunchError> {
		self.request(method, path_and_query).send()
	}
}

// --------------------------------------------------
// LaunchRequest

/// A request being built by the [`ResourceLauncher`]. The first invalid part is
/// reported by [`send()`](Self::send).
pub struct LaunchRequest<'l> {
	launcher: &'l ResourceLauncher,
	result: Result<(Method, Uri, HeaderMap), LaunchError>,
	body: Bytes,
}

impl<'l> LaunchRequest<'l> {
	pub fn header(mut self, name: &str, value: &str) -> Self {
		if let Ok((_, _, headers)) = self.result.as_mut() {
			let some_header = HeaderName::from_str(name)
				.ok()
				.zip(HeaderValue::from_str(value).ok());

			match some_header {
				Some((name, value)) => {
					headers.append(name, value);
				}
				None => self.result = Err(LaunchError::InvalidHeader(name.into())),
			}
		}

		self
	}

	pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
		self.body = body.into();

		self
	}

	pub fn send(self) -> Result<ContainerResponse, LaunchError> {
		let (method, uri, headers) = self.result?;
		let request = ContainerRequest::new(method, uri, headers, self.body);

		Ok(self.launcher.handler.process(request))
	}
}

// --------------------------------------------------

/// An error returned when a part of the launched request is invalid.
#[derive(Debug, ImplError)]
pub enum LaunchError {
	#[error("invalid method {0}")]
	InvalidMethod(Box<str>),
	#[error("invalid URI {0}")]
	InvalidUri(Box<str>),
	#[error("invalid header {0}")]
	InvalidHeader(Box<str>),
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use http::StatusCode;

	use crate::{
		binder::ResourceBinder,
		data::Param,
		provider::ProviderBinder,
		resource::{Args, ResourceDescriptor, _get, _put},
	};

	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	struct Greeting;

	fn launcher() -> ResourceLauncher {
		let resources = ResourceBinder::new();
		resources
			.add_resource(
				ResourceDescriptor::root::<Greeting>("/greeting")
					.singleton(Greeting)
					.method(
						_get(|_: &Greeting, args: &mut Args| {
							let name = args.take::<String>()?;
							let mark = args.take::<String>()?;

							Ok::<_, crate::resource::ArgsError>(format!("Hello, {}{}", name, mark))
						})
						.param(Param::query::<String>("name").default_value("World"))
						.param(Param::header::<String>("x-mark").default_value("!")),
					)
					.method(
						_put(|_: &Greeting, args: &mut Args| args.take::<String>())
							.param(Param::raw_entity::<String>()),
					)
					.build()
					.unwrap(),
			)
			.unwrap();

		ResourceLauncher::new(RequestHandler::new(
			Arc::new(resources),
			Arc::new(ProviderBinder::new()),
		))
	}

	fn text(response: &ContainerResponse) -> &str {
		std::str::from_utf8(response.body().unwrap()).unwrap()
	}

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	#[test]
	fn launch() {
		let launcher = launcher();

		let response = launcher.service("GET", "/greeting").unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(text(&response), "Hello, World!");

		let response = launcher
			.request("GET", "/greeting?name=Horatio")
			.header("x-mark", "?")
			.send()
			.unwrap();

		assert_eq!(text(&response), "Hello, Horatio?");

		let response = launcher
			.request("PUT", "/greeting")
			.header("content-type", "text/plain")
			.body("Good night")
			.send()
			.unwrap();

		assert_eq!(text(&response), "Good night");

		assert!(matches!(
			launcher.service("GE T", "/greeting"),
			Err(LaunchError::InvalidMethod(_))
		));

		assert!(matches!(
			launcher.request("GET", "/greeting").header("x mark", "!").send(),
			Err(LaunchError::InvalidHeader(_))
		));
	}
}
