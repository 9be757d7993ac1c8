//! The request processing pipeline around the dispatcher.

// ----------

use std::{fmt::Write, sync::Arc};

use http::{
	header::{CONTENT_LENGTH, CONTENT_TYPE},
	HeaderValue, Method, StatusCode,
};
use mime::Mime;

use crate::{
	binder::ResourceBinder,
	common::{BoxedError, IntoArray},
	data::entity::Entity,
	dispatcher::{guard, ApplicationContext, Properties, RequestDispatcher},
	provider::{ProviderBinder, Providers},
	request::ContainerRequest,
	response::{ContainerResponse, Failure},
	StdError,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

const DEFAULT_BODY_SIZE_LIMIT: usize = 200 * 1024;

// --------------------------------------------------
// HandlerConfigOption

option! {
	pub HandlerConfigOption {
		DiagnosticErrors(bool),
		BodySizeLimit(usize),
		Property(Box<str>, Box<str>),
	}
}

// ----------

/// Enables or disables the diagnostic bodies of `500 Internal Server Error` responses.
/// Enabled by default.
pub fn _with_diagnostic_errors(enable: bool) -> HandlerConfigOption {
	HandlerConfigOption::DiagnosticErrors(enable)
}

/// Sets the maximum size of the request body. Larger bodies are answered with
/// `413 Payload Too Large`. The default limit is 200 KiB.
pub fn _with_body_size_limit(limit: usize) -> HandlerConfigOption {
	HandlerConfigOption::BodySizeLimit(limit)
}

/// Sets an application property, readable by context parameters.
pub fn _with_property<N, V>(name: N, value: V) -> HandlerConfigOption
where
	N: Into<Box<str>>,
	V: Into<Box<str>>,
{
	HandlerConfigOption::Property(name.into(), value.into())
}

// --------------------------------------------------
// RequestHandler

/// Processes requests: runs the request filters, dispatches, maps the errors, runs
/// the response filters, and writes the response entity.
///
/// The handler never fails. Every error is turned into a response.
///
/// ```
/// use std::sync::Arc;
///
/// use restive::{
/// 	binder::ResourceBinder,
/// 	handler::{RequestHandler, _with_diagnostic_errors},
/// 	provider::ProviderBinder,
/// };
///
/// let mut handler = RequestHandler::new(
/// 	Arc::new(ResourceBinder::new()),
/// 	Arc::new(ProviderBinder::new()),
/// );
///
/// handler.configure(_with_diagnostic_errors(false));
/// ```
#[derive(Clone)]
pub struct RequestHandler {
	dispatcher: RequestDispatcher,
	providers: Arc<ProviderBinder>,
	properties: Arc<Properties>,
	diagnostic_errors: bool,
	body_size_limit: usize,
}

impl RequestHandler {
	pub fn new(resources: Arc<ResourceBinder>, providers: Arc<ProviderBinder>) -> Self {
		Self {
			dispatcher: RequestDispatcher::new(resources),
			providers,
			properties: Arc::default(),
			diagnostic_errors: true,
			body_size_limit: DEFAULT_BODY_SIZE_LIMIT,
		}
	}

	pub fn configure<C, const N: usize>(&mut self, config_options: C)
	where
		C: IntoArray<HandlerConfigOption, N>,
	{
		let config_options = config_options.into_array();

		for config_option in config_options {
			use HandlerConfigOption::*;

			match config_option {
				DiagnosticErrors(enable) => self.diagnostic_errors = enable,
				BodySizeLimit(limit) => self.body_size_limit = limit,
				Property(name, value) => {
					Arc::make_mut(&mut self.properties).insert(name, value);
				}
			}
		}
	}

	#[inline(always)]
	pub fn resources(&self) -> &ResourceBinder {
		self.dispatcher.binder()
	}

	#[inline(always)]
	pub fn providers(&self) -> &ProviderBinder {
		&self.providers
	}

	#[inline(always)]
	pub fn body_size_limit(&self) -> usize {
		self.body_size_limit
	}

	/// Processes the request. The entity of the returned response, if any, is the
	/// written body as [`Bytes`](bytes::Bytes).
	pub fn process(&self, mut request: ContainerRequest) -> ContainerResponse {
		let providers = self.providers.providers();
		let is_head = request.method() == Method::HEAD;
		let path = request.matching_path().into_owned();

		if request.body().len() > self.body_size_limit {
			return self.finish(
				ContainerResponse::new(StatusCode::PAYLOAD_TOO_LARGE),
				&providers,
				None,
				is_head,
			);
		}

		for filter in providers.request_filters(&path) {
			if let Err(error) = guard(|| filter.filter(&mut request)) {
				let response = self.handle_error(error, &providers);

				return self.finish(response, &providers, None, is_head);
			}
		}

		let mut context = ApplicationContext::new(request, providers.clone(), self.properties.clone());

		let mut response = match self.dispatcher.dispatch(&mut context) {
			Ok(response) => response,
			Err(error) => self.handle_error(error, &providers),
		};

		let some_media_type = context.negotiated_media_type().cloned();
		let request = context.into_request();

		for filter in providers.response_filters(&path) {
			if let Err(error) = guard(|| filter.filter(&request, &mut response)) {
				response = self.handle_error(error, &providers);

				break;
			}
		}

		self.finish(response, &providers, some_media_type.as_ref(), is_head)
	}

	// Classifies the error and converts it into a response.
	fn handle_error(&self, error: BoxedError, providers: &Providers) -> ContainerResponse {
		match Failure::from(error) {
			Failure::Respond(error) => {
				if !error.status().is_server_error() || error.response().has_entity() {
					return error.into_response();
				}

				if let Ok(Some(response)) = guard(|| Ok(providers.map_error_chain(&error))) {
					return response;
				}

				tracing::error!("{}", error);

				let diagnostic = self.diagnostic_errors.then(|| diagnostic(&error));
				let mut response = error.into_response();
				if let Some(diagnostic) = diagnostic {
					response.set_entity(Some(Entity::from(diagnostic)));
					response.set_content_type(&mime::TEXT_PLAIN);
				}

				response
			}
			Failure::Fault(error) => {
				if let Ok(Some(response)) = guard(|| Ok(providers.map_error(error.as_ref()))) {
					return response;
				}

				tracing::error!("unhandled error: {}", error);

				let mut response = ContainerResponse::new(StatusCode::INTERNAL_SERVER_ERROR);
				if self.diagnostic_errors {
					response.set_entity(Some(Entity::from(diagnostic(error.as_ref()))));
					response.set_content_type(&mime::TEXT_PLAIN);
				}

				response
			}
		}
	}

	// Writes the entity and drops the body of a HEAD response.
	fn finish(
		&self,
		mut response: ContainerResponse,
		providers: &Providers,
		some_media_type: Option<&Mime>,
		is_head: bool,
	) -> ContainerResponse {
		if let Err(error) = write_entity(&mut response, providers, some_media_type) {
			response = self.handle_error(error, providers);

			if write_entity(&mut response, providers, None).is_err() {
				response = ContainerResponse::new(StatusCode::INTERNAL_SERVER_ERROR);
			}
		}

		if is_head {
			response.set_entity(None);
		}

		response
	}
}

// Converts the entity into the body with a writer of the response's media type, the
// negotiated media type, or any media type.
fn write_entity(
	response: &mut ContainerResponse,
	providers: &Providers,
	some_media_type: Option<&Mime>,
) -> Result<(), BoxedError> {
	let Some(entity) = response.take_entity() else {
		if !matches!(response.status(), StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
			&& !response.status().is_informational()
		{
			response
				.headers_mut()
				.insert(CONTENT_LENGTH, HeaderValue::from(0));
		}

		return Ok(());
	};

	let media_type = response
		.content_type()
		.or_else(|| some_media_type.cloned())
		.unwrap_or(mime::STAR_STAR);

	let Some((writer, media_type)) = providers.writer_for(&entity, &media_type) else {
		tracing::error!("no entity writer for {} in {}", entity.type_name(), media_type);

		return Err(NoEntityWriter {
			type_name: entity.type_name(),
			media_type,
		}
		.into());
	};

	let body = guard(|| writer.write_to(&entity, &media_type))?;

	if !response.headers().contains_key(CONTENT_TYPE) {
		response.set_content_type(&media_type);
	}

	response
		.headers_mut()
		.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

	response.set_entity(Some(Entity::from(body)));

	Ok(())
}

// Lists the error and its sources, one per line.
fn diagnostic(error: &(dyn StdError + 'static)) -> String {
	let mut diagnostic = error.to_string();

	let mut some_source = error.source();
	while let Some(source) = some_source {
		let _ = write!(diagnostic, "\ncaused by: {}", source);

		some_source = source.source();
	}

	diagnostic
}

// --------------------------------------------------

/// An error returned when no entity writer supports the response entity.
#[derive(Debug, crate::ImplError)]
#[error("no entity writer for {type_name} in {media_type}")]
pub struct NoEntityWriter {
	type_name: &'static str,
	media_type: Mime,
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
