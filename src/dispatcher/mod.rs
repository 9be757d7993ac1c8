//! Request dispatching: matching the path to a resource and selecting its method.

// ----------

use std::{sync::Arc, time::SystemTime};

use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use mime::Mime;

use crate::{
	binder::ResourceBinder,
	common::BoxedError,
	media::{acceptable_media_type, best_quality, is_compatible},
	pattern::is_terminal,
	resource::{Instance, MethodDescriptor, MethodMap, ResourceId},
	response::{ContainerResponse, MethodResult},
	ImplError,
};

// --------------------------------------------------

mod context;
mod invoker;

pub use context::{ApplicationContext, Properties};
pub use invoker::HandlerPanic;

pub(crate) use invoker::guard;

use invoker::{instantiate, invoke_locator, invoke_method};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

const NOT_FOUND_MESSAGE: &str = "There is no any resources matched to request path";

// --------------------------------------------------
// RequestDispatcher

/// Matches requests to the resources of a [`ResourceBinder`] and invokes the selected
/// methods.
///
/// The outcomes of the matching, such as `404 Not Found` or `405 Method Not Allowed`,
/// are returned as responses. Errors are returned only when the application code
/// fails.
#[derive(Clone)]
pub struct RequestDispatcher {
	binder: Arc<ResourceBinder>,
}

impl RequestDispatcher {
	pub fn new(binder: Arc<ResourceBinder>) -> Self {
		Self { binder }
	}

	#[inline(always)]
	pub fn binder(&self) -> &ResourceBinder {
		&self.binder
	}

	pub fn dispatch(&self, context: &mut ApplicationContext) -> Result<ContainerResponse, BoxedError> {
		let path = context.request().matching_path().into_owned();
		let resources = self.binder.resources();

		let now = SystemTime::now();

		// Roots are in specificity order. A root that doesn't consume the whole path is
		// skipped when it has nothing to match the remainder. Expired roots are skipped
		// until the binder removes them.
		let some_root = resources.iter().find_map(|descriptor| {
			if descriptor.is_expired(now) {
				return None;
			}

			let uri_match = descriptor.pattern()?.match_path(&path)?;

			(uri_match.is_terminal() || descriptor.has_sub_resources())
				.then(|| (descriptor.clone(), uri_match))
		});

		let Some((root, uri_match)) = some_root else {
			tracing::debug!("no root resource matched {}", path);

			return Ok(not_found(&path));
		};

		tracing::debug!(resource = %root.id(), "root resource matched {}", path);

		let consumed_len = uri_match.consumed_len(&path);
		let (values, mut some_remainder) = uri_match.into_parts();

		context.push_match(
			root.id(),
			root.pattern().map(|pattern| pattern.names()).unwrap_or_default(),
			values,
			path[..consumed_len].to_owned(),
		);

		let mut instance = instantiate(&root, context)?;
		let mut descriptor = root;
		let mut visited = Vec::<(ResourceId, Option<String>)>::new();

		loop {
			let remainder = match some_remainder.as_deref() {
				Some(remainder) if !is_terminal(Some(remainder)) => remainder.to_owned(),
				_ => {
					return match negotiate(descriptor.resource_methods(), context) {
						Ok((method, some_media_type)) => {
							self.invoke(method, some_media_type, &instance, context)
						}
						Err(response) => Ok(response),
					};
				}
			};

			let some_sub_resource = descriptor
				.sub_resource_methods()
				.iter()
				.find_map(|sub_resource| {
					sub_resource
						.pattern()
						.match_path(&remainder)
						.filter(|uri_match| uri_match.is_terminal())
						.map(|uri_match| (sub_resource, uri_match))
				});

			let some_locator = descriptor
				.sub_resource_locators()
				.iter()
				.find_map(|locator| {
					locator
						.pattern()
						.match_path(&remainder)
						.map(|uri_match| (locator, uri_match))
				});

			// A locator wins over a sub-resource method only if its pattern is more specific.
			let prefer_locator = match (&some_sub_resource, &some_locator) {
				(Some((sub_resource, _)), Some((locator, _))) => locator
					.pattern()
					.compare_specificity(sub_resource.pattern())
					.is_lt(),
				(None, Some(_)) => true,
				_ => false,
			};

			if let Some((sub_resource, uri_match)) = some_sub_resource.filter(|_| !prefer_locator) {
				// A sub-resource method that rejects the request gives way to a matched locator.
				match negotiate(sub_resource.methods(), context) {
					Ok((method, some_media_type)) => {
						tracing::debug!(
							resource = %descriptor.id(),
							"sub-resource method path {} matched",
							sub_resource.pattern(),
						);

						let (values, _) = uri_match.into_parts();
						context.push_match(
							descriptor.id(),
							sub_resource.pattern().names(),
							values,
							remainder,
						);

						return self.invoke(method, some_media_type, &instance, context);
					}
					Err(response) if some_locator.is_none() => return Ok(response),
					Err(response) => tracing::debug!(
						resource = %descriptor.id(),
						"sub-resource method path {} answered {}, trying the locator",
						sub_resource.pattern(),
						response.status(),
					),
				}
			}

			let Some((locator, uri_match)) = some_locator else {
				tracing::debug!(resource = %descriptor.id(), "nothing matched {}", remainder);

				return Ok(not_found(&path));
			};

			let consumed_len = uri_match.consumed_len(&remainder);
			let (values, next_remainder) = uri_match.into_parts();
			context.push_match(
				descriptor.id(),
				locator.pattern().names(),
				values,
				remainder[..consumed_len].to_owned(),
			);

			let (next_instance, next_descriptor) = invoke_locator(locator, &instance, context)?;

			tracing::debug!(
				resource = %descriptor.id(),
				"descended through the locator {} to {}",
				locator.pattern(),
				next_descriptor.id(),
			);

			let key = (next_descriptor.id(), next_remainder.clone());
			if visited.contains(&key) {
				return Err(
					DispatchError::LocatorCycle {
						resource: next_descriptor.id().type_name(),
						remainder: next_remainder.unwrap_or_default().into(),
					}
					.into(),
				);
			}

			visited.push(key);

			instance = next_instance;
			descriptor = next_descriptor;
			some_remainder = next_remainder;
		}
	}

	fn invoke(
		&self,
		method: &MethodDescriptor,
		some_media_type: Option<Mime>,
		instance: &Instance,
		context: &mut ApplicationContext,
	) -> Result<ContainerResponse, BoxedError> {
		tracing::debug!(
			resource = %method.resource_id(),
			"method {} {} selected",
			method.method(),
			method.path().unwrap_or_default(),
		);

		if let Some(media_type) = some_media_type {
			context.set_negotiated_media_type(media_type);
		}

		match invoke_method(method, instance, context)? {
			MethodResult::NoContent => Ok(ContainerResponse::no_content()),
			MethodResult::Entity(entity) => Ok(ContainerResponse::ok().with_entity(entity)),
			MethodResult::Response(response) => Ok(response),
		}
	}
}

// Selects the method by the HTTP method, the Content-Type, and the Accept header.
// The rejection is returned as a `405`, `400`, `415`, or `406` response.
fn negotiate<'m>(
	method_map: &'m MethodMap,
	context: &ApplicationContext,
) -> Result<(&'m MethodDescriptor, Option<Mime>), ContainerResponse> {
	let request = context.request();

	let Some(candidates) = method_map.get(request.method()) else {
		tracing::debug!("method {} is not allowed", request.method());

		let mut response = ContainerResponse::new(StatusCode::METHOD_NOT_ALLOWED);
		response.set_allow(method_map.methods());

		return Err(response);
	};

	let some_content_type = match request.content_type() {
		Ok(some_content_type) => some_content_type,
		Err(error) => {
			tracing::debug!("invalid Content-Type: {}", error);

			return Err(ContainerResponse::new(StatusCode::BAD_REQUEST).with_entity(error.to_string()));
		}
	};

	// A request without a body is compatible with any consumed media type.
	let candidates = candidates
		.iter()
		.filter(|candidate| match some_content_type.as_ref() {
			Some(content_type) if !request.body().is_empty() => candidate
				.consumes()
				.iter()
				.any(|media_type| is_compatible(media_type, content_type)),
			_ => true,
		})
		.collect::<Vec<_>>();

	if candidates.is_empty() {
		tracing::debug!("unsupported media type {:?}", some_content_type);

		return Err(ContainerResponse::new(StatusCode::UNSUPPORTED_MEDIA_TYPE));
	}

	let accept = context.acceptable_media_types();

	// Candidates are sorted by specificity. The first one with the best quality wins.
	let mut some_selected = None::<(&MethodDescriptor, f32)>;
	for candidate in candidates {
		let quality = best_quality(accept, candidate.produces());
		if quality > 0.0 && some_selected.map_or(true, |(_, best)| quality > best) {
			some_selected = Some((candidate, quality));
		}
	}

	let Some((method, _)) = some_selected else {
		tracing::debug!("no acceptable media type");

		return Err(ContainerResponse::new(StatusCode::NOT_ACCEPTABLE));
	};

	Ok((method, acceptable_media_type(accept, method.produces())))
}

fn not_found(path: &str) -> ContainerResponse {
	let mut response = ContainerResponse::new(StatusCode::NOT_FOUND)
		.with_entity(format!("{} {}", NOT_FOUND_MESSAGE, path));

	response
		.headers_mut()
		.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

	response
}

// --------------------------------------------------
// DispatchError

#[derive(Debug, ImplError)]
pub enum DispatchError {
	#[error("locators of {resource} returned to the remaining path {remainder:?} in a cycle")]
	LocatorCycle {
		resource: &'static str,
		remainder: Box<str>,
	},
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use bytes::Bytes;
	use http::{header::ACCEPT, HeaderMap, Method, Uri};

	use crate::{
		data::Param,
		request::ContainerRequest,
		resource::{
			_get, _locator, _post, Args, Describe, RegistrationError, ResourceDescriptor, SubResource,
		},
	};

	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	struct Root;
	struct Child;

	impl Describe for Child {
		fn describe() -> Result<ResourceDescriptor, RegistrationError> {
			ResourceDescriptor::builder::<Child>()
				.method(_get(|_: &Child, args: &mut Args| {
					args.take::<String>().map(|id| format!("child {}", id))
				})
				.param(Param::path::<String>("id")))
				.sub_resource_locator("", _locator(|_: &Child, _: &mut Args| SubResource::new(Child)))
				.build()
		}
	}

	fn dispatcher() -> RequestDispatcher {
		let binder = ResourceBinder::new();
		binder
			.add_resource(
				ResourceDescriptor::root::<Root>("/a")
					.singleton(Root)
					.method(_get(|_: &Root, _: &mut Args| "root").produces(["text/plain"]))
					.method(_get(|_: &Root, _: &mut Args| "root json").produces(["application/json"]))
					.method(_post(|_: &Root, _: &mut Args| ()).consumes(["text/plain"]))
					.sub_resource_method("b", _get(|_: &Root, _: &mut Args| "b"))
					.sub_resource_locator(
						"{id}",
						_locator(|_: &Root, _: &mut Args| SubResource::new(Child)),
					)
					.build()
					.unwrap(),
			)
			.unwrap();

		RequestDispatcher::new(Arc::new(binder))
	}

	fn context(
		method: Method,
		path: &'static str,
		headers: &[(&'static str, &'static str)],
		body: &'static str,
	) -> ApplicationContext {
		let mut header_map = HeaderMap::new();
		for &(name, value) in headers {
			header_map.append(name, HeaderValue::from_static(value));
		}

		let request = ContainerRequest::new(
			method,
			Uri::from_static(path),
			header_map,
			Bytes::from_static(body.as_bytes()),
		);

		ApplicationContext::new(request, Arc::default(), Arc::default())
	}

	fn text(response: &ContainerResponse) -> String {
		let Some(entity) = response.entity() else {
			return String::new();
		};

		if let Some(text) = entity.downcast_ref::<&'static str>() {
			return text.to_string();
		}

		entity.downcast_ref::<String>().cloned().unwrap_or_default()
	}

	// --------------------------------------------------

	#[test]
	fn dispatch() {
		let dispatcher = dispatcher();

		let cases = [
			(Method::GET, "/a", &[][..], "", StatusCode::OK, "root"),
			(Method::GET, "/a/", &[][..], "", StatusCode::OK, "root"),
			(Method::GET, "/a", &[("accept", "application/json")][..], "", StatusCode::OK, "root json"),
			(Method::GET, "/a", &[("accept", "image/png")][..], "", StatusCode::NOT_ACCEPTABLE, ""),
			(Method::GET, "/a", &[("accept", "text/plain;q=0")][..], "", StatusCode::NOT_ACCEPTABLE, ""),
			(Method::POST, "/a", &[("content-type", "text/plain")][..], "x", StatusCode::NO_CONTENT, ""),
			(Method::POST, "/a", &[("content-type", "image/png")][..], "x", StatusCode::UNSUPPORTED_MEDIA_TYPE, ""),
			(Method::POST, "/a", &[("content-type", "image/png")][..], "", StatusCode::NO_CONTENT, ""),
			(Method::POST, "/a", &[("content-type", "text")][..], "x", StatusCode::BAD_REQUEST, ""),
			(Method::PUT, "/a", &[][..], "", StatusCode::METHOD_NOT_ALLOWED, ""),
			(Method::GET, "/a/b", &[][..], "", StatusCode::OK, "b"),
			(Method::GET, "/a/c", &[][..], "", StatusCode::OK, "child c"),
			(Method::GET, "/x", &[][..], "", StatusCode::NOT_FOUND, ""),
		];

		for (method, path, headers, body, status, entity) in cases {
			dbg!(&method, path, headers);

			let mut context = context(method, path, headers, body);
			let response = dispatcher.dispatch(&mut context).unwrap();

			assert_eq!(response.status(), status);
			if !entity.is_empty() {
				assert_eq!(text(&response), entity);
			}
		}
	}

	#[test]
	fn method_not_allowed() {
		let dispatcher = dispatcher();

		let mut context = context(Method::DELETE, "/a", &[], "");
		let response = dispatcher.dispatch(&mut context).unwrap();

		assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(
			response.headers().get(http::header::ALLOW).unwrap(),
			"GET, POST, HEAD, OPTIONS"
		);
	}

	#[test]
	fn not_found() {
		let dispatcher = dispatcher();

		let mut context = context(Method::GET, "/b/c", &[(ACCEPT.as_str(), "*/*")], "");
		let response = dispatcher.dispatch(&mut context).unwrap();

		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(
			text(&response),
			"There is no any resources matched to request path /b/c"
		);
	}

	#[test]
	fn locator_cycle() {
		let dispatcher = dispatcher();

		// The empty locator template of the child consumes nothing.
		let mut context = context(Method::GET, "/a/c/d", &[], "");
		let error = dispatcher.dispatch(&mut context).unwrap_err();

		assert!(error.is::<DispatchError>());
	}
}
