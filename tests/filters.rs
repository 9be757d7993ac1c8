use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc,
};

use restive::{prelude::*, resource::MethodDescriptor};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

struct Archive;

fn launcher(providers: ProviderBinder) -> ResourceLauncher {
	let resources = ResourceBinder::new();
	resources
		.add_resource(
			ResourceDescriptor::root::<Archive>("/archive")
				.singleton(Archive)
				.method(_get(|_: &Archive, _: &mut Args| "list"))
				.method(_put(|_: &Archive, _: &mut Args| "replaced"))
				.method(_delete(|_: &Archive, _: &mut Args| "deleted"))
				.sub_resource_method("sealed", _get(|_: &Archive, _: &mut Args| "sealed"))
				.sub_resource_method("public", _get(|_: &Archive, _: &mut Args| "public"))
				.build()
				.unwrap(),
		)
		.unwrap();

	ResourceLauncher::new(RequestHandler::new(
		Arc::new(resources),
		Arc::new(providers),
	))
}

fn text(response: &ContainerResponse) -> &str {
	response
		.body()
		.map(|body| std::str::from_utf8(body).unwrap())
		.unwrap_or_default()
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[test]
fn request_filters() {
	let providers = ProviderBinder::new();

	// Tunnels the method through a header.
	providers.add_request_filter(|request: &mut ContainerRequest| -> Result<(), BoxedError> {
		let some_method = request
			.headers()
			.get("x-http-method-override")
			.and_then(|value| Method::from_bytes(value.as_bytes()).ok());

		if let Some(method) = some_method {
			request.set_method(method);
		}

		Ok(())
	});

	// Redirects the old path.
	providers.add_request_filter(|request: &mut ContainerRequest| -> Result<(), BoxedError> {
		if request.path() == "/old-archive" {
			request.set_path("/archive");
		}

		Ok(())
	});

	providers
		.add_scoped_request_filter(
			"/archive/sealed",
			|_: &mut ContainerRequest| -> Result<(), BoxedError> {
				Err(WebApplicationError::from(StatusCode::FORBIDDEN).into())
			},
		)
		.unwrap();

	let launcher = launcher(providers);

	let response = launcher
		.request("POST", "/archive")
		.header("x-http-method-override", "PUT")
		.send()
		.unwrap();

	assert_eq!(text(&response), "replaced");

	let response = launcher.service("GET", "/old-archive").unwrap();
	assert_eq!(text(&response), "list");

	let response = launcher.service("GET", "/archive/sealed").unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);

	// The scope matches the whole path only.
	let response = launcher.service("GET", "/archive/public").unwrap();
	assert_eq!(text(&response), "public");
}

#[test]
fn method_invoker_filters() {
	let providers = ProviderBinder::new();
	let invocations = Arc::new(AtomicUsize::new(0));

	let counter = invocations.clone();
	providers.add_method_invoker_filter(
		move |_: &MethodDescriptor, _: &ApplicationContext| -> Result<(), BoxedError> {
			counter.fetch_add(1, Ordering::Relaxed);

			Ok(())
		},
	);

	providers.add_method_invoker_filter(
		|method: &MethodDescriptor, context: &ApplicationContext| -> Result<(), BoxedError> {
			let is_admin = context
				.request()
				.headers()
				.get("x-role")
				.is_some_and(|role| role == "admin");

			if method.method() == Method::DELETE && !is_admin {
				return Err(WebApplicationError::from(StatusCode::FORBIDDEN).into());
			}

			Ok(())
		},
	);

	let launcher = launcher(providers);

	let response = launcher.service("DELETE", "/archive").unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);

	let response = launcher
		.request("DELETE", "/archive")
		.header("x-role", "admin")
		.send()
		.unwrap();

	assert_eq!(text(&response), "deleted");

	let response = launcher.service("GET", "/archive").unwrap();
	assert_eq!(text(&response), "list");

	assert_eq!(invocations.load(Ordering::Relaxed), 3);

	// Not found requests don't reach the invoker filters.
	let response = launcher.service("GET", "/unknown").unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(invocations.load(Ordering::Relaxed), 3);
}

#[test]
fn response_filters() {
	let providers = ProviderBinder::new();

	providers.add_response_filter(
		|request: &ContainerRequest, response: &mut ContainerResponse| -> Result<(), BoxedError> {
			let value = HeaderValue::from_str(request.method().as_str())?;
			response
				.headers_mut()
				.insert(HeaderName::from_static("x-method"), value);

			Ok(())
		},
	);

	providers
		.add_scoped_response_filter(
			"/archive/public",
			|_: &ContainerRequest, response: &mut ContainerResponse| -> Result<(), BoxedError> {
				response.set_entity(Some("filtered".into()));

				Ok(())
			},
		)
		.unwrap();

	let launcher = launcher(providers);

	let response = launcher.service("GET", "/archive").unwrap();
	assert_eq!(response.headers().get("x-method").unwrap(), "GET");
	assert_eq!(text(&response), "list");

	let response = launcher.service("GET", "/archive/public").unwrap();
	assert_eq!(text(&response), "filtered");

	// Error responses are filtered too.
	let response = launcher.service("PATCH", "/archive").unwrap();
	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
	assert_eq!(response.headers().get("x-method").unwrap(), "PATCH");
}

#[test]
fn negotiation_without_accept() {
	struct Report;

	let resources = ResourceBinder::new();
	resources
		.add_resource(
			ResourceDescriptor::root::<Report>("/report")
				.singleton(Report)
				.method(
					_get(|_: &Report, _: &mut Args| "text")
						.produces(["text/*", "text/plain", "application/json"]),
				)
				.build()
				.unwrap(),
		)
		.unwrap();

	let launcher = ResourceLauncher::new(RequestHandler::new(
		Arc::new(resources),
		Arc::new(ProviderBinder::new()),
	));

	// The most specific produced media type is chosen.
	let response = launcher.service("GET", "/report").unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");

	let response = launcher.service("HEAD", "/report").unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers().get("content-length").unwrap(), "4");
	assert!(response.body().is_none());
}
