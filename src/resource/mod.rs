//! The resource model: root resources, sub-resource methods, and sub-resource locators.

// ----------

use std::{
	any::{type_name, Any, TypeId},
	fmt::{self, Debug, Display, Formatter},
	hash::{Hash, Hasher},
	marker::PhantomData,
	sync::Arc,
	time::SystemTime,
};

use http::Method;

use crate::{
	common::BoxedError,
	data::{bind_params, Param},
	dispatcher::ApplicationContext,
	pattern::{UriPattern, UriTemplateError},
	ImplError,
};

// --------------------------------------------------

mod locator;
mod method;
mod options;

pub use locator::{
	_locator, Describe, IntoSubResource, LocatorDefinition, LocatorDescriptor, SubResource,
};

pub use method::{
	_delete, _get, _head, _method, _options, _patch, _post, _put, Args, ArgsError,
	MethodDefinition, MethodDescriptor, MethodMap,
};

pub use options::{MethodOptions, ParamOptions, ResourceOptions, SubResourceMethodOptions};

pub(crate) use method::Instance;

use options::{allowed_methods, OptionsHandler};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ResourceId

/// Identifies a resource by its type.
#[derive(Clone, Copy)]
pub struct ResourceId {
	type_id: TypeId,
	type_name: &'static str,
}

impl ResourceId {
	pub fn of<T: Any>() -> Self {
		Self {
			type_id: TypeId::of::<T>(),
			type_name: type_name::<T>(),
		}
	}

	#[inline(always)]
	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	#[inline(always)]
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}
}

impl PartialEq for ResourceId {
	#[inline]
	fn eq(&self, other: &Self) -> bool {
		self.type_id == other.type_id
	}
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.type_id.hash(state)
	}
}

impl Debug for ResourceId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.type_name)
	}
}

impl Display for ResourceId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.type_name)
	}
}

// --------------------------------------------------
// Scope

/// The lifecycle of a root resource's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
	/// One instance serves all the requests.
	Singleton,
	/// A new instance is created for each request.
	PerRequest,
}

// ----------

pub(crate) trait ErasedFactory: Send + Sync {
	fn create(&self, args: &mut Args<'_>) -> Result<Instance, BoxedError>;
}

struct TypedFactory<T, F> {
	factory: F,
	_mark: PhantomData<fn() -> T>,
}

impl<T, F> ErasedFactory for TypedFactory<T, F>
where
	T: Any + Send + Sync,
	F: Fn(&mut Args<'_>) -> Result<T, BoxedError> + Send + Sync,
{
	fn create(&self, args: &mut Args<'_>) -> Result<Instance, BoxedError> {
		(self.factory)(args).map(|instance| Arc::new(instance) as Instance)
	}
}

#[derive(Clone)]
enum InstanceProvider {
	Singleton(Instance),
	PerRequest {
		factory: Arc<dyn ErasedFactory>,
		params: Arc<[Param]>,
	},
}

// --------------------------------------------------
// SubResourceMethods

/// The sub-resource methods that share a path template.
#[derive(Debug, Clone)]
pub struct SubResourceMethods {
	pattern: UriPattern,
	methods: MethodMap,
}

impl SubResourceMethods {
	#[inline(always)]
	pub fn pattern(&self) -> &UriPattern {
		&self.pattern
	}

	#[inline(always)]
	pub fn methods(&self) -> &MethodMap {
		&self.methods
	}
}

// --------------------------------------------------
// ResourceDescriptor

/// The immutable model of a resource type.
///
/// A root resource has a path template and an instance provider. A sub-resource,
/// reached through a locator, needs neither.
///
/// ```
/// use restive::{
/// 	data::Param,
/// 	resource::{_get, _post, Args, ResourceDescriptor},
/// };
///
/// #[derive(Default)]
/// struct Books;
///
/// let descriptor = ResourceDescriptor::root::<Books>("/books")
/// 	.per_request(|_| Ok(Books::default()))
/// 	.method(_get(|_: &Books, _: &mut Args| "all books").produces(["text/plain"]))
/// 	.sub_resource_method(
/// 		"{id}",
/// 		_get(|_: &Books, args: &mut Args| args.take::<u32>().map(|id| id.to_string()))
/// 			.param(Param::path::<u32>("id")),
/// 	)
/// 	.build()
/// 	.unwrap();
///
/// assert_eq!(descriptor.pattern().unwrap().template(), "/books");
/// ```
pub struct ResourceDescriptor {
	id: ResourceId,
	some_pattern: Option<UriPattern>,
	some_instance_provider: Option<InstanceProvider>,
	resource_methods: MethodMap,
	sub_resource_methods: Vec<SubResourceMethods>,
	sub_resource_locators: Vec<LocatorDescriptor>,
	some_expiration: Option<SystemTime>,
}

impl ResourceDescriptor {
	/// Starts building a root resource.
	pub fn root<T: Any + Send + Sync>(template: &str) -> ResourceBuilder<T> {
		ResourceBuilder {
			some_template: Some(template.into()),
			..ResourceBuilder::new()
		}
	}

	/// Starts building a resource without a path template, reachable only through
	/// sub-resource locators.
	pub fn builder<T: Any + Send + Sync>() -> ResourceBuilder<T> {
		ResourceBuilder::new()
	}

	#[inline(always)]
	pub fn id(&self) -> ResourceId {
		self.id
	}

	#[inline(always)]
	pub fn pattern(&self) -> Option<&UriPattern> {
		self.some_pattern.as_ref()
	}

	#[inline(always)]
	pub fn is_root(&self) -> bool {
		self.some_pattern.is_some()
	}

	pub fn scope(&self) -> Option<Scope> {
		self
			.some_instance_provider
			.as_ref()
			.map(|instance_provider| match instance_provider {
				InstanceProvider::Singleton(_) => Scope::Singleton,
				InstanceProvider::PerRequest { .. } => Scope::PerRequest,
			})
	}

	#[inline(always)]
	pub fn resource_methods(&self) -> &MethodMap {
		&self.resource_methods
	}

	#[inline(always)]
	pub fn sub_resource_methods(&self) -> &[SubResourceMethods] {
		&self.sub_resource_methods
	}

	#[inline(always)]
	pub fn sub_resource_locators(&self) -> &[LocatorDescriptor] {
		&self.sub_resource_locators
	}

	/// Checks whether the resource can serve paths longer than its own.
	#[inline]
	pub fn has_sub_resources(&self) -> bool {
		!self.sub_resource_methods.is_empty() || !self.sub_resource_locators.is_empty()
	}

	#[inline(always)]
	pub fn expiration(&self) -> Option<SystemTime> {
		self.some_expiration
	}

	#[inline]
	pub fn is_expired(&self, now: SystemTime) -> bool {
		self
			.some_expiration
			.is_some_and(|expiration| expiration <= now)
	}

	// Returns the singleton or creates a new instance for the request.
	pub(crate) fn instance(&self, context: &ApplicationContext) -> Result<Instance, BoxedError> {
		match self.some_instance_provider.as_ref() {
			Some(InstanceProvider::Singleton(instance)) => Ok(instance.clone()),
			Some(InstanceProvider::PerRequest { factory, params }) => {
				let values = bind_params(params, context)?;

				factory.create(&mut Args::new(values, context))
			}
			None => Err(RegistrationError::MissingFactory(self.id.type_name).into()),
		}
	}
}

impl Debug for ResourceDescriptor {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResourceDescriptor")
			.field("id", &self.id)
			.field("pattern", &self.some_pattern)
			.field("scope", &self.scope())
			.field("resource_methods", &self.resource_methods)
			.field("sub_resource_methods", &self.sub_resource_methods)
			.field("sub_resource_locators", &self.sub_resource_locators)
			.field("expiration", &self.some_expiration)
			.finish()
	}
}

// --------------------------------------------------
// ResourceBuilder

/// Builds a [`ResourceDescriptor`] for the resource type `T`.
pub struct ResourceBuilder<T> {
	some_template: Option<Box<str>>,
	some_instance_provider: Option<InstanceProvider>,
	constructor_params: Vec<Param>,
	methods: Vec<(Option<Box<str>>, MethodDefinition<T>)>,
	locators: Vec<(Box<str>, LocatorDefinition<T>)>,
	some_expiration: Option<SystemTime>,
	some_error: Option<RegistrationError>,
}

impl<T: Any + Send + Sync> ResourceBuilder<T> {
	fn new() -> Self {
		Self {
			some_template: None,
			some_instance_provider: None,
			constructor_params: Vec::new(),
			methods: Vec::new(),
			locators: Vec::new(),
			some_expiration: None,
			some_error: None,
		}
	}

	/// Serves all the requests with the single `instance`.
	pub fn singleton(mut self, instance: T) -> Self {
		self.some_instance_provider = Some(InstanceProvider::Singleton(Arc::new(instance)));

		self
	}

	/// Creates a new instance for each request. The factory receives the bound
	/// constructor parameters.
	pub fn per_request<F>(mut self, factory: F) -> Self
	where
		F: Fn(&mut Args<'_>) -> Result<T, BoxedError> + Send + Sync + 'static,
	{
		self.some_instance_provider = Some(InstanceProvider::PerRequest {
			factory: Arc::new(TypedFactory {
				factory,
				_mark: PhantomData,
			}),
			params: Arc::new([]),
		});

		self
	}

	/// Adds a parameter bound for the per-request factory.
	pub fn constructor_param(mut self, param: Param) -> Self {
		self.constructor_params.push(param);

		self
	}

	/// Adds a resource method, served at the resource's own path.
	pub fn method(mut self, definition: MethodDefinition<T>) -> Self {
		self.methods.push((None, definition));

		self
	}

	/// Adds a sub-resource method, served at the `path` relative to the resource.
	pub fn sub_resource_method(mut self, path: &str, definition: MethodDefinition<T>) -> Self {
		self.methods.push((Some(path.into()), definition));

		self
	}

	/// Adds a sub-resource locator for the `path` relative to the resource.
	pub fn sub_resource_locator(mut self, path: &str, definition: LocatorDefinition<T>) -> Self {
		self.locators.push((path.into(), definition));

		self
	}

	/// Sets the expiration from an HTTP-date, e.g., `Sun, 06 Nov 1994 08:49:37 GMT`.
	pub fn expiration_date(mut self, http_date: &str) -> Self {
		match httpdate::parse_http_date(http_date) {
			Ok(expiration) => self.some_expiration = Some(expiration),
			Err(error) => {
				self.some_error.get_or_insert(RegistrationError::InvalidExpirationDate(error));
			}
		}

		self
	}

	pub fn expires_at(mut self, expiration: SystemTime) -> Self {
		self.some_expiration = Some(expiration);

		self
	}

	pub fn build(self) -> Result<ResourceDescriptor, RegistrationError> {
		let Self {
			some_template,
			mut some_instance_provider,
			constructor_params,
			methods,
			locators,
			some_expiration,
			some_error,
		} = self;

		if let Some(error) = some_error {
			return Err(error);
		}

		let id = ResourceId::of::<T>();

		let some_pattern = some_template
			.as_deref()
			.map(UriPattern::compile)
			.transpose()?;

		if some_pattern.is_some() && some_instance_provider.is_none() {
			return Err(RegistrationError::MissingFactory(id.type_name));
		}

		if let Some(InstanceProvider::PerRequest { params, .. }) = some_instance_provider.as_mut() {
			*params = constructor_params.into();
		}

		let mut resource_methods = MethodMap::default();
		let mut sub_resource_methods = Vec::<SubResourceMethods>::new();

		for (some_path, definition) in methods {
			let descriptor = definition.into_descriptor(id, some_path.as_deref())?;

			let Some(path) = some_path else {
				resource_methods
					.insert(descriptor)
					.map_err(|descriptor| RegistrationError::duplicate_method(&descriptor))?;

				continue;
			};

			let pattern = UriPattern::compile(&path)?;
			let position = match sub_resource_methods
				.iter()
				.position(|sub_resource| sub_resource.pattern == pattern)
			{
				Some(position) => position,
				None => {
					sub_resource_methods.push(SubResourceMethods {
						pattern,
						methods: MethodMap::default(),
					});

					sub_resource_methods.len() - 1
				}
			};

			sub_resource_methods[position]
				.methods
				.insert(descriptor)
				.map_err(|descriptor| RegistrationError::duplicate_method(&descriptor))?;
		}

		let mut sub_resource_locators = Vec::<LocatorDescriptor>::new();
		for (path, definition) in locators {
			let pattern = UriPattern::compile(&path)?;
			if sub_resource_locators
				.iter()
				.any(|locator| locator.pattern() == &pattern)
			{
				return Err(RegistrationError::DuplicateLocator {
					resource: id.type_name,
					path,
				});
			}

			sub_resource_locators.push(definition.into_descriptor(id, pattern));
		}

		if resource_methods.is_empty()
			&& sub_resource_methods.is_empty()
			&& sub_resource_locators.is_empty()
		{
			return Err(RegistrationError::NoMethods(id.type_name));
		}

		// Specificity order. Equally specific patterns keep their registration order.
		sub_resource_methods.sort_by(|a, b| a.pattern.compare_specificity(&b.pattern));
		sub_resource_locators.sort_by(|a, b| a.pattern().compare_specificity(b.pattern()));

		resource_methods.synthesize_head();
		for sub_resource in sub_resource_methods.iter_mut() {
			sub_resource.methods.synthesize_head();
		}

		let options = ResourceOptions {
			path: some_pattern.as_ref().map(|pattern| pattern.template().to_owned()),
			allow: method_names(&allowed_methods(&resource_methods)),
			methods: MethodOptions::from_method_map(&resource_methods),
			sub_resource_methods: sub_resource_methods
				.iter()
				.map(|sub_resource| SubResourceMethodOptions {
					path: sub_resource.pattern.template().to_owned(),
					methods: MethodOptions::from_method_map(&sub_resource.methods),
				})
				.collect(),
			sub_resource_locators: sub_resource_locators
				.iter()
				.map(|locator| locator.pattern().template().to_owned())
				.collect(),
		};

		synthesize_options(&mut resource_methods, id, None, options);

		for sub_resource in sub_resource_methods.iter_mut() {
			let options = ResourceOptions {
				path: Some(sub_resource.pattern.template().to_owned()),
				allow: method_names(&allowed_methods(&sub_resource.methods)),
				methods: MethodOptions::from_method_map(&sub_resource.methods),
				sub_resource_methods: Vec::new(),
				sub_resource_locators: Vec::new(),
			};

			let path = sub_resource.pattern.template().to_owned();
			synthesize_options(&mut sub_resource.methods, id, Some(&path), options);
		}

		resource_methods.sort();
		for sub_resource in sub_resource_methods.iter_mut() {
			sub_resource.methods.sort();
		}

		Ok(ResourceDescriptor {
			id,
			some_pattern,
			some_instance_provider,
			resource_methods,
			sub_resource_methods,
			sub_resource_locators,
			some_expiration,
		})
	}
}

fn method_names(methods: &[Method]) -> Vec<String> {
	methods.iter().map(ToString::to_string).collect()
}

fn synthesize_options(
	method_map: &mut MethodMap,
	id: ResourceId,
	some_path: Option<&str>,
	options: ResourceOptions,
) {
	if method_map.contains(&Method::OPTIONS) {
		return;
	}

	let descriptor = MethodDescriptor::synthesized(
		Method::OPTIONS,
		id,
		some_path,
		Arc::new(OptionsHandler::new(options)),
	);

	// The map has no OPTIONS methods, so the insertion cannot conflict.
	let _ = method_map.insert(descriptor);
}

// --------------------------------------------------
// RegistrationError

/// An error returned when a resource model is invalid.
#[derive(Debug, ImplError)]
pub enum RegistrationError {
	#[error("{resource}: duplicate {method} method {path:?} with the same media types")]
	DuplicateMethod {
		resource: &'static str,
		method: Method,
		path: Box<str>,
	},
	#[error("{resource}: duplicate sub-resource locator {path:?}")]
	DuplicateLocator {
		resource: &'static str,
		path: Box<str>,
	},
	#[error("{0}: the resource has neither methods nor locators")]
	NoMethods(&'static str),
	#[error("{0}: a root resource needs a singleton instance or a per-request factory")]
	MissingFactory(&'static str),
	#[error(transparent)]
	InvalidTemplate(#[from] UriTemplateError),
	#[error("invalid media type {0:?}")]
	InvalidMediaType(Box<str>),
	#[error("invalid expiration date: {0}")]
	InvalidExpirationDate(httpdate::Error),
	#[error("the descriptor of {descriptor} cannot describe {instance}")]
	TypeMismatch {
		descriptor: &'static str,
		instance: &'static str,
	},
}

impl RegistrationError {
	fn duplicate_method(descriptor: &MethodDescriptor) -> Self {
		tracing::warn!(
			resource = %descriptor.resource_id(),
			"duplicate {} method {:?}",
			descriptor.method(),
			descriptor.path().unwrap_or_default(),
		);

		Self::DuplicateMethod {
			resource: descriptor.resource_id().type_name(),
			method: descriptor.method().clone(),
			path: descriptor.path().unwrap_or_default().into(),
		}
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use std::time::Duration;

	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	#[derive(Default)]
	struct Resource;

	#[derive(Default)]
	struct Child;

	impl Describe for Child {
		fn describe() -> Result<ResourceDescriptor, RegistrationError> {
			ResourceDescriptor::builder::<Child>()
				.method(_get(|_: &Child, _: &mut Args| "child"))
				.build()
		}
	}

	// --------------------------------------------------

	#[test]
	fn build() {
		let descriptor = ResourceDescriptor::root::<Resource>("/a")
			.singleton(Resource)
			.method(_get(|_: &Resource, _: &mut Args| ()).produces(["text/plain"]))
			.method(_post(|_: &Resource, _: &mut Args| ()))
			.sub_resource_method("b/{x}", _get(|_: &Resource, _: &mut Args| ()))
			.sub_resource_method("b/c", _put(|_: &Resource, _: &mut Args| ()))
			.sub_resource_method("b/c/", _get(|_: &Resource, _: &mut Args| ()))
			.sub_resource_locator(
				"{x}",
				_locator(|_: &Resource, _: &mut Args| SubResource::new(Child)),
			)
			.sub_resource_locator(
				"d",
				_locator(|_: &Resource, _: &mut Args| SubResource::new(Child)),
			)
			.build()
			.unwrap();

		assert_eq!(descriptor.id(), ResourceId::of::<Resource>());
		assert!(descriptor.is_root());
		assert_eq!(descriptor.scope(), Some(Scope::Singleton));
		assert!(descriptor.has_sub_resources());

		let methods = descriptor.resource_methods().methods().collect::<Vec<_>>();
		assert_eq!(methods, [Method::GET, Method::POST, Method::HEAD, Method::OPTIONS]);

		let templates = descriptor
			.sub_resource_methods()
			.iter()
			.map(|sub_resource| sub_resource.pattern().template())
			.collect::<Vec<_>>();

		// "b/c" and "b/c/" share a pattern.
		assert_eq!(templates, ["b/c", "b/{x}"]);

		let methods = descriptor.sub_resource_methods()[0]
			.methods()
			.methods()
			.collect::<Vec<_>>();

		assert_eq!(methods, [Method::PUT, Method::GET, Method::HEAD, Method::OPTIONS]);

		let templates = descriptor
			.sub_resource_locators()
			.iter()
			.map(|locator| locator.pattern().template())
			.collect::<Vec<_>>();

		assert_eq!(templates, ["d", "{x}"]);
	}

	#[test]
	fn registration_errors() {
		let result = ResourceDescriptor::root::<Resource>("/a")
			.singleton(Resource)
			.method(_get(|_: &Resource, _: &mut Args| ()).produces(["text/plain", "text/html"]))
			.method(_get(|_: &Resource, _: &mut Args| ()).produces(["text/html", "text/plain"]))
			.build();

		assert!(matches!(
			result,
			Err(RegistrationError::DuplicateMethod { method, .. }) if method == Method::GET
		));

		let result = ResourceDescriptor::root::<Resource>("/a")
			.singleton(Resource)
			.sub_resource_method("b", _get(|_: &Resource, _: &mut Args| ()))
			.sub_resource_method("/b/", _get(|_: &Resource, _: &mut Args| ()))
			.build();

		assert!(matches!(
			result,
			Err(RegistrationError::DuplicateMethod { path, .. }) if path.as_ref() == "/b/"
		));

		let result = ResourceDescriptor::root::<Resource>("/a")
			.singleton(Resource)
			.sub_resource_locator("{x}", _locator(|_: &Resource, _: &mut Args| SubResource::new(Child)))
			.sub_resource_locator("{y}", _locator(|_: &Resource, _: &mut Args| SubResource::new(Child)))
			.build();

		assert!(matches!(result, Err(RegistrationError::DuplicateLocator { .. })));

		let result = ResourceDescriptor::root::<Resource>("/a").singleton(Resource).build();
		assert!(matches!(result, Err(RegistrationError::NoMethods(_))));

		let result = ResourceDescriptor::root::<Resource>("/a")
			.method(_get(|_: &Resource, _: &mut Args| ()))
			.build();

		assert!(matches!(result, Err(RegistrationError::MissingFactory(_))));

		let result = ResourceDescriptor::root::<Resource>("/a/{x")
			.singleton(Resource)
			.method(_get(|_: &Resource, _: &mut Args| ()))
			.build();

		assert!(matches!(result, Err(RegistrationError::InvalidTemplate(_))));

		let result = ResourceDescriptor::root::<Resource>("/a")
			.singleton(Resource)
			.method(_get(|_: &Resource, _: &mut Args| ()))
			.expiration_date("tomorrow")
			.build();

		assert!(matches!(result, Err(RegistrationError::InvalidExpirationDate(_))));
	}

	#[test]
	fn declared_head_and_options() {
		let descriptor = ResourceDescriptor::root::<Resource>("/a")
			.per_request(|_| Ok(Resource))
			.method(_get(|_: &Resource, _: &mut Args| ()))
			.method(_head(|_: &Resource, _: &mut Args| ()))
			.method(_options(|_: &Resource, _: &mut Args| ()))
			.build()
			.unwrap();

		assert_eq!(descriptor.scope(), Some(Scope::PerRequest));

		let methods = descriptor.resource_methods();
		assert_eq!(methods.get(&Method::HEAD).unwrap().len(), 1);
		assert!(!methods.get(&Method::HEAD).unwrap()[0].is_synthesized());
		assert!(!methods.get(&Method::OPTIONS).unwrap()[0].is_synthesized());
	}

	#[test]
	fn sub_resource_descriptor() {
		let descriptor = Child::describe().unwrap();

		assert!(!descriptor.is_root());
		assert!(descriptor.pattern().is_none());
		assert_eq!(descriptor.scope(), None);
		assert!(!descriptor.has_sub_resources());
	}

	#[test]
	fn expiration() {
		let descriptor = ResourceDescriptor::root::<Resource>("/a")
			.singleton(Resource)
			.method(_get(|_: &Resource, _: &mut Args| ()))
			.expiration_date("Sun, 06 Nov 1994 08:49:37 GMT")
			.build()
			.unwrap();

		let expiration = descriptor.expiration().unwrap();
		assert!(descriptor.is_expired(expiration));
		assert!(!descriptor.is_expired(expiration - Duration::from_secs(1)));

		let descriptor = ResourceDescriptor::root::<Resource>("/a")
			.singleton(Resource)
			.method(_get(|_: &Resource, _: &mut Args| ()))
			.build()
			.unwrap();

		assert!(!descriptor.is_expired(SystemTime::now()));
	}
}
