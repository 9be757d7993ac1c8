use std::{
	any::{type_name, Any},
	fmt::{self, Debug, Formatter},
	marker::PhantomData,
	str::FromStr,
	sync::Arc,
};

use http::Method;
use mime::Mime;

use crate::{
	common::{BoxedError, SCOPE_VALIDITY},
	data::Param,
	dispatcher::ApplicationContext,
	media::{compare_specificity, sort_by_specificity},
	response::{IntoMethodResult, MethodResult},
	ImplError,
};

use super::{RegistrationError, ResourceId};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// Args

/// The bound arguments of a resource method, a locator, or a constructor, in the order
/// of their declared parameters.
pub struct Args<'c> {
	values: Vec<Option<Box<dyn Any>>>,
	next_index: usize,
	context: &'c ApplicationContext,
}

impl<'c> Args<'c> {
	pub(crate) fn new(values: Vec<Box<dyn Any>>, context: &'c ApplicationContext) -> Self {
		Self {
			values: values.into_iter().map(Some).collect(),
			next_index: 0,
			context,
		}
	}

	#[inline(always)]
	pub fn context(&self) -> &'c ApplicationContext {
		self.context
	}

	#[inline(always)]
	pub fn len(&self) -> usize {
		self.values.len()
	}

	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Takes the argument that follows the last taken one.
	pub fn take<T: Any>(&mut self) -> Result<T, ArgsError> {
		let value = self.take_at(self.next_index)?;
		self.next_index += 1;

		Ok(value)
	}

	/// Takes the argument at the `index`. Each argument can be taken once.
	pub fn take_at<T: Any>(&mut self, index: usize) -> Result<T, ArgsError> {
		let slot = self.values.get_mut(index).ok_or(ArgsError::Missing(index))?;
		let value = slot.take().ok_or(ArgsError::Missing(index))?;

		match value.downcast::<T>() {
			Ok(value) => Ok(*value),
			Err(value) => {
				*slot = Some(value);

				Err(ArgsError::TypeMismatch {
					index,
					expected: type_name::<T>(),
				})
			}
		}
	}
}

#[derive(Debug, ImplError)]
pub enum ArgsError {
	#[error("argument {0} is missing or was already taken")]
	Missing(usize),
	#[error("argument {index} is not of type {expected}")]
	TypeMismatch {
		index: usize,
		expected: &'static str,
	},
}

// --------------------------------------------------
// Handlers

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) trait ErasedHandler: Send + Sync {
	fn call(&self, instance: &(dyn Any + Send + Sync), args: &mut Args<'_>)
		-> Result<MethodResult, BoxedError>;
}

struct TypedHandler<T, F, R> {
	handler: F,
	_mark: PhantomData<fn(&T) -> R>,
}

impl<T, F, R> ErasedHandler for TypedHandler<T, F, R>
where
	T: Any + Send + Sync,
	F: Fn(&T, &mut Args<'_>) -> R + Send + Sync,
	R: IntoMethodResult,
{
	fn call(
		&self,
		instance: &(dyn Any + Send + Sync),
		args: &mut Args<'_>,
	) -> Result<MethodResult, BoxedError> {
		let instance = instance.downcast_ref::<T>().expect(SCOPE_VALIDITY);

		(self.handler)(instance, args).into_method_result()
	}
}

// --------------------------------------------------
// MethodDefinition

/// A resource method of the resource type `T` before it's added to a resource.
pub struct MethodDefinition<T> {
	method: Method,
	consumes: Vec<Box<str>>,
	produces: Vec<Box<str>>,
	params: Vec<Param>,
	handler: Arc<dyn ErasedHandler>,
	_mark: PhantomData<fn(&T)>,
}

impl<T> MethodDefinition<T> {
	pub(crate) fn new<F, R>(method: Method, handler: F) -> Self
	where
		T: Any + Send + Sync,
		F: Fn(&T, &mut Args<'_>) -> R + Send + Sync + 'static,
		R: IntoMethodResult + 'static,
	{
		Self {
			method,
			consumes: Vec::new(),
			produces: Vec::new(),
			params: Vec::new(),
			handler: Arc::new(TypedHandler {
				handler,
				_mark: PhantomData,
			}),
			_mark: PhantomData,
		}
	}

	/// Sets the media types of the request entity the method accepts. When not set,
	/// the method accepts any media type.
	pub fn consumes<I, M>(mut self, media_types: I) -> Self
	where
		I: IntoIterator<Item = M>,
		M: AsRef<str>,
	{
		self.consumes = media_types
			.into_iter()
			.map(|media_type| media_type.as_ref().into())
			.collect();

		self
	}

	/// Sets the media types of the response entity the method produces. When not set,
	/// the method produces any media type.
	pub fn produces<I, M>(mut self, media_types: I) -> Self
	where
		I: IntoIterator<Item = M>,
		M: AsRef<str>,
	{
		self.produces = media_types
			.into_iter()
			.map(|media_type| media_type.as_ref().into())
			.collect();

		self
	}

	pub fn param(mut self, param: Param) -> Self {
		self.params.push(param);

		self
	}

	pub(crate) fn into_descriptor(
		self,
		resource_id: ResourceId,
		some_path: Option<&str>,
	) -> Result<MethodDescriptor, RegistrationError> {
		Ok(MethodDescriptor {
			method: self.method,
			resource_id,
			some_path: some_path.map(Into::into),
			consumes: parse_media_types(&self.consumes)?,
			produces: parse_media_types(&self.produces)?,
			params: self.params.into(),
			handler: self.handler,
			synthesized: false,
		})
	}
}

// Parses and sorts the media types by specificity. An empty list becomes `*/*`.
fn parse_media_types(media_types: &[Box<str>]) -> Result<Vec<Mime>, RegistrationError> {
	if media_types.is_empty() {
		return Ok(vec![mime::STAR_STAR]);
	}

	let mut media_types = media_types
		.iter()
		.map(|media_type| {
			Mime::from_str(media_type)
				.map_err(|_| RegistrationError::InvalidMediaType(media_type.clone()))
		})
		.collect::<Result<Vec<_>, _>>()?;

	sort_by_specificity(&mut media_types);

	Ok(media_types)
}

// ----------

macro_rules! method_definition_by_method {
	($func:ident, $http_method:path) => {
		pub fn $func<T, F, R>(handler: F) -> MethodDefinition<T>
		where
			T: Any + Send + Sync,
			F: Fn(&T, &mut Args<'_>) -> R + Send + Sync + 'static,
			R: IntoMethodResult + 'static,
		{
			MethodDefinition::new($http_method, handler)
		}
	};
}

method_definition_by_method!(_get, Method::GET);
method_definition_by_method!(_head, Method::HEAD);
method_definition_by_method!(_post, Method::POST);
method_definition_by_method!(_put, Method::PUT);
method_definition_by_method!(_patch, Method::PATCH);
method_definition_by_method!(_delete, Method::DELETE);
method_definition_by_method!(_options, Method::OPTIONS);

pub fn _method<T, M, F, R>(method: M, handler: F) -> MethodDefinition<T>
where
	T: Any + Send + Sync,
	M: AsRef<str>,
	F: Fn(&T, &mut Args<'_>) -> R + Send + Sync + 'static,
	R: IntoMethodResult + 'static,
{
	let method = Method::from_str(method.as_ref())
		.expect("HTTP method should be a valid token [RFC 9110, 5.6.2 Tokens]");

	MethodDefinition::new(method, handler)
}

// --------------------------------------------------
// MethodDescriptor

/// A registered resource method or sub-resource method.
#[derive(Clone)]
pub struct MethodDescriptor {
	method: Method,
	resource_id: ResourceId,
	some_path: Option<Box<str>>,
	consumes: Vec<Mime>,
	produces: Vec<Mime>,
	params: Arc<[Param]>,
	handler: Arc<dyn ErasedHandler>,
	synthesized: bool,
}

impl MethodDescriptor {
	pub(crate) fn synthesized(
		method: Method,
		resource_id: ResourceId,
		some_path: Option<&str>,
		handler: Arc<dyn ErasedHandler>,
	) -> Self {
		Self {
			method,
			resource_id,
			some_path: some_path.map(Into::into),
			consumes: vec![mime::STAR_STAR],
			produces: vec![mime::STAR_STAR],
			params: Arc::new([]),
			handler,
			synthesized: true,
		}
	}

	#[inline(always)]
	pub fn method(&self) -> &Method {
		&self.method
	}

	#[inline(always)]
	pub fn resource_id(&self) -> ResourceId {
		self.resource_id
	}

	/// Returns the path template of a sub-resource method.
	#[inline(always)]
	pub fn path(&self) -> Option<&str> {
		self.some_path.as_deref()
	}

	#[inline(always)]
	pub fn consumes(&self) -> &[Mime] {
		&self.consumes
	}

	#[inline(always)]
	pub fn produces(&self) -> &[Mime] {
		&self.produces
	}

	#[inline(always)]
	pub fn params(&self) -> &[Param] {
		&self.params
	}

	/// Checks whether the method was added by the framework, e.g., a HEAD method derived
	/// from a GET method.
	#[inline(always)]
	pub fn is_synthesized(&self) -> bool {
		self.synthesized
	}

	#[inline]
	pub(crate) fn invoke(
		&self,
		instance: &(dyn Any + Send + Sync),
		args: &mut Args<'_>,
	) -> Result<MethodResult, BoxedError> {
		self.handler.call(instance, args)
	}

	// Media type lists are compared as sets.
	pub(crate) fn has_same_media_types(&self, other: &Self) -> bool {
		fn set_equal(a: &[Mime], b: &[Mime]) -> bool {
			a.iter().all(|media_type| b.contains(media_type))
				&& b.iter().all(|media_type| a.contains(media_type))
		}

		set_equal(&self.consumes, &other.consumes) && set_equal(&self.produces, &other.produces)
	}

	fn to_head(&self) -> Self {
		let mut head = self.clone();
		head.method = Method::HEAD;
		head.synthesized = true;

		head
	}
}

impl Debug for MethodDescriptor {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("MethodDescriptor")
			.field("method", &self.method)
			.field("resource_id", &self.resource_id)
			.field("path", &self.some_path)
			.field("consumes", &self.consumes)
			.field("produces", &self.produces)
			.field("params", &self.params)
			.field("synthesized", &self.synthesized)
			.finish()
	}
}

// --------------------------------------------------
// MethodMap

/// Resource methods grouped by their HTTP method, in the order of their registration.
#[derive(Debug, Clone, Default)]
pub struct MethodMap {
	entries: Vec<(Method, Vec<MethodDescriptor>)>,
}

impl MethodMap {
	pub fn get(&self, method: &Method) -> Option<&[MethodDescriptor]> {
		self
			.entries
			.iter()
			.find_map(|(entry_method, descriptors)| {
				(entry_method == method).then_some(descriptors.as_slice())
			})
	}

	#[inline]
	pub fn contains(&self, method: &Method) -> bool {
		self.get(method).is_some()
	}

	pub fn methods(&self) -> impl Iterator<Item = &Method> {
		self.entries.iter().map(|(method, _)| method)
	}

	pub fn descriptors(&self) -> impl Iterator<Item = &MethodDescriptor> {
		self
			.entries
			.iter()
			.flat_map(|(_, descriptors)| descriptors.iter())
	}

	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	// Fails with the rejected descriptor when a method with the same HTTP method and
	// the same media types exists.
	pub(crate) fn insert(&mut self, descriptor: MethodDescriptor) -> Result<(), MethodDescriptor> {
		let some_position = self
			.entries
			.iter()
			.position(|(method, _)| method == descriptor.method());

		let Some(position) = some_position else {
			self
				.entries
				.push((descriptor.method().clone(), vec![descriptor]));

			return Ok(());
		};

		let descriptors = &mut self.entries[position].1;
		if descriptors
			.iter()
			.any(|existing| existing.has_same_media_types(&descriptor))
		{
			return Err(descriptor);
		}

		descriptors.push(descriptor);

		Ok(())
	}

	// Adds a HEAD method for each GET method that has no HEAD counterpart with the
	// same media types.
	pub(crate) fn synthesize_head(&mut self) {
		let heads = self
			.get(&Method::GET)
			.unwrap_or_default()
			.iter()
			.map(MethodDescriptor::to_head)
			.collect::<Vec<_>>();

		for head in heads {
			// A declared HEAD method with the same media types is kept.
			let _ = self.insert(head);
		}
	}

	// Sorts the methods of each HTTP method by the specificity of their first consumed
	// media type, then of their first produced media type. The sort is stable.
	pub(crate) fn sort(&mut self) {
		for (_, descriptors) in self.entries.iter_mut() {
			descriptors.sort_by(|a, b| {
				compare_specificity(&a.consumes[0], &b.consumes[0])
					.then_with(|| compare_specificity(&a.produces[0], &b.produces[0]))
			});
		}
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	struct Resource;

	fn descriptor(definition: MethodDefinition<Resource>) -> MethodDescriptor {
		definition
			.into_descriptor(ResourceId::of::<Resource>(), None)
			.unwrap()
	}

	// --------------------------------------------------

	#[test]
	fn method_definition() {
		let descriptor = super::test::descriptor(
			_post(|_: &Resource, _: &mut Args| ())
				.consumes(["text/*", "application/json"])
				.produces([mime::TEXT_PLAIN]),
		);

		assert_eq!(descriptor.method(), Method::POST);
		assert_eq!(descriptor.consumes(), [mime::APPLICATION_JSON, mime::TEXT_STAR]);
		assert_eq!(descriptor.produces(), [mime::TEXT_PLAIN]);
		assert!(!descriptor.is_synthesized());

		let descriptor = super::test::descriptor(_get(|_: &Resource, _: &mut Args| ()));
		assert_eq!(descriptor.consumes(), [mime::STAR_STAR]);
		assert_eq!(descriptor.produces(), [mime::STAR_STAR]);

		let result = _get(|_: &Resource, _: &mut Args| ())
			.consumes(["invalid"])
			.into_descriptor(ResourceId::of::<Resource>(), None);

		assert!(matches!(result, Err(RegistrationError::InvalidMediaType(_))));
	}

	#[test]
	#[should_panic(expected = "valid token")]
	fn invalid_method() {
		let _ = _method("GE T", |_: &Resource, _: &mut Args| ());
	}

	#[test]
	fn method_map() {
		let mut method_map = MethodMap::default();

		method_map
			.insert(descriptor(
				_get(|_: &Resource, _: &mut Args| ()).produces(["text/plain", "application/json"]),
			))
			.unwrap();

		method_map
			.insert(descriptor(_get(|_: &Resource, _: &mut Args| ()).produces(["*/*"])))
			.unwrap();

		method_map
			.insert(descriptor(_post(|_: &Resource, _: &mut Args| ())))
			.unwrap();

		// Set-equal media types.
		let result = method_map.insert(descriptor(
			_get(|_: &Resource, _: &mut Args| ()).produces(["application/json", "text/plain"]),
		));

		assert!(result.is_err());

		method_map.synthesize_head();
		method_map.sort();

		assert_eq!(
			method_map.methods().collect::<Vec<_>>(),
			[Method::GET, Method::POST, Method::HEAD]
		);

		let heads = method_map.get(&Method::HEAD).unwrap();
		assert_eq!(heads.len(), 2);
		assert!(heads.iter().all(MethodDescriptor::is_synthesized));
		assert_eq!(heads[0].produces()[0], mime::TEXT_PLAIN);
		assert_eq!(heads[1].produces()[0], mime::STAR_STAR);

		assert!(method_map.get(&Method::PUT).is_none());
	}

	#[test]
	fn args() {
		let context = ApplicationContext::for_test();
		let mut args = Args::new(
			vec![Box::new(7u32), Box::new(String::from("x"))],
			&context,
		);

		assert_eq!(args.len(), 2);
		assert!(matches!(
			args.take::<String>(),
			Err(ArgsError::TypeMismatch { index: 0, .. })
		));

		assert_eq!(args.take::<u32>().unwrap(), 7);
		assert_eq!(args.take::<String>().unwrap(), "x");
		assert!(matches!(args.take::<u32>(), Err(ArgsError::Missing(2))));
		assert!(matches!(args.take_at::<u32>(0), Err(ArgsError::Missing(0))));
	}
}
