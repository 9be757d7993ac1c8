use std::{
	any::{type_name, Any, TypeId},
	collections::HashMap,
	fmt::{self, Debug, Formatter},
	marker::PhantomData,
	sync::{Arc, PoisonError, RwLock},
};

use http::StatusCode;

use crate::{
	common::{BoxedError, SCOPE_VALIDITY},
	data::Param,
	pattern::UriPattern,
	response::WebApplicationError,
};

use super::{
	method::{Args, Instance},
	RegistrationError, ResourceDescriptor, ResourceId,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// Describe trait

/// Implemented by sub-resource types that describe their own resource model.
///
/// The descriptor is built once per locator and reused.
pub trait Describe: Any + Send + Sync + Sized {
	fn describe() -> Result<ResourceDescriptor, RegistrationError>;
}

// --------------------------------------------------
// SubResource

enum DescriptorSource {
	Describe(fn() -> Result<ResourceDescriptor, RegistrationError>),
	Given(Arc<ResourceDescriptor>),
}

/// A resource object returned by a sub-resource locator.
pub struct SubResource {
	instance: Instance,
	type_id: TypeId,
	type_name: &'static str,
	descriptor_source: DescriptorSource,
}

impl SubResource {
	pub fn new<R: Describe>(instance: R) -> Self {
		Self::shared(Arc::new(instance))
	}

	pub fn shared<R: Describe>(instance: Arc<R>) -> Self {
		Self {
			instance,
			type_id: TypeId::of::<R>(),
			type_name: type_name::<R>(),
			descriptor_source: DescriptorSource::Describe(R::describe),
		}
	}

	/// Creates a sub-resource with an already built descriptor. The descriptor must
	/// describe the type `R`.
	pub fn with_descriptor<R: Any + Send + Sync>(
		instance: R,
		descriptor: Arc<ResourceDescriptor>,
	) -> Result<Self, RegistrationError> {
		if descriptor.id() != ResourceId::of::<R>() {
			return Err(RegistrationError::TypeMismatch {
				descriptor: descriptor.id().type_name(),
				instance: type_name::<R>(),
			});
		}

		Ok(Self {
			instance: Arc::new(instance),
			type_id: TypeId::of::<R>(),
			type_name: type_name::<R>(),
			descriptor_source: DescriptorSource::Given(descriptor),
		})
	}

	#[inline(always)]
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}
}

impl Debug for SubResource {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("SubResource")
			.field("type_name", &self.type_name)
			.finish()
	}
}

// --------------------------------------------------
// IntoSubResource trait

/// Implemented by the return types of sub-resource locators.
pub trait IntoSubResource {
	fn into_sub_resource(self) -> Result<SubResource, BoxedError>;
}

impl IntoSubResource for SubResource {
	#[inline(always)]
	fn into_sub_resource(self) -> Result<SubResource, BoxedError> {
		Ok(self)
	}
}

/// `None` is answered with `404 Not Found`.
impl<L: IntoSubResource> IntoSubResource for Option<L> {
	fn into_sub_resource(self) -> Result<SubResource, BoxedError> {
		match self {
			Some(sub_resource) => sub_resource.into_sub_resource(),
			None => Err(WebApplicationError::from(StatusCode::NOT_FOUND).into()),
		}
	}
}

impl<L, E> IntoSubResource for Result<L, E>
where
	L: IntoSubResource,
	E: Into<BoxedError>,
{
	fn into_sub_resource(self) -> Result<SubResource, BoxedError> {
		self.map_err(Into::into)?.into_sub_resource()
	}
}

// --------------------------------------------------
// Locators

pub(crate) trait ErasedLocator: Send + Sync {
	fn call(&self, instance: &(dyn Any + Send + Sync), args: &mut Args<'_>)
		-> Result<SubResource, BoxedError>;
}

struct TypedLocator<T, F, L> {
	handler: F,
	_mark: PhantomData<fn(&T) -> L>,
}

impl<T, F, L> ErasedLocator for TypedLocator<T, F, L>
where
	T: Any + Send + Sync,
	F: Fn(&T, &mut Args<'_>) -> L + Send + Sync,
	L: IntoSubResource,
{
	fn call(
		&self,
		instance: &(dyn Any + Send + Sync),
		args: &mut Args<'_>,
	) -> Result<SubResource, BoxedError> {
		let instance = instance.downcast_ref::<T>().expect(SCOPE_VALIDITY);

		(self.handler)(instance, args).into_sub_resource()
	}
}

/// A sub-resource locator of the resource type `T` before it's added to a resource.
pub struct LocatorDefinition<T> {
	params: Vec<Param>,
	handler: Arc<dyn ErasedLocator>,
	_mark: PhantomData<fn(&T)>,
}

impl<T> LocatorDefinition<T> {
	pub fn param(mut self, param: Param) -> Self {
		self.params.push(param);

		self
	}

	pub(crate) fn into_descriptor(self, resource_id: ResourceId, pattern: UriPattern) -> LocatorDescriptor {
		LocatorDescriptor {
			pattern,
			resource_id,
			params: self.params.into(),
			handler: self.handler,
			descriptors: Arc::default(),
		}
	}
}

pub fn _locator<T, F, L>(handler: F) -> LocatorDefinition<T>
where
	T: Any + Send + Sync,
	F: Fn(&T, &mut Args<'_>) -> L + Send + Sync + 'static,
	L: IntoSubResource + 'static,
{
	LocatorDefinition {
		params: Vec::new(),
		handler: Arc::new(TypedLocator {
			handler,
			_mark: PhantomData,
		}),
		_mark: PhantomData,
	}
}

// --------------------------------------------------
// LocatorDescriptor

/// A registered sub-resource locator.
#[derive(Clone)]
pub struct LocatorDescriptor {
	pattern: UriPattern,
	resource_id: ResourceId,
	params: Arc<[Param]>,
	handler: Arc<dyn ErasedLocator>,
	descriptors: Arc<RwLock<HashMap<TypeId, Arc<ResourceDescriptor>>>>,
}

impl LocatorDescriptor {
	#[inline(always)]
	pub fn pattern(&self) -> &UriPattern {
		&self.pattern
	}

	#[inline(always)]
	pub fn resource_id(&self) -> ResourceId {
		self.resource_id
	}

	#[inline(always)]
	pub fn params(&self) -> &[Param] {
		&self.params
	}

	// Calls the locator and returns the sub-resource with its descriptor.
	pub(crate) fn locate(
		&self,
		instance: &(dyn Any + Send + Sync),
		args: &mut Args<'_>,
	) -> Result<(Instance, Arc<ResourceDescriptor>), BoxedError> {
		let SubResource {
			instance,
			type_id,
			descriptor_source,
			..
		} = self.handler.call(instance, args)?;

		let describe = match descriptor_source {
			DescriptorSource::Given(descriptor) => return Ok((instance, descriptor)),
			DescriptorSource::Describe(describe) => describe,
		};

		let some_descriptor = self
			.descriptors
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&type_id)
			.cloned();

		if let Some(descriptor) = some_descriptor {
			return Ok((instance, descriptor));
		}

		let descriptor = Arc::new(describe()?);
		self
			.descriptors
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.entry(type_id)
			.or_insert_with(|| descriptor.clone());

		Ok((instance, descriptor))
	}
}

impl Debug for LocatorDescriptor {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("LocatorDescriptor")
			.field("pattern", &self.pattern)
			.field("resource_id", &self.resource_id)
			.field("params", &self.params)
			.finish()
	}
}
