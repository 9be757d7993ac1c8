//! Request, response, and method invoker filters.

// ----------

use std::sync::Arc;

use crate::{
	common::BoxedError,
	dispatcher::ApplicationContext,
	pattern::UriPattern,
	request::ContainerRequest,
	resource::MethodDescriptor,
	response::ContainerResponse,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// Filter traits

/// Runs before the dispatch. May change the request, e.g., its method or path.
///
/// Returning a [`WebApplicationError`](crate::response::WebApplicationError) stops
/// the processing and its response is sent instead.
pub trait RequestFilter: Send + Sync {
	fn filter(&self, request: &mut ContainerRequest) -> Result<(), BoxedError>;
}

impl<Func> RequestFilter for Func
where
	Func: Fn(&mut ContainerRequest) -> Result<(), BoxedError> + Send + Sync,
{
	#[inline(always)]
	fn filter(&self, request: &mut ContainerRequest) -> Result<(), BoxedError> {
		self(request)
	}
}

// -------------------------

/// Runs after the dispatch and before the response entity is written. May change or
/// replace the response.
pub trait ResponseFilter: Send + Sync {
	fn filter(
		&self,
		request: &ContainerRequest,
		response: &mut ContainerResponse,
	) -> Result<(), BoxedError>;
}

impl<Func> ResponseFilter for Func
where
	Func: Fn(&ContainerRequest, &mut ContainerResponse) -> Result<(), BoxedError> + Send + Sync,
{
	#[inline(always)]
	fn filter(
		&self,
		request: &ContainerRequest,
		response: &mut ContainerResponse,
	) -> Result<(), BoxedError> {
		self(request, response)
	}
}

// -------------------------

/// Runs after a resource method is selected and before its parameters are bound.
/// An error vetoes the invocation.
pub trait MethodInvokerFilter: Send + Sync {
	fn accept(
		&self,
		method: &MethodDescriptor,
		context: &ApplicationContext,
	) -> Result<(), BoxedError>;
}

impl<Func> MethodInvokerFilter for Func
where
	Func: Fn(&MethodDescriptor, &ApplicationContext) -> Result<(), BoxedError> + Send + Sync,
{
	#[inline(always)]
	fn accept(
		&self,
		method: &MethodDescriptor,
		context: &ApplicationContext,
	) -> Result<(), BoxedError> {
		self(method, context)
	}
}

// --------------------------------------------------
// Scoped

// A filter applied only to the paths its pattern matches fully.
pub(crate) struct Scoped<F: ?Sized> {
	some_pattern: Option<UriPattern>,
	filter: Arc<F>,
}

impl<F: ?Sized> Scoped<F> {
	pub(crate) fn new(some_pattern: Option<UriPattern>, filter: Arc<F>) -> Self {
		Self {
			some_pattern,
			filter,
		}
	}

	#[inline]
	pub(crate) fn applies_to(&self, path: &str) -> bool {
		self
			.some_pattern
			.as_ref()
			.map_or(true, |pattern| pattern.is_full_match(path))
	}

	#[inline(always)]
	pub(crate) fn filter(&self) -> &F {
		&self.filter
	}
}

impl<F: ?Sized> Clone for Scoped<F> {
	fn clone(&self) -> Self {
		Self {
			some_pattern: self.some_pattern.clone(),
			filter: self.filter.clone(),
		}
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
