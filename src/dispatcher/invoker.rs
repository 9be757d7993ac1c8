use std::{
	any::Any,
	panic::{catch_unwind, AssertUnwindSafe},
};

use crate::{
	common::BoxedError,
	data::bind_params,
	resource::{Args, Instance, LocatorDescriptor, MethodDescriptor, ResourceDescriptor},
	response::MethodResult,
	ImplError,
};

use super::ApplicationContext;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// Runs the method invoker filters, binds the parameters, and calls the method.
pub(crate) fn invoke_method(
	method: &MethodDescriptor,
	instance: &Instance,
	context: &ApplicationContext,
) -> Result<MethodResult, BoxedError> {
	let path = context.request().matching_path();
	for filter in context.providers().method_invoker_filters(&path) {
		filter.accept(method, context)?;
	}

	let values = bind_params(method.params(), context)?;
	let mut args = Args::new(values, context);

	guard(|| method.invoke(instance.as_ref(), &mut args))
}

pub(crate) fn invoke_locator(
	locator: &LocatorDescriptor,
	instance: &Instance,
	context: &ApplicationContext,
) -> Result<(Instance, std::sync::Arc<ResourceDescriptor>), BoxedError> {
	let values = bind_params(locator.params(), context)?;
	let mut args = Args::new(values, context);

	guard(|| locator.locate(instance.as_ref(), &mut args))
}

pub(crate) fn instantiate(
	descriptor: &ResourceDescriptor,
	context: &ApplicationContext,
) -> Result<Instance, BoxedError> {
	guard(|| descriptor.instance(context))
}

// Converts a panic escaping the application code into an error.
pub(crate) fn guard<T, Func>(func: Func) -> Result<T, BoxedError>
where
	Func: FnOnce() -> Result<T, BoxedError>,
{
	catch_unwind(AssertUnwindSafe(func)).unwrap_or_else(|payload| {
		let panic = HandlerPanic::from_payload(payload);
		tracing::error!("{}", panic);

		Err(panic.into())
	})
}

// --------------------------------------------------
// HandlerPanic

/// An error created from a panic in a resource method, a locator, or a factory.
#[derive(Debug, ImplError)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
	message: Box<str>,
}

impl HandlerPanic {
	fn from_payload(payload: Box<dyn Any + Send>) -> Self {
		let message = match payload.downcast::<String>() {
			Ok(message) => message.into_boxed_str(),
			Err(payload) => match payload.downcast::<&'static str>() {
				Ok(message) => (*message).into(),
				Err(_) => "unknown payload".into(),
			},
		};

		Self { message }
	}

	#[inline(always)]
	pub fn message(&self) -> &str {
		&self.message
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	// --------------------------------------------------------------------------------
	// --------------------------------------------------------------------------------

	#[test]
	fn guard() {
		let result = super::guard(|| Ok(1));
		assert_eq!(result.unwrap(), 1);

		let result = super::guard::<(), _>(|| panic!("broken {}", "handler"));
		let error = result.unwrap_err();
		let panic = error.downcast_ref::<HandlerPanic>().unwrap();
		assert_eq!(panic.message(), "broken handler");

		let result = super::guard::<(), _>(|| panic!("broken"));
		let error = result.unwrap_err();
		assert_eq!(error.to_string(), "handler panicked: broken");
	}
}
