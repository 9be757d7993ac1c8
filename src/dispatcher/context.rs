use std::{
	collections::HashMap,
	sync::{Arc, Mutex, PoisonError},
};

use http::Extensions;
use mime::Mime;

use crate::{
	media::AcceptMediaType,
	provider::Providers,
	request::ContainerRequest,
	resource::ResourceId,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// Application properties, readable by context parameters.
pub type Properties = HashMap<Box<str>, Box<str>>;

// --------------------------------------------------
// ApplicationContext

/// The state of a single request's processing.
///
/// The context owns the request and is dropped when the request is answered.
/// Besides the application properties, it keeps typed per-request attributes that
/// locators and methods can leave for the later stages of the processing.
pub struct ApplicationContext {
	request: ContainerRequest,
	providers: Arc<Providers>,
	properties: Arc<Properties>,
	accept: Vec<AcceptMediaType>,
	path_parameters: Vec<(Box<str>, String)>,
	matched_uris: Vec<String>,
	matched_resources: Vec<ResourceId>,
	some_negotiated_media_type: Option<Mime>,
	attributes: Mutex<Extensions>,
}

impl ApplicationContext {
	pub fn new(
		request: ContainerRequest,
		providers: Arc<Providers>,
		properties: Arc<Properties>,
	) -> Self {
		let accept = request.acceptable_media_types();

		Self {
			request,
			providers,
			properties,
			accept,
			path_parameters: Vec::new(),
			matched_uris: Vec::new(),
			matched_resources: Vec::new(),
			some_negotiated_media_type: None,
			attributes: Mutex::new(Extensions::new()),
		}
	}

	#[cfg(test)]
	pub(crate) fn for_test() -> Self {
		use http::{HeaderMap, Method, Uri};

		let request = ContainerRequest::new(
			Method::GET,
			Uri::from_static("/"),
			HeaderMap::new(),
			bytes::Bytes::new(),
		);

		Self::new(request, Arc::default(), Arc::default())
	}

	#[inline(always)]
	pub fn request(&self) -> &ContainerRequest {
		&self.request
	}

	#[inline(always)]
	pub(crate) fn request_mut(&mut self) -> &mut ContainerRequest {
		&mut self.request
	}

	pub(crate) fn into_request(self) -> ContainerRequest {
		self.request
	}

	#[inline(always)]
	pub fn providers(&self) -> &Providers {
		&self.providers
	}

	#[inline]
	pub fn property(&self, name: &str) -> Option<&str> {
		self.properties.get(name).map(AsRef::as_ref)
	}

	#[inline(always)]
	pub fn properties(&self) -> &Properties {
		&self.properties
	}

	/// Returns the acceptable media types of the request in descending quality order.
	#[inline(always)]
	pub fn acceptable_media_types(&self) -> &[AcceptMediaType] {
		&self.accept
	}

	/// Returns the raw value of the path parameter. When the name was matched more
	/// than once, the last matched value is returned.
	pub fn path_parameter(&self, name: &str) -> Option<&str> {
		self
			.path_parameters
			.iter()
			.rev()
			.find_map(|(parameter_name, value)| (parameter_name.as_ref() == name).then_some(value.as_str()))
	}

	/// Returns the path parameters in the order of their matching.
	pub fn path_parameters(&self) -> impl Iterator<Item = (&str, &str)> {
		self
			.path_parameters
			.iter()
			.map(|(name, value)| (name.as_ref(), value.as_str()))
	}

	/// Returns the matched parts of the path, the most recently matched first.
	pub fn matched_uris(&self) -> impl Iterator<Item = &str> {
		self.matched_uris.iter().rev().map(String::as_str)
	}

	/// Returns the matched resources, the most recently matched first.
	pub fn matched_resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
		self.matched_resources.iter().rev().copied()
	}

	/// Returns the media type selected for the response entity.
	#[inline(always)]
	pub fn negotiated_media_type(&self) -> Option<&Mime> {
		self.some_negotiated_media_type.as_ref()
	}

	/// Stores the per-request attribute and returns the previous attribute of the
	/// same type.
	pub fn set_attribute<T: Clone + Send + Sync + 'static>(&self, value: T) -> Option<T> {
		self
			.attributes
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(value)
	}

	pub fn attribute<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
		self
			.attributes
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get::<T>()
			.cloned()
	}

	pub fn remove_attribute<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
		self
			.attributes
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove::<T>()
	}

	// -------------------------

	pub(crate) fn push_match(
		&mut self,
		resource_id: ResourceId,
		names: &[Box<str>],
		values: Vec<String>,
		matched_uri: String,
	) {
		self
			.path_parameters
			.extend(names.iter().cloned().zip(values));

		self.matched_uris.push(matched_uri);
		self.matched_resources.push(resource_id);
	}

	#[inline(always)]
	pub(crate) fn set_negotiated_media_type(&mut self, media_type: Mime) {
		self.some_negotiated_media_type = Some(media_type);
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
