//! Entity providers, exception mappers, and filters.

// ----------

use std::{
	any::type_name,
	cmp::Ordering,
	sync::Arc,
};

use mime::Mime;

use crate::{
	common::Registry,
	data::{
		entity::{
			BytesEntityProvider, Entity, EntityReader, EntityType, EntityWriter, StringEntityProvider,
		},
		form::FormEntityProvider,
		json::JsonEntityProvider,
	},
	media::{compare_specificity, is_compatible, is_concrete},
	middleware::{MethodInvokerFilter, RequestFilter, ResponseFilter, Scoped},
	pattern::{UriPattern, UriTemplateError},
	response::ContainerResponse,
	StdError,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

type ErasedMapper = dyn Fn(&(dyn StdError + 'static)) -> Option<ContainerResponse> + Send + Sync;
type DefaultMapper = dyn Fn(&(dyn StdError + 'static)) -> ContainerResponse + Send + Sync;

// --------------------------------------------------
// Providers

/// A snapshot of the registered providers.
///
/// Providers added by the application come before the built-in ones.
#[derive(Clone)]
pub struct Providers {
	readers: Vec<Arc<dyn EntityReader>>,
	writers: Vec<Arc<dyn EntityWriter>>,
	builtin_readers: Vec<Arc<dyn EntityReader>>,
	builtin_writers: Vec<Arc<dyn EntityWriter>>,
	exception_mappers: Vec<(&'static str, Arc<ErasedMapper>)>,
	some_default_mapper: Option<Arc<DefaultMapper>>,
	request_filters: Vec<Scoped<dyn RequestFilter>>,
	response_filters: Vec<Scoped<dyn ResponseFilter>>,
	method_invoker_filters: Vec<Scoped<dyn MethodInvokerFilter>>,
}

impl Default for Providers {
	fn default() -> Self {
		Self {
			readers: Vec::new(),
			writers: Vec::new(),
			builtin_readers: vec![
				Arc::new(StringEntityProvider),
				Arc::new(BytesEntityProvider),
				Arc::new(JsonEntityProvider),
				Arc::new(FormEntityProvider),
			],
			builtin_writers: vec![
				Arc::new(StringEntityProvider),
				Arc::new(BytesEntityProvider),
				Arc::new(JsonEntityProvider),
				Arc::new(FormEntityProvider),
			],
			exception_mappers: Vec::new(),
			some_default_mapper: None,
			request_filters: Vec::new(),
			response_filters: Vec::new(),
			method_invoker_filters: Vec::new(),
		}
	}
}

impl Providers {
	/// Returns the reader of the `entity_type` in the `media_type`.
	///
	/// Among the readers of a group, the one declaring the most specific compatible
	/// media type wins. Equally specific readers are taken in their registration order.
	pub fn reader_for(
		&self,
		entity_type: &EntityType,
		media_type: &Mime,
	) -> Option<&Arc<dyn EntityReader>> {
		select_reader(&self.readers, entity_type, media_type)
			.or_else(|| select_reader(&self.builtin_readers, entity_type, media_type))
	}

	/// Returns the writer of the `entity` in the `media_type` and the concrete media
	/// type of the response body.
	///
	/// When the `media_type` has wildcards, the most specific compatible media type the
	/// writer declares is used. A writer that declares only wildcards writes
	/// `application/octet-stream`.
	pub fn writer_for(
		&self,
		entity: &Entity,
		media_type: &Mime,
	) -> Option<(&Arc<dyn EntityWriter>, Mime)> {
		let (writer, some_declared) = select_writer(&self.writers, entity, media_type)
			.or_else(|| select_writer(&self.builtin_writers, entity, media_type))?;

		let response_media_type = if is_concrete(media_type) {
			media_type.clone()
		} else {
			some_declared
				.filter(is_concrete)
				.unwrap_or(mime::APPLICATION_OCTET_STREAM)
		};

		Some((writer, response_media_type))
	}

	/// Maps the error to a response.
	///
	/// Looks for a mapper of the error's type, then of each error in its source chain,
	/// and falls back to the default mapper.
	pub fn map_error(&self, error: &(dyn StdError + 'static)) -> Option<ContainerResponse> {
		self
			.map_error_chain(error)
			.or_else(|| self.some_default_mapper.as_ref().map(|mapper| mapper(error)))
	}

	// Doesn't consult the default mapper.
	pub(crate) fn map_error_chain(&self, error: &(dyn StdError + 'static)) -> Option<ContainerResponse> {
		let mut some_error = Some(error);
		while let Some(error) = some_error {
			for (type_name, mapper) in self.exception_mappers.iter() {
				if let Some(response) = mapper(error) {
					tracing::debug!("error mapped by the mapper of {}", type_name);

					return Some(response);
				}
			}

			some_error = error.source();
		}

		None
	}

	pub(crate) fn request_filters<'p>(
		&'p self,
		path: &'p str,
	) -> impl Iterator<Item = &'p (dyn RequestFilter + 'static)> + 'p {
		self
			.request_filters
			.iter()
			.filter(move |scoped| scoped.applies_to(path))
			.map(Scoped::filter)
	}

	pub(crate) fn response_filters<'p>(
		&'p self,
		path: &'p str,
	) -> impl Iterator<Item = &'p (dyn ResponseFilter + 'static)> + 'p {
		self
			.response_filters
			.iter()
			.filter(move |scoped| scoped.applies_to(path))
			.map(Scoped::filter)
	}

	pub(crate) fn method_invoker_filters<'p>(
		&'p self,
		path: &'p str,
	) -> impl Iterator<Item = &'p (dyn MethodInvokerFilter + 'static)> + 'p {
		self
			.method_invoker_filters
			.iter()
			.filter(move |scoped| scoped.applies_to(path))
			.map(Scoped::filter)
	}
}

fn select_reader<'r>(
	readers: &'r [Arc<dyn EntityReader>],
	entity_type: &EntityType,
	media_type: &Mime,
) -> Option<&'r Arc<dyn EntityReader>> {
	readers
		.iter()
		.filter(|reader| reader.is_readable(entity_type, media_type))
		.map(|reader| (reader, most_specific(reader.media_types(), media_type)))
		.min_by(|(_, a), (_, b)| compare_some_specificity(a.as_ref(), b.as_ref()))
		.map(|(reader, _)| reader)
}

fn select_writer<'w>(
	writers: &'w [Arc<dyn EntityWriter>],
	entity: &Entity,
	media_type: &Mime,
) -> Option<(&'w Arc<dyn EntityWriter>, Option<Mime>)> {
	writers
		.iter()
		.filter(|writer| writer.is_writeable(entity, media_type))
		.map(|writer| (writer, most_specific(writer.media_types(), media_type)))
		.min_by(|(_, a), (_, b)| compare_some_specificity(a.as_ref(), b.as_ref()))
}

// Returns the most specific of the `media_types` compatible with the `media_type`.
fn most_specific(media_types: &[Mime], media_type: &Mime) -> Option<Mime> {
	media_types
		.iter()
		.filter(|declared| is_compatible(declared, media_type))
		.min_by(|a, b| compare_specificity(a, b))
		.cloned()
}

fn compare_some_specificity(a: Option<&Mime>, b: Option<&Mime>) -> Ordering {
	match (a, b) {
		(Some(a), Some(b)) => compare_specificity(a, b),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}

// --------------------------------------------------
// ProviderBinder

/// The registry of providers.
///
/// Providers are usually added before the requests are served. Changes made later
/// affect only the requests that start after them.
///
/// ```
/// use restive::{
/// 	provider::ProviderBinder,
/// 	response::ContainerResponse,
/// };
/// use http::StatusCode;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("book not found")]
/// struct BookNotFound;
///
/// let providers = ProviderBinder::new();
/// providers.add_exception_mapper(|_: &BookNotFound| ContainerResponse::new(StatusCode::NOT_FOUND));
/// ```
#[derive(Default)]
pub struct ProviderBinder {
	providers: Registry<Providers>,
}

impl ProviderBinder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the current snapshot of the providers.
	#[inline]
	pub fn providers(&self) -> Arc<Providers> {
		self.providers.load()
	}

	pub fn add_entity_reader<R: EntityReader + 'static>(&self, reader: R) {
		self.modify(|providers| providers.readers.push(Arc::new(reader)));
	}

	pub fn add_entity_writer<W: EntityWriter + 'static>(&self, writer: W) {
		self.modify(|providers| providers.writers.push(Arc::new(writer)));
	}

	/// Adds a mapper of the errors of the type `E`. Mappers are tried in their
	/// registration order.
	pub fn add_exception_mapper<E, Func>(&self, mapper: Func)
	where
		E: StdError + 'static,
		Func: Fn(&E) -> ContainerResponse + Send + Sync + 'static,
	{
		let erased: Arc<ErasedMapper> =
			Arc::new(move |error: &(dyn StdError + 'static)| error.downcast_ref::<E>().map(&mapper));

		self.modify(|providers| providers.exception_mappers.push((type_name::<E>(), erased)));
	}

	/// Sets the mapper of the errors no other mapper maps.
	pub fn set_default_exception_mapper<Func>(&self, mapper: Func)
	where
		Func: Fn(&(dyn StdError + 'static)) -> ContainerResponse + Send + Sync + 'static,
	{
		self.modify(|providers| providers.some_default_mapper = Some(Arc::new(mapper)));
	}

	pub fn add_request_filter<F: RequestFilter + 'static>(&self, filter: F) {
		self.modify(|providers| {
			providers
				.request_filters
				.push(Scoped::new(None, Arc::new(filter)))
		});
	}

	/// Adds a request filter applied only to the paths the `template` matches fully.
	pub fn add_scoped_request_filter<F: RequestFilter + 'static>(
		&self,
		template: &str,
		filter: F,
	) -> Result<(), UriTemplateError> {
		let pattern = UriPattern::compile(template)?;
		self.modify(|providers| {
			providers
				.request_filters
				.push(Scoped::new(Some(pattern), Arc::new(filter)))
		});

		Ok(())
	}

	pub fn add_response_filter<F: ResponseFilter + 'static>(&self, filter: F) {
		self.modify(|providers| {
			providers
				.response_filters
				.push(Scoped::new(None, Arc::new(filter)))
		});
	}

	pub fn add_scoped_response_filter<F: ResponseFilter + 'static>(
		&self,
		template: &str,
		filter: F,
	) -> Result<(), UriTemplateError> {
		let pattern = UriPattern::compile(template)?;
		self.modify(|providers| {
			providers
				.response_filters
				.push(Scoped::new(Some(pattern), Arc::new(filter)))
		});

		Ok(())
	}

	pub fn add_method_invoker_filter<F: MethodInvokerFilter + 'static>(&self, filter: F) {
		self.modify(|providers| {
			providers
				.method_invoker_filters
				.push(Scoped::new(None, Arc::new(filter)))
		});
	}

	pub fn add_scoped_method_invoker_filter<F: MethodInvokerFilter + 'static>(
		&self,
		template: &str,
		filter: F,
	) -> Result<(), UriTemplateError> {
		let pattern = UriPattern::compile(template)?;
		self.modify(|providers| {
			providers
				.method_invoker_filters
				.push(Scoped::new(Some(pattern), Arc::new(filter)))
		});

		Ok(())
	}

	fn modify<Func: FnOnce(&mut Providers)>(&self, func: Func) {
		let _ = self.providers.update(|providers| {
			func(providers);

			Ok::<_, ()>(())
		});
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
