//! Parameter and entity binding.

// ----------

use std::{
	any::{type_name, Any},
	collections::{BTreeSet, HashSet},
	fmt::{self, Debug, Display, Formatter},
	hash::Hash,
	net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use http::{HeaderName, StatusCode};
use mime::Mime;
use serde::de::DeserializeOwned;

use crate::{
	common::{decode_path_component, header_utils::ContentTypeError, parse_urlencoded, BoxedError},
	dispatcher::ApplicationContext,
	response::{ContainerResponse, WebApplicationError},
	ImplError,
};

// --------------------------------------------------

pub mod entity;
pub mod form;
pub mod json;

use entity::EntityType;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ParamSource

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
	Path,
	Query,
	Header,
	Matrix,
	Form,
	#[cfg(feature = "cookies")]
	Cookie,
	Entity,
	/// An application property.
	Context,
}

impl ParamSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Path => "path",
			Self::Query => "query",
			Self::Header => "header",
			Self::Matrix => "matrix",
			Self::Form => "form",
			#[cfg(feature = "cookies")]
			Self::Cookie => "cookie",
			Self::Entity => "entity",
			Self::Context => "context",
		}
	}
}

impl Display for ParamSource {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

// --------------------------------------------------
// Param

type Converter = fn(&[String]) -> Result<Box<dyn Any>, BoxedError>;

#[derive(Clone, Copy)]
enum ParamKind {
	Value(Converter),
	Entity(EntityType),
}

/// A declared parameter of a resource method, locator, or constructor.
///
/// ```
/// use restive::data::Param;
///
/// let id = Param::path::<u64>("id");
/// let tags = Param::query::<Vec<String>>("tag");
/// let page = Param::query::<u32>("page").default_value("1");
/// ```
#[derive(Clone)]
pub struct Param {
	source: ParamSource,
	name: Box<str>,
	some_default_value: Option<Box<str>>,
	encoded: bool,
	type_name: &'static str,
	kind: ParamKind,
}

impl Param {
	fn new<T: FromParam + 'static>(source: ParamSource, name: &str) -> Self {
		Self {
			source,
			name: name.into(),
			some_default_value: None,
			encoded: false,
			type_name: type_name::<T>(),
			kind: ParamKind::Value(convert::<T>),
		}
	}

	pub fn path<T: FromParam + 'static>(name: &str) -> Self {
		Self::new::<T>(ParamSource::Path, name)
	}

	pub fn query<T: FromParam + 'static>(name: &str) -> Self {
		Self::new::<T>(ParamSource::Query, name)
	}

	pub fn header<T: FromParam + 'static>(name: &str) -> Self {
		Self::new::<T>(ParamSource::Header, name)
	}

	/// A matrix parameter of the last path segment.
	pub fn matrix<T: FromParam + 'static>(name: &str) -> Self {
		Self::new::<T>(ParamSource::Matrix, name)
	}

	/// A field of the `application/x-www-form-urlencoded` request body.
	pub fn form<T: FromParam + 'static>(name: &str) -> Self {
		Self::new::<T>(ParamSource::Form, name)
	}

	#[cfg(feature = "cookies")]
	pub fn cookie<T: FromParam + 'static>(name: &str) -> Self {
		Self::new::<T>(ParamSource::Cookie, name)
	}

	/// An application property.
	pub fn context<T: FromParam + 'static>(name: &str) -> Self {
		Self::new::<T>(ParamSource::Context, name)
	}

	/// The request entity, read by a provider that can deserialize `T`.
	pub fn entity<T>() -> Self
	where
		T: DeserializeOwned + Any + Send + Sync,
	{
		Self::with_entity_type(EntityType::deserializable::<T>())
	}

	/// The request entity, read by a provider that supports `T` directly, e.g.,
	/// `String`, `Bytes`, or [`Form`](form::Form).
	pub fn raw_entity<T: Any + Send + Sync>() -> Self {
		Self::with_entity_type(EntityType::of::<T>())
	}

	fn with_entity_type(entity_type: EntityType) -> Self {
		Self {
			source: ParamSource::Entity,
			name: "".into(),
			some_default_value: None,
			encoded: false,
			type_name: entity_type.type_name(),
			kind: ParamKind::Entity(entity_type),
		}
	}

	/// Sets the value used when the request has none.
	pub fn default_value(mut self, value: &str) -> Self {
		self.some_default_value = Some(value.into());

		self
	}

	/// Disables the decoding of path, query, matrix, and form values.
	pub fn encoded(mut self) -> Self {
		self.encoded = true;

		self
	}

	#[inline(always)]
	pub fn source(&self) -> ParamSource {
		self.source
	}

	#[inline(always)]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline(always)]
	pub fn default(&self) -> Option<&str> {
		self.some_default_value.as_deref()
	}

	#[inline(always)]
	pub fn is_encoded(&self) -> bool {
		self.encoded
	}

	#[inline(always)]
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub(crate) fn bind(&self, context: &ApplicationContext) -> Result<Box<dyn Any>, BoxedError> {
		let converter = match self.kind {
			ParamKind::Value(converter) => converter,
			ParamKind::Entity(entity_type) => return bind_entity(&entity_type, context),
		};

		let mut values = self.values(context);
		if values.is_empty() {
			if let Some(default_value) = self.some_default_value.as_deref() {
				values.push(default_value.to_owned());
			}
		}

		converter(&values).map_err(|error| {
			tracing::warn!(source = %self.source, name = %self.name, "parameter binding failed: {}", error);

			ParamBindingError::Conversion {
				param_source: self.source,
				name: self.name.clone(),
				error,
			}
			.into_boxed()
		})
	}

	fn values(&self, context: &ApplicationContext) -> Vec<String> {
		let request = context.request();
		let decode = !self.encoded;

		match self.source {
			ParamSource::Path => context
				.path_parameter(&self.name)
				.map(|value| {
					if decode {
						decode_path_component(value)
					} else {
						value.to_owned()
					}
				})
				.into_iter()
				.collect(),
			ParamSource::Query => matching_values(request.query_parameters(decode), &self.name),
			ParamSource::Header => HeaderName::try_from(self.name.as_ref())
				.map(|header_name| request.header_values(&header_name))
				.unwrap_or_default(),
			ParamSource::Matrix => request
				.path_segments(decode)
				.pop()
				.map(|segment| matching_values(segment.matrix_parameters().to_vec(), &self.name))
				.unwrap_or_default(),
			ParamSource::Form => {
				let is_form = matches!(
					request.content_type(),
					Ok(Some(media_type))
						if media_type.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str(),
				);

				if !is_form {
					return Vec::new();
				}

				std::str::from_utf8(request.body())
					.map(|body| matching_values(parse_urlencoded(body, decode), &self.name))
					.unwrap_or_default()
			}
			#[cfg(feature = "cookies")]
			ParamSource::Cookie => matching_values(request.cookies(), &self.name),
			ParamSource::Context => context
				.property(&self.name)
				.map(ToOwned::to_owned)
				.into_iter()
				.collect(),
			ParamSource::Entity => Vec::new(),
		}
	}
}

impl Debug for Param {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Param")
			.field("source", &self.source)
			.field("name", &self.name)
			.field("default_value", &self.some_default_value)
			.field("encoded", &self.encoded)
			.field("type_name", &self.type_name)
			.finish()
	}
}

// Binds the parameters in the order of their declaration. The first failure stops
// the binding.
pub(crate) fn bind_params(
	params: &[Param],
	context: &ApplicationContext,
) -> Result<Vec<Box<dyn Any>>, BoxedError> {
	params.iter().map(|param| param.bind(context)).collect()
}

fn convert<T: FromParam + 'static>(values: &[String]) -> Result<Box<dyn Any>, BoxedError> {
	T::from_param(values).map(|value| Box::new(value) as Box<dyn Any>)
}

fn matching_values(pairs: Vec<(String, String)>, name: &str) -> Vec<String> {
	pairs
		.into_iter()
		.filter_map(|(pair_name, value)| (pair_name == name).then_some(value))
		.collect()
}

fn bind_entity(
	entity_type: &EntityType,
	context: &ApplicationContext,
) -> Result<Box<dyn Any>, BoxedError> {
	let request = context.request();

	let media_type = request
		.content_type()
		.map_err(|error| ParamBindingError::from(error).into_boxed())?
		.unwrap_or(mime::APPLICATION_OCTET_STREAM);

	let Some(reader) = context.providers().reader_for(entity_type, &media_type) else {
		tracing::warn!(
			"no entity reader for {} in {}",
			entity_type.type_name(),
			media_type
		);

		return Err(
			ParamBindingError::NoReader {
				type_name: entity_type.type_name(),
				media_type,
			}
			.into_boxed(),
		);
	};

	match reader.read_from(entity_type, &media_type, request.body()) {
		Ok(entity) => Ok(entity.into_value()),
		Err(error) if error.is::<WebApplicationError>() => Err(error),
		Err(error) => {
			tracing::warn!("reading {} failed: {}", entity_type.type_name(), error);

			Err(
				ParamBindingError::EntityReading {
					type_name: entity_type.type_name(),
					error,
				}
				.into_boxed(),
			)
		}
	}
}

// ----------

#[derive(Debug, ImplError)]
pub enum ParamBindingError {
	#[error("invalid {param_source} parameter {name:?}: {error}")]
	Conversion {
		param_source: ParamSource,
		name: Box<str>,
		error: BoxedError,
	},
	#[error(transparent)]
	InvalidContentType(#[from] ContentTypeError),
	#[error("no entity reader for {type_name} in {media_type}")]
	NoReader {
		type_name: &'static str,
		media_type: Mime,
	},
	#[error("invalid {type_name} entity: {error}")]
	EntityReading {
		type_name: &'static str,
		error: BoxedError,
	},
}

impl ParamBindingError {
	/// Path, query, and matrix parameters identify the resource, so their failures are
	/// answered with `404 Not Found`.
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Conversion {
				param_source: ParamSource::Path | ParamSource::Query | ParamSource::Matrix,
				..
			} => StatusCode::NOT_FOUND,
			Self::NoReader { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
			_ => StatusCode::BAD_REQUEST,
		}
	}

	#[inline(always)]
	fn into_boxed(self) -> BoxedError {
		WebApplicationError::from(self).into()
	}
}

impl From<ParamBindingError> for WebApplicationError {
	fn from(error: ParamBindingError) -> Self {
		WebApplicationError::with_cause(ContainerResponse::new(error.status()), error)
	}
}

// --------------------------------------------------------------------------------

// --------------------------------------------------
// FromParamValue trait

/// Converts a single string value into a parameter type.
///
/// Types that implement `FromStr` can use the [`from_param_value!`](crate::from_param_value)
/// macro.
pub trait FromParamValue: Sized {
	fn from_param_value(value: &str) -> Result<Self, BoxedError>;
}

crate::from_param_value!(
	bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String,
	IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr,
);

// --------------------------------------------------
// FromParam trait

/// Converts all the values of a parameter in the order of their appearance.
///
/// Scalars take the first value and fail when there is none. `Option` is `None` when
/// there is no value. Collections convert every value.
pub trait FromParam: Sized {
	fn from_param(values: &[String]) -> Result<Self, BoxedError>;
}

impl<T: FromParamValue> FromParam for T {
	fn from_param(values: &[String]) -> Result<Self, BoxedError> {
		let value = values.first().ok_or(MissingParamValue)?;

		T::from_param_value(value)
	}
}

impl<T: FromParamValue> FromParam for Option<T> {
	fn from_param(values: &[String]) -> Result<Self, BoxedError> {
		values
			.first()
			.map(|value| T::from_param_value(value))
			.transpose()
	}
}

impl<T: FromParamValue> FromParam for Vec<T> {
	fn from_param(values: &[String]) -> Result<Self, BoxedError> {
		values
			.iter()
			.map(|value| T::from_param_value(value))
			.collect()
	}
}

impl<T: FromParamValue + Ord> FromParam for BTreeSet<T> {
	fn from_param(values: &[String]) -> Result<Self, BoxedError> {
		values
			.iter()
			.map(|value| T::from_param_value(value))
			.collect()
	}
}

impl<T: FromParamValue + Eq + Hash> FromParam for HashSet<T> {
	fn from_param(values: &[String]) -> Result<Self, BoxedError> {
		values
			.iter()
			.map(|value| T::from_param_value(value))
			.collect()
	}
}

// ----------

#[derive(Debug, ImplError)]
#[error("missing value")]
pub struct MissingParamValue;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
