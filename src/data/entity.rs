//! Type-erased entities and the entity provider traits.

// ----------

use std::{
	any::{type_name, Any, TypeId},
	fmt::{self, Debug, Formatter},
};

use bytes::Bytes;
use mime::Mime;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
	common::{BoxedError, SCOPE_VALIDITY},
	media::is_compatible,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

type Serializer = fn(&(dyn Any + Send + Sync), SerdeFormat) -> Result<Bytes, BoxedError>;
type Deserializer = fn(&[u8], SerdeFormat) -> Result<Entity, BoxedError>;

/// Wire formats the built-in serde providers support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerdeFormat {
	Json,
	UrlEncoded,
}

// --------------------------------------------------
// Entity

/// A request or response entity of any type.
///
/// An entity created with [`Entity::serializable()`] can be written by the JSON and
/// form providers.
pub struct Entity {
	value: Box<dyn Any + Send + Sync>,
	type_name: &'static str,
	some_serializer: Option<Serializer>,
}

impl Entity {
	pub fn new<T: Any + Send + Sync>(value: T) -> Self {
		Self {
			value: Box::new(value),
			type_name: type_name::<T>(),
			some_serializer: None,
		}
	}

	pub fn serializable<T>(value: T) -> Self
	where
		T: Serialize + Any + Send + Sync,
	{
		Self {
			value: Box::new(value),
			type_name: type_name::<T>(),
			some_serializer: Some(serialize::<T>),
		}
	}

	#[inline(always)]
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	#[inline(always)]
	pub fn value_type_id(&self) -> TypeId {
		self.value.as_ref().type_id()
	}

	#[inline(always)]
	pub fn is<T: Any>(&self) -> bool {
		self.value.is::<T>()
	}

	#[inline(always)]
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.value.downcast_ref()
	}

	pub fn downcast<T: Any>(self) -> Result<T, Self> {
		let Self {
			value,
			type_name,
			some_serializer,
		} = self;

		value.downcast::<T>().map(|value| *value).map_err(|value| Self {
			value,
			type_name,
			some_serializer,
		})
	}

	#[inline(always)]
	pub(crate) fn into_value(self) -> Box<dyn Any + Send + Sync> {
		self.value
	}

	#[inline(always)]
	pub fn is_serializable(&self) -> bool {
		self.some_serializer.is_some()
	}

	/// Serializes the value when the entity was created with [`Entity::serializable()`].
	pub fn serialize(&self, format: SerdeFormat) -> Option<Result<Bytes, BoxedError>> {
		self
			.some_serializer
			.map(|serializer| serializer(self.value.as_ref(), format))
	}
}

impl Debug for Entity {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Entity")
			.field("type_name", &self.type_name)
			.field("serializable", &self.is_serializable())
			.finish()
	}
}

macro_rules! impl_from_for_entity {
	($($type:ty),+) => {
		$(
			impl From<$type> for Entity {
				#[inline]
				fn from(value: $type) -> Self {
					Self::new(value)
				}
			}
		)+
	};
}

impl_from_for_entity!(String, &'static str, Vec<u8>, Bytes);

fn serialize<T: Serialize + 'static>(
	value: &(dyn Any + Send + Sync),
	format: SerdeFormat,
) -> Result<Bytes, BoxedError> {
	let value = value.downcast_ref::<T>().expect(SCOPE_VALIDITY);

	match format {
		SerdeFormat::Json => Ok(serde_json::to_vec(value).map(Bytes::from)?),
		SerdeFormat::UrlEncoded => Ok(serde_urlencoded::to_string(value).map(Bytes::from)?),
	}
}

// --------------------------------------------------
// EntityType

/// The type an entity parameter expects to be read into.
#[derive(Clone, Copy)]
pub struct EntityType {
	type_id: TypeId,
	type_name: &'static str,
	some_deserializer: Option<Deserializer>,
}

impl EntityType {
	pub fn of<T: Any>() -> Self {
		Self {
			type_id: TypeId::of::<T>(),
			type_name: type_name::<T>(),
			some_deserializer: None,
		}
	}

	pub fn deserializable<T>() -> Self
	where
		T: DeserializeOwned + Any + Send + Sync,
	{
		Self {
			type_id: TypeId::of::<T>(),
			type_name: type_name::<T>(),
			some_deserializer: Some(deserialize::<T>),
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

	#[inline(always)]
	pub fn is<T: Any>(&self) -> bool {
		self.type_id == TypeId::of::<T>()
	}

	#[inline(always)]
	pub fn is_deserializable(&self) -> bool {
		self.some_deserializer.is_some()
	}

	/// Deserializes the bytes when the type was created with
	/// [`EntityType::deserializable()`].
	pub fn deserialize(&self, bytes: &[u8], format: SerdeFormat) -> Option<Result<Entity, BoxedError>> {
		self
			.some_deserializer
			.map(|deserializer| deserializer(bytes, format))
	}
}

impl Debug for EntityType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("EntityType")
			.field("type_name", &self.type_name)
			.field("deserializable", &self.is_deserializable())
			.finish()
	}
}

fn deserialize<T>(bytes: &[u8], format: SerdeFormat) -> Result<Entity, BoxedError>
where
	T: DeserializeOwned + Any + Send + Sync,
{
	let value = match format {
		SerdeFormat::Json => serde_json::from_slice::<T>(bytes)?,
		SerdeFormat::UrlEncoded => serde_urlencoded::from_bytes::<T>(bytes)?,
	};

	Ok(Entity::new(value))
}

// --------------------------------------------------------------------------------

// --------------------------------------------------
// EntityReader

/// Converts a request body of some media type into an entity.
pub trait EntityReader: Send + Sync {
	/// The media types the reader can consume.
	fn media_types(&self) -> &[Mime];

	fn is_readable(&self, entity_type: &EntityType, media_type: &Mime) -> bool;

	fn read_from(
		&self,
		entity_type: &EntityType,
		media_type: &Mime,
		body: &Bytes,
	) -> Result<Entity, BoxedError>;
}

// --------------------------------------------------
// EntityWriter

/// Converts a response entity into a body of some media type.
pub trait EntityWriter: Send + Sync {
	/// The media types the writer can produce.
	fn media_types(&self) -> &[Mime];

	fn is_writeable(&self, entity: &Entity, media_type: &Mime) -> bool;

	fn write_to(&self, entity: &Entity, media_type: &Mime) -> Result<Bytes, BoxedError>;
}

// ----------

#[inline]
pub(crate) fn supports_media_type(media_types: &[Mime], media_type: &Mime) -> bool {
	media_types
		.iter()
		.any(|supported_media_type| is_compatible(supported_media_type, media_type))
}

// --------------------------------------------------------------------------------

// --------------------------------------------------
// StringEntityProvider

static TEXT_MEDIA_TYPES: [Mime; 2] = [mime::TEXT_PLAIN, mime::STAR_STAR];

/// Reads and writes `String` entities. Also writes `&'static str`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringEntityProvider;

impl EntityReader for StringEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&TEXT_MEDIA_TYPES
	}

	fn is_readable(&self, entity_type: &EntityType, media_type: &Mime) -> bool {
		entity_type.is::<String>() && supports_media_type(&TEXT_MEDIA_TYPES, media_type)
	}

	fn read_from(
		&self,
		_entity_type: &EntityType,
		_media_type: &Mime,
		body: &Bytes,
	) -> Result<Entity, BoxedError> {
		let text = String::from_utf8(body.to_vec())?;

		Ok(Entity::new(text))
	}
}

impl EntityWriter for StringEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&TEXT_MEDIA_TYPES
	}

	fn is_writeable(&self, entity: &Entity, media_type: &Mime) -> bool {
		(entity.is::<String>() || entity.is::<&'static str>())
			&& supports_media_type(&TEXT_MEDIA_TYPES, media_type)
	}

	fn write_to(&self, entity: &Entity, _media_type: &Mime) -> Result<Bytes, BoxedError> {
		if let Some(text) = entity.downcast_ref::<String>() {
			return Ok(Bytes::copy_from_slice(text.as_bytes()));
		}

		if let Some(text) = entity.downcast_ref::<&'static str>() {
			return Ok(Bytes::from_static(text.as_bytes()));
		}

		Err(UnsupportedEntity(entity.type_name()).into())
	}
}

// --------------------------------------------------
// BytesEntityProvider

static OCTET_STREAM_MEDIA_TYPES: [Mime; 2] = [mime::APPLICATION_OCTET_STREAM, mime::STAR_STAR];

/// Reads and writes `Bytes` and `Vec<u8>` entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesEntityProvider;

impl EntityReader for BytesEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&OCTET_STREAM_MEDIA_TYPES
	}

	fn is_readable(&self, entity_type: &EntityType, _media_type: &Mime) -> bool {
		entity_type.is::<Bytes>() || entity_type.is::<Vec<u8>>()
	}

	fn read_from(
		&self,
		entity_type: &EntityType,
		_media_type: &Mime,
		body: &Bytes,
	) -> Result<Entity, BoxedError> {
		if entity_type.is::<Vec<u8>>() {
			return Ok(Entity::new(body.to_vec()));
		}

		Ok(Entity::new(body.clone()))
	}
}

impl EntityWriter for BytesEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&OCTET_STREAM_MEDIA_TYPES
	}

	fn is_writeable(&self, entity: &Entity, _media_type: &Mime) -> bool {
		entity.is::<Bytes>() || entity.is::<Vec<u8>>()
	}

	fn write_to(&self, entity: &Entity, _media_type: &Mime) -> Result<Bytes, BoxedError> {
		if let Some(bytes) = entity.downcast_ref::<Bytes>() {
			return Ok(bytes.clone());
		}

		if let Some(bytes) = entity.downcast_ref::<Vec<u8>>() {
			return Ok(Bytes::copy_from_slice(bytes));
		}

		Err(UnsupportedEntity(entity.type_name()).into())
	}
}

// ----------

#[derive(Debug, crate::ImplError)]
#[error("unsupported entity type {0}")]
pub struct UnsupportedEntity(pub &'static str);

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
