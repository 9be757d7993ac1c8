use bytes::Bytes;
use mime::Mime;

use crate::common::{parse_urlencoded, BoxedError};

use super::entity::{
	supports_media_type, Entity, EntityReader, EntityType, EntityWriter, SerdeFormat,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

static FORM_MEDIA_TYPES: [Mime; 1] = [mime::APPLICATION_WWW_FORM_URLENCODED];

// --------------------------------------------------
// Form

/// Decoded `application/x-www-form-urlencoded` fields in the order of their appearance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Form {
	fields: Vec<(String, String)>,
}

impl Form {
	#[inline(always)]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn parse(source: &str, decode: bool) -> Self {
		Self {
			fields: parse_urlencoded(source, decode),
		}
	}

	/// Returns the first value of the field.
	pub fn get(&self, name: &str) -> Option<&str> {
		self
			.fields
			.iter()
			.find_map(|(field_name, value)| (field_name == name).then_some(value.as_str()))
	}

	/// Returns all the values of the field.
	pub fn get_all<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s str> + 's {
		self
			.fields
			.iter()
			.filter(move |(field_name, _)| field_name == name)
			.map(|(_, value)| value.as_str())
	}

	pub fn add<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
		self.fields.push((name.into(), value.into()));
	}

	#[inline(always)]
	pub fn fields(&self) -> &[(String, String)] {
		&self.fields
	}

	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	fn to_urlencoded(&self) -> Result<String, serde_urlencoded::ser::Error> {
		serde_urlencoded::to_string(&self.fields)
	}
}

// --------------------------------------------------
// FormEntityProvider

/// Reads `application/x-www-form-urlencoded` bodies into [`Form`] or any deserializable
/// type, and writes them back from [`Form`] or serializable entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormEntityProvider;

impl EntityReader for FormEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&FORM_MEDIA_TYPES
	}

	fn is_readable(&self, entity_type: &EntityType, media_type: &Mime) -> bool {
		(entity_type.is::<Form>() || entity_type.is_deserializable())
			&& media_type.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()
	}

	fn read_from(
		&self,
		entity_type: &EntityType,
		_media_type: &Mime,
		body: &Bytes,
	) -> Result<Entity, BoxedError> {
		if entity_type.is::<Form>() {
			let source = std::str::from_utf8(body)?;

			return Ok(Entity::new(Form::parse(source, true)));
		}

		entity_type
			.deserialize(body, SerdeFormat::UrlEncoded)
			.unwrap_or_else(|| Err(FormError::NotDeserializable(entity_type.type_name()).into()))
	}
}

impl EntityWriter for FormEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&FORM_MEDIA_TYPES
	}

	fn is_writeable(&self, entity: &Entity, media_type: &Mime) -> bool {
		(entity.is::<Form>() || entity.is_serializable())
			&& supports_media_type(&FORM_MEDIA_TYPES, media_type)
	}

	fn write_to(&self, entity: &Entity, _media_type: &Mime) -> Result<Bytes, BoxedError> {
		if let Some(form) = entity.downcast_ref::<Form>() {
			return Ok(Bytes::from(form.to_urlencoded()?));
		}

		entity
			.serialize(SerdeFormat::UrlEncoded)
			.unwrap_or_else(|| Err(FormError::NotSerializable(entity.type_name()).into()))
	}
}

// ----------

#[derive(Debug, crate::ImplError)]
pub enum FormError {
	#[error("{0} cannot be deserialized from a form")]
	NotDeserializable(&'static str),
	#[error("{0} cannot be serialized into a form")]
	NotSerializable(&'static str),
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
