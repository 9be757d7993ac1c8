use bytes::Bytes;
use mime::Mime;
use serde_json::error::Category;

use crate::common::BoxedError;

use super::entity::{
	supports_media_type, Entity, EntityReader, EntityType, EntityWriter, SerdeFormat,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

static JSON_MEDIA_TYPES: [Mime; 1] = [mime::APPLICATION_JSON];

// --------------------------------------------------
// JsonEntityProvider

/// Reads and writes serde types as `application/json`.
///
/// Raw types (`String`, `Vec<u8>`, `Bytes`) are left to their own providers.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEntityProvider;

impl EntityReader for JsonEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&JSON_MEDIA_TYPES
	}

	fn is_readable(&self, entity_type: &EntityType, media_type: &Mime) -> bool {
		entity_type.is_deserializable()
			&& !is_raw_type(entity_type)
			&& supports_media_type(&JSON_MEDIA_TYPES, media_type)
	}

	fn read_from(
		&self,
		entity_type: &EntityType,
		_media_type: &Mime,
		body: &Bytes,
	) -> Result<Entity, BoxedError> {
		match entity_type.deserialize(body, SerdeFormat::Json) {
			Some(Ok(entity)) => Ok(entity),
			Some(Err(error)) => match error.downcast::<serde_json::Error>() {
				Ok(json_error) => Err(JsonError::from(*json_error).into()),
				Err(error) => Err(error),
			},
			None => Err(JsonError::NotDeserializable(entity_type.type_name()).into()),
		}
	}
}

impl EntityWriter for JsonEntityProvider {
	fn media_types(&self) -> &[Mime] {
		&JSON_MEDIA_TYPES
	}

	fn is_writeable(&self, entity: &Entity, media_type: &Mime) -> bool {
		entity.is_serializable() && supports_media_type(&JSON_MEDIA_TYPES, media_type)
	}

	fn write_to(&self, entity: &Entity, _media_type: &Mime) -> Result<Bytes, BoxedError> {
		entity
			.serialize(SerdeFormat::Json)
			.unwrap_or_else(|| Err(JsonError::NotSerializable(entity.type_name()).into()))
	}
}

#[inline]
fn is_raw_type(entity_type: &EntityType) -> bool {
	entity_type.is::<String>() || entity_type.is::<Vec<u8>>() || entity_type.is::<Bytes>()
}

// ----------

#[derive(Debug, crate::ImplError)]
pub enum JsonError {
	#[error("invalid JSON syntax in line {line}, column {column}")]
	InvalidSyntax { line: usize, column: usize },
	#[error("invalid JSON data in line {line}, column {column}")]
	InvalidData { line: usize, column: usize },
	#[error("unexpected end of JSON input")]
	UnexpectedEof,
	#[error("{0} cannot be deserialized")]
	NotDeserializable(&'static str),
	#[error("{0} cannot be serialized")]
	NotSerializable(&'static str),
	#[error(transparent)]
	Io(serde_json::Error),
}

impl From<serde_json::Error> for JsonError {
	fn from(error: serde_json::Error) -> Self {
		match error.classify() {
			Category::Syntax => JsonError::InvalidSyntax {
				line: error.line(),
				column: error.column(),
			},
			Category::Data => JsonError::InvalidData {
				line: error.line(),
				column: error.column(),
			},
			Category::Eof => JsonError::UnexpectedEof,
			Category::Io => JsonError::Io(error),
		}
	}
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
