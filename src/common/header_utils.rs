use std::num::ParseFloatError;

use http::{
	header::{ToStrError, CONTENT_TYPE},
	HeaderMap, HeaderValue,
};
use mime::Mime;

use crate::ImplError;

use super::SCOPE_VALIDITY;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub(crate) fn content_type(headers: &HeaderMap) -> Result<Option<Mime>, ContentTypeError> {
	let Some(content_type) = headers.get(CONTENT_TYPE) else {
		return Ok(None);
	};

	content_type
		.to_str()?
		.parse::<Mime>()
		.map(Some)
		.map_err(|_| ContentTypeError::InvalidMediaType)
}

#[derive(Debug, ImplError)]
pub enum ContentTypeError {
	#[error(transparent)]
	InvalidValue(#[from] ToStrError),
	#[error("invalid media type")]
	InvalidMediaType,
}

// --------------------------------------------------------------------------------

pub(crate) fn split_header_value(
	header_value: &HeaderValue,
) -> Result<impl Iterator<Item = &str>, ToStrError> {
	Ok(header_value.to_str()?.split(',').filter_map(|value| {
		let value = value.trim();
		if value.is_empty() {
			return None;
		}

		Some(value)
	}))
}

// ----------

// Used for the Accept-Language and Accept-Charset family of headers.
pub(crate) fn split_header_value_with_weights(
	header_value: &HeaderValue,
) -> Result<Vec<(&str, f32)>, SplitHeaderValueError> {
	header_value
		.to_str()?
		.split(',')
		.filter(|value| !value.trim().is_empty())
		.try_fold::<_, _, Result<_, SplitHeaderValueError>>(Vec::new(), |mut values, value| {
			let value = value.trim().split_once(';').map_or(
				Result::<_, SplitHeaderValueError>::Ok((value.trim(), 1f32)),
				|segments| {
					let value = segments.0.trim_end();
					let quality = segments
						.1
						.trim_start()
						.strip_prefix("q=")
						.ok_or(SplitHeaderValueError::InvalidQualitySpecifier)?;

					let quality = quality.parse::<f32>()?;
					if !(0.0..=1.0).contains(&quality) {
						return Err(SplitHeaderValueError::InvalidQualitySpecifier);
					}

					Ok((value, quality))
				},
			)?;

			values.push(value);

			Ok(values)
		})
		.map(|mut values| {
			// Sort in descending order. The sort is stable, so equal weights keep
			// their order of appearance.
			values.sort_by(|a, b| b.1.partial_cmp(&a.1).expect(SCOPE_VALIDITY));

			values
		})
}

#[derive(Debug, crate::ImplError)]
pub enum SplitHeaderValueError {
	#[error(transparent)]
	ToStrError(#[from] ToStrError),
	#[error("invalid quality specifier")]
	InvalidQualitySpecifier,
	#[error(transparent)]
	ParseFloatError(#[from] ParseFloatError),
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
