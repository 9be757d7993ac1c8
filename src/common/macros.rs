// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------------------------------------
// Config Options

macro_rules! option {
	(
		$(#[$metas:meta])*
		$vis:vis $config_name:ident$(<$($lt:lifetime),* $($tp:ident),*>)? {
			$(#[$option_metas:meta])*
			$($option_name:ident $(($($tokens:ty),+))?,)+
		}
	) => {
		mod option_private {
			use super::*;

			#[allow(private_interfaces)]
			$(#[$metas])*
			pub enum $config_name$(<$($lt),* $($tp),*>)? {
				$(None(std::marker::PhantomData<fn() -> ($($lt),* $($tp),*)>),)?
				$(#[$option_metas])*
				$($option_name $(($($tokens),+))?,)+
			}

			impl$(<$($lt),* $($tp),*>)? crate::common::IntoArray<$config_name$(<$($lt),* $($tp),*>)?, 1>
			for $config_name$(<$($lt),* $($tp),*>)? {
				fn into_array(self) -> [$config_name$(<$($lt),* $($tp),*>)?; 1] {
					[self]
				}
			}
		}

		$vis use option_private::$config_name;
	};
}

// --------------------------------------------------------------------------------

// --------------------------------------------------------------------------------
// FromParamValue

/// Implements `FromParamValue` for types that implement `FromStr`.
///
/// ```
/// use std::str::FromStr;
///
/// struct Isbn(String);
///
/// impl FromStr for Isbn {
/// 	type Err = std::num::ParseIntError;
///
/// 	fn from_str(value: &str) -> Result<Self, Self::Err> {
/// 		value.replace('-', "").parse::<u64>().map(|_| Isbn(value.to_owned()))
/// 	}
/// }
///
/// restive::from_param_value!(Isbn);
/// ```
#[macro_export]
macro_rules! from_param_value {
	($($type:ty),+ $(,)?) => {
		$(
			impl $crate::data::FromParamValue for $type {
				fn from_param_value(value: &str) -> Result<Self, $crate::BoxedError> {
					<$type as ::std::str::FromStr>::from_str(value).map_err(Into::into)
				}
			}
		)+
	};
}

// --------------------------------------------------------------------------------
