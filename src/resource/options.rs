use std::{any::Any, sync::Arc};

use http::{header::ALLOW, HeaderValue, Method};
use serde::Serialize;

use crate::{
	common::BoxedError,
	data::{entity::Entity, Param},
	response::{ContainerResponse, MethodResult},
};

use super::method::{Args, ErasedHandler, MethodDescriptor, MethodMap};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ResourceOptions

/// The capability description returned by the synthesized OPTIONS methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	pub allow: Vec<String>,
	pub methods: Vec<MethodOptions>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub sub_resource_methods: Vec<SubResourceMethodOptions>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub sub_resource_locators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodOptions {
	pub method: String,
	pub consumes: Vec<String>,
	pub produces: Vec<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub params: Vec<ParamOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubResourceMethodOptions {
	pub path: String,
	pub methods: Vec<MethodOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamOptions {
	pub source: &'static str,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub name: String,
	#[serde(rename = "type")]
	pub type_name: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub default_value: Option<String>,
}

// ----------

impl MethodOptions {
	pub(crate) fn from_method_map(method_map: &MethodMap) -> Vec<Self> {
		method_map.descriptors().map(Self::from_descriptor).collect()
	}

	fn from_descriptor(descriptor: &MethodDescriptor) -> Self {
		Self {
			method: descriptor.method().to_string(),
			consumes: descriptor.consumes().iter().map(ToString::to_string).collect(),
			produces: descriptor.produces().iter().map(ToString::to_string).collect(),
			params: descriptor.params().iter().map(ParamOptions::from_param).collect(),
		}
	}
}

impl ParamOptions {
	fn from_param(param: &Param) -> Self {
		Self {
			source: param.source().as_str(),
			name: param.name().to_owned(),
			type_name: param.type_name(),
			default_value: param.default().map(ToOwned::to_owned),
		}
	}
}

// Returns the methods of the map as they are listed in the `Allow` header, with the
// OPTIONS method included.
pub(crate) fn allowed_methods(method_map: &MethodMap) -> Vec<Method> {
	let mut methods = method_map.methods().cloned().collect::<Vec<_>>();
	if !methods.contains(&Method::OPTIONS) {
		methods.push(Method::OPTIONS);
	}

	methods
}

// --------------------------------------------------
// OptionsHandler

pub(crate) struct OptionsHandler {
	options: Arc<ResourceOptions>,
}

impl OptionsHandler {
	pub(crate) fn new(options: ResourceOptions) -> Self {
		Self {
			options: Arc::new(options),
		}
	}
}

impl ErasedHandler for OptionsHandler {
	fn call(
		&self,
		_instance: &(dyn Any + Send + Sync),
		_args: &mut Args<'_>,
	) -> Result<MethodResult, BoxedError> {
		let mut response = ContainerResponse::ok()
			.with_entity(Entity::serializable(ResourceOptions::clone(&self.options)))
			.with_content_type(&mime::APPLICATION_JSON);

		let allow = self.options.allow.join(", ");
		response
			.headers_mut()
			.insert(ALLOW, HeaderValue::from_str(&allow)?);

		Ok(MethodResult::Response(response))
	}
}
