//! Re-exported types and traits for convinience.

pub use crate::{
	binder::{ResourceBinder, ResourceListener, ResourcePublicationError},
	common::BoxedError,
	data::{
		entity::{Entity, EntityReader, EntityType, EntityWriter},
		form::Form,
		FromParam, FromParamValue, Param, ParamSource,
	},
	dispatcher::ApplicationContext,
	handler::{RequestHandler, _with_body_size_limit, _with_diagnostic_errors, _with_property},
	http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
	launcher::ResourceLauncher,
	middleware::{MethodInvokerFilter, RequestFilter, ResponseFilter},
	pattern::UriPattern,
	provider::ProviderBinder,
	request::ContainerRequest,
	resource::{
		Args, Describe, ResourceDescriptor, SubResource, _delete, _get, _head, _locator, _method,
		_options, _patch, _post, _put,
	},
	response::{ContainerResponse, IntoMethodResult, MethodResult, WebApplicationError},
	server::Server,
	service::RestService,
};
