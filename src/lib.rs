//! A JAX-RS style request dispatch core.
//!
//! Resources are described with [`ResourceDescriptor`](resource::ResourceDescriptor)s
//! and published in a [`ResourceBinder`](binder::ResourceBinder). The
//! [`RequestHandler`](handler::RequestHandler) matches a request against the published
//! root resources, descends through sub-resource locators, selects a resource method
//! by HTTP method and media types, binds its parameters, and writes the returned
//! entity with a provider from the [`ProviderBinder`](provider::ProviderBinder).
//!
//! [`RestService`](service::RestService) adapts the handler to `hyper` and `tower`, and
//! [`ResourceLauncher`](launcher::ResourceLauncher) runs it without a transport.

// ----------

pub(crate) use std::error::Error as StdError;
pub(crate) use thiserror::Error as ImplError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[macro_use]
pub(crate) mod common;

pub mod binder;
pub mod data;
pub mod dispatcher;
pub mod handler;
pub mod launcher;
pub mod media;
pub mod middleware;
pub mod pattern;
pub mod provider;
pub mod request;
pub mod resource;
pub mod response;
pub mod server;
pub mod service;

pub mod prelude;

// ----------

pub use common::{BoxedError, IntoArray};
pub use restive_core::{body, http};

// --------------------------------------------------------------------------------
