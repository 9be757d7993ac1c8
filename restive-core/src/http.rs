//! Types related to the HTTP protocol.

// ----------

pub use http::{header, method, status, uri, version};
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};

// --------------------------------------------------------------------------------
