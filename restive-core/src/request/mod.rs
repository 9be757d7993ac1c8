//! Request types.

// ----------

pub use http::request::Builder;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub type Request<B> = http::request::Request<B>;
pub type RequestHeadParts = http::request::Parts;

// --------------------------------------------------------------------------------
