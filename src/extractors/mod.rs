//! Request extractors.

mod request;

pub use request::{client_addr, query_params, RequestContext, FORWARDED_FOR_HEADER};
