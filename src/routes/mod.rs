//! Routers: data routes and common health/readiness routes.

mod common;
mod data;

pub use common::{common_routes, common_routes_with_ready};
pub use data::{data_routes, DATA_BODY_LIMIT};
