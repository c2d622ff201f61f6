//! HTTP management surface

pub mod routes;

pub use routes::build_router;
