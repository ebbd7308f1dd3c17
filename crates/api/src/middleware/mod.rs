//! Request extractors guarding the routes.
//!
//! - [`auth::AuthUser`] -- the user behind a JWT Bearer token.
//! - [`service_key::ServiceKey`] -- a trusted caller presenting `x-service-key`.

pub mod auth;
pub mod service_key;
