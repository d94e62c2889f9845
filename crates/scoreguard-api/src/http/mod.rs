//! HTTP surface: router, gate middleware, handlers, and helpers.

pub(crate) mod auth;
pub(crate) mod constants;
pub(crate) mod errors;
pub(crate) mod health;
pub(crate) mod payload;
pub(crate) mod rate_limit;
pub mod router;
pub(crate) mod telemetry;
pub(crate) mod webhook;
