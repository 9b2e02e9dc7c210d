//! glr-daemon library target.
//!
//! Exposes the router, state and run orchestration for integration tests and
//! for `glr-cli`, which runs the same pipeline without HTTP.

pub mod api_types;
pub mod routes;
pub mod runner;
pub mod state;
