//! HTTP handlers for the server.

pub mod fonts;
pub mod sessions;
