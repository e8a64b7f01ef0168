//! HTTP route handlers.
//!
//! Handlers decode requests, call the [`crate::staging::StagingRepository`]
//! held in Rocket state, and encode JSON responses. They carry no query text
//! or validation of their own. Each is annotated with `#[openapi]` so
//! `rocket_okapi` can derive the OpenAPI document.

pub mod health;
pub mod staging;
