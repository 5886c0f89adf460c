//! Axum route handlers.
//!
//! - [`authorizer`]: the API Gateway authorizer endpoint
//! - [`webhooks`]: the Adyen notification endpoint
//! - [`health`]: liveness probe

pub mod authorizer;
pub mod health;
pub mod webhooks;
