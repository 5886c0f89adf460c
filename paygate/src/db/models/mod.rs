//! Database record models matching table schemas.
//!
//! - [`tenants`]: merchant accounts and where their secrets live
//! - [`transactions`]: the transaction columns and operation rows written by webhooks

pub mod tenants;
pub mod transactions;
