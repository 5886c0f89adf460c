//! Store traits and their Postgres implementations.
//!
//! The authorizer and the webhook processor only see the traits, so they can be driven by
//! in-memory stores in tests. Every Postgres statement runs under
//! [`with_retry`](crate::db::retry::with_retry).
//!
//! - [`TenantStore`] / [`PgTenants`]: tenant lookup by merchant account or ID
//! - [`TransactionStore`] / [`PgTransactions`]: transaction lookup and status projection

pub mod tenants;
pub mod transactions;

pub use tenants::{PgTenants, TenantStore};
pub use transactions::{PgTransactions, TransactionStore};
