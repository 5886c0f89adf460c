//! Request authorization for the payment API.
//!
//! API Gateway calls the authorizer before routing a request to the payment API. The
//! authorizer answers with an IAM policy allowing or denying `execute-api:Invoke` on the
//! requested method ARN.
//!
//! # Modules
//!
//! - [`authorizer`]: the decision over public routes, tenant API keys and tenant tokens
//! - [`allowlist`]: literal and CIDR IP allowlist matching
//! - [`policy`]: the gateway event and policy document shapes, method ARN parsing
//! - [`session`]: tenant JWT verification

pub mod allowlist;
pub mod authorizer;
pub mod policy;
pub mod session;

pub use authorizer::{Authorizer, AuthorizeError, Decision};
