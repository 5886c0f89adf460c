//! HTTP surface.
//!
//! - `POST /authorize`: API Gateway REQUEST authorizer, answers with an IAM policy
//! - `POST /webhooks/adyen`: Adyen notification receiver, always answers `[accepted]`
//! - `GET /health`: liveness

pub mod handlers;
