//! API route definitions
//!
//! The primary API is GraphQL at /graphql; the only REST endpoints are the
//! health and readiness probes.

pub mod health;
