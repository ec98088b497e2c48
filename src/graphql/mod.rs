//! GraphQL API
//!
//! This module provides a GraphQL API using async-graphql. Queries and
//! mutations are generated per entity and merged into the schema roots;
//! see `crate::entities` for the entity declarations.

mod schema;

pub use schema::{MutationRoot, QueryRoot, RosterSchema, build_schema};
