//! Roster - GraphQL user directory service
//!
//! Library crate shared by the server binary and the integration tests.
//! All operations are exposed via GraphQL at /graphql.

pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod graphql;
pub mod orm;

use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::graphql::RosterSchema;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub schema: RosterSchema,
}
