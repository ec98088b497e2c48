//! GraphQL ORM layer
//!
//! Provides traits and utilities for macro-generated GraphQL entities.
//! The `roster-macros` crate generates implementations of these traits
//! from annotated Rust structs, creating a single source of truth for:
//! - GraphQL types and input objects
//! - SQL schema descriptors (columns, relations)
//! - Row decoding (FromSqlRow)
//! - The named CRUD resolvers
//!
//! # Data service
//!
//! All database access for an entity goes through its `DataService`:
//!
//! ```rust,ignore
//! use roster::entities::{CreateUserInput, User};
//! use roster::orm::DataService;
//!
//! let users = DataService::<User>::new(pool);
//! let ada = users
//!     .create(&CreateUserInput {
//!         firstname: "Ada".into(),
//!         surname: "Lovelace".into(),
//!     })
//!     .await?;
//! ```

mod builder;
mod service;
mod traits;

pub use builder::*;
pub use service::*;
pub use traits::*;
