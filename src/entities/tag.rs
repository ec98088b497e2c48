//! Tag entity
//!
//! Labels attachable to users through the `users_tags` join table.

use async_graphql::SimpleObject;
use roster_macros::{GraphQLEntity, GraphQLOperations};
use serde::{Deserialize, Serialize};

#[derive(
    GraphQLEntity,
    GraphQLOperations,
    SimpleObject,
    Clone,
    Debug,
    Serialize,
    Deserialize,
)]
#[graphql(name = "Tag")]
#[graphql_entity(table = "tags", plural = "Tags", default_sort = "name")]
pub struct Tag {
    #[primary_key]
    pub id: i64,

    /// Tag label
    pub name: String,

    /// When the row was created (ISO8601)
    pub created: String,

    /// When the row was last updated (ISO8601)
    pub updated: String,

    /// When the row was soft-deleted; null for live rows
    pub deleted: Option<String>,
}
