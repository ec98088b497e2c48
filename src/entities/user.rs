//! User entity
//!
//! The directory's core record. CRUD endpoints are macro-generated; the
//! tag relation field and its mutations are resolved by hand below.

use async_graphql::{ComplexObject, Context, Object, Result, SimpleObject};
use roster_macros::{GraphQLEntity, GraphQLOperations};
use serde::{Deserialize, Serialize};

use crate::orm::{DataService, RelationalUpdateInput};

use super::tag::Tag;

#[derive(
    GraphQLEntity,
    GraphQLOperations,
    SimpleObject,
    Clone,
    Debug,
    Serialize,
    Deserialize,
)]
#[graphql(name = "User", complex)]
#[graphql_entity(table = "users", plural = "Users")]
pub struct User {
    #[primary_key]
    pub id: i64,

    /// Firstname of user
    pub firstname: String,

    /// Surname of user
    pub surname: String,

    /// When the row was created (ISO8601)
    pub created: String,

    /// When the row was last updated (ISO8601)
    pub updated: String,

    /// When the row was soft-deleted; null for live rows
    pub deleted: Option<String>,

    #[graphql(skip)]
    #[serde(skip)]
    #[skip_db]
    #[relation(
        join_table = "users_tags",
        owner_column = "user_id",
        related_column = "tag_id",
        related_table = "tags"
    )]
    pub tags: Vec<Tag>,
}

#[ComplexObject]
impl User {
    /// Tags attached to this user
    async fn tags(&self, ctx: &Context<'_>) -> Result<Vec<Tag>> {
        let service = ctx.data_unchecked::<DataService<User>>();
        service
            .find_related::<Tag>(self.id, "tags")
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }
}

#[derive(Default)]
pub struct UserRelationMutations;

#[Object]
impl UserRelationMutations {
    /// Attach tags to a user. Fails if a tag id does not exist or is already attached.
    #[graphql(name = "addUserTags")]
    async fn add_tags(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "relationalUpdateInput")] input: RelationalUpdateInput,
    ) -> Result<Option<User>> {
        let service = ctx.data_unchecked::<DataService<User>>();
        service
            .add_relations(&input, "tags")
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }

    /// Detach tags from a user. Ids that are not attached are ignored.
    #[graphql(name = "removeUserTags")]
    async fn remove_tags(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "relationalUpdateInput")] input: RelationalUpdateInput,
    ) -> Result<Option<User>> {
        let service = ctx.data_unchecked::<DataService<User>>();
        service
            .remove_relations(&input, "tags")
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }

    /// Replace a user's tags with exactly the given set.
    #[graphql(name = "updateUserTags")]
    async fn update_tags(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "relationalUpdateInput")] input: RelationalUpdateInput,
    ) -> Result<Option<User>> {
        let service = ctx.data_unchecked::<DataService<User>>();
        service
            .update_relations::<Tag>(&input, "tags")
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }
}
