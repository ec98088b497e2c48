//! GraphQL schema definition with queries and mutations
//!
//! This is the single API surface for the Roster backend. Per-entity
//! resolvers come from `#[derive(GraphQLOperations)]` and are merged here.

use async_graphql::{EmptySubscription, MergedObject, Schema};

use crate::db::Database;
use crate::entities::{
    TagMutations, TagQueries, UserMutations, UserQueries, UserRelationMutations,
};

/// The GraphQL schema type
pub type RosterSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(UserQueries, TagQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(UserMutations, UserRelationMutations, TagMutations);

/// Build the GraphQL schema with a data service per entity
pub fn build_schema(db: Database) -> RosterSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        EmptySubscription,
    )
    .data(db.users())
    .data(db.tags())
    .finish()
}
