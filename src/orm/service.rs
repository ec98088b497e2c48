//! Generic data service for database entities
//!
//! One `DataService<E>` instance per entity type carries the full CRUD and
//! relation contract: soft-deleting reads, partial updates, join-table
//! mutations. Entities opt in via `#[derive(GraphQLEntity)]`; nothing here
//! knows any concrete table.

use std::marker::PhantomData;

use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::sqlite_helpers::now_iso8601;

use super::builder::{execute_with_binds, EntityQuery};
use super::traits::{
    DatabaseSchema, EntityInput, EntityUpdate, FromSqlRow, RelationDef, SqlValue,
};

/// Errors surfaced by the data service.
///
/// `Storage` deliberately has no `#[from]`: storage failures are logged with
/// entity and operation context at the point they are wrapped.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("unknown field `{field}` on {entity}")]
    UnknownField { entity: &'static str, field: String },

    #[error("unknown relation `{relation}` on {entity}")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },

    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),
}

/// Input for the relation mutations: the owning row's id plus the related
/// ids to attach, detach or install.
#[derive(async_graphql::InputObject, Debug, Clone)]
#[graphql(name = "RelationalUpdateInput")]
pub struct RelationalUpdateInput {
    /// Primary key of the owning entity
    pub id: i64,
    /// Primary keys of the related entities
    pub relation_ids: Vec<i64>,
}

/// Generic CRUD service over a single entity table.
pub struct DataService<E> {
    pool: SqlitePool,
    _marker: PhantomData<E>,
}

// Manual impl: `E` itself is never stored, so no `E: Clone` bound is needed.
impl<E> Clone for DataService<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E: DatabaseSchema + FromSqlRow> DataService<E> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wrap a sqlx error, logging it with entity/operation context.
    fn storage(op: &'static str, error: sqlx::Error) -> ServiceError {
        tracing::error!(entity = E::TABLE_NAME, op, error = %error, "Storage operation failed");
        ServiceError::Storage(error)
    }

    /// Reject field names that are not columns of this entity.
    fn check_field(field: &str) -> Result<(), ServiceError> {
        if E::column_names().contains(&field) {
            Ok(())
        } else {
            Err(ServiceError::UnknownField {
                entity: E::ENTITY_NAME,
                field: field.to_string(),
            })
        }
    }

    /// Look up a relation descriptor by name.
    fn relation(name: &str) -> Result<&'static RelationDef, ServiceError> {
        E::relations()
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ServiceError::UnknownRelation {
                entity: E::ENTITY_NAME,
                relation: name.to_string(),
            })
    }

    /// Insert a new row and return it as stored.
    ///
    /// `created` and `updated` are stamped here; the caller never supplies
    /// them.
    pub async fn create(&self, input: &E::CreateInput) -> Result<E, ServiceError> {
        let now = now_iso8601();
        let mut entries = input.values();
        entries.push(("created", SqlValue::String(now.clone())));
        entries.push(("updated", SqlValue::String(now)));

        let columns: Vec<&str> = entries.iter().map(|(column, _)| *column).collect();
        let placeholders: Vec<String> = (1..=entries.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE_NAME,
            columns.join(", "),
            placeholders.join(", ")
        );
        let values: Vec<SqlValue> = entries.into_iter().map(|(_, value)| value).collect();

        let result = execute_with_binds(&sql, &values, &self.pool)
            .await
            .map_err(|e| Self::storage("create", e))?;
        let id = result.last_insert_rowid();
        tracing::debug!(entity = E::TABLE_NAME, id, "Created row");

        self.find_one(id).await?.ok_or(ServiceError::NotFound {
            entity: E::ENTITY_NAME,
            id,
        })
    }

    /// Fetch every live row, in the entity's default order.
    pub async fn find_all(&self) -> Result<Vec<E>, ServiceError> {
        EntityQuery::<E>::new()
            .where_raw("deleted IS NULL")
            .default_order()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::storage("find_all", e))
    }

    /// Fetch every soft-deleted row.
    pub async fn find_all_deleted(&self) -> Result<Vec<E>, ServiceError> {
        EntityQuery::<E>::new()
            .where_raw("deleted IS NOT NULL")
            .default_order()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::storage("find_all_deleted", e))
    }

    /// Fetch every live row whose `field` equals `value`.
    pub async fn find_by_field_all(&self, field: &str, value: &str) -> Result<Vec<E>, ServiceError> {
        Self::check_field(field)?;
        EntityQuery::<E>::new()
            .where_clause(
                &format!("{} = ?", field),
                SqlValue::String(value.to_string()),
            )
            .where_raw("deleted IS NULL")
            .default_order()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::storage("find_by_field_all", e))
    }

    /// Fetch the first live row whose `field` equals `value`.
    pub async fn find_by_field_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<E>, ServiceError> {
        Self::check_field(field)?;
        EntityQuery::<E>::new()
            .where_clause(
                &format!("{} = ?", field),
                SqlValue::String(value.to_string()),
            )
            .where_raw("deleted IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::storage("find_by_field_one", e))
    }

    /// Fetch the live rows matching the given ids. Unknown and soft-deleted
    /// ids are silently absent from the result.
    pub async fn find_many(&self, ids: &[i64]) -> Result<Vec<E>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        EntityQuery::<E>::new()
            .where_in(
                E::PRIMARY_KEY,
                ids.iter().map(|id| SqlValue::Int(*id)).collect(),
            )
            .where_raw("deleted IS NULL")
            .default_order()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::storage("find_many", e))
    }

    /// Fetch the live related rows attached to `id` through the named
    /// relation, in the related entity's default order.
    pub async fn find_related<R: DatabaseSchema + FromSqlRow>(
        &self,
        id: i64,
        relation: &str,
    ) -> Result<Vec<R>, ServiceError> {
        let rel = Self::relation(relation)?;
        debug_assert_eq!(R::TABLE_NAME, rel.related_table);
        debug_assert_eq!(R::PRIMARY_KEY, rel.related_key);

        let sql = format!(
            "{} JOIN {} ON {}.{} = {}.{} WHERE {}.{} = ?1 AND deleted IS NULL ORDER BY {} {}",
            R::select_sql(),
            rel.join_table,
            rel.join_table,
            rel.related_column,
            R::TABLE_NAME,
            R::PRIMARY_KEY,
            rel.join_table,
            rel.owner_column,
            R::DEFAULT_SORT,
            R::DEFAULT_SORT_DIR
        );
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::storage("find_related", e))?;
        rows.iter()
            .map(R::from_row)
            .collect::<Result<Vec<R>, sqlx::Error>>()
            .map_err(|e| Self::storage("find_related", e))
    }

    /// Fetch a single live row by primary key.
    pub async fn find_one(&self, id: i64) -> Result<Option<E>, ServiceError> {
        EntityQuery::<E>::new()
            .where_clause(
                &format!("{} = ?", E::PRIMARY_KEY),
                SqlValue::Int(id),
            )
            .where_raw("deleted IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::storage("find_one", e))
    }

    /// Apply a partial update to a live row.
    ///
    /// Returns `Ok(None)` without touching storage when the row does not
    /// exist (or is soft-deleted). An input with no set fields returns the
    /// current row unchanged, `updated` included.
    pub async fn update(&self, input: &E::UpdateInput) -> Result<Option<E>, ServiceError> {
        let id = input.id();
        if self.find_one(id).await?.is_none() {
            return Ok(None);
        }

        let mut entries = input.values();
        if !entries.is_empty() {
            entries.push(("updated", SqlValue::String(now_iso8601())));
            let assignments: Vec<String> = entries
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                E::TABLE_NAME,
                assignments.join(", "),
                E::PRIMARY_KEY,
                entries.len() + 1
            );
            let mut values: Vec<SqlValue> = entries.into_iter().map(|(_, value)| value).collect();
            values.push(SqlValue::Int(id));

            execute_with_binds(&sql, &values, &self.pool)
                .await
                .map_err(|e| Self::storage("update", e))?;
            tracing::debug!(entity = E::TABLE_NAME, id, "Updated row");
        }

        match self.find_one(id).await? {
            Some(entity) => Ok(Some(entity)),
            None => Err(ServiceError::NotFound {
                entity: E::ENTITY_NAME,
                id,
            }),
        }
    }

    /// Soft-delete a live row. Returns `false` when no live row has the id.
    pub async fn remove(&self, id: i64) -> Result<bool, ServiceError> {
        if self.find_one(id).await?.is_none() {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE {} SET deleted = ?1 WHERE {} = ?2",
            E::TABLE_NAME,
            E::PRIMARY_KEY
        );
        execute_with_binds(
            &sql,
            &[SqlValue::String(now_iso8601()), SqlValue::Int(id)],
            &self.pool,
        )
        .await
        .map_err(|e| Self::storage("remove", e))?;
        tracing::debug!(entity = E::TABLE_NAME, id, "Soft-deleted row");
        Ok(true)
    }

    /// Soft-delete every live row in `ids`. Returns `true` when at least one
    /// row was deleted; ids that are unknown or already deleted are skipped.
    pub async fn remove_many(&self, ids: &[i64]) -> Result<bool, ServiceError> {
        if ids.is_empty() {
            return Ok(false);
        }

        let placeholders: Vec<String> =
            (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "UPDATE {} SET deleted = ?1 WHERE {} IN ({}) AND deleted IS NULL",
            E::TABLE_NAME,
            E::PRIMARY_KEY,
            placeholders.join(", ")
        );
        let mut values = vec![SqlValue::String(now_iso8601())];
        values.extend(ids.iter().map(|id| SqlValue::Int(*id)));

        let result = execute_with_binds(&sql, &values, &self.pool)
            .await
            .map_err(|e| Self::storage("remove_many", e))?;
        tracing::debug!(
            entity = E::TABLE_NAME,
            requested = ids.len(),
            deleted = result.rows_affected(),
            "Soft-deleted rows"
        );
        Ok(result.rows_affected() > 0)
    }

    /// Attach related rows to `input.id` through the named relation's join
    /// table.
    ///
    /// Returns `Ok(None)` when the owning row does not exist. Attaching an id
    /// that is already present or unknown in the related table surfaces the
    /// constraint violation as a `Storage` error.
    pub async fn add_relations(
        &self,
        input: &RelationalUpdateInput,
        relation: &str,
    ) -> Result<Option<E>, ServiceError> {
        let rel = Self::relation(relation)?;
        if self.find_one(input.id).await?.is_none() {
            return Ok(None);
        }

        if !input.relation_ids.is_empty() {
            let tuples: Vec<String> = (0..input.relation_ids.len())
                .map(|i| format!("(?1, ?{})", i + 2))
                .collect();
            let sql = format!(
                "INSERT INTO {} ({}, {}) VALUES {}",
                rel.join_table,
                rel.owner_column,
                rel.related_column,
                tuples.join(", ")
            );
            let mut values = vec![SqlValue::Int(input.id)];
            values.extend(input.relation_ids.iter().map(|id| SqlValue::Int(*id)));

            execute_with_binds(&sql, &values, &self.pool)
                .await
                .map_err(|e| Self::storage("add_relations", e))?;
            tracing::debug!(
                entity = E::TABLE_NAME,
                id = input.id,
                relation,
                added = input.relation_ids.len(),
                "Attached relations"
            );
        }

        self.find_one(input.id).await
    }

    /// Detach related rows from `input.id`. Ids without a join row are
    /// ignored.
    pub async fn remove_relations(
        &self,
        input: &RelationalUpdateInput,
        relation: &str,
    ) -> Result<Option<E>, ServiceError> {
        let rel = Self::relation(relation)?;
        if self.find_one(input.id).await?.is_none() {
            return Ok(None);
        }

        if !input.relation_ids.is_empty() {
            let placeholders: Vec<String> = (0..input.relation_ids.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} IN ({})",
                rel.join_table,
                rel.owner_column,
                rel.related_column,
                placeholders.join(", ")
            );
            let mut values = vec![SqlValue::Int(input.id)];
            values.extend(input.relation_ids.iter().map(|id| SqlValue::Int(*id)));

            execute_with_binds(&sql, &values, &self.pool)
                .await
                .map_err(|e| Self::storage("remove_relations", e))?;
            tracing::debug!(
                entity = E::TABLE_NAME,
                id = input.id,
                relation,
                "Detached relations"
            );
        }

        self.find_one(input.id).await
    }

    /// Replace the relation's membership with exactly `input.relation_ids`.
    ///
    /// Existing join rows are cleared first; ids with no live row in the
    /// related table are dropped rather than rejected, so the final set is
    /// the intersection of the requested ids and `R`'s live rows.
    pub async fn update_relations<R: DatabaseSchema>(
        &self,
        input: &RelationalUpdateInput,
        relation: &str,
    ) -> Result<Option<E>, ServiceError> {
        let rel = Self::relation(relation)?;
        debug_assert_eq!(R::TABLE_NAME, rel.related_table);
        debug_assert_eq!(R::PRIMARY_KEY, rel.related_key);
        if self.find_one(input.id).await?.is_none() {
            return Ok(None);
        }

        let clear_sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            rel.join_table, rel.owner_column
        );
        execute_with_binds(&clear_sql, &[SqlValue::Int(input.id)], &self.pool)
            .await
            .map_err(|e| Self::storage("update_relations", e))?;

        if !input.relation_ids.is_empty() {
            let placeholders: Vec<String> = (0..input.relation_ids.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            let sql = format!(
                "INSERT INTO {} ({}, {}) SELECT ?1, {} FROM {} WHERE {} IN ({}) AND deleted IS NULL",
                rel.join_table,
                rel.owner_column,
                rel.related_column,
                R::PRIMARY_KEY,
                R::TABLE_NAME,
                R::PRIMARY_KEY,
                placeholders.join(", ")
            );
            let mut values = vec![SqlValue::Int(input.id)];
            values.extend(input.relation_ids.iter().map(|id| SqlValue::Int(*id)));

            execute_with_binds(&sql, &values, &self.pool)
                .await
                .map_err(|e| Self::storage("update_relations", e))?;
        }
        tracing::debug!(
            entity = E::TABLE_NAME,
            id = input.id,
            relation,
            requested = input.relation_ids.len(),
            "Replaced relations"
        );

        self.find_one(input.id).await
    }
}
