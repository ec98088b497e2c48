//! SQL query builder for the GraphQL ORM
//!
//! Builds parameterized SELECT queries for `DatabaseEntity` types via sqlx,
//! so no caller-supplied value is ever spliced into SQL text.

use sqlx::SqlitePool;

use super::traits::{DatabaseEntity, FromSqlRow, SqlValue};

/// A query builder for database entities.
///
/// Builds parameterized SQL queries for SELECT operations with filtering
/// and sorting support.
pub struct EntityQuery<E: DatabaseEntity> {
    _phantom: std::marker::PhantomData<E>,
    where_clauses: Vec<String>,
    values: Vec<SqlValue>,
    order_by: Option<String>,
    limit: Option<i64>,
    param_counter: usize,
}

impl<E: DatabaseEntity + FromSqlRow> EntityQuery<E> {
    /// Create a new query builder for the entity type.
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
            where_clauses: Vec::new(),
            values: Vec::new(),
            order_by: None,
            limit: None,
            param_counter: 0,
        }
    }

    /// Add a WHERE condition with a single `?` placeholder and its bind value.
    pub fn where_clause(mut self, condition: &str, value: SqlValue) -> Self {
        self.param_counter += 1;
        let rewritten = condition.replace("?", &format!("?{}", self.param_counter));
        self.where_clauses.push(rewritten);
        self.values.push(value);
        self
    }

    /// Add a WHERE condition with no bind values (e.g., "deleted IS NULL").
    pub fn where_raw(mut self, condition: &str) -> Self {
        self.where_clauses.push(condition.to_string());
        self
    }

    /// Add a `column IN (...)` condition over the given values.
    ///
    /// An empty value list matches nothing; callers short-circuit before this.
    pub fn where_in(mut self, column: &str, values: Vec<SqlValue>) -> Self {
        let placeholders: Vec<String> = values
            .iter()
            .map(|_| {
                self.param_counter += 1;
                format!("?{}", self.param_counter)
            })
            .collect();
        self.where_clauses
            .push(format!("{} IN ({})", column, placeholders.join(", ")));
        self.values.extend(values);
        self
    }

    /// Add default sorting if no order is specified.
    pub fn default_order(mut self) -> Self {
        if self.order_by.is_none() {
            self.order_by = Some(format!("{} {}", E::DEFAULT_SORT, E::DEFAULT_SORT_DIR));
        }
        self
    }

    /// Set limit directly.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build the SQL query string.
    fn build_sql(&self) -> String {
        let mut sql = E::select_sql();

        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        if let Some(ref order) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }

    /// Execute the query and return all matching entities.
    pub async fn fetch_all(self, pool: &SqlitePool) -> Result<Vec<E>, sqlx::Error> {
        let sql = self.build_sql();
        tracing::debug!(sql = %sql, "Executing entity query");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }

        let rows = query.fetch_all(pool).await?;
        rows.iter().map(E::from_row).collect()
    }

    /// Execute the query and return a single entity.
    pub async fn fetch_one(self, pool: &SqlitePool) -> Result<Option<E>, sqlx::Error> {
        let sql = self.build_sql();
        tracing::debug!(sql = %sql, "Executing entity query (one)");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }

        match query.fetch_optional(pool).await? {
            Some(row) => Ok(Some(E::from_row(&row)?)),
            None => Ok(None),
        }
    }
}

impl<E: DatabaseEntity + FromSqlRow> Default for EntityQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute an INSERT/UPDATE/DELETE query with bound values.
/// This helper properly handles the sqlx query lifetime requirements.
pub async fn execute_with_binds(
    sql: &str,
    values: &[SqlValue],
    pool: &SqlitePool,
) -> Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error> {
    tracing::debug!(sql = %sql, binds = values.len(), "Executing statement");

    let mut query = sqlx::query(sql);
    for value in values {
        query = value.bind_to_query(query);
    }
    query.execute(pool).await
}
