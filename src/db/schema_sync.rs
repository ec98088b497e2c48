//! Descriptor-driven schema synchronization
//!
//! Brings the database in line with the entity declarations at startup:
//! missing tables are created from the column descriptors, missing columns
//! are added to existing tables, and the join tables declared by
//! `#[relation(...)]` fields are created once both entity tables exist.
//! Column renames and type changes are out of scope; those need a manual
//! migration.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::orm::{ColumnDef, DatabaseSchema, RelationDef};

/// Report of what a sync pass changed and what it could not change.
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<(String, String)>, // (table, column)
    pub errors: Vec<String>,
}

impl SchemaSyncResult {
    fn merge(&mut self, other: SchemaSyncResult) {
        self.tables_created.extend(other.tables_created);
        self.columns_added.extend(other.columns_added);
        self.errors.extend(other.errors);
    }
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool, sqlx::Error> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_optional(pool)
            .await?;

    Ok(found.is_some())
}

/// Column names currently present on a table.
async fn get_table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    // PRAGMA table_info rows: (cid, name, type, notnull, dflt_value, pk)
    let columns: Vec<(i32, String, String, i32, Option<String>, i32)> =
        sqlx::query_as(&format!("PRAGMA table_info({})", table))
            .fetch_all(pool)
            .await?;

    Ok(columns.into_iter().map(|(_, name, ..)| name).collect())
}

/// Sync a single entity's table: create it when absent, otherwise add any
/// columns the declaration has gained since the table was created.
pub async fn sync_entity<E: DatabaseSchema>(
    pool: &SqlitePool,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();
    let table = E::TABLE_NAME;

    if !table_exists(pool, table).await? {
        let ddl = E::create_table_sql();
        debug!(table, sql = %ddl, "Creating entity table");

        match sqlx::query(&ddl).execute(pool).await {
            Ok(_) => {
                info!(table, "Created table");
                result.tables_created.push(table.to_string());
            }
            Err(e) => {
                warn!(table, error = %e, "Table creation failed");
                result.errors.push(format!("create table {}: {}", table, e));
            }
        }
        return Ok(result);
    }

    let existing = get_table_columns(pool, table).await?;
    for column in E::columns() {
        if existing.iter().any(|name| name == column.name) {
            continue;
        }
        let ddl = add_column_sql(table, column);
        debug!(table, column = column.name, sql = %ddl, "Adding missing column");

        match sqlx::query(&ddl).execute(pool).await {
            Ok(_) => {
                info!(table, column = column.name, "Added column");
                result
                    .columns_added
                    .push((table.to_string(), column.name.to_string()));
            }
            Err(e) => {
                warn!(table, column = column.name, error = %e, "Column addition failed");
                result
                    .errors
                    .push(format!("add column {}.{}: {}", table, column.name, e));
            }
        }
    }

    Ok(result)
}

/// Create the join tables for an entity's relations.
///
/// Runs after every entity table exists so the foreign keys have targets.
pub async fn sync_relations<E: DatabaseSchema>(
    pool: &SqlitePool,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();

    for rel in E::relations() {
        if table_exists(pool, rel.join_table).await? {
            continue;
        }
        let ddl = relation_table_sql::<E>(rel);
        debug!(table = rel.join_table, sql = %ddl, "Creating join table");

        match sqlx::query(&ddl).execute(pool).await {
            Ok(_) => {
                info!(table = rel.join_table, "Created join table");
                result.tables_created.push(rel.join_table.to_string());
            }
            Err(e) => {
                warn!(table = rel.join_table, error = %e, "Join table creation failed");
                result
                    .errors
                    .push(format!("create join table {}: {}", rel.join_table, e));
            }
        }
    }

    Ok(result)
}

/// ALTER TABLE ADD COLUMN for one descriptor.
///
/// SQLite refuses ADD COLUMN with NOT NULL unless a default backfills the
/// existing rows, and cannot add primary key or unique columns at all.
fn add_column_sql(table: &str, column: &ColumnDef) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table, column.name, column.sql_type
    );

    if let Some(default) = column.default {
        sql.push_str(&format!(" DEFAULT {}", default));
    } else if !column.nullable {
        let backfill = match column.sql_type {
            "INTEGER" => "0",
            "REAL" => "0.0",
            _ => "''",
        };
        sql.push_str(&format!(" NOT NULL DEFAULT {}", backfill));
    }

    sql
}

/// CREATE TABLE for a join table: composite primary key plus a foreign key
/// to each side, so attaching an unknown id fails at the database.
fn relation_table_sql<E: DatabaseSchema>(rel: &RelationDef) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {} INTEGER NOT NULL REFERENCES {}({}),\n  {} INTEGER NOT NULL REFERENCES {}({}),\n  PRIMARY KEY ({}, {})\n)",
        rel.join_table,
        rel.owner_column,
        E::TABLE_NAME,
        E::PRIMARY_KEY,
        rel.related_column,
        rel.related_table,
        rel.related_key,
        rel.owner_column,
        rel.related_column
    )
}

/// Sync every registered entity at startup.
///
/// Entity tables come first, then the join tables that reference them.
/// Failures are collected per statement rather than aborting the pass, so
/// one bad table does not keep the rest of the schema from converging.
pub async fn sync_all_entity_schemas(pool: &SqlitePool) -> SchemaSyncResult {
    use crate::entities::{Tag, User};

    let mut total = SchemaSyncResult::default();

    macro_rules! sync {
        ($step:expr, $what:literal) => {
            match $step.await {
                Ok(result) => total.merge(result),
                Err(e) => total.errors.push(format!("{}: {}", $what, e)),
            }
        };
    }

    sync!(sync_entity::<User>(pool), "sync users");
    sync!(sync_entity::<Tag>(pool), "sync tags");
    sync!(sync_relations::<User>(pool), "sync users relations");
    sync!(sync_relations::<Tag>(pool), "sync tags relations");

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Tag, User};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        // One connection so every statement sees the same in-memory database
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect to in-memory SQLite")
    }

    #[test]
    fn add_column_sql_backfills_not_null() {
        let col = ColumnDef {
            name: "surname",
            sql_type: "TEXT",
            nullable: false,
            is_primary_key: false,
            default: None,
        };
        assert_eq!(
            add_column_sql("users", &col),
            "ALTER TABLE users ADD COLUMN surname TEXT NOT NULL DEFAULT ''"
        );
    }

    #[test]
    fn join_table_sql_has_composite_key_and_foreign_keys() {
        let rel = &User::relations()[0];
        let sql = relation_table_sql::<User>(rel);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS users_tags"));
        assert!(sql.contains("user_id INTEGER NOT NULL REFERENCES users(id)"));
        assert!(sql.contains("tag_id INTEGER NOT NULL REFERENCES tags(id)"));
        assert!(sql.contains("PRIMARY KEY (user_id, tag_id)"));
    }

    #[tokio::test]
    async fn sync_creates_all_tables_and_is_idempotent() {
        let pool = memory_pool().await;

        let first = sync_all_entity_schemas(&pool).await;
        assert!(first.errors.is_empty(), "errors: {:?}", first.errors);
        assert!(first.tables_created.contains(&"users".to_string()));
        assert!(first.tables_created.contains(&"tags".to_string()));
        assert!(first.tables_created.contains(&"users_tags".to_string()));

        let second = sync_all_entity_schemas(&pool).await;
        assert!(second.errors.is_empty());
        assert!(second.tables_created.is_empty());
        assert!(second.columns_added.is_empty());
    }

    #[tokio::test]
    async fn sync_adds_missing_columns_to_existing_table() {
        let pool = memory_pool().await;

        // A table from an older entity declaration, before the audit columns
        sqlx::query("CREATE TABLE tags (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let result = sync_entity::<Tag>(&pool).await.unwrap();
        assert!(result.tables_created.is_empty());
        let added: Vec<&str> = result
            .columns_added
            .iter()
            .map(|(_, column)| column.as_str())
            .collect();
        assert_eq!(added, vec!["created", "updated", "deleted"]);
    }
}
