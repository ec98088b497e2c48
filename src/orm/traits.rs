//! Core traits for the GraphQL ORM layer
//!
//! These traits are implemented by the `#[derive(GraphQLEntity)]` macro from
//! `roster-macros`; the data service and schema sync are written against them.

use sqlx::sqlite::SqliteRow;

/// Column definition for schema generation.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// SQLite column type (TEXT, INTEGER, REAL, BLOB)
    pub sql_type: &'static str,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub is_primary_key: bool,
    /// Default value expression (e.g., "datetime('now')")
    pub default: Option<&'static str>,
}

impl ColumnDef {
    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);

        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
            // INTEGER primary keys get generated ids that are never reused.
            if self.sql_type == "INTEGER" {
                sql.push_str(" AUTOINCREMENT");
            }
        }

        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        sql
    }
}

/// Many-to-many relation definition backed by a join table.
#[derive(Debug, Clone)]
pub struct RelationDef {
    /// Relation name as exposed on the entity (e.g., "tags")
    pub name: &'static str,
    /// Join table name (e.g., "users_tags")
    pub join_table: &'static str,
    /// Join table column holding the owning entity's id
    pub owner_column: &'static str,
    /// Join table column holding the related entity's id
    pub related_column: &'static str,
    /// Table the related ids point into (e.g., "tags")
    pub related_table: &'static str,
    /// Primary key column of the related table
    pub related_key: &'static str,
}

/// Metadata about a database entity (table).
///
/// Implemented by `#[derive(GraphQLEntity)]` macro.
pub trait DatabaseEntity: Sized + Send + Sync + 'static {
    /// The SQL table name (e.g., "users")
    const TABLE_NAME: &'static str;

    /// The GraphQL singular name (e.g., "User")
    const ENTITY_NAME: &'static str;

    /// The GraphQL plural name (e.g., "Users")
    const PLURAL_NAME: &'static str;

    /// The primary key column name (e.g., "id")
    const PRIMARY_KEY: &'static str;

    /// Default sort column for list queries (e.g., "name")
    const DEFAULT_SORT: &'static str;

    /// Default sort direction
    const DEFAULT_SORT_DIR: &'static str = "ASC";

    /// Input type accepted by `create`
    type CreateInput: EntityInput;

    /// Input type accepted by `update`
    type UpdateInput: EntityUpdate;

    /// List of all column names in the table
    fn column_names() -> &'static [&'static str];

    /// Build a SELECT query for all columns
    fn select_sql() -> String {
        let columns = Self::column_names().join(", ");
        format!("SELECT {} FROM {}", columns, Self::TABLE_NAME)
    }
}

/// Trait for database schema generation and migration.
///
/// Implemented by `#[derive(GraphQLEntity)]` macro.
pub trait DatabaseSchema: DatabaseEntity {
    /// Get all column definitions for this entity's table
    fn columns() -> &'static [ColumnDef];

    /// Get all join-table relations owned by this entity
    fn relations() -> &'static [RelationDef] {
        &[]
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    fn create_table_sql() -> String {
        let column_defs: Vec<String> = Self::columns().iter().map(|c| c.to_sql()).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            Self::TABLE_NAME,
            column_defs.join(",\n  ")
        )
    }

    /// Get column names that exist in the entity definition
    fn defined_column_names() -> Vec<&'static str> {
        Self::columns().iter().map(|c| c.name).collect()
    }
}

/// Trait for decoding a database row into an entity.
///
/// Implemented by `#[derive(GraphQLEntity)]` macro; relation fields are left
/// at their default and filled in separately.
pub trait FromSqlRow: Sized {
    /// Decode a SQLite row into this entity type
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Trait for create inputs: the column/value pairs to write.
///
/// Implemented for the generated `Create*Input` and `Update*Input` structs.
/// Nullable columns left unset in a create input yield an explicit NULL;
/// unset fields in an update input are omitted entirely.
pub trait EntityInput: Send + Sync {
    /// Column/value pairs in declaration order
    fn values(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Trait for update inputs, which additionally carry the target row's id.
pub trait EntityUpdate: EntityInput {
    /// Primary key of the row to update
    fn id(&self) -> i64;
}

/// Represents a SQL value that can be bound to a query.
///
/// Used to collect values for parameterized queries.
#[derive(Debug, Clone)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder at the given parameter index
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_def_to_sql_variants() {
        let pk = ColumnDef {
            name: "id",
            sql_type: "INTEGER",
            nullable: false,
            is_primary_key: true,
            default: None,
        };
        assert_eq!(pk.to_sql(), "id INTEGER PRIMARY KEY AUTOINCREMENT");

        let required = ColumnDef {
            name: "firstname",
            sql_type: "TEXT",
            nullable: false,
            is_primary_key: false,
            default: None,
        };
        assert_eq!(required.to_sql(), "firstname TEXT NOT NULL");

        let nullable_with_default = ColumnDef {
            name: "deleted",
            sql_type: "TEXT",
            nullable: true,
            is_primary_key: false,
            default: Some("NULL"),
        };
        assert_eq!(nullable_with_default.to_sql(), "deleted TEXT DEFAULT NULL");
    }
}
