//! Integration tests for the generic data service
//!
//! These tests run the full CRUD contract against SQLite:
//! - Create / find round-trips and soft-delete filtering
//! - Field lookups with fail-closed column validation
//! - Partial updates by primary key
//! - Single and bulk soft-deletion

use std::str::FromStr;

use assert_matches::assert_matches;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use roster::db::sqlite_helpers::str_to_datetime;
use roster::db::{Database, sync_all_entity_schemas};
use roster::entities::{CreateUserInput, UpdateUserInput, User};
use roster::orm::{DataService, ServiceError};

// ============================================================================
// Test Helpers
// ============================================================================

/// Single-connection in-memory pool, so every statement sees the same database
async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect to in-memory SQLite");

    let result = sync_all_entity_schemas(&pool).await;
    assert!(
        result.errors.is_empty(),
        "schema sync failed: {:?}",
        result.errors
    );
    pool
}

async fn user_service() -> DataService<User> {
    Database::new(test_pool().await).users()
}

fn input(firstname: &str, surname: &str) -> CreateUserInput {
    CreateUserInput {
        firstname: firstname.to_string(),
        surname: surname.to_string(),
    }
}

fn ids(users: &[User]) -> Vec<i64> {
    users.iter().map(|u| u.id).collect()
}

// ============================================================================
// Create
// ============================================================================

mod creating {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_returns_stored_row() {
        let service = user_service().await;

        let user = service.create(&input("Ada", "Lovelace")).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.firstname, "Ada");
        assert_eq!(user.surname, "Lovelace");
        assert_eq!(user.deleted, None);
        // Both stamps come from the same clock read
        assert_eq!(user.created, user.updated);
        assert!(str_to_datetime(&user.created).is_ok());
    }

    #[tokio::test]
    async fn test_generated_ids_are_sequential() {
        let service = user_service().await;

        let first = service.create(&input("Ada", "Lovelace")).await.unwrap();
        let second = service.create(&input("Grace", "Hopper")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }
}

// ============================================================================
// Find
// ============================================================================

mod finding {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_find_one_by_primary_key() {
        let service = user_service().await;
        let created = service.create(&input("Ada", "Lovelace")).await.unwrap();

        let found = service.find_one(created.id).await.unwrap().unwrap();
        assert_eq!(found.firstname, "Ada");

        assert!(service.find_one(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_lists_live_rows_in_id_order() {
        let service = user_service().await;
        assert!(service.find_all().await.unwrap().is_empty());

        service.create(&input("Grace", "Hopper")).await.unwrap();
        service.create(&input("Ada", "Lovelace")).await.unwrap();

        let all = service.find_all().await.unwrap();
        assert_eq!(ids(&all), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_find_all_excludes_soft_deleted_rows() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();
        service.create(&input("Grace", "Hopper")).await.unwrap();

        assert!(service.remove(1).await.unwrap());

        assert_eq!(ids(&service.find_all().await.unwrap()), vec![2]);

        let deleted = service.find_all_deleted().await.unwrap();
        assert_eq!(ids(&deleted), vec![1]);
        assert!(str_to_datetime(deleted[0].deleted.as_deref().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_find_many_skips_unknown_and_deleted_ids() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();
        service.create(&input("Grace", "Hopper")).await.unwrap();
        service.remove(2).await.unwrap();

        assert_eq!(ids(&service.find_many(&[1, 2, 99]).await.unwrap()), vec![1]);
        assert!(service.find_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_field_one_matches_first_live_row() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();

        let found = service
            .find_by_field_one("firstname", "Ada")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.surname, "Lovelace");

        assert!(
            service
                .find_by_field_one("firstname", "Grace")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_find_by_field_all_returns_every_match() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();
        service.create(&input("Anne", "Lovelace")).await.unwrap();
        service.create(&input("Grace", "Hopper")).await.unwrap();

        let matches = service
            .find_by_field_all("surname", "Lovelace")
            .await
            .unwrap();
        assert_eq!(ids(&matches), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_find_by_field_compares_through_column_affinity() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();

        // The value always arrives as text; the INTEGER id column still matches
        let found = service.find_by_field_one("id", "1").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_find_by_field_rejects_unknown_columns() {
        let service = user_service().await;

        assert_matches!(
            service.find_by_field_one("password", "x").await,
            Err(ServiceError::UnknownField { field, .. }) if field == "password"
        );
        assert_matches!(
            service.find_by_field_all("tags", "x").await,
            Err(ServiceError::UnknownField { .. })
        );
    }
}

// ============================================================================
// Update
// ============================================================================

mod updating {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_update_changes_only_set_fields() {
        let service = user_service().await;
        let created = service.create(&input("Ada", "Lovelace")).await.unwrap();

        let updated = service
            .update(&UpdateUserInput {
                id: created.id,
                firstname: None,
                surname: Some("Byron".to_string()),
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.firstname, "Ada");
        assert_eq!(updated.surname, "Byron");
        assert_eq!(updated.created, created.created);
        assert_ne!(updated.updated, created.updated);
    }

    #[tokio::test]
    async fn test_update_unknown_id_returns_none() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();

        let result = service
            .update(&UpdateUserInput {
                id: 999,
                firstname: Some("Grace".to_string()),
                surname: None,
            })
            .await
            .unwrap();
        assert!(result.is_none());

        // Nothing was written
        let untouched = service.find_one(1).await.unwrap().unwrap();
        assert_eq!(untouched.firstname, "Ada");
    }

    #[tokio::test]
    async fn test_update_with_no_fields_returns_current_row() {
        let service = user_service().await;
        let created = service.create(&input("Ada", "Lovelace")).await.unwrap();

        let result = service
            .update(&UpdateUserInput {
                id: created.id,
                firstname: None,
                surname: None,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.firstname, "Ada");
        assert_eq!(result.updated, created.updated);
    }

    #[tokio::test]
    async fn test_update_skips_soft_deleted_rows() {
        let service = user_service().await;
        let created = service.create(&input("Ada", "Lovelace")).await.unwrap();
        service.remove(created.id).await.unwrap();

        let result = service
            .update(&UpdateUserInput {
                id: created.id,
                firstname: Some("Grace".to_string()),
                surname: None,
            })
            .await
            .unwrap();
        assert!(result.is_none());
    }
}

// ============================================================================
// Remove
// ============================================================================

mod removing {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_remove_marks_row_deleted() {
        let service = user_service().await;
        let created = service.create(&input("Ada", "Lovelace")).await.unwrap();

        assert!(service.remove(created.id).await.unwrap());
        assert!(service.find_one(created.id).await.unwrap().is_none());

        let deleted = service.find_all_deleted().await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].deleted.is_some());
    }

    #[tokio::test]
    async fn test_remove_is_false_for_unknown_or_already_deleted() {
        let service = user_service().await;
        let created = service.create(&input("Ada", "Lovelace")).await.unwrap();

        assert!(!service.remove(999).await.unwrap());
        assert!(service.remove(created.id).await.unwrap());
        assert!(!service.remove(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_many_reports_whether_anything_was_deleted() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();
        service.create(&input("Grace", "Hopper")).await.unwrap();
        service.create(&input("Edith", "Clarke")).await.unwrap();

        assert!(service.remove_many(&[1, 2]).await.unwrap());
        assert_eq!(ids(&service.find_all().await.unwrap()), vec![3]);

        // All already deleted or unknown
        assert!(!service.remove_many(&[1, 2]).await.unwrap());
        assert!(!service.remove_many(&[98, 99]).await.unwrap());
        assert!(!service.remove_many(&[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_many_with_partially_known_ids() {
        let service = user_service().await;
        service.create(&input("Ada", "Lovelace")).await.unwrap();
        service.create(&input("Grace", "Hopper")).await.unwrap();
        service.remove(2).await.unwrap();

        // One live id in the batch is enough for a true result
        assert!(service.remove_many(&[1, 2, 999]).await.unwrap());
        assert!(service.find_all().await.unwrap().is_empty());
    }
}

// ============================================================================
// File-backed storage
// ============================================================================

mod storage {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_connect_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.db");

        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        let result = db.sync_schema().await;
        assert!(result.errors.is_empty(), "errors: {:?}", result.errors);

        let user = db.users().create(&input("Ada", "Lovelace")).await.unwrap();
        assert_eq!(user.id, 1);
        assert!(path.exists());
    }
}
