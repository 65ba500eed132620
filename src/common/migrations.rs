// src/common/migrations.rs
//! Database migration and schema management

use sqlx::SqlitePool;
use std::env;
use tracing::{info, warn};

use super::id_generator::generate_category_id;

/// Run all database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Only drop tables if RESET_DB environment variable is set to "true"
    // This prevents data loss on server restarts
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("RESET_DB=true - Dropping all tables and recreating schema...");
        drop_all_tables(pool).await?;
        info!("Dropped old tables");
    }

    create_identity_tables(pool).await?;
    create_catalog_tables(pool).await?;
    create_indexes(pool).await?;

    // Seed the default category list when starting from an empty catalog
    seed_default_categories(pool).await?;

    info!("Database migration completed successfully");

    Ok(())
}

async fn drop_all_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for table in ["items", "categories", "linked_identities", "users"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Users and their per-provider linked identities.
///
/// The UNIQUE index on users.username is the guard against two concurrent
/// first-time sign-ins for the same username: the losing INSERT is ignored
/// and the caller re-selects the surviving row.
async fn create_identity_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            created_on TEXT NOT NULL DEFAULT (datetime('now')),
            updated_on TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS linked_identities (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            token TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_on TEXT NOT NULL DEFAULT (datetime('now')),
            updated_on TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (provider, user_id),
            FOREIGN KEY (user_id) REFERENCES users (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_catalog_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            image TEXT,
            created_on TEXT NOT NULL DEFAULT (datetime('now')),
            updated_on TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            image TEXT,
            category_id TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_on TEXT NOT NULL DEFAULT (datetime('now')),
            updated_on TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (category_id) REFERENCES categories (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_linked_identities_user ON linked_identities (user_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_category ON items (category_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_created_by ON items (created_by)",
        "CREATE INDEX IF NOT EXISTS idx_items_created_on ON items (created_on)",
    ];

    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    Ok(())
}

/// Insert the default category list when the table is empty.
/// Existing catalogs are never touched.
async fn seed_default_categories(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Ok(());
    }

    let defaults = [
        "Soccer",
        "Baseball",
        "Basketball",
        "Frisbee",
        "Snowboarding",
        "Cricket",
        "Hockey",
        "Rock Climbing",
    ];

    for name in defaults {
        sqlx::query(
            "INSERT INTO categories (id, name, created_on, updated_on) \
             VALUES (?, ?, datetime('now'), datetime('now'))",
        )
        .bind(generate_category_id())
        .bind(name)
        .execute(pool)
        .await?;
    }

    info!(count = defaults.len(), "Seeded default categories");

    Ok(())
}
