//! Common test utilities

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Setup test database - truncate wallet tables for a fresh state
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Clean up DB for fresh state
    sqlx::query(
        "TRUNCATE TABLE wallet_ledger_entries, wallet_recharges, outbox_messages, wallets CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}

/// Seed a wallet row directly, bypassing the command layer
pub async fn seed_wallet(pool: &PgPool, student_id: Uuid, balance: Decimal) -> Uuid {
    let wallet_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO wallets (id, student_id, balance, currency, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, 'EGP', true, NOW(), NOW())
        "#,
    )
    .bind(wallet_id)
    .bind(student_id)
    .bind(balance)
    .execute(pool)
    .await
    .expect("Failed to seed wallet");

    wallet_id
}
