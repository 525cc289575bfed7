//! Runs against a real Postgres only when `ETL_TEST_DATABASE_URL` is set.

use anyhow::Result;
use sqlx::{Connection, PgConnection, Row};
use user_processing_etl::domain::ports::UserStore;
use user_processing_etl::{Connections, PgUserStore};

fn database_url() -> Option<String> {
    std::env::var("ETL_TEST_DATABASE_URL").ok()
}

fn store(url: &str, table: &str) -> PgUserStore {
    let connections = Connections::default().with("postgres_it", url);
    PgUserStore::new(connections, "postgres_it".to_string(), table.to_string())
}

async fn reset(url: &str, table: &str) -> Result<PgConnection> {
    let mut conn = PgConnection::connect(url).await?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
        .execute(&mut conn)
        .await?;
    Ok(conn)
}

#[tokio::test]
async fn test_postgres_schema_and_copy() -> Result<()> {
    let Some(url) = database_url() else {
        println!("ETL_TEST_DATABASE_URL not set, skipping");
        return Ok(());
    };
    let table = "users_it_copy";
    let mut conn = reset(&url, table).await?;
    let store = store(&url, table);

    store.ensure_schema().await?;
    store.ensure_schema().await?;

    let columns: Vec<String> = sqlx::query(
        "SELECT column_name::text AS column_name FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position",
    )
    .bind(table)
    .fetch_all(&mut conn)
    .await?
    .iter()
    .map(|row| row.get::<String, _>("column_name"))
    .collect();
    assert_eq!(
        columns,
        vec!["firstname", "lastname", "country", "username", "password", "email"]
    );

    let rows = store
        .copy_csv(b"Ada,Lovelace,UK,ada99,secret,a@x.com\n")
        .await?;
    assert_eq!(rows, 1);

    let row = sqlx::query(&format!("SELECT * FROM {}", table))
        .fetch_one(&mut conn)
        .await?;
    let values: Vec<String> = (0..6).map(|i| row.get::<String, _>(i)).collect();
    assert_eq!(values, vec!["Ada", "Lovelace", "UK", "ada99", "secret", "a@x.com"]);

    Ok(())
}

#[tokio::test]
async fn test_postgres_copy_keeps_empty_strings() -> Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let table = "users_it_empty";
    let mut conn = reset(&url, table).await?;
    let store = store(&url, table);
    store.ensure_schema().await?;

    let rows = store.copy_csv(b"Ada,,UK,ada99,secret,\n").await?;
    assert_eq!(rows, 1);

    let row = sqlx::query(&format!("SELECT lastname, email FROM {}", table))
        .fetch_one(&mut conn)
        .await?;
    assert_eq!(row.get::<String, _>("lastname"), "");
    assert_eq!(row.get::<String, _>("email"), "");

    Ok(())
}

#[tokio::test]
async fn test_postgres_copy_rejects_short_row() -> Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let table = "users_it_short";
    let mut conn = reset(&url, table).await?;
    let store = store(&url, table);
    store.ensure_schema().await?;

    let result = store
        .copy_csv(b"Ada,Lovelace,UK,ada99,secret,a@x.com\nGrace,Hopper\n")
        .await;
    assert!(result.is_err());

    let count: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
        .fetch_one(&mut conn)
        .await?
        .get("n");
    assert_eq!(count, 0);

    Ok(())
}
