use anyhow::Context;
use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

pub async fn init_db(database_url: &str) -> anyhow::Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}
