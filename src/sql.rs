//! Relational data access for the SQL agent.
//!
//! A thin wrapper over one SQLite connection: list tables, describe a
//! table, run an arbitrary statement. Statements are executed as given,
//! without validation.

use anyhow::Result;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};

use docchat_core::models::ColumnInfo;

use crate::db;

pub struct SqliteDatabase {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteDatabase {
    /// Open (creating if missing) the database file.
    ///
    /// The pool holds a single connection, reused for every call.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path, 1).await?;
        tracing::info!(path = %path.display(), "database connected");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Table names from the catalog, in catalog order.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        tracing::debug!("db call: list_tables");
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table'")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    /// `(name, type)` for each column of `table_name`. Unknown tables yield
    /// an empty list.
    pub async fn describe_table(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        tracing::debug!(table_name, "db call: describe_table");
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get("name"),
                column_type: row.get("type"),
            })
            .collect())
    }

    /// Execute `sql` and return every result row.
    pub async fn execute_query(&self, sql: &str) -> Result<Vec<Vec<Value>>> {
        tracing::debug!(sql, "db call: execute_query");
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Create and fill the example `products`, `staff` and `orders` tables.
    ///
    /// Rows are inserted only when `products` is empty, so seeding twice
    /// leaves a single copy.
    pub async fn seed_example_data(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                product_id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_name VARCHAR(255) NOT NULL,
                price DECIMAL(10, 2) NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS staff (
                staff_id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name VARCHAR(255) NOT NULL,
                last_name VARCHAR(255) NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                order_id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_name VARCHAR(255) NOT NULL,
                staff_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                FOREIGN KEY (staff_id) REFERENCES staff (staff_id),
                FOREIGN KEY (product_id) REFERENCES products (product_id)
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *tx)
            .await?;
        if existing == 0 {
            for (name, price) in [("Laptop", 799.99), ("Keyboard", 129.99), ("Mouse", 29.99)] {
                sqlx::query("INSERT INTO products (product_name, price) VALUES (?, ?)")
                    .bind(name)
                    .bind(price)
                    .execute(&mut *tx)
                    .await?;
            }
            for (first, last) in [("Alice", "Smith"), ("Bob", "Johnson"), ("Charlie", "Williams")] {
                sqlx::query("INSERT INTO staff (first_name, last_name) VALUES (?, ?)")
                    .bind(first)
                    .bind(last)
                    .execute(&mut *tx)
                    .await?;
            }
            for (customer, staff_id, product_id) in [
                ("David Lee", 1i64, 1i64),
                ("Emily Chen", 2, 2),
                ("Frank Brown", 1, 3),
            ] {
                sqlx::query(
                    "INSERT INTO orders (customer_name, staff_id, product_id) VALUES (?, ?, ?)",
                )
                .bind(customer)
                .bind(staff_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(path = %self.path.display(), "example tables seeded");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database connection closed");
    }
}

fn row_to_json(row: &SqliteRow) -> Vec<Value> {
    (0..row.len()).map(|i| cell_to_json(row, i)).collect()
}

/// INTEGER and REAL become numbers, TEXT a string, BLOB a hex string.
fn cell_to_json(row: &SqliteRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get::<f64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|b| Value::String(hex::encode(b)))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
