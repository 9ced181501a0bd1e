use log::{debug, error, warn};
use serde::Serialize;
use sqlx::{Pool, Sqlite, query::Query, sqlite::SqliteArguments};

use crate::BatchError;
use crate::core::item::{ItemWriter, ItemWriterResult};
use crate::item::rdbc::named_parameter::{NamedParameterStatement, SqlValue};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// A writer that inserts chunks of items into a SQLite database using SQLx.
///
/// Every call to `write` runs in its own transaction: the statement is
/// executed once per item, with its `:name` placeholders bound from the
/// item's serialized fields, and the transaction is committed only when every
/// item went through. On the first failure the transaction is rolled back, so
/// none of the chunk's items are visible afterwards.
///
/// The writer is synchronous at the `ItemWriter` boundary and drives the
/// async driver with `block_in_place`, so it must be called from within a
/// multi-threaded tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use employee_batch::item::rdbc::sqlite_writer::SqliteItemWriterBuilder;
/// use sqlx::SqlitePool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = SqlitePool::connect("sqlite://employees.db").await?;
///
/// let writer = SqliteItemWriterBuilder::new()
///     .pool(&pool)
///     .statement("INSERT INTO employee (name, age) VALUES (:name, :age)")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteItemWriter<'a> {
    pool: &'a Pool<Sqlite>,
    statement: NamedParameterStatement,
}

impl SqliteItemWriter<'_> {
    async fn insert_rows(&self, rows: Vec<Vec<SqlValue>>) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut rows_affected = 0;

        for row in rows {
            let query = row
                .into_iter()
                .fold(sqlx::query(self.statement.sql()), bind_value);

            match query.execute(&mut *tx).await {
                Ok(done) => rows_affected += done.rows_affected(),
                Err(error) => {
                    if let Err(rollback_error) = tx.rollback().await {
                        warn!("Rollback failed: {}", rollback_error);
                    }
                    return Err(error);
                }
            }
        }

        tx.commit().await?;
        Ok(rows_affected)
    }
}

fn bind_value(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Integer(i) => query.bind(i),
        SqlValue::Real(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
    }
}

impl<O: Serialize> ItemWriter<O> for SqliteItemWriter<'_> {
    /// Writes the items in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::ItemWriter` when an item lacks a bound field, or
    /// when the database rejects the statement (constraint violation, lost
    /// connection, missing table). The chunk is rolled back in both cases.
    fn write(&self, items: &[O]) -> ItemWriterResult {
        if items.is_empty() {
            return Ok(());
        }

        let rows = items
            .iter()
            .map(|item| self.statement.parameters_for(item))
            .collect::<Result<Vec<_>, _>>()?;

        let result = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.insert_rows(rows))
        });

        match result {
            Ok(rows_affected) => {
                debug!(
                    "Successfully wrote {} items to SQLite ({} rows affected)",
                    items.len(),
                    rows_affected
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to write {} items to SQLite: {}", items.len(), e);
                Err(BatchError::ItemWriter(format!("SQLite write failed: {}", e)))
            }
        }
    }
}

/// Builder for a [`SqliteItemWriter`].
#[derive(Default)]
pub struct SqliteItemWriterBuilder<'a> {
    pool: Option<&'a Pool<Sqlite>>,
    statement: Option<String>,
}

impl<'a> SqliteItemWriterBuilder<'a> {
    pub fn new() -> Self {
        Self {
            pool: None,
            statement: None,
        }
    }

    pub fn pool(mut self, pool: &'a Pool<Sqlite>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sets the insert statement, written with `:name` placeholders.
    pub fn statement(mut self, statement: &str) -> Self {
        self.statement = Some(statement.to_owned());
        self
    }

    /// Fails with `BatchError::Configuration` when the pool or the statement
    /// is missing, or when the statement cannot be parsed.
    pub fn build(self) -> Result<SqliteItemWriter<'a>, BatchError> {
        let pool = self
            .pool
            .ok_or_else(|| BatchError::Configuration("a SQLite pool is required".to_string()))?;
        let statement = self
            .statement
            .ok_or_else(|| BatchError::Configuration("an insert statement is required".to_string()))?;

        Ok(SqliteItemWriter {
            pool,
            statement: NamedParameterStatement::parse(&statement)?,
        })
    }
}
