/// `:name` placeholder parsing and binding of item fields.
pub mod named_parameter;

/// Transactional chunk writer for SQLite.
#[cfg(feature = "rdbc-sqlite")]
pub mod sqlite_writer;

#[cfg(feature = "rdbc-sqlite")]
pub use sqlite_writer::{SqliteItemWriter, SqliteItemWriterBuilder};
