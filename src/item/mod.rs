#[cfg(feature = "logger")]
/// This module provides a logger item writer, useful for dry runs.
pub mod logger;

#[cfg(feature = "csv")]
/// This module provides a CSV item reader.
pub mod csv;

/// This module provides named SQL parameters and, with `rdbc-sqlite`, a
/// transactional SQLite item writer.
pub mod rdbc;
