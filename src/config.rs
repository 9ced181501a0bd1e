use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{BatchError, item::rdbc::named_parameter::NamedParameterStatement};

pub const DEFAULT_INSERT_STATEMENT: &str = "INSERT INTO employee (name, title, department, age) \
     VALUES (:name, :title, :department, :age)";

/// Settings of the employee import, read from a JSON file.
///
/// Every key is optional; missing keys take the defaults below.
///
/// ```json
/// {
///   "jobName": "employeeJob",
///   "chunkSize": 10,
///   "inputResourceLocation": "resources/employees.csv",
///   "columnMapping": ["name", "title", "department", "age"],
///   "insertStatement": "INSERT INTO employee (name, title, department, age) VALUES (:name, :title, :department, :age)",
///   "delimiter": ",",
///   "hasHeaders": false,
///   "encoding": "utf-8",
///   "databaseUrl": "sqlite://employees.db",
///   "skipLimit": 0,
///   "dryRun": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchSettings {
    pub job_name: String,
    /// Items committed per transaction. Signed so that a negative value is
    /// reported as a configuration error rather than a parse error.
    pub chunk_size: i64,
    pub input_resource_location: PathBuf,
    /// Names given to the fields of each row, in order
    pub column_mapping: Vec<String>,
    pub insert_statement: String,
    pub delimiter: String,
    pub has_headers: bool,
    pub encoding: String,
    pub database_url: String,
    pub skip_limit: usize,
    /// Log items instead of writing them to the database
    pub dry_run: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            job_name: "employeeJob".to_string(),
            chunk_size: 10,
            input_resource_location: PathBuf::from("resources/employees.csv"),
            column_mapping: ["name", "title", "department", "age"]
                .into_iter()
                .map(String::from)
                .collect(),
            insert_statement: DEFAULT_INSERT_STATEMENT.to_string(),
            delimiter: ",".to_string(),
            has_headers: false,
            encoding: "utf-8".to_string(),
            database_url: "sqlite://employees.db".to_string(),
            skip_limit: 0,
            dry_run: false,
        }
    }
}

impl BatchSettings {
    /// Reads, parses and validates the settings file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|error| {
            BatchError::Configuration(format!("cannot read {}: {}", path.display(), error))
        })?;

        let settings: BatchSettings = serde_json::from_str(&content).map_err(|error| {
            BatchError::Configuration(format!("invalid settings in {}: {}", path.display(), error))
        })?;

        settings.validate()?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);

        Ok(settings)
    }

    /// Rejects every setting that would make the job fail before reading.
    pub fn validate(&self) -> Result<(), BatchError> {
        self.commit_interval()?;
        self.delimiter_byte()?;

        if self.column_mapping.is_empty() {
            return Err(BatchError::Configuration(
                "column mapping must name at least one column".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self
            .column_mapping
            .iter()
            .find(|column| !seen.insert(column.as_str()))
        {
            return Err(BatchError::Configuration(format!(
                "column `{duplicate}` is mapped twice"
            )));
        }

        self.statement()?.check_fields(&self.column_mapping)?;

        if !matches!(self.encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
            return Err(BatchError::Configuration(format!(
                "unsupported encoding `{}`, only UTF-8 input is read",
                self.encoding
            )));
        }

        Ok(())
    }

    /// The chunk size as a positive count.
    pub fn commit_interval(&self) -> Result<usize, BatchError> {
        match usize::try_from(self.chunk_size) {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(BatchError::Configuration(format!(
                "chunk size must be a positive integer, got {}",
                self.chunk_size
            ))),
        }
    }

    pub fn delimiter_byte(&self) -> Result<u8, BatchError> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(BatchError::Configuration(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ))),
        }
    }

    pub fn statement(&self) -> Result<NamedParameterStatement, BatchError> {
        NamedParameterStatement::parse(&self.insert_statement)
    }
}
