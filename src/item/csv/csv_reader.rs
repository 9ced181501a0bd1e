use csv::{ErrorKind, ReaderBuilder, StringRecord, StringRecordsIntoIter, Terminator, Trim};
use serde::de::DeserializeOwned;
use std::{
    cell::RefCell,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::BatchError,
};

enum CsvSource {
    /// Re-opened from the start on every `open`
    Path(PathBuf),
    /// Can be opened once only
    Reader(RefCell<Option<Box<dyn Read>>>),
}

/// A CSV item reader that implements the `ItemReader` trait.
///
/// Rows are mapped positionally onto the configured column names, then
/// deserialized with serde. Nothing is read before [`CsvItemReader::open`].
///
/// # Examples
///
/// ```
/// use employee_batch::item::csv::csv_reader::CsvItemReaderBuilder;
/// use employee_batch::core::item::ItemReader;
/// use employee_batch::employee::Employee;
///
/// let data = "\
/// Ada Lovelace,Analyst,Engineering,36
/// Alan Turing,Researcher,Mathematics,41
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .column_mapping(&["name", "title", "department", "age"])
///     .from_reader(data.as_bytes());
/// reader.open().unwrap();
///
/// let employee: Employee = reader.read().unwrap().unwrap();
/// assert_eq!(employee.name, "Ada Lovelace");
/// assert_eq!(employee.id, None);
///
/// let employee: Employee = reader.read().unwrap().unwrap();
/// assert_eq!(employee.age, 41);
///
/// assert!(ItemReader::<Employee>::read(&reader).unwrap().is_none());
/// ```
pub struct CsvItemReader {
    source: CsvSource,
    delimiter: u8,
    terminator: Terminator,
    has_headers: bool,
    column_mapping: Option<StringRecord>,
    /// Column names used for deserialization, resolved on `open`
    headers: RefCell<Option<StringRecord>>,
    /// Uses `RefCell` so that `read` can keep the `&self` signature of `ItemReader`
    records: RefCell<Option<StringRecordsIntoIter<Box<dyn Read>>>>,
}

impl CsvItemReader {
    /// Opens the underlying resource and positions the reader on the first row.
    ///
    /// Fails with [`BatchError::SourceUnavailable`] when the file cannot be
    /// opened or when a one-shot reader has already been consumed.
    pub fn open(&self) -> Result<(), BatchError> {
        let input = self.open_source()?;

        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(self.has_headers)
            .flexible(true)
            .from_reader(input);

        let headers = match &self.column_mapping {
            Some(mapping) => Some(mapping.clone()),
            None if self.has_headers => Some(
                rdr.headers()
                    .map_err(|error| self.to_batch_error(error))?
                    .clone(),
            ),
            None => None,
        };

        *self.headers.borrow_mut() = headers;
        *self.records.borrow_mut() = Some(rdr.into_records());

        Ok(())
    }

    pub fn close(&self) -> Result<(), BatchError> {
        self.records.borrow_mut().take();
        Ok(())
    }

    fn open_source(&self) -> Result<Box<dyn Read>, BatchError> {
        match &self.source {
            CsvSource::Path(path) => File::open(path)
                .map(|file| Box::new(file) as Box<dyn Read>)
                .map_err(|error| {
                    BatchError::SourceUnavailable(format!("{}: {}", path.display(), error))
                }),
            CsvSource::Reader(reader) => reader.borrow_mut().take().ok_or_else(|| {
                BatchError::SourceUnavailable("CSV input has already been consumed".to_string())
            }),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, record: &StringRecord) -> Result<T, BatchError> {
        let line = record.position().map_or(0, |position| position.line());
        let content = record
            .iter()
            .collect::<Vec<_>>()
            .join(&char::from(self.delimiter).to_string());

        let headers = self.headers.borrow();

        if let Some(headers) = headers.as_ref() {
            if record.len() != headers.len() {
                return Err(BatchError::Parse {
                    line,
                    content,
                    message: format!("expected {} fields, found {}", headers.len(), record.len()),
                });
            }
        }

        record
            .deserialize(headers.as_ref())
            .map_err(|error| BatchError::Parse {
                line,
                content,
                message: error.to_string(),
            })
    }

    fn to_batch_error(&self, error: csv::Error) -> BatchError {
        if let ErrorKind::Io(io_error) = error.kind() {
            return BatchError::SourceUnavailable(io_error.to_string());
        }

        BatchError::Parse {
            line: error.position().map_or(0, |position| position.line()),
            content: String::new(),
            message: error.to_string(),
        }
    }
}

impl<T: DeserializeOwned> ItemReader<T> for CsvItemReader {
    fn open(&self) -> Result<(), BatchError> {
        CsvItemReader::open(self)
    }

    /// Reads the next row.
    ///
    /// # Returns
    /// - `Ok(Some(record))` if a record is successfully read
    /// - `Ok(None)` if there are no more records to read
    /// - `Err(BatchError::Parse { .. })` if the row is malformed
    /// - `Err(BatchError::SourceUnavailable(_))` if the reader is not open or the input fails
    fn read(&self) -> ItemReaderResult<T> {
        let next = {
            let mut records = self.records.borrow_mut();
            let records = records.as_mut().ok_or_else(|| {
                BatchError::SourceUnavailable("CSV reader has not been opened".to_string())
            })?;
            records.next()
        };

        match next {
            None => Ok(None),
            Some(Ok(record)) => self.deserialize(&record).map(Some),
            Some(Err(error)) => Err(self.to_batch_error(error)),
        }
    }

    fn close(&self) -> Result<(), BatchError> {
        CsvItemReader::close(self)
    }
}

/// A builder for configuring CSV item reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Terminator: CRLF (accepts `\r\n`, `\r` and `\n`)
/// - Headers: disabled
/// - Column mapping: none (struct fields are filled in declaration order)
pub struct CsvItemReaderBuilder {
    delimiter: u8,
    terminator: Terminator,
    has_headers: bool,
    column_mapping: Option<StringRecord>,
}

impl Default for CsvItemReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            terminator: Terminator::CRLF,
            has_headers: false,
            column_mapping: None,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Sets whether the first row holds column names and must not be returned.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Names the columns of each row, in order.
    ///
    /// Takes precedence over the header row when both are present.
    pub fn column_mapping<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.column_mapping = Some(StringRecord::from_iter(names.iter().map(AsRef::as_ref)));
        self
    }

    /// Creates a reader over any `Read` source. It can be opened only once.
    pub fn from_reader<R: Read + 'static>(self, rdr: R) -> CsvItemReader {
        self.build(CsvSource::Reader(RefCell::new(Some(Box::new(rdr)))))
    }

    /// Creates a reader over a file. The file is opened by `open`, not here.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvItemReader {
        self.build(CsvSource::Path(path.as_ref().to_path_buf()))
    }

    fn build(self, source: CsvSource) -> CsvItemReader {
        CsvItemReader {
            source,
            delimiter: self.delimiter,
            terminator: self.terminator,
            has_headers: self.has_headers,
            column_mapping: self.column_mapping,
            headers: RefCell::new(None),
            records: RefCell::new(None),
        }
    }
}
