/// CSV support for reading delimited records.
///
/// [`csv_reader::CsvItemReader`] turns each row of a delimited resource into
/// an item, mapping the row's fields positionally onto a list of column names
/// and deserializing the result with serde. Files without a header row are
/// the norm here; the column names come from configuration.
///
/// # Examples
///
/// ```
/// use employee_batch::item::csv::csv_reader::CsvItemReaderBuilder;
/// use employee_batch::core::item::ItemReader;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// struct City {
///     city: String,
///     country: String,
///     pop: u32,
/// }
///
/// let csv_data = "\
/// Boston,United States,4628910
/// Concord,United States,42695
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .column_mapping(&["city", "country", "pop"])
///     .from_reader(csv_data.as_bytes());
/// reader.open().unwrap();
///
/// let mut cities: Vec<City> = Vec::new();
/// while let Some(city) = reader.read().unwrap() {
///     cities.push(city);
/// }
///
/// assert_eq!(cities.len(), 2);
/// assert_eq!(cities[1].city, "Concord");
/// assert_eq!(cities[1].pop, 42695);
/// ```

/// A module providing facilities for reading CSV data records.
pub mod csv_reader;
