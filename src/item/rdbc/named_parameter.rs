use serde::Serialize;
use serde_json::Value;

use crate::BatchError;

/// Value bound to one placeholder of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl TryFrom<&Value> for SqlValue {
    type Error = BatchError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(SqlValue::Integer(i)),
                None => n.as_f64().map(SqlValue::Real).ok_or_else(|| {
                    BatchError::ItemWriter(format!("number {n} cannot be bound"))
                }),
            },
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(BatchError::ItemWriter(format!(
                "nested value {value} cannot be bound to a parameter"
            ))),
        }
    }
}

/// SQL statement written with `:name` placeholders.
///
/// Parsing rewrites every placeholder to a positional `?` and remembers the
/// names in order, so values can be bound by name from any item that
/// serializes to a map of fields. Quoted literals and `::` casts are left
/// untouched.
///
/// ```
/// use employee_batch::item::rdbc::named_parameter::NamedParameterStatement;
///
/// let statement = NamedParameterStatement::parse(
///     "INSERT INTO employee (name, age) VALUES (:name, :age)",
/// )
/// .unwrap();
///
/// assert_eq!(statement.sql(), "INSERT INTO employee (name, age) VALUES (?, ?)");
/// assert_eq!(statement.parameter_names(), ["name", "age"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedParameterStatement {
    sql: String,
    parameter_names: Vec<String>,
}

impl NamedParameterStatement {
    pub fn parse(statement: &str) -> Result<Self, BatchError> {
        let mut sql = String::with_capacity(statement.len());
        let mut parameter_names = Vec::new();
        let mut chars = statement.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\'' | '"' => {
                    sql.push(c);
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        sql.push(inner);
                        if inner == c {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(BatchError::Configuration(format!(
                            "unterminated quote in statement: {statement}"
                        )));
                    }
                }
                ':' => match chars.peek() {
                    Some(':') => {
                        chars.next();
                        sql.push_str("::");
                    }
                    Some(&next) if next.is_ascii_alphabetic() || next == '_' => {
                        let mut name = String::new();
                        while let Some(&next) = chars.peek() {
                            if !(next.is_ascii_alphanumeric() || next == '_') {
                                break;
                            }
                            name.push(next);
                            chars.next();
                        }
                        sql.push('?');
                        parameter_names.push(name);
                    }
                    _ => sql.push(':'),
                },
                _ => sql.push(c),
            }
        }

        if parameter_names.is_empty() {
            return Err(BatchError::Configuration(format!(
                "statement has no named parameter: {statement}"
            )));
        }

        Ok(Self {
            sql,
            parameter_names,
        })
    }

    /// The statement with positional `?` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Checks that every placeholder names one of `fields`.
    pub fn check_fields<S: AsRef<str>>(&self, fields: &[S]) -> Result<(), BatchError> {
        match self
            .parameter_names
            .iter()
            .find(|name| !fields.iter().any(|field| field.as_ref() == name.as_str()))
        {
            Some(unknown) => Err(BatchError::Configuration(format!(
                "parameter :{unknown} does not match any mapped column"
            ))),
            None => Ok(()),
        }
    }

    /// Values of the item's fields, in placeholder order.
    pub fn parameters_for<T: Serialize>(&self, item: &T) -> Result<Vec<SqlValue>, BatchError> {
        let value =
            serde_json::to_value(item).map_err(|error| BatchError::ItemWriter(error.to_string()))?;
        let fields = value.as_object().ok_or_else(|| {
            BatchError::ItemWriter("item does not serialize to named fields".to_string())
        })?;

        self.parameter_names
            .iter()
            .map(|name| {
                fields
                    .get(name)
                    .ok_or_else(|| BatchError::ItemWriter(format!("item has no field `{name}`")))
                    .and_then(SqlValue::try_from)
            })
            .collect()
    }
}
