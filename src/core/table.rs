use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while materialising a request payload into a table
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("request is missing the `data` field")]
    MissingData,

    #[error("`data` must be a list of row objects or an object of columns, got {0}")]
    NotATable(&'static str),

    #[error("row {0} is not an object")]
    RowNotAnObject(usize),

    #[error("column `{0}` is not a list")]
    ColumnNotAList(String),

    #[error("column `{column}` has {actual} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("value in column `{column}` at row {row} is not numeric: {kind}")]
    NonNumeric {
        column: String,
        row: usize,
        kind: &'static str,
    },

    #[error("table has no rows")]
    Empty,

    #[error("column `{0}` already exists")]
    DuplicateColumn(String),

    #[error("unknown column `{0}`")]
    UnknownColumn(String),
}

/// Named columns over ordered numeric rows.
///
/// Row order always mirrors the order rows arrived in; callers rely on it to
/// line predictions back up with their inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, TableError> {
        let mut seen = IndexSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        for row in &rows {
            if row.len() != columns.len() {
                return Err(TableError::RaggedColumn {
                    column: columns.last().cloned().unwrap_or_default(),
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Extract the `data` field of a scoring request and build a table from it
    pub fn from_request(request: &Value) -> Result<Self, TableError> {
        let object = request.as_object().ok_or(TableError::NotAnObject)?;
        let data = object.get("data").ok_or(TableError::MissingData)?;
        Self::from_json(data)
    }

    /// Build a table from either a list of row objects or an object of columns
    pub fn from_json(data: &Value) -> Result<Self, TableError> {
        let table = match data {
            Value::Array(rows) => Self::from_records(rows)?,
            Value::Object(columns) => Self::from_columns(columns)?,
            other => return Err(TableError::NotATable(kind_of(other))),
        };

        if table.rows.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(table)
    }

    fn from_records(records: &[Value]) -> Result<Self, TableError> {
        let mut keys: IndexSet<&str> = IndexSet::new();
        for (i, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or(TableError::RowNotAnObject(i))?;
            keys.extend(object.keys().map(String::as_str));
        }
        let columns: Vec<String> = keys.into_iter().map(str::to_string).collect();

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or(TableError::RowNotAnObject(i))?;
            let row = columns
                .iter()
                .map(|name| match object.get(name) {
                    // A key missing from this row reads as a missing value
                    None => Ok(f64::NAN),
                    Some(v) => cell(v, name, i),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    fn from_columns(object: &Map<String, Value>) -> Result<Self, TableError> {
        let mut columns = Vec::with_capacity(object.len());
        let mut values: Vec<&Vec<Value>> = Vec::with_capacity(object.len());
        for (name, column) in object {
            let list = column
                .as_array()
                .ok_or_else(|| TableError::ColumnNotAList(name.clone()))?;
            columns.push(name.clone());
            values.push(list);
        }

        let expected = values.first().map(|v| v.len()).unwrap_or(0);
        for (name, list) in columns.iter().zip(&values) {
            if list.len() != expected {
                return Err(TableError::RaggedColumn {
                    column: name.clone(),
                    expected,
                    actual: list.len(),
                });
            }
        }

        let mut rows = Vec::with_capacity(expected);
        for i in 0..expected {
            let row = columns
                .iter()
                .zip(&values)
                .map(|(name, list)| cell(&list[i], name, i))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of a single column in row order
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Return a copy of this table with `values` appended as the last column
    pub fn with_column(&self, name: &str, values: &[f64]) -> Result<Self, TableError> {
        if self.column_index(name).is_some() {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.rows.len() {
            return Err(TableError::RaggedColumn {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, v)| {
                let mut row = row.clone();
                row.push(*v);
                row
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Keep only the named columns, in the order given
    pub fn project(&self, names: &[&str]) -> Result<Self, TableError> {
        let columns: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let rows = self.select_ordered(names)?;
        Self::new(columns, rows)
    }

    /// Row-major matrix with columns laid out in `order`
    pub fn select_ordered<S: AsRef<str>>(&self, order: &[S]) -> Result<Vec<Vec<f64>>, TableError> {
        let indices = order
            .iter()
            .map(|name| {
                self.column_index(name.as_ref())
                    .ok_or_else(|| TableError::UnknownColumn(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect())
    }
}

fn cell(value: &Value, column: &str, row: usize) -> Result<f64, TableError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| TableError::NonNumeric {
            column: column.to_string(),
            row,
            kind: "number out of range",
        }),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(f64::NAN),
        other => Err(TableError::NonNumeric {
            column: column.to_string(),
            row,
            kind: kind_of(other),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
