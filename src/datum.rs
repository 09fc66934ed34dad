//! Strongly-typed values exchanged with capabilities.
//!
//! Oracle arguments arrive as loose JSON and are coerced into [`Datum`]s;
//! capability results are [`Datum`]s serialized back into canonical JSON
//! before they are stored in the orchestration context.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Absent value. Not-a-number inputs are normalized to this.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Datum>),
    Map(BTreeMap<String, Datum>),
    Table(Table),
}

impl Datum {
    /// Structural conversion with no type tags applied.
    pub fn from_json(value: &Value) -> Datum {
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Datum::Int(i),
                None => Datum::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Datum::Str(s.clone()),
            Value::Array(items) => Datum::List(items.iter().map(Datum::from_json).collect()),
            Value::Object(map) => Datum::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Datum::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Float constructor that maps NaN and infinities to [`Datum::Null`].
    pub fn float(value: f64) -> Datum {
        if value.is_finite() {
            Datum::Float(value)
        } else {
            Datum::Null
        }
    }

    /// Canonical JSON form: tables become row-mappings, containers are
    /// serialized recursively and non-finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Int(i) => Value::Number((*i).into()),
            Datum::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Datum::Str(s) => Value::String(s.clone()),
            Datum::List(items) => Value::Array(items.iter().map(Datum::to_json).collect()),
            Datum::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            Datum::Table(table) => table.to_records(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int(i) => Some(*i),
            Datum::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int(i) => Some(*i as f64),
            Datum::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Datum]> {
        match self {
            Datum::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Datum>> {
        match self {
            Datum::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Datum::Table(table) => Some(table),
            _ => None,
        }
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Int(value)
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::float(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Str(value.to_string())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::Str(value)
    }
}

impl From<Table> for Datum {
    fn from(value: Table) -> Self {
        Datum::Table(value)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Datum::Null)
    }
}

/// Column-oriented tabular container with row-major cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Datum>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from a sequence of row-mappings.
    ///
    /// Columns appear in first-seen order; cells a row does not mention are null.
    pub fn from_records(records: &[Value]) -> Result<Self, String> {
        let mut columns: Vec<String> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let Some(object) = record.as_object() else {
                return Err(format!("row {} is not a mapping", i));
            };
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .filter_map(Value::as_object)
            .map(|object| {
                columns
                    .iter()
                    .map(|column| object.get(column).map(Datum::from_json).unwrap_or(Datum::Null))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Append a row; short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Datum>) {
        row.resize(self.columns.len(), Datum::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Datum> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    /// Columns from `required` that this table lacks, sorted.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        let mut missing: Vec<String> = required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect();
        missing.sort();
        missing
    }

    pub fn to_records(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|cells| {
                    Value::Object(
                        self.columns
                            .iter()
                            .zip(cells)
                            .map(|(column, cell)| (column.clone(), cell.to_json()))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

/// Integer reading of a JSON value; integral floats such as `18.0` qualify.
pub(crate) fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Identifier reading of a JSON value; numeric ids are rendered as text.
pub(crate) fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
