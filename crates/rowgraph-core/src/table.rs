//! Row sources: columnar tables and rectangular arrays.
//!
//! Both kinds convert to plain `Row`s without losing column order, which is
//! the only thing the batch executor needs from them.

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

use serde::Serialize;

use crate::error::TableError;
use crate::types::Value;

/// One row of values, positionally aligned to a declared attribute list.
pub type Row = Vec<Value>;

/// Anything rectangular that can be sliced into plain rows.
pub trait RowSource {
    /// Number of columns.
    fn width(&self) -> usize;

    /// Number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names, when the source carries them.
    fn column_names(&self) -> Option<&[String]>;

    /// Materialize the rows in `range`, in source order.
    ///
    /// Panics if `range` is out of bounds, like slice indexing.
    fn rows(&self, range: Range<usize>) -> Vec<Row>;
}

// ── Table ─────────────────────────────────────────────────────────

/// A columnar table with named, ordered columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    len: usize,
}

impl Table {
    /// Build a table from `(name, values)` columns of equal length.
    pub fn new<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut data = Vec::new();
        let mut seen = HashSet::new();
        let mut len = None;

        for (name, values) in columns {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(TableError::DuplicateColumn(name));
            }
            match len {
                None => len = Some(values.len()),
                Some(expected) if expected != values.len() => {
                    return Err(TableError::ColumnLength {
                        column: name,
                        expected,
                        found: values.len(),
                    });
                }
                Some(_) => {}
            }
            names.push(name);
            data.push(values);
        }

        Ok(Self {
            columns: names,
            data,
            len: len.unwrap_or(0),
        })
    }

    /// Build a table from row-major data.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Row>,
    ) -> Result<Self, TableError> {
        let names: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut data: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let mut len = 0;

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(TableError::RaggedRow {
                    row: i,
                    expected: names.len(),
                    found: row.len(),
                });
            }
            for (column, value) in data.iter_mut().zip(row) {
                column.push(value);
            }
            len += 1;
        }

        let mut table = Self::new(names.into_iter().zip(data))?;
        table.len = len;
        Ok(table)
    }

    /// Build a table from keyed records.
    ///
    /// Columns are the union of all record keys in first-seen order; keys a
    /// record lacks are filled with `Value::Null`.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a BTreeMap<String, Value>>,
    {
        let records: Vec<_> = records.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for record in &records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }

        let data = columns
            .iter()
            .map(|c| {
                records
                    .iter()
                    .map(|r| r.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            columns,
            data,
            len: records.len(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Values of a single column.
    pub fn column(&self, name: &str) -> Result<&[Value], TableError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data[i].as_slice())
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Values of a single row, in column order.
    pub fn row(&self, index: usize) -> Option<Row> {
        (index < self.len).then(|| self.data.iter().map(|c| c[index].clone()).collect())
    }

    /// Drop the column names, keeping positional data.
    pub fn into_array(self) -> Array {
        let width = self.columns.len();
        let mut values = Vec::with_capacity(width * self.len);
        for i in 0..self.len {
            values.extend(self.data.iter().map(|c| c[i].clone()));
        }
        Array { values, width }
    }
}

impl RowSource for Table {
    fn width(&self) -> usize {
        self.columns.len()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn column_names(&self) -> Option<&[String]> {
        Some(&self.columns)
    }

    fn rows(&self, range: Range<usize>) -> Vec<Row> {
        assert!(range.end <= self.len, "row range out of bounds");
        range
            .map(|i| self.data.iter().map(|c| c[i].clone()).collect())
            .collect()
    }
}

// ── Array ─────────────────────────────────────────────────────────

/// A rectangular, row-major array with positional columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Array {
    values: Vec<Value>,
    width: usize,
}

impl Array {
    /// Build an array from rows that must all have the same length.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Result<Self, TableError> {
        let mut values = Vec::new();
        let mut width = None;
        for (i, row) in rows.into_iter().enumerate() {
            let expected = *width.get_or_insert(row.len());
            if row.len() != expected {
                return Err(TableError::RaggedRow {
                    row: i,
                    expected,
                    found: row.len(),
                });
            }
            values.extend(row);
        }
        Ok(Self {
            values,
            width: width.unwrap_or(0),
        })
    }

    /// Build an array from flat row-major data.
    pub fn from_flat<T: Into<Value>>(data: Vec<T>, width: usize) -> Result<Self, TableError> {
        if (width == 0 && !data.is_empty()) || (width != 0 && data.len() % width != 0) {
            return Err(TableError::Shape {
                len: data.len(),
                width,
            });
        }
        Ok(Self {
            values: data.into_iter().map(Into::into).collect(),
            width,
        })
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (RowSource::len(self), self.width)
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        let start = index.checked_mul(self.width)?;
        self.values.get(start..start + self.width)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl RowSource for Array {
    fn width(&self) -> usize {
        self.width
    }

    fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    fn column_names(&self) -> Option<&[String]> {
        None
    }

    fn rows(&self, range: Range<usize>) -> Vec<Row> {
        if self.width == 0 {
            return vec![Vec::new(); range.len()];
        }
        self.values[range.start * self.width..range.end * self.width]
            .chunks(self.width)
            .map(<[Value]>::to_vec)
            .collect()
    }
}
