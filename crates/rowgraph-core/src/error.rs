use thiserror::Error;

/// Shape errors raised while building or slicing row sources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Column {column} has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Array data of length {len} is not divisible into rows of width {width}")]
    Shape { len: usize, width: usize },
}
