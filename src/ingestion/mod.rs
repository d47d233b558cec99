//! Input side of a recipe run: CSV records to typed rows.
//!
//! [`csv::read_csv_from_path`] reads the whole input into an in-memory
//! [`crate::types::DataSet`]. Along the way it validates every parser invocation of the schema
//! (before the first row), coerces every cell, and runs the parser chains.

pub mod csv;

pub use self::csv::{
    build_header, build_row, read_csv_from_path, read_csv_from_reader, validate_parsers,
};
