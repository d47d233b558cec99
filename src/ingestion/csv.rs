//! CSV reading and row building.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::StringRecord;

use crate::error::{RecipeError, RecipeResult};
use crate::parsers::ParserRegistry;
use crate::types::{ColumnDef, DataSet, Header, Row, Schema, Value};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a CSV file into an in-memory [`DataSet`], running every column's parser chain.
///
/// Rules:
///
/// - A leading UTF-8 byte-order mark is skipped.
/// - The first record is the header; input columns the schema does not declare are dropped.
/// - Declared columns missing from the input are simply absent from the rows.
/// - Dynamic columns are computed after the input columns, in declaration order.
pub fn read_csv_from_path(
    path: impl AsRef<Path>,
    schema: &Schema,
    parsers: &ParserRegistry,
) -> RecipeResult<DataSet> {
    read_csv_from_reader(File::open(path)?, schema, parsers)
}

/// Read CSV data from any reader. See [`read_csv_from_path`].
pub fn read_csv_from_reader<R: Read>(
    reader: R,
    schema: &Schema,
    parsers: &ParserRegistry,
) -> RecipeResult<DataSet> {
    let mut reader = BufReader::new(reader);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let header = build_header(schema, &headers, parsers)?;

    let mut rows = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // 1-based record number; the header is record 1.
        let row_number = row_idx0 + 2;
        let record = result?;
        rows.push(build_row(schema, &header, &record, row_number, parsers)?);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

/// Check every parser invocation of every column against the registry.
pub fn validate_parsers(schema: &Schema, parsers: &ParserRegistry) -> RecipeResult<()> {
    for def in &schema.columns {
        for invocation in &def.parsers {
            parsers.validate(invocation).map_err(|e| match e {
                RecipeError::Config { message } => {
                    RecipeError::config(format!("column '{}': {message}", def.name))
                }
                other => other,
            })?;
        }
    }
    Ok(())
}

/// Map the header record onto the schema and validate every configured parser invocation.
pub fn build_header<'s>(
    schema: &'s Schema,
    headers: &StringRecord,
    parsers: &ParserRegistry,
) -> RecipeResult<Header<'s>> {
    validate_parsers(schema, parsers)?;
    Ok(Header::new(schema, headers.iter()))
}

/// Build one typed row from a record.
///
/// Input cells are coerced first; then each input column's parser chain runs (in input order),
/// followed by the dynamic columns.
pub fn build_row(
    schema: &Schema,
    header: &Header<'_>,
    record: &StringRecord,
    row_number: usize,
    parsers: &ParserRegistry,
) -> RecipeResult<Row> {
    let mut row = Row::default();
    for (pos, def) in header.iter() {
        let raw = record.get(pos).unwrap_or("");
        let value = Value::new(def, raw).map_err(|e| RecipeError::CellValue {
            row: row_number,
            column: def.name.clone(),
            source: Box::new(e),
        })?;
        row.insert(def.name.clone(), value);
    }

    for (_, def) in header.iter() {
        if let Some(cell) = row.get(&def.name).cloned() {
            run_chain(def, cell, &mut row, row_number, parsers)?;
        }
    }

    for def in schema.columns.iter().filter(|d| d.dynamic) {
        let seed = Value::seed(def).map_err(|e| RecipeError::CellValue {
            row: row_number,
            column: def.name.clone(),
            source: Box::new(e),
        })?;
        run_chain(def, seed.clone(), &mut row, row_number, parsers)?;
        if !row.contains(&def.name) {
            row.insert(def.name.clone(), seed);
        }
    }

    Ok(row)
}

/// Run `def`'s parsers on `cell`, storing each intermediate value back into the row.
fn run_chain(
    def: &ColumnDef,
    mut cell: Value,
    row: &mut Row,
    row_number: usize,
    parsers: &ParserRegistry,
) -> RecipeResult<()> {
    for invocation in &def.parsers {
        let wrap = |e: RecipeError| RecipeError::Cell {
            row: row_number,
            column: def.name.clone(),
            parser: invocation.name.clone(),
            source: Box::new(e),
        };

        let output = parsers.run(invocation, cell.as_str(), row).map_err(wrap)?;
        cell = Value::new(def, &output).map_err(wrap)?;
        row.insert(def.name.clone(), cell.clone());
    }
    Ok(())
}
