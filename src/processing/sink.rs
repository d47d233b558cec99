use std::fs::File;
use std::io::{self, Write};

use crate::args::{ArgKind, ArgShape, ArgShapes, ResolvedArgs, arg_shapes};
use crate::error::RecipeResult;
use crate::types::{DataSet, Row};

use super::{Operation, OperationContext};

const FLUSH_EVERY: usize = 100;

/// Write `cols` as a header record, then one record per row.
///
/// The writer is flushed every 100 rows and once at the end.
pub fn write_rows<W: Write>(writer: W, rows: &[Row], cols: &[String]) -> RecipeResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(cols)?;

    for (i, row) in rows.iter().enumerate() {
        let record = cols
            .iter()
            .map(|c| row.text_of(c))
            .collect::<RecipeResult<Vec<_>>>()?;
        wtr.write_record(record)?;

        if (i + 1) % FLUSH_EVERY == 0 {
            wtr.flush()?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// `print`: write the `cols` columns to stdout as CSV.
pub struct Print {
    shapes: ArgShapes,
}

impl Default for Print {
    fn default() -> Self {
        Self {
            shapes: arg_shapes([("cols", ArgShape::List(ArgKind::Text))]),
        }
    }
}

impl Operation for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn arg_shapes(&self) -> &ArgShapes {
        &self.shapes
    }

    fn execute(
        &self,
        input: &DataSet,
        args: &ResolvedArgs,
        _ctx: OperationContext<'_>,
    ) -> RecipeResult<Option<DataSet>> {
        let cols = args.texts("cols")?;
        write_rows(io::stdout().lock(), &input.rows, &cols)?;
        Ok(None)
    }
}

/// `toFile`: write the `cols` columns to `filename` as CSV, replacing any existing file.
pub struct ToFile {
    shapes: ArgShapes,
}

impl Default for ToFile {
    fn default() -> Self {
        Self {
            shapes: arg_shapes([
                ("filename", ArgShape::Scalar(ArgKind::Text)),
                ("cols", ArgShape::List(ArgKind::Text)),
            ]),
        }
    }
}

impl Operation for ToFile {
    fn name(&self) -> &str {
        "toFile"
    }

    fn arg_shapes(&self) -> &ArgShapes {
        &self.shapes
    }

    fn execute(
        &self,
        input: &DataSet,
        args: &ResolvedArgs,
        _ctx: OperationContext<'_>,
    ) -> RecipeResult<Option<DataSet>> {
        let cols = args.texts("cols")?;
        let file = File::create(args.text("filename")?)?;
        write_rows(file, &input.rows, &cols)?;
        Ok(None)
    }
}
