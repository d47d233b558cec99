use std::cmp::Ordering;

use crate::args::{ArgKind, ArgShape, ArgShapes, ResolvedArgs, arg_shapes};
use crate::error::{RecipeError, RecipeResult};
use crate::types::{DataSet, DataType, Row};

use super::{Operation, OperationContext};

/// `sort`: stable multi-column sort.
///
/// Arguments: `cols` (list of column names) and `order` (one `asc`/`desc` per column; anything
/// else sorts ascending). Numeric columns compare by their float projection, every other column
/// by its string form.
pub struct Sort {
    shapes: ArgShapes,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            shapes: arg_shapes([
                ("cols", ArgShape::List(ArgKind::Text)),
                ("order", ArgShape::List(ArgKind::Text)),
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

struct SortKey {
    column: String,
    numeric: bool,
    direction: Direction,
}

impl SortKey {
    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let (va, vb) = (a.get(&self.column), b.get(&self.column));
        let ord = if self.numeric {
            let fa = va.and_then(|v| v.as_float()).unwrap_or_default();
            let fb = vb.and_then(|v| v.as_float()).unwrap_or_default();
            // -0.0 and 0.0 are equal keys.
            if fa == fb {
                Ordering::Equal
            } else {
                fa.total_cmp(&fb)
            }
        } else {
            let sa = va.map(|v| v.as_str()).unwrap_or_default();
            let sb = vb.map(|v| v.as_str()).unwrap_or_default();
            sa.cmp(sb)
        };

        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

impl Operation for Sort {
    fn name(&self) -> &str {
        "sort"
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
        let order = args.texts("order")?;
        if cols.len() != order.len() {
            return Err(RecipeError::invalid_argument(
                "order",
                format!("expected {} directions, got {}", cols.len(), order.len()),
            ));
        }

        let keys = cols
            .into_iter()
            .zip(&order)
            .map(|(column, dir)| {
                let def = input.schema.column(&column)?;
                Ok(SortKey {
                    numeric: matches!(def.data_type, DataType::Int | DataType::Float),
                    direction: Direction::parse(dir),
                    column,
                })
            })
            .collect::<RecipeResult<Vec<_>>>()?;

        let mut rows = input.rows.clone();
        // `sort_by` is stable: ties keep their input order.
        rows.sort_by(|a, b| {
            keys.iter()
                .map(|k| k.compare(a, b))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        Ok(Some(DataSet::new(input.schema.clone(), rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, Schema};

    fn data() -> DataSet {
        let schema = Schema::new(vec![
            ColumnDef::new("id", DataType::String),
            ColumnDef::new("group", DataType::String),
            ColumnDef::new("size", DataType::Int),
        ]);
        let rows = [
            ["r1", "b", "10"],
            ["r2", "a", "9"],
            ["r3", "b", "2"],
            ["r4", "a", "9"],
            ["r5", "b", "10"],
        ]
        .iter()
        .map(|r| schema.build_row(r).unwrap())
        .collect();
        DataSet::new(schema, rows)
    }

    fn sort(data: &DataSet, cols: &[&str], order: &[&str]) -> RecipeResult<Vec<String>> {
        let args = ResolvedArgs::new()
            .with_list("cols", cols.iter().copied())
            .with_list("order", order.iter().copied());
        let out = Sort::default()
            .execute(data, &args, OperationContext::default())?
            .unwrap();
        Ok(out
            .column_values("id")
            .into_iter()
            .map(|v| v.unwrap().to_owned())
            .collect())
    }

    #[test]
    fn numeric_columns_compare_as_numbers() {
        // Lexicographically "10" < "2"; numerically it is not.
        let ids = sort(&data(), &["size"], &["asc"]).unwrap();
        assert_eq!(ids, vec!["r3", "r2", "r4", "r1", "r5"]);
    }

    #[test]
    fn mixed_directions_and_stability() {
        let ids = sort(&data(), &["group", "size"], &["asc", "desc"]).unwrap();
        // r2/r4 and r1/r5 tie on both keys and keep their input order.
        assert_eq!(ids, vec!["r2", "r4", "r1", "r5", "r3"]);
    }

    #[test]
    fn signed_zeros_are_equal_keys() {
        let schema = Schema::new(vec![
            ColumnDef::new("id", DataType::String),
            ColumnDef::new("delta", DataType::Float),
        ]);
        let rows = [["z1", "0"], ["z2", "-0.0"], ["z3", "-1.5"], ["z4", "0.0"]]
            .iter()
            .map(|r| schema.build_row(r).unwrap())
            .collect();
        let data = DataSet::new(schema, rows);

        let ids = sort(&data, &["delta"], &["asc"]).unwrap();
        assert_eq!(ids, vec!["z3", "z1", "z2", "z4"]);
    }

    #[test]
    fn unknown_direction_is_ascending() {
        let ids = sort(&data(), &["group"], &["sideways"]).unwrap();
        assert_eq!(ids, vec!["r2", "r4", "r1", "r3", "r5"]);
    }

    #[test]
    fn input_is_left_untouched() {
        let data = data();
        sort(&data, &["size"], &["desc"]).unwrap();
        assert_eq!(data.column_values("id")[0], Some("r1"));
    }

    #[test]
    fn bad_arguments() {
        let err = sort(&data(), &["size", "id"], &["asc"]).unwrap_err();
        assert!(matches!(err, RecipeError::InvalidArgument { ref name, .. } if name == "order"));

        let err = sort(&data(), &["weight"], &["asc"]).unwrap_err();
        assert_eq!(err.to_string(), "column 'weight' not found");
    }
}
