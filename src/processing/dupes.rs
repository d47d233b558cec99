//! Grouping operations.
//!
//! Rows are grouped on the concatenated string forms of the `indexCols` columns. Groups keep
//! their members in input order and are emitted in the order their first member appears.
//! Key concatenation is not delimited, so `("ab", "c")` and `("a", "bc")` share a group.

use std::collections::HashMap;

use crate::args::{ArgKind, ArgShape, ArgShapes, ResolvedArgs, arg_shapes};
use crate::error::{RecipeError, RecipeResult};
use crate::types::{ColumnDef, DataSet, DataType, Row, Value};

use super::{Operation, OperationContext};

fn group_rows<'a>(rows: &'a [Row], index_cols: &[String]) -> RecipeResult<Vec<Vec<&'a Row>>> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Row>> = Vec::new();

    for row in rows {
        let mut key = String::new();
        for col in index_cols {
            key.push_str(row.text_of(col)?);
        }

        match positions.get(&key) {
            Some(&i) => groups[i].push(row),
            None => {
                positions.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }

    Ok(groups)
}

/// `dupesCount`: one row per group larger than `gt`, with the group size in `countCol`.
pub struct DupesCount {
    shapes: ArgShapes,
}

impl Default for DupesCount {
    fn default() -> Self {
        Self {
            shapes: arg_shapes([
                ("indexCols", ArgShape::List(ArgKind::Text)),
                ("outCols", ArgShape::List(ArgKind::Text)),
                ("countCol", ArgShape::Scalar(ArgKind::Text)),
                ("gt", ArgShape::Scalar(ArgKind::Int)),
            ]),
        }
    }
}

impl Operation for DupesCount {
    fn name(&self) -> &str {
        "dupesCount"
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
        let index_cols = args.texts("indexCols")?;
        let out_cols = args.texts("outCols")?;
        let count_def = ColumnDef::computed(args.text("countCol")?, DataType::Int);
        let gt = args.int("gt")?;

        let schema = input.schema.select(&out_cols, Some(count_def.clone()))?;

        let mut rows = Vec::new();
        for group in group_rows(&input.rows, &index_cols)? {
            let size = group.len() as i64;
            if size <= gt {
                continue;
            }
            let mut row = group[0].project(&out_cols)?;
            row.insert(count_def.name.clone(), Value::new(&count_def, &size.to_string())?);
            rows.push(row);
        }

        Ok(Some(DataSet::new(schema, rows)))
    }
}

/// `findDuplicates`: one row per group of two or more, listing the `idCol` of every member but
/// the first in `dupeIdsCol`, joined with `sep`.
pub struct FindDuplicates {
    shapes: ArgShapes,
}

impl Default for FindDuplicates {
    fn default() -> Self {
        Self {
            shapes: arg_shapes([
                ("indexCols", ArgShape::List(ArgKind::Text)),
                ("outCols", ArgShape::List(ArgKind::Text)),
                ("idCol", ArgShape::Scalar(ArgKind::Text)),
                ("dupeIdsCol", ArgShape::Scalar(ArgKind::Text)),
                ("sep", ArgShape::Scalar(ArgKind::Text)),
            ]),
        }
    }
}

impl Operation for FindDuplicates {
    fn name(&self) -> &str {
        "findDuplicates"
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
        let index_cols = args.texts("indexCols")?;
        let out_cols = args.texts("outCols")?;
        let id_col = args.text("idCol")?;
        let ids_def = ColumnDef::computed(args.text("dupeIdsCol")?, DataType::String);
        let sep = args.text("sep")?;

        let schema = input.schema.select(&out_cols, Some(ids_def.clone()))?;

        let mut rows = Vec::new();
        for group in group_rows(&input.rows, &index_cols)? {
            if group.len() < 2 {
                continue;
            }
            let ids = group[1..]
                .iter()
                .map(|r| r.text_of(id_col))
                .collect::<RecipeResult<Vec<_>>>()?;

            let mut row = group[0].project(&out_cols)?;
            row.insert(ids_def.name.clone(), Value::new(&ids_def, &ids.join(sep))?);
            rows.push(row);
        }

        Ok(Some(DataSet::new(schema, rows)))
    }
}

/// `mergeDupes`: collapse every group into a single row.
///
/// With `mergeValues` off each output column comes from the first member. With it on, the first
/// non-empty value wins, falling back to the last member's value.
pub struct MergeDupes {
    shapes: ArgShapes,
}

impl Default for MergeDupes {
    fn default() -> Self {
        Self {
            shapes: arg_shapes([
                ("indexCols", ArgShape::List(ArgKind::Text)),
                ("outCols", ArgShape::List(ArgKind::Text)),
                ("mergeValues", ArgShape::Scalar(ArgKind::Bool)),
            ]),
        }
    }
}

impl Operation for MergeDupes {
    fn name(&self) -> &str {
        "mergeDupes"
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
        let index_cols = args.texts("indexCols")?;
        let out_cols = args.texts("outCols")?;
        let merge_values = args.boolean("mergeValues")?;

        let schema = input.schema.select(&out_cols, None)?;

        let mut rows = Vec::new();
        for group in group_rows(&input.rows, &index_cols)? {
            let (first, last) = (group[0], group[group.len() - 1]);
            let mut row = Row::default();
            for col in &out_cols {
                let source = if merge_values {
                    group
                        .iter()
                        .copied()
                        .find(|r| r.get(col).is_some_and(|v| !v.as_str().is_empty()))
                        .unwrap_or(last)
                } else {
                    first
                };
                let value = source.get(col).ok_or_else(|| RecipeError::ColumnNotFound {
                    column: col.clone(),
                })?;
                row.insert(col.clone(), value.clone());
            }
            rows.push(row);
        }

        Ok(Some(DataSet::new(schema, rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Schema;

    fn data(records: &[[&str; 3]]) -> DataSet {
        let schema = Schema::new(vec![
            ColumnDef::new("id", DataType::String),
            ColumnDef::new("code", DataType::String),
            ColumnDef::new("x", DataType::String),
        ]);
        let rows = records.iter().map(|r| schema.build_row(r).unwrap()).collect();
        DataSet::new(schema, rows)
    }

    fn codes() -> DataSet {
        data(&[["1", "AAA", ""], ["2", "AAA", "v"], ["3", "BBB", "w"], ["4", "AAA", "z"]])
    }

    fn run(op: &dyn Operation, input: &DataSet, args: ResolvedArgs) -> RecipeResult<DataSet> {
        Ok(op.execute(input, &args, OperationContext::default())?.unwrap())
    }

    #[test]
    fn dupes_count_above_threshold() {
        let input = data(&[["1", "AAA", ""], ["2", "AAA", ""], ["3", "BBB", ""]]);
        let args = ResolvedArgs::new()
            .with_list("indexCols", ["code"])
            .with_list("outCols", ["code"])
            .with("countCol", "count")
            .with("gt", "1");

        let out = run(&DupesCount::default(), &input, args).unwrap();
        assert_eq!(out.schema.column_names().collect::<Vec<_>>(), vec!["code", "count"]);
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0].get("code").unwrap().as_str(), "AAA");
        assert_eq!(out.rows[0].get("count").unwrap().as_int(), Some(2));
        assert!(!out.rows[0].contains("id"));
    }

    #[test]
    fn dupes_count_zero_threshold_keeps_every_group_in_first_seen_order() {
        let args = ResolvedArgs::new()
            .with_list("indexCols", ["code"])
            .with_list("outCols", ["code", "id"])
            .with("countCol", "n")
            .with("gt", "0");

        let out = run(&DupesCount::default(), &codes(), args).unwrap();
        assert_eq!(out.column_values("code"), vec![Some("AAA"), Some("BBB")]);
        assert_eq!(out.column_values("id"), vec![Some("1"), Some("3")]);
        assert_eq!(out.column_values("n"), vec![Some("3"), Some("1")]);
    }

    #[test]
    fn find_duplicates_lists_all_but_first() {
        let args = ResolvedArgs::new()
            .with_list("indexCols", ["code"])
            .with_list("outCols", ["id", "code"])
            .with("idCol", "id")
            .with("dupeIdsCol", "dupes")
            .with("sep", ";");

        let out = run(&FindDuplicates::default(), &codes(), args).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0].get("id").unwrap().as_str(), "1");
        assert_eq!(out.rows[0].get("dupes").unwrap().as_str(), "2;4");
    }

    #[test]
    fn merge_dupes_prefers_non_empty_values() {
        let input = data(&[["1", "K", ""], ["2", "K", "v"]]);
        let base = ResolvedArgs::new()
            .with_list("indexCols", ["code"])
            .with_list("outCols", ["code", "x"]);

        let merged = run(&MergeDupes::default(), &input, base.clone().with("mergeValues", "true")).unwrap();
        assert_eq!(merged.column_values("x"), vec![Some("v")]);

        let first = run(&MergeDupes::default(), &input, base.with("mergeValues", "false")).unwrap();
        assert_eq!(first.column_values("x"), vec![Some("")]);
    }

    #[test]
    fn merge_dupes_falls_back_to_last_member() {
        let input = data(&[["1", "K", ""], ["2", "K", ""], ["3", "L", "only"]]);
        let args = ResolvedArgs::new()
            .with_list("indexCols", ["code"])
            .with_list("outCols", ["id", "x"])
            .with("mergeValues", "yes");

        let out = run(&MergeDupes::default(), &input, args).unwrap();
        // "1" is non-empty so the first member wins for `id`; `x` is empty throughout.
        assert_eq!(out.column_values("id"), vec![Some("1"), Some("3")]);
        assert_eq!(out.column_values("x"), vec![Some(""), Some("only")]);
    }

    #[test]
    fn unknown_index_column_is_reported() {
        let args = ResolvedArgs::new()
            .with_list("indexCols", ["nope"])
            .with_list("outCols", ["code"])
            .with("mergeValues", "no");
        let err = run(&MergeDupes::default(), &codes(), args).unwrap_err();
        assert!(matches!(err, RecipeError::ColumnNotFound { ref column } if column == "nope"));
    }

    #[test]
    fn group_keys_are_concatenated() {
        let input = data(&[["ab", "c", ""], ["a", "bc", ""]]);
        let groups = group_rows(&input.rows, &["id".to_owned(), "code".to_owned()]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }
}
