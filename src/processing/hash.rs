use crate::args::{ArgKind, ArgShape, ArgShapes, ResolvedArgs, arg_shapes};
use crate::error::{RecipeError, RecipeResult};
use crate::execution::hash_into_rows;
use crate::observability::RecipeEvent;
use crate::types::{ColumnDef, DataSet, DataType};

use super::{Operation, OperationContext};

/// `filesMd5`: hash the file named by `filenameCol` into `md5Col`, for every row.
///
/// Output rows hold `outCols` plus the hash column. At most `threads` files are read at once;
/// a missing or unreadable file yields an empty hash.
pub struct FilesMd5 {
    shapes: ArgShapes,
}

impl Default for FilesMd5 {
    fn default() -> Self {
        Self {
            shapes: arg_shapes([
                ("filenameCol", ArgShape::Scalar(ArgKind::Text)),
                ("md5Col", ArgShape::Scalar(ArgKind::Text)),
                ("outCols", ArgShape::List(ArgKind::Text)),
                ("threads", ArgShape::Scalar(ArgKind::Int)),
            ]),
        }
    }
}

impl Operation for FilesMd5 {
    fn name(&self) -> &str {
        "filesMd5"
    }

    fn arg_shapes(&self) -> &ArgShapes {
        &self.shapes
    }

    fn execute(
        &self,
        input: &DataSet,
        args: &ResolvedArgs,
        ctx: OperationContext<'_>,
    ) -> RecipeResult<Option<DataSet>> {
        let filename_col = args.text("filenameCol")?;
        let md5_def = ColumnDef::computed(args.text("md5Col")?, DataType::String);
        let out_cols = args.texts("outCols")?;
        let threads = args.int("threads")?;
        if threads < 1 {
            return Err(RecipeError::invalid_argument(
                "threads",
                format!("must be at least 1, got {threads}"),
            ));
        }

        input.schema.column(filename_col)?;
        let schema = input.schema.select(&out_cols, Some(md5_def.clone()))?;

        let filenames = input
            .rows
            .iter()
            .map(|r| r.text_of(filename_col).map(str::to_owned))
            .collect::<RecipeResult<Vec<_>>>()?;
        let mut rows = input
            .rows
            .iter()
            .map(|r| r.project(&out_cols))
            .collect::<RecipeResult<Vec<_>>>()?;

        let metrics = hash_into_rows(
            &mut rows,
            &filenames,
            &md5_def.name,
            usize::try_from(threads).unwrap_or(usize::MAX),
            ctx.observer,
        )?;
        if let Some(obs) = ctx.observer {
            obs.on_event(&RecipeEvent::FilesHashed { metrics });
        }

        Ok(Some(DataSet::new(schema, rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::file_md5;
    use crate::types::Schema;

    fn data(paths: &[String]) -> DataSet {
        let schema = Schema::new(vec![
            ColumnDef::new("id", DataType::Int),
            ColumnDef::new("path", DataType::String),
        ]);
        let rows = paths
            .iter()
            .enumerate()
            .map(|(i, p)| schema.build_row(&[i.to_string(), p.clone()]).unwrap())
            .collect();
        DataSet::new(schema, rows)
    }

    fn args(threads: &str) -> ResolvedArgs {
        ResolvedArgs::new()
            .with("filenameCol", "path")
            .with("md5Col", "md5")
            .with_list("outCols", ["id"])
            .with("threads", threads)
    }

    #[test]
    fn hashes_in_row_order_and_projects_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..5 {
            let p = dir.path().join(format!("{i}.bin"));
            std::fs::write(&p, format!("content {i}")).unwrap();
            paths.push(p.to_string_lossy().into_owned());
        }
        paths.push(dir.path().join("absent").to_string_lossy().into_owned());

        let input = data(&paths);
        let out = FilesMd5::default()
            .execute(&input, &args("2"), OperationContext::default())
            .unwrap()
            .unwrap();

        assert_eq!(out.schema.column_names().collect::<Vec<_>>(), vec!["id", "md5"]);
        for (i, row) in out.rows.iter().enumerate() {
            assert_eq!(row.len(), 2);
            assert_eq!(row.get("id").unwrap().as_int(), Some(i as i64));
            let expected = file_md5(&paths[i]).unwrap_or_default();
            assert_eq!(row.get("md5").unwrap().as_str(), expected);
        }
        assert_eq!(out.rows[5].get("md5").unwrap().as_str(), "");
        assert!(!input.rows[0].contains("md5"));
    }

    #[test]
    fn rejects_non_positive_thread_counts() {
        let input = data(&["x".to_owned()]);
        for bad in ["0", "-2"] {
            let err = FilesMd5::default()
                .execute(&input, &args(bad), OperationContext::default())
                .unwrap_err();
            assert!(matches!(err, RecipeError::InvalidArgument { ref name, .. } if name == "threads"));
        }
    }

    #[test]
    fn unknown_filename_column() {
        let input = data(&["x".to_owned()]);
        let args = args("1").with("filenameCol", "file");
        let err = FilesMd5::default()
            .execute(&input, &args, OperationContext::default())
            .unwrap_err();
        assert!(matches!(err, RecipeError::ColumnNotFound { ref column } if column == "file"));
    }
}
