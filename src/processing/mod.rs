//! Pipeline operations over in-memory datasets.
//!
//! An [`Operation`] turns a [`DataSet`] (rows + schema) into a new one, or consumes it without
//! producing rows (terminal sinks). Operations are looked up by name in an [`OperationRegistry`]
//! and run in sequence by the [`Pipeline`].
//!
//! Built-in operations:
//!
//! - [`sort::Sort`] (`sort`): stable multi-column sort
//! - [`dupes::DupesCount`] (`dupesCount`), [`dupes::FindDuplicates`] (`findDuplicates`),
//!   [`dupes::MergeDupes`] (`mergeDupes`): grouping on index columns
//! - [`hash::FilesMd5`] (`filesMd5`): concurrent file hashing
//! - [`sink::Print`] (`print`), [`sink::ToFile`] (`toFile`): CSV output
//!
//! ## Example
//!
//! ```rust
//! use csv_recipe::args::ArgumentNode;
//! use csv_recipe::processing::{OperationInvocation, OperationRegistry, Pipeline};
//! use csv_recipe::types::{ColumnDef, DataSet, DataType, Schema};
//!
//! let schema = Schema::new(vec![ColumnDef::new("code", DataType::String)]);
//! let rows = ["AAA", "AAA", "BBB"]
//!     .iter()
//!     .map(|c| schema.build_row(&[*c]))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! let base = DataSet::new(schema, rows);
//!
//! let dupes = OperationInvocation::new("dupes", "dupesCount")
//!     .arg("indexCols", ArgumentNode::literals(["code"]))
//!     .arg("outCols", ArgumentNode::literals(["code"]))
//!     .arg("countCol", ArgumentNode::literal("n"))
//!     .arg("gt", ArgumentNode::literal("1"))
//!     .keep_state();
//!
//! let registry = OperationRegistry::with_builtins();
//! let states = Pipeline::new(&registry).run(&base, &[dupes]).unwrap();
//! let out = states.get("dupes").unwrap();
//! assert_eq!(out.row_count(), 1);
//! assert_eq!(out.rows[0].get("n").unwrap().as_int(), Some(2));
//! ```

pub mod dupes;
pub mod hash;
pub mod pipeline;
pub mod sink;
pub mod sort;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::args::{ArgShapes, ArgumentNode, ResolvedArgs, validate_args};
use crate::error::{RecipeError, RecipeResult};
use crate::observability::RecipeObserver;
use crate::types::DataSet;

pub use pipeline::{Pipeline, RetainedStates};

/// Ambient services available to an executing operation.
#[derive(Clone, Copy, Default)]
pub struct OperationContext<'a> {
    pub observer: Option<&'a dyn RecipeObserver>,
}

/// A named dataset transformation.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn arg_shapes(&self) -> &ArgShapes;

    /// Run on `input`. Terminal operations return `Ok(None)`.
    fn execute(
        &self,
        input: &DataSet,
        args: &ResolvedArgs,
        ctx: OperationContext<'_>,
    ) -> RecipeResult<Option<DataSet>>;
}

/// One pipeline step, as configured in a recipe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInvocation {
    /// Step name; also the name of the state it may retain.
    pub name: String,
    /// Registered operation to run.
    pub operation: String,
    /// Run on this retained state instead of the base dataset.
    #[serde(default)]
    pub from_state: Option<String>,
    /// Retain the output under `name`.
    #[serde(default)]
    pub keep_state: bool,
    #[serde(default)]
    pub args: BTreeMap<String, ArgumentNode>,
}

impl OperationInvocation {
    pub fn new(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: operation.into(),
            from_state: None,
            keep_state: false,
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, node: ArgumentNode) -> Self {
        self.args.insert(name.into(), node);
        self
    }

    pub fn from_state(mut self, state: impl Into<String>) -> Self {
        self.from_state = Some(state.into());
        self
    }

    pub fn keep_state(mut self) -> Self {
        self.keep_state = true;
        self
    }

    /// The source state, if one is named (blank names count as none).
    pub fn source_state(&self) -> Option<&str> {
        self.from_state.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Operation name -> operation. Built once, then only read.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in operations.
    pub fn with_builtins() -> Self {
        let builtins: [Arc<dyn Operation>; 7] = [
            Arc::new(sink::Print::default()),
            Arc::new(sink::ToFile::default()),
            Arc::new(sort::Sort::default()),
            Arc::new(dupes::DupesCount::default()),
            Arc::new(dupes::FindDuplicates::default()),
            Arc::new(dupes::MergeDupes::default()),
            Arc::new(hash::FilesMd5::default()),
        ];

        let mut registry = Self::new();
        for op in builtins {
            registry.operations.insert(op.name().to_owned(), op);
        }
        registry
    }

    /// Add an operation. Fails on a blank or already registered name.
    pub fn register(&mut self, operation: Arc<dyn Operation>) -> RecipeResult<()> {
        let name = operation.name().trim().to_owned();
        if name.is_empty() {
            return Err(RecipeError::config("operation's name cannot be empty"));
        }
        if self.operations.contains_key(&name) {
            return Err(RecipeError::config(format!("operation '{name}' already exists")));
        }
        self.operations.insert(name, operation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.operations.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn lookup(&self, invocation: &OperationInvocation) -> RecipeResult<&Arc<dyn Operation>> {
        self.get(&invocation.operation).ok_or_else(|| {
            RecipeError::config(format!(
                "operation '{}' does not exist for '{}'",
                invocation.operation, invocation.name
            ))
        })
    }

    /// Check that the operation exists and that the configured arguments match its contract.
    pub fn validate(&self, invocation: &OperationInvocation) -> RecipeResult<()> {
        let op = self.lookup(invocation)?;
        validate_args(
            &format!(
                "operation '{}' named '{}'",
                invocation.operation, invocation.name
            ),
            op.arg_shapes(),
            &invocation.args,
        )
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_once() {
        let mut registry = OperationRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                "dupesCount",
                "filesMd5",
                "findDuplicates",
                "mergeDupes",
                "print",
                "sort",
                "toFile"
            ]
        );

        let err = registry.register(Arc::new(sort::Sort::default())).unwrap_err();
        assert_eq!(err.to_string(), "invalid recipe: operation 'sort' already exists");
    }

    #[test]
    fn validate_rejects_unknown_operation_and_arguments() {
        let registry = OperationRegistry::with_builtins();

        let err = registry
            .validate(&OperationInvocation::new("x", "explode"))
            .unwrap_err();
        assert!(err.to_string().contains("operation 'explode' does not exist for 'x'"));

        let err = registry
            .validate(&OperationInvocation::new("s", "sort").arg("limit", ArgumentNode::literal("3")))
            .unwrap_err();
        assert!(err.to_string().contains("does not take argument 'limit'"));

        let err = registry
            .validate(&OperationInvocation::new("s", "sort").arg("cols", ArgumentNode::literal("a")))
            .unwrap_err();
        assert!(err.to_string().contains("type must be 'values'"));
    }

    #[test]
    fn blank_from_state_means_base() {
        let inv = OperationInvocation::new("a", "sort").from_state("  ");
        assert_eq!(inv.source_state(), None);
        assert_eq!(OperationInvocation::new("a", "sort").from_state("s").source_state(), Some("s"));
    }
}
