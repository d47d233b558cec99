//! Recipe configuration and the engine that runs it.
//!
//! A [`Recipe`] is plain data: the column definitions, optional external parsers and the ordered
//! operation list. It deserializes from JSON (camelCase keys) or any other serde format.
//!
//! An [`Engine`] owns the parser and operation registries. They are filled once when the engine
//! is built and only read afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::error::RecipeResult;
use crate::ingestion::{read_csv_from_path, read_csv_from_reader, validate_parsers};
use crate::observability::{RecipeEvent, RecipeObserver, RecipeSeverity};
use crate::parsers::{CommandParser, ParserRegistry};
use crate::processing::{OperationInvocation, OperationRegistry, Pipeline};
use crate::types::{ColumnDef, DataSet, Schema};

/// An external program registered as a parser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParserConf {
    /// Name the parser is registered under.
    pub name: String,
    /// Program to run.
    pub command: PathBuf,
    /// Extra command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Declared arguments: name -> `string` | `array` | `object` | `bool`.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// A complete recipe.
///
/// ```rust
/// use csv_recipe::recipe::Recipe;
///
/// let recipe = Recipe::from_json_str(r#"{
///     "cols": [
///         {"name": "code", "type": "string", "notEmpty": true},
///         {"name": "tag", "type": "string", "dynamic": true,
///          "parsers": [{"name": "uppercase", "args": {"value": {"col": "code"}}}]}
///     ],
///     "operations": [
///         {"name": "sorted", "operation": "sort", "keepState": true,
///          "args": {"cols": {"values": ["code"]}, "order": {"values": ["asc"]}}}
///     ]
/// }"#).unwrap();
///
/// assert_eq!(recipe.cols.len(), 2);
/// assert!(recipe.operations[0].keep_state);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub script_parsers: Vec<ScriptParserConf>,
    pub cols: Vec<ColumnDef>,
    #[serde(default)]
    pub operations: Vec<OperationInvocation>,
}

impl Recipe {
    pub fn from_json_str(json: &str) -> RecipeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> RecipeResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// The declared columns as a [`Schema`]. Fails on duplicate column names.
    pub fn schema(&self) -> RecipeResult<Schema> {
        let schema = Schema::new(self.cols.clone());
        schema.ensure_unique_names()?;
        Ok(schema)
    }
}

/// Options controlling a recipe run.
#[derive(Clone)]
pub struct EngineOptions {
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn RecipeObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: RecipeSeverity,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            observer: None,
            alert_at_or_above: RecipeSeverity::Critical,
        }
    }
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

/// Runs recipes against CSV input.
#[derive(Debug)]
pub struct Engine {
    parsers: ParserRegistry,
    operations: OperationRegistry,
    options: EngineOptions,
}

impl Engine {
    /// An engine over explicit registries.
    pub fn new(parsers: ParserRegistry, operations: OperationRegistry, options: EngineOptions) -> Self {
        Self {
            parsers,
            operations,
            options,
        }
    }

    /// The built-in parsers and operations plus the recipe's script parsers.
    pub fn for_recipe(recipe: &Recipe, options: EngineOptions) -> RecipeResult<Self> {
        let mut parsers = ParserRegistry::with_builtins();
        for conf in &recipe.script_parsers {
            let parser = CommandParser::new(conf.name.clone(), &conf.command, &conf.params)?
                .with_args(conf.args.clone());
            parsers.register(Arc::new(parser))?;
        }
        Ok(Self::new(parsers, OperationRegistry::with_builtins(), options))
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    /// Read `csv_path`, build every row and run the pipeline. Returns the base dataset.
    ///
    /// The whole configuration (parser invocations, operations and their arguments) is validated
    /// before the first row is built. The first error stops the run.
    ///
    /// When an observer is configured, this reports:
    ///
    /// - progress events while running, ending with [`RecipeEvent::RunFinished`]
    /// - `on_failure` on failure, with a computed severity
    /// - `on_alert` on failure when the severity is >= `alert_at_or_above`
    pub fn run(&self, recipe: &Recipe, csv_path: impl AsRef<Path>) -> RecipeResult<DataSet> {
        let path = csv_path.as_ref();
        self.observe(|schema| read_csv_from_path(path, schema, &self.parsers), recipe)
    }

    /// Like [`Engine::run`], reading CSV data from `reader`.
    pub fn run_reader<R: Read>(&self, recipe: &Recipe, reader: R) -> RecipeResult<DataSet> {
        self.observe(|schema| read_csv_from_reader(reader, schema, &self.parsers), recipe)
    }

    fn observe<F>(&self, read: F, recipe: &Recipe) -> RecipeResult<DataSet>
    where
        F: FnOnce(&Schema) -> RecipeResult<DataSet>,
    {
        let started = Instant::now();
        let result = self.execute(read, recipe);

        if let Some(obs) = self.options.observer.as_ref() {
            match &result {
                Ok(_) => obs.on_event(&RecipeEvent::RunFinished {
                    elapsed: started.elapsed(),
                }),
                Err(e) => {
                    let sev = RecipeSeverity::of(e);
                    obs.on_failure(sev, e);
                    if sev >= self.options.alert_at_or_above {
                        obs.on_alert(sev, e);
                    }
                }
            }
        }

        result
    }

    fn execute<F>(&self, read: F, recipe: &Recipe) -> RecipeResult<DataSet>
    where
        F: FnOnce(&Schema) -> RecipeResult<DataSet>,
    {
        let schema = recipe.schema()?;
        validate_parsers(&schema, &self.parsers)?;

        let mut pipeline = Pipeline::new(&self.operations);
        if let Some(obs) = self.options.observer.as_deref() {
            pipeline = pipeline.with_observer(obs);
        }
        pipeline.validate(&recipe.operations)?;

        let started = Instant::now();
        let base = read(&schema)?;
        self.emit(RecipeEvent::RowsBuilt {
            rows: base.row_count(),
            elapsed: started.elapsed(),
        });

        pipeline.run(&base, &recipe.operations)?;
        Ok(base)
    }

    fn emit(&self, event: RecipeEvent) {
        if let Some(obs) = self.options.observer.as_ref() {
            obs.on_event(&event);
        }
    }
}
