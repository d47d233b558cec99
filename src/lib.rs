//! `csv-recipe` runs declarative recipes over CSV files.
//!
//! A [`recipe::Recipe`] declares the typed columns to read, the chain of value parsers each column
//! goes through, and an ordered pipeline of operations (sorting, duplicate detection, merging,
//! file hashing, CSV output) over the resulting rows.
//!
//! The primary entrypoint is [`recipe::Engine::run`]: it validates the whole recipe, reads the
//! input into an in-memory [`types::DataSet`] and runs the pipeline.
//!
//! ## Columns and values
//!
//! Each column has a [`types::DataType`]:
//!
//! - `string`: text, no projections
//! - `int`: base-10 integer; also exposes a float and a bool (`true` when `<= 0`)
//! - `float`: decimal; also exposes a truncated int and the same bool rule
//! - `bool`: boolean tokens (`1`/`yes`/`true`, `0`/`no`/`false`/`n/a`)
//!
//! Cells are trimmed. Empty cells take the column's `default`, then `"0"` for non-string types;
//! an empty `notEmpty` string column without a default is an error. `dynamic` columns are not
//! read from the input but computed by their parser chain.
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use csv_recipe::observability::StdErrObserver;
//! use csv_recipe::recipe::{Engine, EngineOptions, Recipe};
//!
//! # fn main() -> Result<(), csv_recipe::RecipeError> {
//! let recipe = Recipe::from_json_path("recipe.json")?;
//! let options = EngineOptions {
//!     observer: Some(Arc::new(StdErrObserver)),
//!     ..Default::default()
//! };
//!
//! let engine = Engine::for_recipe(&recipe, options)?;
//! let base = engine.run(&recipe, "input.csv")?;
//! println!("rows={}", base.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline semantics
//!
//! Every operation reads the base dataset unless it names a `fromState`. Outputs never chain
//! implicitly: a step only sees another step's output through a state kept with `keepState`.
//! The first step's name is an alias of the base dataset.
//!
//! ## Modules
//!
//! - [`recipe`]: configuration model and the [`recipe::Engine`]
//! - [`types`]: schema, typed values, rows and datasets
//! - [`args`]: argument trees and their resolution
//! - [`parsers`]: value parsers (built-in and external command) and their registry
//! - [`ingestion`]: CSV reading and row building
//! - [`processing`]: operations, their registry and the pipeline executor
//! - [`execution`]: bounded parallel file hashing
//! - [`observability`]: run events, observers and failure severity
//! - [`error`]: error types

pub mod args;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod observability;
pub mod parsers;
pub mod processing;
pub mod recipe;
pub mod types;

pub use error::{RecipeError, RecipeResult};
