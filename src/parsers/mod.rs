//! Value parsers and their registry.
//!
//! A [`Parser`] turns resolved arguments into a single output string. Each column of a recipe
//! carries a chain of [`ParserInvocation`]s; the row builder runs them in order and feeds every
//! output back through the column's type coercion.
//!
//! Parsers come from two places, registered through the same [`ParserRegistry`]:
//!
//! - [`builtin`]: `uppercase`, `lowercase`, `concat`, `ext`, `fileExists`, `fileMd5`, `contains`
//! - [`command`]: parsers backed by an external program

pub mod builtin;
pub mod command;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::args::{ArgShapes, ArgumentNode, ResolvedArgs, Scope, resolve, validate_args};
use crate::error::{RecipeError, RecipeResult};
use crate::types::Row;

pub use builtin::builtin_parsers;
pub use command::CommandParser;

/// A named, pure function from resolved arguments to an output string.
pub trait Parser: Send + Sync {
    fn name(&self) -> &str;

    /// Declared arguments. Every declared argument is resolved before [`Parser::parse`] runs.
    fn arg_shapes(&self) -> &ArgShapes;

    fn parse(&self, args: &ResolvedArgs) -> RecipeResult<String>;
}

/// A parser applied to a column, as configured in a recipe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParserInvocation {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, ArgumentNode>,
}

impl ParserInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, node: ArgumentNode) -> Self {
        self.args.insert(name.into(), node);
        self
    }
}

/// Parser name -> parser. Built once, then only read.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn Parser>>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in parsers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for parser in builtin_parsers() {
            // Built-in names are distinct and non-blank.
            let name = parser.name().to_owned();
            registry.parsers.insert(name, parser);
        }
        registry
    }

    /// Add a parser. Fails on a blank or already registered name.
    pub fn register(&mut self, parser: Arc<dyn Parser>) -> RecipeResult<()> {
        let name = parser.name().trim().to_owned();
        if name.is_empty() {
            return Err(RecipeError::config("parser's name cannot be empty"));
        }
        if self.parsers.contains_key(&name) {
            return Err(RecipeError::config(format!(
                "parser with name '{name}' already exists"
            )));
        }
        self.parsers.insert(name, parser);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Parser>> {
        self.parsers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lookup(&self, name: &str) -> RecipeResult<&Arc<dyn Parser>> {
        self.get(name)
            .ok_or_else(|| RecipeError::config(format!("parser '{name}' does not exist")))
    }

    /// Check that the parser exists and that the configured arguments match its contract.
    pub fn validate(&self, invocation: &ParserInvocation) -> RecipeResult<()> {
        let parser = self.lookup(&invocation.name)?;
        validate_args(
            &format!("parser '{}'", invocation.name),
            parser.arg_shapes(),
            &invocation.args,
        )
    }

    /// Resolve every declared argument against `row` (unconfigured ones resolve to `focus`) and
    /// run the parser.
    pub fn run(&self, invocation: &ParserInvocation, focus: &str, row: &Row) -> RecipeResult<String> {
        let parser = self.lookup(&invocation.name)?;
        let scope = Scope::Row { focus, row };

        let mut args = ResolvedArgs::new();
        for name in parser.arg_shapes().keys() {
            let node = invocation.args.get(name).unwrap_or(&ArgumentNode::Focus);
            args.insert(name.clone(), resolve(node, scope)?);
        }

        parser.parse(&args)
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.names())
            .finish()
    }
}
