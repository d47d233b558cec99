//! Argument trees and their resolution.
//!
//! Parsers and operations receive their inputs as [`ArgumentNode`] trees taken from the recipe.
//! Each tree is resolved fresh, per row for parsers and once per invocation for operations, into
//! an [`Argument`]: either a scalar string or an ordered list of arguments.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{RecipeError, RecipeResult};
use crate::types::Row;

/// Unresolved argument as configured in a recipe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ArgumentRepr")]
pub enum ArgumentNode {
    /// Literal text, passed verbatim.
    Literal(String),
    /// The string form of a column of the current row (or, for operations, the column name).
    Column(String),
    /// Ordered list of nested arguments.
    List(Vec<ArgumentNode>),
    /// Nothing set: the value in focus (the cell being parsed).
    Focus,
}

impl ArgumentNode {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    /// List of literals.
    pub fn literals<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Self::literal).collect())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

// Accepted forms: a bare string (literal) or `{value}`, `{values}`, `{col}`, `{}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArgumentRepr {
    Text(String),
    Fields(ArgumentFields),
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ArgumentFields {
    value: String,
    values: Vec<ArgumentNode>,
    col: String,
}

impl From<ArgumentRepr> for ArgumentNode {
    fn from(repr: ArgumentRepr) -> Self {
        match repr {
            ArgumentRepr::Text(text) => Self::Literal(text),
            ArgumentRepr::Fields(f) if !f.value.is_empty() => Self::Literal(f.value),
            ArgumentRepr::Fields(f) if !f.values.is_empty() => Self::List(f.values),
            ArgumentRepr::Fields(f) if !f.col.is_empty() => Self::Column(f.col),
            ArgumentRepr::Fields(_) => Self::Focus,
        }
    }
}

/// A resolved argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Scalar(String),
    List(Vec<Argument>),
}

impl Argument {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Argument]> {
        match self {
            Self::List(items) => Some(items),
            Self::Scalar(_) => None,
        }
    }
}

/// Element kind expected for a declared argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Text,
    Int,
    Bool,
    /// JSON object carried as text (external parsers only).
    Object,
}

/// Declared shape of a parser/operation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    Scalar(ArgKind),
    List(ArgKind),
}

impl ArgShape {
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Scalar(k) | Self::List(k) => *k,
        }
    }
}

/// Argument name -> declared shape.
pub type ArgShapes = BTreeMap<String, ArgShape>;

/// Build an [`ArgShapes`] map from static pairs.
pub fn arg_shapes<const N: usize>(pairs: [(&str, ArgShape); N]) -> ArgShapes {
    pairs
        .into_iter()
        .map(|(name, shape)| (name.to_owned(), shape))
        .collect()
}

/// Check configured arguments against a declared contract.
///
/// `owner` names the parser/operation in error messages, e.g. `parser 'concat'`.
pub fn validate_args(
    owner: &str,
    shapes: &ArgShapes,
    configured: &BTreeMap<String, ArgumentNode>,
) -> RecipeResult<()> {
    for (name, node) in configured {
        let shape = shapes.get(name).ok_or_else(|| {
            RecipeError::config(format!("{owner} does not take argument '{name}'"))
        })?;

        if node.is_list() && !shape.is_list() {
            return Err(RecipeError::config(format!(
                "invalid type for argument '{name}' in {owner}: type must either be 'self', 'col', or 'value', not 'values'"
            )));
        }
        if !node.is_list() && shape.is_list() {
            return Err(RecipeError::config(format!(
                "invalid type for argument '{name}' in {owner}: type must be 'values'"
            )));
        }
    }
    Ok(())
}

/// What column references and the focus resolve against.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Building a row: `focus` is the cell being parsed.
    Row { focus: &'a str, row: &'a Row },
    /// Operation level: column references stand for the column names themselves.
    Operation,
}

/// Resolve one argument tree. List children resolve left to right.
pub fn resolve(node: &ArgumentNode, scope: Scope<'_>) -> RecipeResult<Argument> {
    match node {
        ArgumentNode::Literal(text) => Ok(Argument::Scalar(text.clone())),
        ArgumentNode::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                resolve(item, scope).map_err(|e| RecipeError::ListItem {
                    index,
                    source: Box::new(e),
                })
            })
            .collect::<RecipeResult<Vec<_>>>()
            .map(Argument::List),
        ArgumentNode::Column(name) => match scope {
            Scope::Row { row, .. } => row.text_of(name).map(|s| Argument::Scalar(s.to_owned())),
            Scope::Operation => Ok(Argument::Scalar(name.clone())),
        },
        ArgumentNode::Focus => match scope {
            Scope::Row { focus, .. } => Ok(Argument::Scalar(focus.to_owned())),
            Scope::Operation => Ok(Argument::Scalar(String::new())),
        },
    }
}

/// Resolved arguments of one parser/operation invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArgs {
    values: BTreeMap<String, Argument>,
}

impl ResolvedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Argument) {
        self.values.insert(name.into(), value);
    }

    /// Builder-style [`ResolvedArgs::insert`] for scalars.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, Argument::Scalar(value.into()));
        self
    }

    /// Builder-style [`ResolvedArgs::insert`] for lists of scalars.
    pub fn with_list<I, S>(mut self, name: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = items.into_iter().map(|s| Argument::Scalar(s.into())).collect();
        self.insert(name, Argument::List(items));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn required(&self, name: &str) -> RecipeResult<&Argument> {
        self.get(name).ok_or_else(|| RecipeError::MissingArgument {
            name: name.to_owned(),
        })
    }

    /// Scalar argument as text.
    pub fn text(&self, name: &str) -> RecipeResult<&str> {
        self.required(name)?
            .as_scalar()
            .ok_or_else(|| RecipeError::invalid_argument(name, "must be a string"))
    }

    pub fn int(&self, name: &str) -> RecipeResult<i64> {
        self.text(name)?
            .trim()
            .parse()
            .map_err(|_| RecipeError::invalid_argument(name, "must be an integer"))
    }

    /// Scalar argument read with the bool token set; unknown tokens are `false`.
    pub fn boolean(&self, name: &str) -> RecipeResult<bool> {
        let raw = self.text(name)?.trim().to_lowercase();
        Ok(matches!(raw.as_str(), "1" | "yes" | "true"))
    }

    pub fn list(&self, name: &str) -> RecipeResult<&[Argument]> {
        self.required(name)?
            .as_list()
            .ok_or_else(|| RecipeError::invalid_argument(name, "must be a list"))
    }

    /// List argument whose items are all scalars.
    pub fn texts(&self, name: &str) -> RecipeResult<Vec<String>> {
        self.list(name)?
            .iter()
            .map(|a| {
                a.as_scalar()
                    .map(str::to_owned)
                    .ok_or_else(|| RecipeError::invalid_argument(name, "must be a list of strings"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, DataType, Value};

    fn row() -> Row {
        let mut row = Row::default();
        row.insert("name", Value::new(&ColumnDef::new("name", DataType::String), "Ada").unwrap());
        row.insert("age", Value::new(&ColumnDef::new("age", DataType::Int), "36").unwrap());
        row
    }

    #[test]
    fn resolves_each_node_kind() {
        let row = row();
        let scope = Scope::Row { focus: "self!", row: &row };

        assert_eq!(
            resolve(&ArgumentNode::literal("x"), scope).unwrap(),
            Argument::Scalar("x".into())
        );
        assert_eq!(
            resolve(&ArgumentNode::column("age"), scope).unwrap(),
            Argument::Scalar("36".into())
        );
        assert_eq!(
            resolve(&ArgumentNode::Focus, scope).unwrap(),
            Argument::Scalar("self!".into())
        );

        let nested = ArgumentNode::List(vec![
            ArgumentNode::column("name"),
            ArgumentNode::literal("-"),
            ArgumentNode::List(vec![ArgumentNode::Focus]),
        ]);
        assert_eq!(
            resolve(&nested, scope).unwrap(),
            Argument::List(vec![
                Argument::Scalar("Ada".into()),
                Argument::Scalar("-".into()),
                Argument::List(vec![Argument::Scalar("self!".into())]),
            ])
        );
    }

    #[test]
    fn list_failure_reports_index() {
        let row = row();
        let scope = Scope::Row { focus: "", row: &row };
        let node = ArgumentNode::List(vec![ArgumentNode::literal("a"), ArgumentNode::column("nope")]);

        let err = resolve(&node, scope).unwrap_err();
        assert_eq!(err.to_string(), "argument at index 1: column 'nope' not found");
        assert!(matches!(err.root(), RecipeError::ColumnNotFound { .. }));
    }

    #[test]
    fn operation_scope_keeps_column_names() {
        let node = ArgumentNode::List(vec![ArgumentNode::column("code"), ArgumentNode::literal("id")]);
        assert_eq!(
            resolve(&node, Scope::Operation).unwrap(),
            Argument::List(vec![Argument::Scalar("code".into()), Argument::Scalar("id".into())])
        );
    }

    #[test]
    fn deserializes_all_forms() {
        let json = r#"{
            "a": "plain",
            "b": {"value": "lit"},
            "c": {"col": "name"},
            "d": {},
            "e": {"values": ["x", {"col": "y"}]}
        }"#;
        let args: BTreeMap<String, ArgumentNode> = serde_json::from_str(json).unwrap();
        assert_eq!(args["a"], ArgumentNode::literal("plain"));
        assert_eq!(args["b"], ArgumentNode::literal("lit"));
        assert_eq!(args["c"], ArgumentNode::column("name"));
        assert_eq!(args["d"], ArgumentNode::Focus);
        assert_eq!(
            args["e"],
            ArgumentNode::List(vec![ArgumentNode::literal("x"), ArgumentNode::column("y")])
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_json::from_str::<ArgumentNode>(r#"{"cols": ["a", "b"]}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<ArgumentNode>(r#"{"col": "a", "colum": "b"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn validation_checks_names_and_shapes() {
        let shapes = arg_shapes([
            ("value", ArgShape::Scalar(ArgKind::Text)),
            ("values", ArgShape::List(ArgKind::Text)),
        ]);

        let mut ok = BTreeMap::new();
        ok.insert("value".to_owned(), ArgumentNode::Focus);
        ok.insert("values".to_owned(), ArgumentNode::literals(["a"]));
        validate_args("parser 'p'", &shapes, &ok).unwrap();

        let mut unknown = BTreeMap::new();
        unknown.insert("other".to_owned(), ArgumentNode::Focus);
        let err = validate_args("parser 'p'", &shapes, &unknown).unwrap_err();
        assert!(err.to_string().contains("does not take argument 'other'"));

        let mut wrong = BTreeMap::new();
        wrong.insert("values".to_owned(), ArgumentNode::literal("a"));
        let err = validate_args("parser 'p'", &shapes, &wrong).unwrap_err();
        assert!(err.to_string().contains("type must be 'values'"));
    }

    #[test]
    fn typed_accessors() {
        let args = ResolvedArgs::new()
            .with("n", "12")
            .with("flag", "Yes")
            .with("junk", "maybe")
            .with_list("cols", ["a", "b"]);

        assert_eq!(args.int("n").unwrap(), 12);
        assert!(args.boolean("flag").unwrap());
        assert!(!args.boolean("junk").unwrap());
        assert_eq!(args.texts("cols").unwrap(), vec!["a", "b"]);
        assert!(matches!(args.text("missing"), Err(RecipeError::MissingArgument { .. })));
        assert!(args.int("flag").is_err());
        assert!(args.text("cols").is_err());
    }
}
