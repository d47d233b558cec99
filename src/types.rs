//! Core data model: column definitions, typed values, rows and datasets.
//!
//! A [`Schema`] is the ordered set of [`ColumnDef`]s a recipe declares. Every cell of a [`Row`] is
//! a [`Value`] that keeps the exact string it was built from plus the numeric/boolean projections
//! its declared [`DataType`] allows.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{RecipeError, RecipeResult};
use crate::parsers::ParserInvocation;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum DataType {
    /// Free text; exposes no numeric/boolean projection.
    String,
    /// Base-10 integer; also exposes float and bool.
    Int,
    /// Decimal number; also exposes (truncated) int and bool.
    Float,
    /// Boolean token (`yes`, `no`, `1`, `0`, ...).
    Bool,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

impl FromStr for DataType {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "string" => Ok(Self::String),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            other => Err(RecipeError::UnsupportedType {
                data_type: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = RecipeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a single column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    /// Column name; unique within a [`Schema`].
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Literal used when the input cell is empty.
    #[serde(default)]
    pub default: String,
    /// Fail on empty cells that have no default.
    #[serde(default)]
    pub not_empty: bool,
    /// Computed by its parser chain instead of read from the input.
    #[serde(default)]
    pub dynamic: bool,
    /// Parser chain, applied in order.
    #[serde(default)]
    pub parsers: Vec<ParserInvocation>,
}

impl ColumnDef {
    /// Create a static, optional column without default or parsers.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: String::new(),
            not_empty: false,
            dynamic: false,
            parsers: Vec::new(),
        }
    }

    /// Create a dynamic (computed) column.
    pub fn computed(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            dynamic: true,
            ..Self::new(name, data_type)
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.not_empty = true;
        self
    }

    pub fn with_parser(mut self, parser: ParserInvocation) -> Self {
        self.parsers.push(parser);
        self
    }

    /// Trim `raw` and substitute the default (or `"0"` for non-string types) when empty.
    fn normalize(&self, raw: &str, enforce_required: bool) -> RecipeResult<String> {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_owned());
        }

        if !self.default.is_empty() {
            return Ok(self.default.clone());
        }
        if self.data_type != DataType::String {
            return Ok("0".to_owned());
        }
        if enforce_required && self.not_empty {
            return Err(RecipeError::MissingValue {
                column: self.name.clone(),
            });
        }
        Ok(String::new())
    }
}

/// Ordered list of column definitions describing a dataset state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Schema::get`] but reports a missing column as an error.
    pub fn column(&self, name: &str) -> RecipeResult<&ColumnDef> {
        self.get(name).ok_or_else(|| RecipeError::ColumnNotFound {
            column: name.to_owned(),
        })
    }

    /// Fails if two columns share a name.
    pub fn ensure_unique_names(&self) -> RecipeResult<()> {
        let mut seen = HashMap::with_capacity(self.columns.len());
        for (i, c) in self.columns.iter().enumerate() {
            if let Some(first) = seen.insert(c.name.as_str(), i) {
                return Err(RecipeError::config(format!(
                    "column '{}' is declared twice (positions {first} and {i})",
                    c.name
                )));
            }
        }
        Ok(())
    }

    /// Sub-schema made of `names` (in that order), optionally followed by `extra`.
    pub fn select(&self, names: &[String], extra: Option<ColumnDef>) -> RecipeResult<Schema> {
        let mut columns = names
            .iter()
            .map(|n| self.column(n).cloned())
            .collect::<RecipeResult<Vec<_>>>()?;
        columns.extend(extra);
        let schema = Schema::new(columns);
        schema.ensure_unique_names()?;
        Ok(schema)
    }

    /// Build a row from one string per column, in column order.
    ///
    /// Values go through the regular coercion rules; parser chains are not run.
    pub fn build_row<S: AsRef<str>>(&self, record: &[S]) -> RecipeResult<Row> {
        let mut row = Row::default();
        for (def, raw) in self.columns.iter().zip(record) {
            row.insert(def.name.clone(), Value::new(def, raw.as_ref())?);
        }
        Ok(row)
    }
}

/// A single typed cell.
///
/// The string form is kept verbatim (after trimming/default substitution); projections are only
/// present when the declared type admits them.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    text: String,
    data_type: DataType,
    int: Option<i64>,
    float: Option<f64>,
    boolean: Option<bool>,
}

impl Value {
    /// Build a value for `def` from a raw input string.
    pub fn new(def: &ColumnDef, raw: &str) -> RecipeResult<Self> {
        let text = def.normalize(raw, true)?;
        Self::coerce(def.data_type, text)
    }

    /// Initial value of a dynamic column, before its parser chain runs.
    pub(crate) fn seed(def: &ColumnDef) -> RecipeResult<Self> {
        let text = def.normalize("", false)?;
        Self::coerce(def.data_type, text)
    }

    /// A plain string value; no coercion can fail.
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data_type: DataType::String,
            int: None,
            float: None,
            boolean: None,
        }
    }

    fn coerce(data_type: DataType, text: String) -> RecipeResult<Self> {
        let mut value = Self {
            text,
            data_type,
            int: None,
            float: None,
            boolean: None,
        };

        match data_type {
            DataType::String => {}
            DataType::Int => {
                let i = value
                    .text
                    .parse::<i64>()
                    .map_err(|_| RecipeError::NotANumber {
                        raw: value.text.clone(),
                    })?;
                value.int = Some(i);
                value.float = Some(i as f64);
                value.boolean = Some(i <= 0);
            }
            DataType::Float => {
                let f = value
                    .text
                    .parse::<f64>()
                    .map_err(|_| RecipeError::NotAFloat {
                        raw: value.text.clone(),
                    })?;
                let i = f as i64;
                value.float = Some(f);
                value.int = Some(i);
                value.boolean = Some(i <= 0);
            }
            DataType::Bool => value.boolean = Some(parse_bool_token(&value.text)),
        }

        Ok(value)
    }

    /// String form of the value.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Integer projection (`int` and `float` columns).
    pub fn as_int(&self) -> Option<i64> {
        match self.data_type {
            DataType::Int | DataType::Float | DataType::Bool => self.int,
            DataType::String => None,
        }
    }

    /// Float projection (`int` and `float` columns).
    pub fn as_float(&self) -> Option<f64> {
        if self.data_type.is_numeric() {
            self.float
        } else {
            None
        }
    }

    /// Boolean projection.
    ///
    /// Numeric columns are `true` when the (truncated) integer is `<= 0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self.data_type {
            DataType::Int | DataType::Float | DataType::Bool => self.boolean,
            DataType::String => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Case-insensitive bool tokens; anything unknown counts as `true`.
pub(crate) fn parse_bool_token(s: &str) -> bool {
    match s.trim().to_lowercase().as_str() {
        "" | "0" | "n/a" | "no" | "false" => false,
        "1" | "yes" | "true" => true,
        _ => true,
    }
}

/// One record: typed values keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.get(column)
    }

    /// Replace (or add) a cell.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.cells.insert(column.into(), value);
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// String form of `column`, or a "column not found" error.
    pub fn text_of(&self, column: &str) -> RecipeResult<&str> {
        self.get(column)
            .map(Value::as_str)
            .ok_or_else(|| RecipeError::ColumnNotFound {
                column: column.to_owned(),
            })
    }

    /// Copy of this row restricted to `columns`.
    pub fn project(&self, columns: &[String]) -> RecipeResult<Row> {
        let mut out = Row::default();
        for c in columns {
            let v = self.get(c).ok_or_else(|| RecipeError::ColumnNotFound { column: c.clone() })?;
            out.insert(c.clone(), v.clone());
        }
        Ok(out)
    }
}

/// Input-position -> column mapping, built from the first input record.
///
/// Positions absent from the map are input columns the recipe does not declare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header<'s> {
    positions: BTreeMap<usize, &'s ColumnDef>,
}

impl<'s> Header<'s> {
    /// Match header cells (trimmed) against the schema's static columns.
    ///
    /// A column named more than once is read from its last position.
    pub fn new<I, S>(schema: &'s Schema, header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positions = BTreeMap::new();
        let mut last_seen: HashMap<&'s str, usize> = HashMap::new();
        for (pos, h) in header.into_iter().enumerate() {
            if let Some(def) = schema.get(h.as_ref().trim()) {
                if !def.dynamic {
                    if let Some(prev) = last_seen.insert(def.name.as_str(), pos) {
                        positions.remove(&prev);
                    }
                    positions.insert(pos, def);
                }
            }
        }
        Self { positions }
    }

    pub fn get(&self, position: usize) -> Option<&'s ColumnDef> {
        self.positions.get(&position).copied()
    }

    /// Recognized columns in input order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'s ColumnDef)> + '_ {
        self.positions.iter().map(|(p, d)| (*p, *d))
    }

    /// Number of recognized input columns.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// In-memory dataset: the schema plus its rows. Retained pipeline states are `DataSet`s too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl DataSet {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// String values of `column`, in row order (`None` for rows lacking the column).
    pub fn column_values(&self, column: &str) -> Vec<Option<&str>> {
        self.rows
            .iter()
            .map(|r| r.get(column).map(Value::as_str))
            .collect()
    }
}
