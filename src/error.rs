use thiserror::Error;

/// Convenience result type for recipe operations.
pub type RecipeResult<T> = Result<T, RecipeError>;

/// Error type returned while translating, validating or running a recipe.
///
/// A single enum shared by value coercion, argument resolution, parsers and operations. Errors
/// raised deep inside a row or an operation are wrapped with [`RecipeError::Cell`] or
/// [`RecipeError::Operation`] on the way out so the reported message carries its position.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// Underlying I/O error (e.g. input file not found, output file not writable).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading/writing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Recipe (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The recipe is inconsistent: unknown parser/operation, undeclared argument, shape mismatch,
    /// duplicate registration, ...
    #[error("invalid recipe: {message}")]
    Config { message: String },

    /// The cell is empty, the column has no default and is marked as required.
    #[error("required value is empty and no default configured for column '{column}'")]
    MissingValue { column: String },

    #[error("not a number: '{raw}'")]
    NotANumber { raw: String },

    #[error("not a float: '{raw}'")]
    NotAFloat { raw: String },

    #[error("unsupported type '{data_type}'")]
    UnsupportedType { data_type: String },

    /// A column reference could not be resolved against the row (or dataset state).
    #[error("column '{column}' not found")]
    ColumnNotFound { column: String },

    /// `fromState` names a state that was never kept.
    #[error("state '{state}' does not exist or was never kept")]
    StateNotFound { state: String },

    /// An element of a list argument failed to resolve.
    #[error("argument at index {index}: {source}")]
    ListItem {
        index: usize,
        #[source]
        source: Box<RecipeError>,
    },

    #[error("'{name}' argument not provided")]
    MissingArgument { name: String },

    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// An external parser failed to produce output.
    #[error("parser '{parser}' failed: {message}")]
    Parser { parser: String, message: String },

    /// An input cell could not be coerced to its column type.
    #[error("failed to parse value at row {row} column '{column}': {source}")]
    CellValue {
        row: usize,
        column: String,
        #[source]
        source: Box<RecipeError>,
    },

    /// Failure while running a column's parser chain, with its position.
    #[error("row {row} column '{column}' parser '{parser}': {source}")]
    Cell {
        row: usize,
        column: String,
        parser: String,
        #[source]
        source: Box<RecipeError>,
    },

    /// Failure while executing a pipeline step.
    #[error("operation '{operation}' named '{name}': {source}")]
    Operation {
        name: String,
        operation: String,
        #[source]
        source: Box<RecipeError>,
    },
}

impl RecipeError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_owned(),
            message: message.into(),
        }
    }

    /// Returns the innermost error, unwrapping positional context.
    pub fn root(&self) -> &RecipeError {
        match self {
            Self::ListItem { source, .. }
            | Self::CellValue { source, .. }
            | Self::Cell { source, .. }
            | Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}
