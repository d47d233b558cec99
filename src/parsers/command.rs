//! Parsers backed by an external program.
//!
//! The program receives the bound arguments as one JSON object on stdin and answers with the
//! output value on stdout. Declared argument kinds follow the scripting contract:
//!
//! | kind     | bound argument        | JSON sent          |
//! |----------|-----------------------|--------------------|
//! | `string` | scalar                | string             |
//! | `array`  | list                  | array (nested)     |
//! | `bool`   | scalar (bool tokens)  | `true` / `false`   |
//! | `object` | scalar holding JSON   | object             |

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use serde_json::{Map, Value as Json};

use crate::args::{ArgKind, ArgShape, ArgShapes, Argument, ResolvedArgs};
use crate::error::{RecipeError, RecipeResult};
use crate::types::parse_bool_token;

use super::Parser;

/// A parser that runs `program [args..]` once per invocation.
#[derive(Debug, Clone)]
pub struct CommandParser {
    name: String,
    program: PathBuf,
    program_args: Vec<String>,
    shapes: ArgShapes,
}

impl CommandParser {
    /// Create a parser. `params` maps argument names to `string`, `array`, `object` or `bool`.
    pub fn new(
        name: impl Into<String>,
        program: impl AsRef<Path>,
        params: &BTreeMap<String, String>,
    ) -> RecipeResult<Self> {
        let name = name.into();
        let mut shapes = ArgShapes::new();
        for (arg, kind) in params {
            let shape = match kind.as_str() {
                "string" => ArgShape::Scalar(ArgKind::Text),
                "array" => ArgShape::List(ArgKind::Text),
                "object" => ArgShape::Scalar(ArgKind::Object),
                "bool" => ArgShape::Scalar(ArgKind::Bool),
                other => {
                    return Err(RecipeError::config(format!(
                        "type '{other}' is not supported in '{name}'"
                    )));
                }
            };
            shapes.insert(arg.clone(), shape);
        }

        Ok(Self {
            name,
            program: program.as_ref().to_path_buf(),
            program_args: Vec::new(),
            shapes,
        })
    }

    /// Extra command-line arguments passed to the program.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.program_args = args;
        self
    }

    /// JSON payload for the bound arguments, checked against the declared kinds.
    fn payload(&self, args: &ResolvedArgs) -> RecipeResult<Json> {
        let mut out = Map::new();
        for (name, shape) in &self.shapes {
            let bound = args.get(name).ok_or_else(|| RecipeError::Parser {
                parser: self.name.clone(),
                message: format!("arg '{name}' required but missing"),
            })?;
            out.insert(name.clone(), self.to_json(name, *shape, bound)?);
        }
        Ok(Json::Object(out))
    }

    fn to_json(&self, name: &str, shape: ArgShape, bound: &Argument) -> RecipeResult<Json> {
        let mismatch = |expected: &str| RecipeError::Parser {
            parser: self.name.clone(),
            message: format!("unexpected argument type for '{name}': expected {expected}"),
        };

        match (shape, bound) {
            (ArgShape::List(_), Argument::List(items)) => Ok(list_to_json(items)),
            (ArgShape::List(_), Argument::Scalar(_)) => Err(mismatch("array")),
            (ArgShape::Scalar(_), Argument::List(_)) => Err(mismatch("scalar")),
            (ArgShape::Scalar(ArgKind::Bool), Argument::Scalar(s)) => {
                Ok(Json::Bool(parse_bool_token(s)))
            }
            (ArgShape::Scalar(ArgKind::Object), Argument::Scalar(s)) => {
                match serde_json::from_str::<Json>(s) {
                    Ok(obj @ Json::Object(_)) => Ok(obj),
                    _ => Err(mismatch("object")),
                }
            }
            (ArgShape::Scalar(_), Argument::Scalar(s)) => Ok(Json::String(s.clone())),
        }
    }
}

fn list_to_json(items: &[Argument]) -> Json {
    Json::Array(
        items
            .iter()
            .map(|item| match item {
                Argument::Scalar(s) => Json::String(s.clone()),
                Argument::List(nested) => list_to_json(nested),
            })
            .collect(),
    )
}

impl Parser for CommandParser {
    fn name(&self) -> &str {
        &self.name
    }

    fn arg_shapes(&self) -> &ArgShapes {
        &self.shapes
    }

    fn parse(&self, args: &ResolvedArgs) -> RecipeResult<String> {
        let payload = serde_json::to_vec(&self.payload(args)?)?;

        let mut child = Command::new(&self.program)
            .args(&self.program_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from its own thread while stdout is drained.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|s| {
            let writer = s.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(&payload),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (output, written)
        });
        let output = output?;
        // A program may exit without reading its input; its exit status decides.
        if let Err(e) = written {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }

        if !output.status.success() {
            return Err(RecipeError::Parser {
                parser: self.name.clone(),
                message: format!(
                    "{} ({})",
                    String::from_utf8_lossy(&output.stderr).trim(),
                    output.status
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim_end_matches(['\n', '\r']).to_owned())
    }
}
