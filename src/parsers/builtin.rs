//! Built-in parsers.

use std::fs;
use std::path;
use std::sync::Arc;

use crate::args::{ArgKind, ArgShape, ArgShapes, Argument, ResolvedArgs, arg_shapes};
use crate::error::RecipeResult;
use crate::execution::file_md5;

use super::Parser;

type ParseFn = fn(&ResolvedArgs) -> RecipeResult<String>;

/// A parser implemented by a plain function.
struct BuiltinParser {
    name: &'static str,
    shapes: ArgShapes,
    parse: ParseFn,
}

impl Parser for BuiltinParser {
    fn name(&self) -> &str {
        self.name
    }

    fn arg_shapes(&self) -> &ArgShapes {
        &self.shapes
    }

    fn parse(&self, args: &ResolvedArgs) -> RecipeResult<String> {
        (self.parse)(args)
    }
}

const TEXT: ArgShape = ArgShape::Scalar(ArgKind::Text);

fn builtin(name: &'static str, shapes: ArgShapes, parse: ParseFn) -> Arc<dyn Parser> {
    Arc::new(BuiltinParser { name, shapes, parse })
}

/// Every built-in parser, ready for registration.
pub fn builtin_parsers() -> Vec<Arc<dyn Parser>> {
    vec![
        builtin("concat", arg_shapes([("values", ArgShape::List(ArgKind::Text))]), concat),
        builtin("lowercase", arg_shapes([("value", TEXT)]), lowercase),
        builtin("uppercase", arg_shapes([("value", TEXT)]), uppercase),
        builtin("ext", arg_shapes([("value", TEXT)]), ext),
        builtin("fileExists", arg_shapes([("value", TEXT)]), file_exists),
        builtin("fileMd5", arg_shapes([("filename", TEXT)]), file_md5_hex),
        builtin(
            "contains",
            arg_shapes([
                ("value", TEXT),
                ("term", TEXT),
                ("trueValue", TEXT),
                ("falseValue", TEXT),
            ]),
            contains,
        ),
    ]
}

fn uppercase(args: &ResolvedArgs) -> RecipeResult<String> {
    Ok(args.text("value")?.to_uppercase())
}

fn lowercase(args: &ResolvedArgs) -> RecipeResult<String> {
    Ok(args.text("value")?.to_lowercase())
}

fn concat(args: &ResolvedArgs) -> RecipeResult<String> {
    fn push_all(out: &mut String, items: &[Argument]) {
        for item in items {
            match item {
                Argument::Scalar(s) => out.push_str(s),
                Argument::List(nested) => push_all(out, nested),
            }
        }
    }

    let mut out = String::new();
    push_all(&mut out, args.list("values")?);
    Ok(out)
}

/// Text after the last `.` of the file name; empty when there is none.
///
/// Dotfiles count: `.bashrc` has the extension `bashrc`.
fn ext(args: &ResolvedArgs) -> RecipeResult<String> {
    let filename = args.text("value")?;
    let base = filename.rsplit(path::is_separator).next().unwrap_or_default();
    Ok(base
        .rfind('.')
        .map(|dot| base[dot + 1..].to_owned())
        .unwrap_or_default())
}

fn file_exists(args: &ResolvedArgs) -> RecipeResult<String> {
    let exists = match fs::metadata(args.text("value")?) {
        Ok(_) => true,
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    };
    Ok(exists.to_string())
}

/// Hex MD5 of the file; empty when it is missing or unreadable.
fn file_md5_hex(args: &ResolvedArgs) -> RecipeResult<String> {
    Ok(file_md5(args.text("filename")?).unwrap_or_default())
}

fn contains(args: &ResolvedArgs) -> RecipeResult<String> {
    let value = args.text("value")?;
    let term = args.text("term")?;
    let true_value = args.text("trueValue")?;
    let false_value = args.text("falseValue")?;

    Ok(if value.contains(term) {
        true_value.to_owned()
    } else {
        false_value.to_owned()
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::RecipeError;
    use crate::parsers::ParserRegistry;

    fn run(name: &str, args: ResolvedArgs) -> RecipeResult<String> {
        let registry = ParserRegistry::with_builtins();
        registry.get(name).expect("builtin registered").parse(&args)
    }

    #[test]
    fn case_folding() {
        assert_eq!(run("uppercase", ResolvedArgs::new().with("value", "MiXed")).unwrap(), "MIXED");
        assert_eq!(run("lowercase", ResolvedArgs::new().with("value", "MiXed")).unwrap(), "mixed");
    }

    #[test]
    fn concat_joins_and_flattens() {
        let mut args = ResolvedArgs::new();
        args.insert(
            "values",
            Argument::List(vec![
                Argument::Scalar("a".into()),
                Argument::List(vec![Argument::Scalar("1".into()), Argument::Scalar("2.5".into())]),
                Argument::Scalar("z".into()),
            ]),
        );
        assert_eq!(run("concat", args).unwrap(), "a12.5z");

        let err = run("concat", ResolvedArgs::new().with("values", "scalar")).unwrap_err();
        assert!(matches!(err, RecipeError::InvalidArgument { .. }));
    }

    #[test]
    fn ext_strips_dot() {
        assert_eq!(run("ext", ResolvedArgs::new().with("value", "/tmp/a.tar.GZ")).unwrap(), "GZ");
        assert_eq!(run("ext", ResolvedArgs::new().with("value", "README")).unwrap(), "");
        assert_eq!(run("ext", ResolvedArgs::new().with("value", "/home/u/.bashrc")).unwrap(), "bashrc");
        assert_eq!(run("ext", ResolvedArgs::new().with("value", "v1.2/notes")).unwrap(), "");
    }

    #[test]
    fn file_checks() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello").unwrap();
        let path = f.path().to_string_lossy().into_owned();

        assert_eq!(run("fileExists", ResolvedArgs::new().with("value", &path)).unwrap(), "true");
        assert_eq!(
            run("fileExists", ResolvedArgs::new().with("value", "/definitely/not/here")).unwrap(),
            "false"
        );
        assert_eq!(
            run("fileMd5", ResolvedArgs::new().with("filename", &path)).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            run("fileMd5", ResolvedArgs::new().with("filename", "/definitely/not/here")).unwrap(),
            ""
        );
    }

    #[test]
    fn contains_uses_configured_tokens() {
        let args = ResolvedArgs::new()
            .with("value", "report-final.pdf")
            .with("term", "final")
            .with("trueValue", "Y")
            .with("falseValue", "N");
        assert_eq!(run("contains", args.clone()).unwrap(), "Y");
        assert_eq!(run("contains", args.with("term", "draft")).unwrap(), "N");

        let missing = ResolvedArgs::new().with("value", "x").with("term", "x").with("trueValue", "Y");
        let err = run("contains", missing).unwrap_err();
        assert_eq!(err.to_string(), "'falseValue' argument not provided");
    }
}
