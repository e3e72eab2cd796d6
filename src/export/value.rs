//! Value tree and writer for the export format.
//!
//! The format is a brace-delimited table syntax:
//!
//! ```text
//! {
//!   id = 12,
//!   name = "Fireball",
//!   formatting = {
//!     title = { x=80, y=25, font="Arial Black", size=18, color="#FF4444" }
//!   }
//! }
//! ```
//!
//! Layout rules:
//! - a table whose values are all scalars is written inline, `{ k=v, k=v }`
//! - any other table or list is written one entry per line, indented by two
//!   spaces, entries separated by commas, no comma after the last
//! - an empty table or list is `{}`
//! - integral numbers are written without a fractional part; others use the
//!   shortest representation that reads back to the same `f64`
//!
//! Entry order is the order of the `Vec`, so the same tree always renders to
//! the same text.

use super::escape::escape;
use thiserror::Error;

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Num(f64),
    Bool(bool),
    /// Keyed entries, in output order.
    Table(Vec<(String, Value)>),
    List(Vec<Value>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("field '{field}' contains unsupported control character {character:?}")]
    Unsupported { field: String, character: char },
    #[error("field '{field}' is not a finite number")]
    NonFinite { field: String },
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Build a table from `(key, value)` pairs, keeping their order.
    pub fn table<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        Value::Table(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn is_scalar(&self) -> bool {
        !matches!(self, Value::Table(_) | Value::List(_))
    }

    /// Look up a key in a table.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Table(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value of an `Int` or `Num`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Items of a list. An empty table reads as an empty list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Table(entries) if entries.is_empty() => Some(&[]),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Table(entries) => Some(entries),
            _ => None,
        }
    }

    /// Render to export text.
    pub fn render(&self) -> Result<String, RenderError> {
        let mut out = String::new();
        write_value(&mut out, self, 0, "")?;
        Ok(out)
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Number text, or `None` for NaN and infinities.
pub fn format_number(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Some(format!("{}", n as i64))
    } else {
        Some(format!("{n}"))
    }
}

fn write_scalar(out: &mut String, value: &Value, path: &str) -> Result<(), RenderError> {
    match value {
        Value::Str(s) => {
            let escaped = escape(s).map_err(|character| RenderError::Unsupported {
                field: path.to_string(),
                character,
            })?;
            out.push('"');
            out.push_str(&escaped);
            out.push('"');
        }
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Num(n) => {
            let text = format_number(*n).ok_or_else(|| RenderError::NonFinite {
                field: path.to_string(),
            })?;
            out.push_str(&text);
        }
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Table(_) | Value::List(_) => unreachable!("write_scalar called on a container"),
    }
    Ok(())
}

fn write_value(
    out: &mut String,
    value: &Value,
    indent: usize,
    path: &str,
) -> Result<(), RenderError> {
    match value {
        Value::Table(entries) if entries.is_empty() => out.push_str("{}"),
        Value::List(items) if items.is_empty() => out.push_str("{}"),
        Value::Table(entries) if entries.iter().all(|(_, v)| v.is_scalar()) => {
            out.push_str("{ ");
            for (i, (key, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(key);
                out.push('=');
                write_scalar(out, v, &child_path(path, key))?;
            }
            out.push_str(" }");
        }
        Value::List(items) if items.iter().all(Value::is_scalar) => {
            out.push_str("{ ");
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_scalar(out, v, &format!("{path}[{i}]"))?;
            }
            out.push_str(" }");
        }
        Value::Table(entries) => {
            out.push_str("{\n");
            for (i, (key, v)) in entries.iter().enumerate() {
                push_indent(out, indent + 1);
                out.push_str(key);
                out.push_str(" = ");
                write_value(out, v, indent + 1, &child_path(path, key))?;
                if i + 1 < entries.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, indent);
            out.push('}');
        }
        Value::List(items) => {
            out.push_str("{\n");
            for (i, v) in items.iter().enumerate() {
                push_indent(out, indent + 1);
                write_value(out, v, indent + 1, &format!("{path}[{i}]"))?;
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, indent);
            out.push('}');
        }
        scalar => write_scalar(out, scalar, path)?,
    }
    Ok(())
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_table_is_inline() {
        let v = Value::table([
            ("x", Value::Num(80.0)),
            ("font", Value::str("Arial Black")),
            ("wrap", Value::Bool(true)),
        ]);
        assert_eq!(
            v.render().unwrap(),
            r#"{ x=80, font="Arial Black", wrap=true }"#
        );
    }

    #[test]
    fn nested_table_is_multiline_without_trailing_comma() {
        let v = Value::table([
            ("id", Value::Int(12)),
            ("formatting", Value::table([("title", Value::table([("size", Value::Num(18.0))]))])),
        ]);
        let expected = "{\n  id = 12,\n  formatting = {\n    title = { size=18 }\n  }\n}";
        assert_eq!(v.render().unwrap(), expected);
    }

    #[test]
    fn empty_containers_are_braces() {
        assert_eq!(Value::List(vec![]).render().unwrap(), "{}");
        assert_eq!(Value::Table(vec![]).render().unwrap(), "{}");
    }

    #[test]
    fn scalar_list_is_inline() {
        let v = Value::List(vec![Value::str("Ash"), Value::str("Zed")]);
        assert_eq!(v.render().unwrap(), r#"{ "Ash", "Zed" }"#);
    }

    #[test]
    fn numbers_are_plain() {
        assert_eq!(format_number(18.0).unwrap(), "18");
        assert_eq!(format_number(1.3).unwrap(), "1.3");
        assert_eq!(format_number(-2.5).unwrap(), "-2.5");
        assert_eq!(format_number(f64::NAN), None);
    }

    #[test]
    fn strings_are_escaped() {
        let v = Value::table([("d", Value::str("say \"hi\"\nbye"))]);
        assert_eq!(v.render().unwrap(), r#"{ d="say \"hi\"\nbye" }"#);
    }

    #[test]
    fn unsupported_character_names_the_field() {
        let v = Value::table([(
            "formatting",
            Value::table([("title", Value::table([("font", Value::str("A\u{7}"))]))]),
        )]);
        assert_eq!(
            v.render(),
            Err(RenderError::Unsupported {
                field: "formatting.title.font".into(),
                character: '\u{7}'
            })
        );
    }

    #[test]
    fn non_finite_number_is_error() {
        let v = Value::table([("size", Value::Num(f64::INFINITY))]);
        assert!(matches!(v.render(), Err(RenderError::NonFinite { field }) if field == "size"));
    }

    #[test]
    fn accessors() {
        let v = Value::table([("n", Value::Int(3)), ("list", Value::Table(vec![]))]);
        assert_eq!(v.get("n").and_then(Value::as_f64), Some(3.0));
        assert_eq!(v.get("list").and_then(Value::as_list).map(<[Value]>::len), Some(0));
        assert!(v.get("missing").is_none());
    }
}
