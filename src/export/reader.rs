//! Reader for export text.
//!
//! Parses what [`Value::render`](super::Value::render) writes back into a
//! [`Value`] tree. Used by `verify` and by the round-trip tests; the engine
//! never imports export text as records.
//!
//! A table with `key = value` entries reads as [`Value::Table`]; one with
//! bare values reads as [`Value::List`]; mixing both in one table is an
//! error. `{}` reads as an empty table, which [`Value::as_list`] also
//! accepts. `--` starts a comment running to the end of the line. A comma
//! after the last entry is tolerated.

use super::escape::unescape_char;
use super::value::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}, column {col}: {message}")]
pub struct ReadError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

/// Parse a complete document. Trailing content after the value is an error.
pub fn parse(text: &str) -> Result<Value, ReadError> {
    let mut reader = Reader {
        chars: text.chars().collect(),
        pos: 0,
    };
    let value = reader.value()?;
    reader.skip_trivia();
    if reader.peek().is_some() {
        return Err(reader.error("unexpected content after value"));
    }
    Ok(value)
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

enum Entry {
    Keyed(String, Value),
    Bare(Value),
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ReadError {
        let mut line = 1;
        let mut col = 1;
        for &c in &self.chars[..self.pos.min(self.chars.len())] {
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        ReadError {
            line,
            col,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.pos += 1,
                Some('-') if self.peek_at(1) == Some('-') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ReadError> {
        match self.peek() {
            Some(c) if c == want => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{want}', found '{c}'"))),
            None => Err(self.error(format!("expected '{want}', found end of input"))),
        }
    }

    fn value(&mut self) -> Result<Value, ReadError> {
        self.skip_trivia();
        match self.peek() {
            Some('{') => self.table(),
            Some('"') => self.string().map(Value::Str),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                let word = self.ident();
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => {
                        self.pos = start;
                        Err(self.error(format!("unexpected identifier '{word}'")))
                    }
                }
            }
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn table(&mut self) -> Result<Value, ReadError> {
        self.expect('{')?;
        let mut keyed: Vec<(String, Value)> = Vec::new();
        let mut bare: Vec<Value> = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') {
                self.pos += 1;
                break;
            }
            match self.entry()? {
                Entry::Keyed(key, value) => {
                    if !bare.is_empty() {
                        return Err(self.error("table mixes keyed and positional entries"));
                    }
                    if keyed.iter().any(|(k, _)| *k == key) {
                        return Err(self.error(format!("duplicate key '{key}'")));
                    }
                    keyed.push((key, value));
                }
                Entry::Bare(value) => {
                    if !keyed.is_empty() {
                        return Err(self.error("table mixes keyed and positional entries"));
                    }
                    bare.push(value);
                }
            }
            self.skip_trivia();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                Some(c) => return Err(self.error(format!("expected ',' or '}}', found '{c}'"))),
                None => return Err(self.error("unterminated table")),
            }
        }
        if bare.is_empty() {
            Ok(Value::Table(keyed))
        } else {
            Ok(Value::List(bare))
        }
    }

    fn entry(&mut self) -> Result<Entry, ReadError> {
        if let Some(c) = self.peek()
            && is_ident_start(c)
        {
            let start = self.pos;
            let key = self.ident();
            self.skip_trivia();
            if self.peek() == Some('=') {
                self.pos += 1;
                let value = self.value()?;
                return Ok(Entry::Keyed(key, value));
            }
            self.pos = start;
        }
        self.value().map(Entry::Bare)
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn string(&mut self) -> Result<String, ReadError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => {
                    let Some(letter) = self.bump() else {
                        return Err(self.error("unterminated string"));
                    };
                    match unescape_char(letter) {
                        Some(c) => out.push(c),
                        None => {
                            self.pos -= 1;
                            return Err(self.error(format!("unknown escape '\\{letter}'")));
                        }
                    }
                }
                Some(c) if c.is_control() => {
                    self.pos -= 1;
                    return Err(self.error(format!("raw control character {c:?} in string")));
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn number(&mut self) -> Result<Value, ReadError> {
        let start = self.pos;
        let mut text = String::new();
        let mut fractional = false;
        if self.peek() == Some('-') {
            text.push('-');
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => text.push(c),
                '.' | 'e' | 'E' => {
                    fractional = true;
                    text.push(c);
                }
                '+' | '-' if matches!(text.chars().last(), Some('e' | 'E')) => text.push(c),
                _ => break,
            }
            self.pos += 1;
        }
        let parsed = if fractional {
            text.parse::<f64>().ok().map(Value::Num)
        } else {
            text.parse::<i64>()
                .ok()
                .map(Value::Int)
                .or_else(|| text.parse::<f64>().ok().map(Value::Num))
        };
        parsed.ok_or_else(|| {
            self.pos = start;
            self.error(format!("invalid number '{text}'"))
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_keyed_table() {
        let v = parse(r#"{ x=80, font="Arial Black", wrap=true, lh=1.2 }"#).unwrap();
        assert_eq!(v.get("x"), Some(&Value::Int(80)));
        assert_eq!(v.get("font").and_then(Value::as_str), Some("Arial Black"));
        assert_eq!(v.get("wrap").and_then(Value::as_bool), Some(true));
        assert_eq!(v.get("lh").and_then(Value::as_f64), Some(1.2));
    }

    #[test]
    fn reads_positional_list() {
        let v = parse(r#"{ "Ash", "Zed", }"#).unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::str("Ash"), Value::str("Zed")])
        );
    }

    #[test]
    fn reads_nested_multiline_with_comments() {
        let text = "-- card export\n{\n  id = 12, -- the id\n  tags = {},\n  inner = {\n    n = -3\n  }\n}\n";
        let v = parse(text).unwrap();
        assert_eq!(v.get("id"), Some(&Value::Int(12)));
        assert_eq!(v.get("tags").and_then(Value::as_list).map(<[Value]>::len), Some(0));
        assert_eq!(v.get("inner").and_then(|t| t.get("n")), Some(&Value::Int(-3)));
    }

    #[test]
    fn unescapes_strings() {
        let v = parse(r#"{ d="a\\b\"c\nd\te" }"#).unwrap();
        assert_eq!(v.get("d").and_then(Value::as_str), Some("a\\b\"c\nd\te"));
    }

    #[test]
    fn rendered_output_reads_back() {
        let original = Value::table([
            ("name", Value::str("Fire \"ball\"\n2")),
            ("cost", Value::Int(-4)),
            ("scale", Value::Num(0.25)),
            ("actors", Value::List(vec![Value::str("Ash")])),
            (
                "formatting",
                Value::table([("title", Value::table([("size", Value::Int(18))]))]),
            ),
        ]);
        let text = original.render().unwrap();
        assert_eq!(parse(&text).unwrap(), original);
    }

    #[test]
    fn mixed_table_is_error() {
        let err = parse(r#"{ a=1, 2 }"#).unwrap_err();
        assert!(err.message.contains("mixes"));
    }

    #[test]
    fn error_reports_position() {
        let err = parse("{\n  a = @\n}").unwrap_err();
        assert_eq!((err.line, err.col), (2, 7));
    }

    #[test]
    fn unterminated_string_is_error() {
        assert!(parse(r#"{ a="open }"#).is_err());
    }

    #[test]
    fn unknown_escape_is_error() {
        let err = parse(r#"{ a="\q" }"#).unwrap_err();
        assert!(err.message.contains("unknown escape"));
    }

    #[test]
    fn trailing_content_is_error() {
        assert!(parse("{} {}").is_err());
    }

    #[test]
    fn duplicate_key_is_error() {
        assert!(parse("{ a=1, a=2 }").is_err());
    }
}
