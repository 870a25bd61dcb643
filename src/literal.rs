//! Structured literal reading and writing.
//!
//! Nested survey values (for example `{'response': 'White', 'key': 'race'}`)
//! are stored in the preprocessed CSVs as single-quoted literals. This module
//! reads that literal subset (dicts, lists, tuples, strings, numbers,
//! `True`/`False`/`None`) into a [`serde_json::Value`] and writes values back
//! in the same notation. JSON input (`true`, `false`, `null`, double quotes) is
//! accepted as well. Nothing is ever evaluated.

use crate::error::{AnalysisError, Result};
use serde_json::{Map, Number, Value};

/// Deepest container nesting accepted, matching serde_json's recursion limit.
const MAX_DEPTH: usize = 128;

/// Parse a structured literal into a JSON value.
pub fn parse(input: &str) -> Result<Value> {
    let mut parser = Parser {
        src: input.as_bytes(),
        text: input,
        pos: 0,
        depth: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(parser.error("trailing characters after literal"));
    }
    Ok(value)
}

/// Render a value in literal notation (the inverse of [`parse`]).
pub fn to_literal(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

struct Parser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> AnalysisError {
        AnalysisError::Literal {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => self.nested(Self::parse_dict),
            Some(b'[') => self.nested(|p| p.parse_sequence(b'[', b']')),
            Some(b'(') => self.nested(|p| p.parse_sequence(b'(', b')')),
            Some(b'\'' | b'"') => Ok(Value::String(self.parse_string()?)),
            Some(b'-' | b'+' | b'.' | b'0'..=b'9') => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<Value>) -> Result<Value> {
        if self.depth == MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_dict(&mut self) -> Result<Value> {
        self.expect(b'{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = match self.parse_value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return Err(self.error("dict keys must be strings or numbers")),
            };
            self.expect(b':')?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_sequence(&mut self, open: u8, close: u8) -> Result<Value> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.parse_value()?);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.error(&format!("expected ',' or '{}'", close as char))),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self.src[self.pos];
        self.pos += 1;
        let mut out = String::new();

        loop {
            let text = self.text;
            let mut chars = text[self.pos..].chars();
            let c = chars.next().ok_or_else(|| self.error("unterminated string"))?;
            self.pos += c.len_utf8();

            match c {
                c if c as u32 == quote as u32 => return Ok(out),
                '\\' => {
                    let esc = chars
                        .next()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    self.pos += esc.len_utf8();
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' | '/' => out.push(esc),
                        'u' => out.push(self.parse_unicode_escape(4)?),
                        'x' => out.push(self.parse_unicode_escape(2)?),
                        other => {
                            // Unknown escapes are kept literally.
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn parse_unicode_escape(&mut self, digits: usize) -> Result<char> {
        let end = self.pos + digits;
        let hex = self
            .text
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated escape sequence"))?;
        let code =
            u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid escape sequence"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'_' | b'0'..=b'9')
        ) {
            self.pos += 1;
        }
        let raw: String = self.text[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        if let Ok(i) = raw.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| AnalysisError::Literal {
                offset: start,
                message: format!("invalid number {:?}", raw),
            })
    }

    fn parse_keyword(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        match &self.text[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            other => Err(AnalysisError::Literal {
                offset: start,
                message: format!("unsupported name {:?}", other),
            }),
        }
    }
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&format_number(n)),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

/// Integers print bare, floats always keep a fractional part.
pub fn format_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e16 => format!("{:.1}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn write_string(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_survey_dict() {
        let value = parse("{'response': 'White', 'key': 'race'}").unwrap();
        assert_eq!(value, json!({"response": "White", "key": "race"}));
    }

    #[test]
    fn test_parse_nested_and_keywords() {
        let value =
            parse("{'response': ['Asian', 'White'], 'key': 'race', 'other': None, 'ok': True}")
                .unwrap();
        assert_eq!(value["response"], json!(["Asian", "White"]));
        assert_eq!(value["other"], Value::Null);
        assert_eq!(value["ok"], Value::Bool(true));
    }

    #[test]
    fn test_parse_json_input() {
        let value = parse(r#"{"response": 2, "key": "latino", "flag": false}"#).unwrap();
        assert_eq!(value, json!({"response": 2, "key": "latino", "flag": false}));
    }

    #[test]
    fn test_parse_escapes_and_numbers() {
        let value = parse(r#"('it\'s', "say \"hi\"", -1.5, 3, 1e3)"#).unwrap();
        assert_eq!(value, json!(["it's", "say \"hi\"", -1.5, 3, 1000.0]));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("{'response': 'White'").is_err());
        assert!(parse("{'response' 'White'}").is_err());
        assert!(parse("'unterminated").is_err());
        assert!(parse("{'a': 1} extra").is_err());
        assert!(parse("__import__('os')").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let deep = format!("{}{}", "[".repeat(200_000), "]".repeat(200_000));
        let err = parse(&format!("{{'response': {}, 'key': 'race'}}", deep)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Literal { ref message, .. } if message == "nesting too deep"
        ));

        let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn test_to_literal_matches_stored_form() {
        let value = json!({"response": "Prefer not to say", "key": "race_other"});
        assert_eq!(
            to_literal(&value),
            "{'response': 'Prefer not to say', 'key': 'race_other'}"
        );
        assert_eq!(to_literal(&json!("it's")), "\"it's\"");
        assert_eq!(to_literal(&json!([1, 2.0, null, false])), "[1, 2.0, None, False]");
    }

    #[test]
    fn test_written_literal_reads_back() {
        let value = json!({"response": ["a\\b", "c'd"], "key": "k"});
        assert_eq!(parse(&to_literal(&value)).unwrap(), value);
    }
}
