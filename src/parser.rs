//! Character cursor shared by the default expression language.

use serde_json::Value;

use crate::errors::ElError;

pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    pub fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, expected: char) -> Result<(), ElError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(ElError::Parse(format!("expected `{expected}`")))
        }
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`
    pub fn ident(&mut self) -> Result<&'a str, ElError> {
        let start = self.pos;
        if let Some(c) = self.peek() {
            if c == '_' || c.is_ascii_alphabetic() {
                self.pos += 1;
                while let Some(c) = self.peek() {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
            }
        }
        if self.pos == start {
            return Err(ElError::Parse("identifier expected".into()));
        }
        Ok(&self.src[start..self.pos])
    }

    /// Integer or float, optional leading minus; integers stay integers.
    pub fn number(&mut self) -> Result<Value, ElError> {
        let start = self.pos;
        self.eat('-');
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut float = false;
        if self.peek() == Some('.') {
            float = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.src[start..self.pos];
        if text.is_empty() || text == "-" {
            return Err(ElError::Parse("number expected".into()));
        }
        if float {
            text.parse::<f64>()
                .map(Value::from)
                .map_err(|_| ElError::Parse(format!("bad float `{text}`")))
        } else {
            text.parse::<i64>()
                .map(Value::from)
                .map_err(|_| ElError::Parse(format!("bad integer `{text}`")))
        }
    }

    /// Single- or double-quoted string with conventional escapes; unknown
    /// escapes keep the backslash.
    pub fn quoted(&mut self) -> Result<String, ElError> {
        let quote = match self.peek() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(ElError::Parse("quoted string expected".into())),
        };
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            match self.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            }
        }
        Err(ElError::Parse("unterminated string".into()))
    }
}
