//! Key-value scanner for field tags and short property-like texts.
//!
//! Compared to the conventional single-line `key:"value"` syntax, the grammar
//! here is relaxed: values may span lines, separators, quotes and the escape
//! character are configurable, and anything that fits no token class is
//! skipped as noise. Conventional tags remain parseable unchanged.

use std::collections::BTreeMap;
use std::io::Read;

use tracing::trace;

use crate::errors::ScanError;

/// Scanned key-value pairs. Duplicate keys keep the last occurrence.
pub type TagMap = BTreeMap<String, String>;

/// Tokenizer for tag strings, driven by a character-class state machine.
#[derive(Debug, Clone)]
pub struct Scanner {
    separators: Vec<char>,
    quotes: Vec<char>,
    escape: char,
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new(&[':', '='], &['"', '\'', '`'], '\\')
    }
}

/// Why the scanner currently expects a value token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    /// Not expecting a value; keys and noise may follow.
    No,
    /// A key was just consumed; cancelled by any whitespace.
    AfterKey,
    /// A separator was consumed; sticky across whitespace so values may
    /// start on a later line.
    AfterSeparator,
}

impl Scanner {
    pub fn new(separators: &[char], quotes: &[char], escape: char) -> Self {
        Scanner {
            separators: separators.to_vec(),
            quotes: quotes.to_vec(),
            escape,
        }
    }

    /// Scan a raw field tag. Conventional `key:"value" key2:"value2"` tags
    /// satisfy the relaxed grammar, so this doubles as the struct-tag entry
    /// point.
    pub fn tags(&self, raw: &str) -> Result<TagMap, ScanError> {
        self.scan_chars(&raw.chars().collect::<Vec<_>>())
    }

    /// Scan a property-file-like stream with the same grammar.
    pub fn scan_reader<R: Read>(&self, mut reader: R) -> Result<TagMap, ScanError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.tags(&text)
    }

    fn scan_chars(&self, input: &[char]) -> Result<TagMap, ScanError> {
        let mut pairs = TagMap::new();
        let mut pending_key: Option<String> = None;
        let mut wait = Wait::No;
        let mut i = 0;

        while i < input.len() {
            let c = input[i];
            if c.is_whitespace() {
                while i < input.len() && input[i].is_whitespace() {
                    i += 1;
                }
                // An implicit expectation set by a bare key does not survive
                // whitespace; an explicit separator does.
                if wait == Wait::AfterKey {
                    wait = Wait::No;
                }
            } else if self.separators.contains(&c) {
                while i < input.len() && self.separators.contains(&input[i]) {
                    i += 1;
                }
                wait = Wait::AfterSeparator;
            } else if wait != Wait::No {
                let value = if self.quotes.contains(&c) {
                    i += 1;
                    match self.quoted_value(input, &mut i, c) {
                        Some(v) => v,
                        None => {
                            return Err(ScanError::UnterminatedQuote {
                                quote: c,
                                partial: pairs,
                            })
                        }
                    }
                } else {
                    self.line_value(input, &mut i)
                };
                if let Some(key) = pending_key.take() {
                    trace!(%key, %value, "pair");
                    pairs.insert(key, value);
                }
                // A value with no pending key is dropped silently.
                wait = Wait::No;
            } else if is_key_char(c) {
                let start = i;
                while i < input.len() && is_key_char(input[i]) {
                    i += 1;
                }
                pending_key = Some(input[start..i].iter().collect());
                wait = Wait::AfterKey;
            } else {
                // Noise: a run of non-whitespace that fits no other class.
                while i < input.len() && !input[i].is_whitespace() {
                    i += 1;
                }
            }
        }
        Ok(pairs)
    }

    /// Consume until the matching quote. Escaped characters are taken
    /// literally, the quote and the escape character included. Returns None
    /// when the input ends before the quote closes.
    fn quoted_value(&self, input: &[char], i: &mut usize, quote: char) -> Option<String> {
        let mut out = String::new();
        while *i < input.len() {
            let c = input[*i];
            *i += 1;
            if c == self.escape {
                if *i >= input.len() {
                    return None;
                }
                out.push(input[*i]);
                *i += 1;
            } else if c == quote {
                return Some(out);
            } else {
                out.push(c);
            }
        }
        None
    }

    /// Consume an unquoted value up to end of line. An escaped newline is
    /// taken literally, letting values continue on the next line.
    fn line_value(&self, input: &[char], i: &mut usize) -> String {
        let mut out = String::new();
        while *i < input.len() {
            let c = input[*i];
            if c == self.escape {
                *i += 1;
                if *i < input.len() {
                    out.push(input[*i]);
                    *i += 1;
                }
                continue;
            }
            if c == '\n' || c == '\r' {
                break;
            }
            out.push(c);
            *i += 1;
        }
        out
    }
}

/// Letters, digits, underscore, dollar and hyphen form keys.
fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}
