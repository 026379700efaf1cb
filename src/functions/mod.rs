//! Pluggable functions for the default expression interpreter.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::ElError;

/// One function callable from expressions.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> RangeInclusive<usize>;
    fn call(&self, args: &[Value]) -> Result<Value, ElError>;
}

/// Thread-safe function registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(builtins::Upper);
        registry.register(builtins::Lower);
        registry.register(builtins::Trim);
        registry.register(builtins::Split);
        registry.register(builtins::Fields);
        registry.register(builtins::Join);
        registry.register(builtins::First);
        registry.register(builtins::Unique);
        registry.register(builtins::Len);
        registry.register(builtins::Atoi);
        registry.register(builtins::Match);
        registry.register(builtins::Unbase64);
        registry.register(builtins::OrDefault);
        registry
    }

    /// Custom functions with the same name replace built-in ones.
    pub fn register<F: Function + 'static>(&mut self, function: F) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(function.name(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }
}

fn str_arg<'a>(args: &'a [Value], i: usize, name: &str) -> Result<&'a str, ElError> {
    args.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| ElError::Runtime(format!("`{name}`: argument {i} must be a string")))
}

pub mod builtins {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use itertools::Itertools;

    use super::*;

    pub struct Upper;
    impl Function for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            Ok(match &args[0] {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other.clone(),
            })
        }
    }

    pub struct Lower;
    impl Function for Lower {
        fn name(&self) -> &'static str {
            "lower"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            Ok(match &args[0] {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other.clone(),
            })
        }
    }

    pub struct Trim;
    impl Function for Trim {
        fn name(&self) -> &'static str {
            "trim"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            Ok(Value::String(str_arg(args, 0, "trim")?.trim().to_string()))
        }
    }

    pub struct Split;
    impl Function for Split {
        fn name(&self) -> &'static str {
            "split"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            2..=2
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            let text = str_arg(args, 0, "split")?;
            let separator = str_arg(args, 1, "split")?;
            Ok(Value::Array(
                text.split(separator)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        }
    }

    /// Whitespace-separated words.
    pub struct Fields;
    impl Function for Fields {
        fn name(&self) -> &'static str {
            "fields"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            Ok(Value::Array(
                str_arg(args, 0, "fields")?
                    .split_whitespace()
                    .map(|word| Value::String(word.to_string()))
                    .collect(),
            ))
        }
    }

    pub struct Join;
    impl Function for Join {
        fn name(&self) -> &'static str {
            "join"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            2..=2
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            let parts = args[0]
                .as_array()
                .ok_or_else(|| ElError::Runtime("`join`: argument 0 must be an array".into()))?;
            let separator = str_arg(args, 1, "join")?;
            let joined = parts
                .iter()
                .map(|part| match part {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .join(separator);
            Ok(Value::String(joined))
        }
    }

    pub struct First;
    impl Function for First {
        fn name(&self) -> &'static str {
            "first"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            Ok(match &args[0] {
                Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            })
        }
    }

    pub struct Unique;
    impl Function for Unique {
        fn name(&self) -> &'static str {
            "unique"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            Ok(match &args[0] {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .cloned()
                        .unique_by(|item| serde_json::to_string(item).unwrap_or_default())
                        .collect(),
                ),
                other => other.clone(),
            })
        }
    }

    pub struct Len;
    impl Function for Len {
        fn name(&self) -> &'static str {
            "len"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(ElError::Runtime(format!("`len`: no length for {other}")))
                }
            };
            Ok(Value::from(len))
        }
    }

    pub struct Atoi;
    impl Function for Atoi {
        fn name(&self) -> &'static str {
            "atoi"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            let text = str_arg(args, 0, "atoi")?;
            text.trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| ElError::Runtime(format!("`atoi`: {e}")))
        }
    }

    /// `match(text, pattern, group)`: first capture group match, or
    /// `match(text, pattern)`: whole first match.
    pub struct Match;
    impl Function for Match {
        fn name(&self) -> &'static str {
            "match"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            2..=3
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            let text = str_arg(args, 0, "match")?;
            let pattern = str_arg(args, 1, "match")?;
            let group = match args.get(2) {
                Some(v) => v
                    .as_u64()
                    .ok_or_else(|| ElError::Runtime("`match`: group must be an integer".into()))?
                    as usize,
                None => 0,
            };
            let re = regex::Regex::new(pattern)
                .map_err(|e| ElError::Runtime(format!("`match`: {e}")))?;
            let captures = re
                .captures(text)
                .ok_or_else(|| ElError::Runtime(format!("`match`: no match for `{pattern}`")))?;
            let matched = captures
                .get(group)
                .ok_or_else(|| ElError::Runtime(format!("`match`: no capture group {group}")))?;
            Ok(Value::String(matched.as_str().to_string()))
        }
    }

    pub struct Unbase64;
    impl Function for Unbase64 {
        fn name(&self) -> &'static str {
            "unbase64"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            1..=1
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            let bytes = STANDARD
                .decode(str_arg(args, 0, "unbase64")?)
                .map_err(|e| ElError::Runtime(format!("`unbase64`: {e}")))?;
            String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|e| ElError::Runtime(format!("`unbase64`: {e}")))
        }
    }

    /// Null or empty-array falls back to the second argument parsed as JSON
    /// (or kept as a plain string when it is not valid JSON).
    pub struct OrDefault;
    impl Function for OrDefault {
        fn name(&self) -> &'static str {
            "or_default"
        }
        fn arity(&self) -> RangeInclusive<usize> {
            2..=2
        }
        fn call(&self, args: &[Value]) -> Result<Value, ElError> {
            let fallback = match &args[1] {
                Value::String(text) => serde_json::from_str(text)
                    .unwrap_or_else(|_| Value::String(text.clone())),
                other => other.clone(),
            };
            Ok(match &args[0] {
                Value::Null => fallback,
                Value::Array(items) if items.is_empty() => fallback,
                kept => kept.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, ElError> {
        Registry::with_builtins()
            .get(name)
            .expect("builtin registered")
            .call(args)
    }

    #[test]
    fn string_helpers() {
        assert_eq!(call("upper", &[json!("abc")]).unwrap(), json!("ABC"));
        assert_eq!(call("trim", &[json!("  x ")]).unwrap(), json!("x"));
        assert_eq!(
            call("split", &[json!("a b c"), json!(" ")]).unwrap(),
            json!(["a", "b", "c"])
        );
        assert_eq!(
            call("fields", &[json!(" a \t b ")]).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            call("join", &[json!(["a", "b"]), json!("-")]).unwrap(),
            json!("a-b")
        );
    }

    #[test]
    fn collection_helpers() {
        assert_eq!(call("first", &[json!([10, 20])]).unwrap(), json!(10));
        assert_eq!(
            call("unique", &[json!([1, 1, 2, 2, 3])]).unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(call("len", &[json!("abcd")]).unwrap(), json!(4));
        assert_eq!(
            call("or_default", &[json!(null), json!("{\"x\":1}")]).unwrap(),
            json!({"x": 1})
        );
    }

    #[test]
    fn decoding_helpers() {
        assert_eq!(call("atoi", &[json!(" 42 ")]).unwrap(), json!(42));
        assert_eq!(
            call("match", &[json!("v1.2.3"), json!(r"v(\d+)\.(\d+)"), json!(2)]).unwrap(),
            json!("2")
        );
        assert_eq!(call("unbase64", &[json!("dGVzdAo=")]).unwrap(), json!("test\n"));
        assert!(call("atoi", &[json!("forty")]).is_err());
        assert!(call("match", &[json!("abc"), json!("(")]).is_err());
    }

    #[test]
    fn custom_function_replaces_builtin() {
        struct Shout;
        impl Function for Shout {
            fn name(&self) -> &'static str {
                "upper"
            }
            fn arity(&self) -> RangeInclusive<usize> {
                1..=1
            }
            fn call(&self, _args: &[Value]) -> Result<Value, ElError> {
                Ok(json!("!!!"))
            }
        }
        let mut registry = Registry::with_builtins();
        registry.register(Shout);
        assert_eq!(
            registry.get("upper").unwrap().call(&[json!("x")]).unwrap(),
            json!("!!!")
        );
    }
}
