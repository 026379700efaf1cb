//! Evaluation context handed to interpreters, one per field visit.

use serde_json::Value;

use crate::errors::ElError;
use crate::interp::Registry;
use crate::scanner::TagMap;

/// Everything an interpreter may look at while evaluating one field.
/// Created fresh per field; nothing survives the enclosing `eval()` call.
pub struct ElContext<'a> {
    /// Short name of the field being evaluated.
    pub name: &'a str,
    /// Fully qualified path (`Type.field.sub[0]`), used in error messages
    /// and as an opaque identity string.
    pub long_name: &'a str,
    /// The field's value before evaluation.
    pub val: Value,
    /// Other tags on the field, the selected key removed.
    pub tags: TagMap,
    /// Snapshot of the structure under evaluation as of this field visit;
    /// fields evaluated earlier in the walk are already reflected.
    pub root: Value,
    /// Caller-supplied auxiliary value.
    pub extra: &'a Value,
    /// Partial result computed on the enclosing field's expression, present
    /// only while evaluating the members of a struct that the result could
    /// not be converted into.
    pub sub: Option<&'a Value>,
    registry: &'a Registry,
}

impl<'a> ElContext<'a> {
    /// A blank context bound to `registry`; fields are public, fill in what
    /// the evaluation needs.
    pub fn new(registry: &'a Registry, extra: &'a Value) -> Self {
        ElContext {
            name: "",
            long_name: "",
            val: Value::Null,
            tags: TagMap::new(),
            root: Value::Null,
            extra,
            sub: None,
            registry,
        }
    }

    /// Indirect evaluation: run `expression` with another registered
    /// interpreter against this same context. Lets one expression language
    /// delegate to another.
    pub fn eval_with(&self, interpreter: &str, expression: &str) -> Result<Value, ElError> {
        let interp = self
            .registry
            .get(interpreter)
            .ok_or_else(|| ElError::UnknownInterpreter(interpreter.to_string()))?;
        interp.execute(expression, self)
    }
}
