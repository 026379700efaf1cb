//! The recursive structure walker.
//!
//! The walk pairs a type's [`Schema`] with a shadow `serde_json::Value`
//! snapshot of the target, addressing fields by path steps. Evaluated
//! results are written into the shadow; the typed struct is refreshed from
//! it once the walk ends. Per-field failures are collected, never
//! short-circuited.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;
use tracing::trace;

use crate::context::ElContext;
use crate::errors::{Fault, FieldError};
use crate::interp::Selection;
use crate::schema::{FieldSchema, Schema, StructSchema};
use crate::Evaluator;

/// One step into the shadow tree.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Key(String),
    Index(usize),
}

pub(crate) fn value_at<'v>(root: &'v Value, path: &[Step]) -> Option<&'v Value> {
    let mut current = root;
    for step in path {
        current = match step {
            Step::Key(key) => current.get(key.as_str())?,
            Step::Index(i) => current.get(*i)?,
        };
    }
    Some(current)
}

pub(crate) fn value_at_mut<'v>(root: &'v mut Value, path: &[Step]) -> Option<&'v mut Value> {
    let mut current = root;
    for step in path {
        current = match step {
            Step::Key(key) => current.get_mut(key.as_str())?,
            Step::Index(i) => current.get_mut(*i)?,
        };
    }
    Some(current)
}

/// State of one `eval()` call.
pub(crate) struct Walk<'w> {
    pub ev: &'w Evaluator,
    pub shadow: Value,
    pub extra: Value,
    pub errors: Vec<FieldError>,
}

impl Walk<'_> {
    pub fn run(&mut self, schema: &StructSchema) {
        let mut path = Vec::new();
        self.walk_struct(schema, &mut path, schema.type_name, None);
    }

    /// Scan each member's tag, pick its interpreter and process it. `sub` is
    /// the enclosing field's unconverted result, visible to these members
    /// only; it is never forwarded further down.
    fn walk_struct(
        &mut self,
        schema: &StructSchema,
        path: &mut Vec<Step>,
        long_name: &str,
        sub: Option<&Value>,
    ) {
        for field in &schema.fields {
            let field_name = format!("{long_name}.{}", field.name);
            let tags = match self.ev.scanner.tags(field.tag) {
                Ok(tags) => tags,
                Err(e) => {
                    self.fail(field_name, Fault::Scan(e));
                    continue;
                }
            };
            let selection = self.ev.registry.select(field.tag, tags);
            path.push(Step::Key(field.name.to_string()));
            self.walk_field(field, selection, path, &field_name, sub);
            path.pop();
        }
    }

    fn walk_field(
        &mut self,
        field: &FieldSchema,
        selection: Selection,
        path: &mut Vec<Step>,
        long_name: &str,
        sub: Option<&Value>,
    ) {
        let evaluate = !selection.expression.is_empty() || self.ev.options.eval_empty_tags;
        let Some(interpreter) = selection.interpreter.filter(|_| evaluate) else {
            // No expression to run here, but composite fields are still
            // traversed so nested expressions are discovered.
            self.descend(&field.schema, path, long_name, None);
            return;
        };

        trace!(field = long_name, expression = %selection.expression, "evaluate");
        let outcome = {
            let mut ctx = ElContext::new(&self.ev.registry, &self.extra);
            ctx.name = field.name;
            ctx.long_name = long_name;
            ctx.val = value_at(&self.shadow, path).cloned().unwrap_or(Value::Null);
            ctx.tags = selection.rest;
            ctx.root = self.shadow.clone();
            ctx.sub = sub;
            catch_unwind(AssertUnwindSafe(|| {
                interpreter.execute(&selection.expression, &ctx)
            }))
        };
        let result = match outcome {
            Err(panic) => {
                self.fail(long_name.into(), Fault::Panic(panic_message(panic.as_ref())));
                return;
            }
            Ok(Err(e)) => {
                self.fail(long_name.into(), Fault::Interpreter(e));
                return;
            }
            Ok(Ok(result)) => result,
        };

        if result.is_null() {
            self.write(path, (field.zero)());
            self.descend(&field.schema, path, long_name, None);
            return;
        }
        let stored = match catch_unwind(AssertUnwindSafe(|| (field.store)(result.clone()))) {
            Ok(stored) => stored,
            Err(panic) => {
                self.fail(long_name.into(), Fault::Panic(panic_message(panic.as_ref())));
                return;
            }
        };
        match stored {
            // Composite fields are traversed even after a successful store,
            // so expressions nested under them still run.
            Ok(normalized) => {
                self.write(path, normalized);
                self.descend(&field.schema, path, long_name, None);
            }
            Err(detail) => match field.schema.as_struct() {
                // The result does not convert, but the field is a struct:
                // expose the result to the struct's own members as `sub` and
                // let their expressions take it apart.
                Some(inner) => {
                    if value_at(&self.shadow, path).map_or(true, Value::is_null) {
                        self.fail(long_name.into(), Fault::EmptyOptional);
                        return;
                    }
                    self.walk_struct(inner, path, long_name, Some(&result));
                }
                None => self.fail(long_name.into(), Fault::Convert(detail)),
            },
        }
    }

    /// Kind-directed recursion for fields that were not stored directly.
    fn descend(&mut self, schema: &Schema, path: &mut Vec<Step>, long_name: &str, sub: Option<&Value>) {
        match schema {
            Schema::Struct(inner) => self.walk_struct(inner, path, long_name, sub),
            Schema::Optional(inner) => {
                if value_at(&self.shadow, path).is_some_and(|v| !v.is_null()) {
                    self.descend(inner, path, long_name, sub);
                }
            }
            Schema::Seq(element) => {
                let len = value_at(&self.shadow, path)
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                for i in 0..len {
                    let element_name = format!("{long_name}[{i}]");
                    path.push(Step::Index(i));
                    self.descend(element, path, &element_name, None);
                    path.pop();
                }
            }
            Schema::Map(element) => {
                let keys: Vec<String> = value_at(&self.shadow, path)
                    .and_then(Value::as_object)
                    .map(|object| object.keys().cloned().collect())
                    .unwrap_or_default();
                for key in keys {
                    let element_name = format!("{long_name}[{key}]");
                    path.push(Step::Key(key));
                    self.descend(element, path, &element_name, None);
                    path.pop();
                }
            }
            Schema::Leaf(_) => {}
        }
    }

    fn write(&mut self, path: &[Step], value: Value) {
        if self.ev.options.non_mutating {
            return;
        }
        if let Some(slot) = value_at_mut(&mut self.shadow, path) {
            *slot = value;
        }
    }

    fn fail(&mut self, path: String, fault: Fault) {
        self.errors.push(FieldError { path, fault });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
