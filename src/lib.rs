//! Evaluate expression-language (EL) snippets attached to struct fields as
//! tags, using an optional extra value as additional context.
//!
//! Fields annotated through [`el_struct!`] carry small expressions; one
//! [`Evaluator::eval`] call walks the whole structure depth-first, runs each
//! field's expression with a per-field [`ElContext`] and writes the result
//! back into the field. Nested structs, sequences, maps and optionals are
//! traversed whether or not the containing field is annotated, so a single
//! call populates an entire object graph. Interpreters are pluggable; a
//! default function-call expression language ships in [`expr`].
//!
//! The walk snapshots values through serde, so this is intended for one-time
//! structure population (configuration assembly, extraction from
//! semi-structured sources) rather than hot paths.
//!
//! ```
//! use serde_json::Value;
//!
//! tagel::el_struct! {
//!     #[derive(Debug, Default)]
//!     struct Greeting {
//!         text: String => r#"eval:"upper(tags.arg)" arg:"hello""#,
//!     }
//! }
//!
//! let mut greeting = Greeting::default();
//! tagel::default_evaluator(tagel::functions::Registry::with_builtins())
//!     .eval(&mut greeting, &Value::Null)
//!     .unwrap();
//! assert_eq!(greeting.text, "HELLO");
//! ```

pub mod context;
mod engine;
pub mod errors;
pub mod expr;
pub mod functions;
pub mod interp;
mod parser;
pub mod scanner;
pub mod schema;

use serde::Serialize;
use tracing::debug;

pub use context::ElContext;
pub use errors::{ElError, Error, Fault, FieldError, FieldErrors, ScanError};
pub use interp::{Interpreter, InterpreterFn, Registry, WHOLE_TAG};
pub use scanner::{Scanner, TagMap};
pub use schema::Evaluable;

/// Independent evaluation switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Run interpreters for their side effects but never write results back.
    pub non_mutating: bool,
    /// Invoke the applicable interpreter even for fields without tag
    /// content, passing an empty expression.
    pub eval_empty_tags: bool,
}

/// Walks structures and evaluates their field tags. Construct once, reuse
/// across calls; no state survives a single [`eval`](Evaluator::eval).
pub struct Evaluator {
    pub(crate) scanner: Scanner,
    pub(crate) registry: Registry,
    pub(crate) options: Options,
}

impl Evaluator {
    pub fn new(scanner: Scanner, registry: Registry) -> Result<Self, Error> {
        Evaluator::with_options(scanner, registry, Options::default())
    }

    pub fn with_options(
        scanner: Scanner,
        registry: Registry,
        options: Options,
    ) -> Result<Self, Error> {
        if registry.is_empty() {
            return Err(Error::EmptyRegistry);
        }
        Ok(Evaluator {
            scanner,
            registry,
            options,
        })
    }

    /// Evaluate every tagged field of `target`, depth-first. `extra` is made
    /// available to all expressions of this call.
    ///
    /// Per-field failures do not stop the walk: every failure is reported in
    /// the aggregate [`Error::Fields`], and successfully evaluated fields
    /// keep their new values even when the call returns an error.
    pub fn eval<T, E>(&self, target: &mut T, extra: &E) -> Result<(), Error>
    where
        T: Evaluable,
        E: Serialize,
    {
        let schema = T::schema();
        let root = schema
            .as_struct()
            .ok_or(Error::NotAStruct {
                type_name: std::any::type_name::<T>(),
            })?;
        let shadow = serde_json::to_value(&*target).map_err(Error::Snapshot)?;
        if !shadow.is_object() {
            return Err(Error::NotAStruct {
                type_name: std::any::type_name::<T>(),
            });
        }
        let extra = serde_json::to_value(extra).map_err(Error::Snapshot)?;

        let mut walk = engine::Walk {
            ev: self,
            shadow,
            extra,
            errors: Vec::new(),
        };
        walk.run(root);
        debug!(
            type_name = root.type_name,
            failed = walk.errors.len(),
            "walk finished"
        );

        if !self.options.non_mutating {
            *target = serde_json::from_value(walk.shadow).map_err(Error::Writeback)?;
        }
        if walk.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Fields(FieldErrors(walk.errors)))
        }
    }
}

/// Evaluator wiring the `eval` tag key to the default expression
/// interpreter with the given functions.
pub fn default_evaluator(funcs: functions::Registry) -> Evaluator {
    Evaluator {
        scanner: Scanner::default(),
        registry: Registry::new().register("eval", expr::ExprInterpreter::new(funcs)),
        options: Options::default(),
    }
}
