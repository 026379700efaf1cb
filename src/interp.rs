//! The pluggable interpreter capability and its registry.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::context::ElContext;
use crate::errors::ElError;
use crate::scanner::TagMap;

/// Reserved registry name: when no tag key matches a registered interpreter,
/// the whole raw tag text is handed to the interpreter registered under this
/// name. Probed after every named interpreter.
pub const WHOLE_TAG: &str = "";

/// One expression-language interpreter. Implementations are strategy
/// objects; the evaluator treats them as black boxes.
pub trait Interpreter: Send + Sync {
    fn execute(&self, expression: &str, ctx: &ElContext) -> Result<Value, ElError>;
}

/// Adapter turning a closure into an [`Interpreter`].
pub struct InterpreterFn<F>(pub F);

impl<F> Interpreter for InterpreterFn<F>
where
    F: Fn(&str, &ElContext) -> Result<Value, ElError> + Send + Sync,
{
    fn execute(&self, expression: &str, ctx: &ElContext) -> Result<Value, ElError> {
        (self.0)(expression, ctx)
    }
}

/// Tag-key to interpreter mapping. Entries keep registration order, which is
/// also the probe order when several tag keys could match; the first
/// registered name found among the tag keys wins.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<(String, Arc<dyn Interpreter>)>,
}

/// The interpreter/expression pick for one field.
pub(crate) struct Selection {
    pub interpreter: Option<Arc<dyn Interpreter>>,
    pub expression: String,
    /// Tags left over after removing the selected key.
    pub rest: TagMap,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register<I: Interpreter + 'static>(mut self, name: impl Into<String>, interp: I) -> Self {
        self.entries.push((name.into(), Arc::new(interp)));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Interpreter>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, i)| Arc::clone(i))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match the field's parsed tags against registered names, falling back
    /// to the whole-tag interpreter with the raw tag text.
    pub(crate) fn select(&self, raw_tag: &str, mut tags: TagMap) -> Selection {
        for (name, interp) in &self.entries {
            if name == WHOLE_TAG {
                continue;
            }
            if let Some(expression) = tags.remove(name) {
                debug!(interpreter = %name, "tag key matched");
                return Selection {
                    interpreter: Some(Arc::clone(interp)),
                    expression,
                    rest: tags,
                };
            }
        }
        if let Some(interp) = self.get(WHOLE_TAG) {
            return Selection {
                interpreter: Some(interp),
                expression: raw_tag.to_string(),
                rest: tags,
            };
        }
        Selection {
            interpreter: None,
            expression: String::new(),
            rest: tags,
        }
    }
}
