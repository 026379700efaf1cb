//! Default expression interpreter: a small function-call language over the
//! evaluation context.
//!
//! Expressions are literals, context references with selectors, or nested
//! function calls:
//!
//! ```text
//! upper(tags.arg)
//! split(extra.csv, ',')
//! sub[0]
//! eval('other', tags.expr)
//! ```
//!
//! `eval(name, expression)` is the indirect-evaluation form: both arguments
//! are evaluated to strings and dispatched through another registered
//! interpreter.

use serde_json::Value;

use crate::context::ElContext;
use crate::errors::ElError;
use crate::functions::Registry;
use crate::interp::Interpreter;
use crate::parser::Cursor;

#[derive(Debug, Clone)]
enum Node {
    Literal(Value),
    Ref {
        base: Base,
        selectors: Vec<Selector>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Base {
    Val,
    Name,
    LongName,
    Tags,
    Root,
    Extra,
    Sub,
}

#[derive(Debug, Clone)]
enum Selector {
    Key(String),
    Index(i64),
}

/// Interpreter over the function-call expression language, dispatching to a
/// pluggable [`Registry`] of functions.
pub struct ExprInterpreter {
    funcs: Registry,
}

impl ExprInterpreter {
    pub fn new(funcs: Registry) -> Self {
        ExprInterpreter { funcs }
    }

    pub fn with_builtins() -> Self {
        ExprInterpreter::new(Registry::with_builtins())
    }
}

impl Interpreter for ExprInterpreter {
    fn execute(&self, expression: &str, ctx: &ElContext) -> Result<Value, ElError> {
        let node = parse(expression)?;
        self.eval_node(&node, ctx)
    }
}

fn parse(input: &str) -> Result<Node, ElError> {
    let mut cursor = Cursor::new(input);
    let node = parse_node(&mut cursor)?;
    cursor.skip_ws();
    if !cursor.eof() {
        return Err(ElError::Parse("trailing input".into()));
    }
    Ok(node)
}

fn parse_node(cursor: &mut Cursor) -> Result<Node, ElError> {
    cursor.skip_ws();
    match cursor.peek() {
        Some('\'' | '"') => Ok(Node::Literal(Value::String(cursor.quoted()?))),
        Some(c) if c == '-' || c.is_ascii_digit() => Ok(Node::Literal(cursor.number()?)),
        _ => {
            let name = cursor.ident()?;
            match name {
                "true" => return Ok(Node::Literal(Value::Bool(true))),
                "false" => return Ok(Node::Literal(Value::Bool(false))),
                "null" => return Ok(Node::Literal(Value::Null)),
                _ => {}
            }
            if cursor.eat('(') {
                let args = parse_args(cursor)?;
                cursor.expect(')')?;
                return Ok(Node::Call {
                    name: name.to_string(),
                    args,
                });
            }
            let base = match name {
                "val" => Base::Val,
                "name" => Base::Name,
                "long_name" => Base::LongName,
                "tags" => Base::Tags,
                "root" => Base::Root,
                "extra" => Base::Extra,
                "sub" => Base::Sub,
                other => {
                    return Err(ElError::Parse(format!(
                        "`{other}` is neither a context reference nor a call"
                    )))
                }
            };
            Ok(Node::Ref {
                base,
                selectors: parse_selectors(cursor)?,
            })
        }
    }
}

fn parse_args(cursor: &mut Cursor) -> Result<Vec<Node>, ElError> {
    let mut args = Vec::new();
    cursor.skip_ws();
    if cursor.peek() == Some(')') {
        return Ok(args);
    }
    loop {
        args.push(parse_node(cursor)?);
        cursor.skip_ws();
        if !cursor.eat(',') {
            break;
        }
    }
    Ok(args)
}

fn parse_selectors(cursor: &mut Cursor) -> Result<Vec<Selector>, ElError> {
    let mut selectors = Vec::new();
    loop {
        if cursor.eat('.') {
            selectors.push(Selector::Key(cursor.ident()?.to_string()));
        } else if cursor.eat('[') {
            cursor.skip_ws();
            let selector = match cursor.peek() {
                Some('\'' | '"') => Selector::Key(cursor.quoted()?),
                _ => match cursor.number()? {
                    Value::Number(n) => Selector::Index(n.as_i64().ok_or_else(|| {
                        ElError::Parse("integer index expected".into())
                    })?),
                    _ => return Err(ElError::Parse("integer index expected".into())),
                },
            };
            cursor.skip_ws();
            cursor.expect(']')?;
            selectors.push(selector);
        } else {
            return Ok(selectors);
        }
    }
}

impl ExprInterpreter {
    fn eval_node(&self, node: &Node, ctx: &ElContext) -> Result<Value, ElError> {
        match node {
            Node::Literal(v) => Ok(v.clone()),
            Node::Ref { base, selectors } => Ok(resolve(*base, selectors, ctx)),
            Node::Call { name, args } if name == "eval" => {
                if args.len() != 2 {
                    return Err(ElError::Runtime("eval takes (interpreter, expression)".into()));
                }
                let interpreter = self.string_arg(&args[0], ctx)?;
                let expression = self.string_arg(&args[1], ctx)?;
                ctx.eval_with(&interpreter, &expression)
            }
            Node::Call { name, args } => {
                let func = self
                    .funcs
                    .get(name)
                    .ok_or_else(|| ElError::Runtime(format!("unknown function `{name}`")))?;
                if !func.arity().contains(&args.len()) {
                    return Err(ElError::Runtime(format!(
                        "`{name}` expects {:?} argument(s), got {}",
                        func.arity(),
                        args.len()
                    )));
                }
                let values = args
                    .iter()
                    .map(|arg| self.eval_node(arg, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                func.call(&values)
            }
        }
    }

    fn string_arg(&self, node: &Node, ctx: &ElContext) -> Result<String, ElError> {
        match self.eval_node(node, ctx)? {
            Value::String(s) => Ok(s),
            other => Err(ElError::Runtime(format!("string expected, got {other}"))),
        }
    }
}

/// Selector misses resolve to null rather than erroring, so expressions can
/// probe optional context parts.
fn resolve(base: Base, selectors: &[Selector], ctx: &ElContext) -> Value {
    let mut current = match base {
        Base::Val => ctx.val.clone(),
        Base::Name => Value::String(ctx.name.to_string()),
        Base::LongName => Value::String(ctx.long_name.to_string()),
        Base::Tags => serde_json::to_value(&ctx.tags).unwrap_or(Value::Null),
        Base::Root => ctx.root.clone(),
        Base::Extra => ctx.extra.clone(),
        Base::Sub => ctx.sub.cloned().unwrap_or(Value::Null),
    };
    for selector in selectors {
        current = match selector {
            Selector::Key(key) => current.get(key).cloned().unwrap_or(Value::Null),
            Selector::Index(i) => {
                let index = if *i < 0 {
                    current
                        .as_array()
                        .map_or(*i, |a| a.len() as i64 + *i)
                } else {
                    *i
                };
                usize::try_from(index)
                    .ok()
                    .and_then(|idx| current.get(idx).cloned())
                    .unwrap_or(Value::Null)
            }
        };
    }
    current
}
