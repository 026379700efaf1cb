use std::ops::RangeInclusive;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use tagel::errors::ElError;
use tagel::functions::{self, Function};
use tagel::{
    default_evaluator, ElContext, Evaluator, Interpreter, Registry, Scanner, WHOLE_TAG,
};

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct Simple {
        a: String => r#"eval:"upper(tags.arg)" arg:"tagel""#,
        b: String => r#"eval:"tags.arg" arg:"plain value""#,
        c: String => r#"eval:"extra.x""#,
        d: String => r#"eval:"root.c""#,
        e: String => r#"eval:"'eee'""#,
        untouched: String,
    }
}

#[test]
fn evaluates_string_fields_from_tags_extra_and_siblings() {
    let mut v = Simple {
        untouched: "left alone".into(),
        ..Simple::default()
    };
    let ev = default_evaluator(functions::Registry::with_builtins());
    ev.eval(&mut v, &json!({"x": "extra field X"})).unwrap();

    assert_eq!(v.a, "TAGEL");
    assert_eq!(v.b, "plain value");
    assert_eq!(v.c, "extra field X");
    // `root` reflects fields evaluated earlier in the walk.
    assert_eq!(v.d, "extra field X");
    assert_eq!(v.e, "eee");
    assert_eq!(v.untouched, "left alone");
}

struct Add;

impl Function for Add {
    fn name(&self) -> &'static str {
        "add"
    }
    fn arity(&self) -> RangeInclusive<usize> {
        2..=2
    }
    fn call(&self, args: &[Value]) -> Result<Value, ElError> {
        let (a, b) = (args[0].as_i64(), args[1].as_i64());
        match (a, b) {
            (Some(a), Some(b)) => Ok(Value::from(a + b)),
            _ => Err(ElError::Runtime("`add`: integers expected".into())),
        }
    }
}

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct Typed {
        a: String => r#"eval:"'40'""#,
        b: i64 => r#"eval:"add(atoi(root.a), atoi(tags.b))" b:"2""#,
        c: f64 => r#"eval:"root.b""#,
        d: Vec<String> => r#"eval:"split(tags.d, ' ')" d:"first second third""#,
        e: String => r#"eval:"unbase64(tags.e)" e:"dGVzdAo=""#,
        f: i64 => r#"eval:"42""#,
    }
}

#[test]
fn converts_results_into_field_types() {
    let mut v = Typed::default();
    let mut funcs = functions::Registry::with_builtins();
    funcs.register(Add);
    default_evaluator(funcs).eval(&mut v, &Value::Null).unwrap();

    assert_eq!(v.a, "40");
    assert_eq!(v.b, 42);
    assert_eq!(v.c, 42.0);
    assert_eq!(v.d, vec!["first", "second", "third"]);
    assert_eq!(v.e, "test\n");
    assert_eq!(v.f, 42);
}

// Character-counting interpreter, oblivious to its expression's meaning.
struct CharCount;

impl Interpreter for CharCount {
    fn execute(&self, expression: &str, _ctx: &ElContext) -> Result<Value, ElError> {
        Ok(Value::from(expression.chars().count() as i64))
    }
}

tagel::el_struct! {
    #[derive(Debug, Default)]
    struct Counted {
        a: i64 => r#"cc:"something""#,
    }
}

#[test]
fn custom_interpreter_selected_by_tag_key() {
    let ev = Evaluator::new(
        Scanner::default(),
        Registry::new().register("cc", CharCount),
    )
    .unwrap();
    let mut v = Counted::default();
    ev.eval(&mut v, &Value::Null).unwrap();
    assert_eq!(v.a, 9);
}

tagel::el_struct! {
    #[derive(Debug, Default)]
    struct WholeTagged {
        a: i64 => "this whole text is handed over verbatim",
    }
}

#[test]
fn whole_tag_interpreter_receives_raw_tag() {
    let ev = Evaluator::new(
        Scanner::default(),
        Registry::new().register(WHOLE_TAG, CharCount),
    )
    .unwrap();
    let mut v = WholeTagged::default();
    ev.eval(&mut v, &Value::Null).unwrap();
    assert_eq!(v.a, "this whole text is handed over verbatim".chars().count() as i64);
}

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct Zeroing {
        a: i64 => r#"eval:"null""#,
        b: String => r#"eval:"null""#,
    }
}

#[test]
fn null_result_zeroes_the_field() {
    let mut v = Zeroing { a: 99, b: "stale".into() };
    let ev = default_evaluator(functions::Registry::with_builtins());
    ev.eval(&mut v, &Value::Null).unwrap();
    assert_eq!(v, Zeroing { a: 0, b: String::new() });
}

tagel::el_struct! {
    #[derive(Debug, Default)]
    struct Delegating {
        a: String => r#"cc2:"delegated" expr:"upper('abc')""#,
    }
}

// Interpreter that delegates its tag's `expr` to the default one.
struct Delegate;

impl Interpreter for Delegate {
    fn execute(&self, _expression: &str, ctx: &ElContext) -> Result<Value, ElError> {
        let nested = ctx
            .tags
            .get("expr")
            .cloned()
            .ok_or_else(|| ElError::Runtime("no expr tag".into()))?;
        ctx.eval_with("eval", &nested)
    }
}

#[test]
fn one_interpreter_invokes_another_through_the_context() {
    let ev = Evaluator::new(
        Scanner::default(),
        Registry::new()
            .register("cc2", Delegate)
            .register("eval", tagel::expr::ExprInterpreter::with_builtins()),
    )
    .unwrap();
    let mut v = Delegating::default();
    ev.eval(&mut v, &Value::Null).unwrap();
    assert_eq!(v.a, "ABC");
}
