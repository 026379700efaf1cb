use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use tagel::functions;
use tagel::{default_evaluator, ElContext, ElError, Evaluator, Interpreter, Options, Registry, Scanner};

tagel::el_struct! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Words {
        first: String => r#"eval:"match(sub, '([a-z]+) [a-z]+ [a-z]+', 1)""#,
        second: String => r#"eval:"match(sub, '[a-z]+ ([a-z]+) [a-z]+', 1)""#,
        third: String => r#"eval:"match(sub, '[a-z]+ [a-z]+ ([a-z]+)', 1)""#,
    }
}

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct Extraction {
        // The tag's own result is a plain string, not convertible into
        // `Words`; the members pick it apart through their `sub` context.
        words: Words => r#"eval:"tags.src" src:"first second third""#,
    }
}

#[test]
fn unconvertible_result_feeds_members_through_sub() {
    let mut v = Extraction::default();
    let ev = default_evaluator(functions::Registry::with_builtins());
    ev.eval(&mut v, &Value::Null).unwrap();
    assert_eq!(
        v.words,
        Words {
            first: "first".into(),
            second: "second".into(),
            third: "third".into(),
        }
    );
}

tagel::el_struct! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Indexed {
        w0: String => r#"eval:"sub.words[0]""#,
        w1: String => r#"eval:"sub.words[1]""#,
    }
}

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct SubSiblings {
        tapped: Indexed => r#"eval:"extra.blob""#,
        plain: Plain,
    }
}

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct Plain {
        probe: String => r#"eval:"or_default(sub, 'no sub seen')""#,
    }
}

#[test]
fn sub_is_not_leaked_to_sibling_fields() {
    let mut v = SubSiblings::default();
    let ev = default_evaluator(functions::Registry::with_builtins());
    ev.eval(&mut v, &json!({"blob": {"words": ["a", "b"]}}))
        .unwrap();
    assert_eq!(v.tapped.w0, "a");
    assert_eq!(v.tapped.w1, "b");
    // The sibling's members never see `tapped`'s partial result.
    assert_eq!(v.plain.probe, "no sub seen");
}

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct ConvertibleStruct {
        target: Plain2 => r#"eval:"extra.preset""#,
    }
}

tagel::el_struct! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Plain2 {
        probe: String,
    }
}

#[test]
fn convertible_result_is_stored_into_the_struct_field() {
    let mut v = ConvertibleStruct::default();
    let ev = default_evaluator(functions::Registry::with_builtins());
    ev.eval(&mut v, &json!({"preset": {"probe": "stored whole"}}))
        .unwrap();
    assert_eq!(v.target.probe, "stored whole");
}

// Counts executions and echoes the expression back as the result.
struct Counting(Arc<AtomicUsize>);

impl Interpreter for Counting {
    fn execute(&self, expression: &str, _ctx: &ElContext) -> Result<Value, ElError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Value::String(expression.to_string()))
    }
}

tagel::el_struct! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Observed {
        a: String => r#"count:"first field""#,
        b: String => r#"count:"second field""#,
    }
}

#[test]
fn non_mutating_mode_runs_interpreters_without_writing() {
    let executions = Arc::new(AtomicUsize::new(0));
    let ev = Evaluator::with_options(
        Scanner::default(),
        Registry::new().register("count", Counting(Arc::clone(&executions))),
        Options {
            non_mutating: true,
            ..Options::default()
        },
    )
    .unwrap();

    let mut v = Observed {
        a: "original a".into(),
        b: "original b".into(),
    };
    let before = v.clone();
    ev.eval(&mut v, &Value::Null).unwrap();

    // Interpreters ran, the structure did not change.
    assert_eq!(executions.load(Ordering::SeqCst), 2);
    assert_eq!(v, before);
}

#[test]
fn mutating_mode_writes_the_same_fields() {
    let executions = Arc::new(AtomicUsize::new(0));
    let ev = Evaluator::new(
        Scanner::default(),
        Registry::new().register("count", Counting(executions)),
    )
    .unwrap();
    let mut v = Observed::default();
    ev.eval(&mut v, &Value::Null).unwrap();
    assert_eq!(v.a, "first field");
    assert_eq!(v.b, "second field");
}

tagel::el_struct! {
    #[derive(Debug, Default, PartialEq)]
    struct EmptyTagged {
        a: String => r#"count:"""#,
        b: String,
    }
}

#[test]
fn empty_expressions_are_skipped_unless_opted_in() {
    let executions = Arc::new(AtomicUsize::new(0));
    let ev = Evaluator::new(
        Scanner::default(),
        Registry::new().register("count", Counting(Arc::clone(&executions))),
    )
    .unwrap();
    let mut v = EmptyTagged::default();
    ev.eval(&mut v, &Value::Null).unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    assert_eq!(v, EmptyTagged::default());

    let ev = Evaluator::with_options(
        Scanner::default(),
        Registry::new().register("count", Counting(Arc::clone(&executions))),
        Options {
            eval_empty_tags: true,
            ..Options::default()
        },
    )
    .unwrap();
    ev.eval(&mut v, &Value::Null).unwrap();
    // Only `a` has a matching tag key; `b` has no tag at all and no
    // whole-tag interpreter is registered.
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(v.a, "");
}
