//! Emitted modules executed by an embedded JavaScript engine against a
//! synchronous runtime shim (`support/runtime.js`), with every result
//! checked against the reference interpreter on the same tree.

use boa_engine::{Context, Source};
use fate_compiler::compiler::ast::{Node, Target, Tree};
use fate_compiler::compiler::build::*;
use fate_compiler::{compile, CompileOptions, Compiled, Interpreter};
use fate_core::{BinaryOp, Value};
use pretty_assertions::assert_eq;

const RUNTIME: &str = include_str!("support/runtime.js");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn compiled(body: Vec<Node>) -> Compiled {
    init_tracing();
    match compile(Tree::new(body), &CompileOptions::default()) {
        Ok(c) => c,
        Err(err) => panic!("compile failed: {}", err),
    }
}

/// JSON has no `undefined` and its objects are unordered, so both sides
/// are compared with `nothing` as `null` and object keys sorted.
fn normalize(v: Value) -> Value {
    match v {
        Value::Nothing => Value::Null,
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(entries) => {
            let mut entries: Vec<_> = entries.into_iter().map(|(k, v)| (k, normalize(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries)
        }
        other => other,
    }
}

fn from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as J;
    normalize(match json {
        J::Null => Value::Null,
        J::Bool(b) => Value::Bool(*b),
        J::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        J::String(s) => Value::String(s.clone()),
        J::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        J::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), from_json(v))).collect()),
    })
}

struct Run {
    result: Value,
    exports: Value,
}

/// Evaluate the module function with the shim as `$r`.
fn execute(module: &str) -> Run {
    let program = format!(
        "(function () {{\n\
         const $r = {runtime};\n\
         const exports = {{}};\n\
         const result = {module}($r)({{}}, exports);\n\
         return JSON.stringify({{ result: result === undefined ? null : result, exports: exports }});\n\
         }})()",
        runtime = RUNTIME,
        module = module,
    );
    let mut context = Context::default();
    let value = match context.eval(Source::from_bytes(&program)) {
        Ok(v) => v,
        Err(err) => panic!("module threw: {}\n{}", err, module),
    };
    let Some(json) = value.as_string().map(|s| s.to_std_string_escaped()) else {
        panic!("module produced no JSON\n{}", module);
    };
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    Run { result: from_json(&parsed["result"]), exports: from_json(&parsed["exports"]) }
}

fn interpret(c: &Compiled) -> Run {
    let mut interp = Interpreter::new(&c.annotations);
    let result = interp.run(&c.tree.root).unwrap();
    let exports = interp
        .exports()
        .iter()
        .map(|(name, v)| (name.clone(), v.as_value().cloned().unwrap_or(Value::Nothing)))
        .collect();
    Run {
        result: normalize(result.as_value().cloned().unwrap_or(Value::Nothing)),
        exports: normalize(Value::Object(exports)),
    }
}

/// Run the emitted module and the interpreter; they must agree. Returns
/// the module's value.
fn agree(body: Vec<Node>) -> Value {
    let c = compiled(body);
    let expected = interpret(&c);
    let actual = execute(&c.module.text);
    assert_eq!(actual.result, expected.result, "{}", c.module.text);
    assert_eq!(actual.exports, expected.exports, "{}", c.module.text);
    actual.result
}

fn strs(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::from(*s)).collect())
}

fn nums(items: &[f64]) -> Value {
    Value::Array(items.iter().map(|n| Value::Number(*n)).collect())
}

#[test]
fn guarded_call_adds_its_arguments() {
    let body = vec![
        func(
            "f",
            vec![typed_param("a", ident("Integer")), param("b")],
            vec![ret(binary(BinaryOp::Add, ident("a"), ident("b")))],
        ),
        ret(call(ident("f"), vec![num(3.0), num(4.0)])),
    ];
    assert_eq!(agree(body), Value::Number(7.0));
}

#[test]
fn one_sided_writes_merge_in_both_directions() {
    for (flag, expected) in [(true, 2.0), (false, 1.0)] {
        let body = vec![
            let_("flag", bool_(flag)),
            let_("x", num(1.0)),
            if_(ident("flag"), vec![assign("x", num(2.0))], vec![]),
            ret(ident("x")),
        ];
        assert_eq!(agree(body), Value::Number(expected));
    }
}

#[test]
fn nested_branches_merge_at_every_level() {
    let cases = [(true, true, [1.0, 0.0]), (true, false, [2.0, 5.0]), (false, true, [0.0, 9.0])];
    for (a, b, expected) in cases {
        let body = vec![
            let_("a", bool_(a)),
            let_("b", bool_(b)),
            let_("x", num(0.0)),
            let_("y", num(0.0)),
            if_(
                ident("a"),
                vec![if_(
                    ident("b"),
                    vec![assign("x", num(1.0))],
                    vec![assign("x", num(2.0)), assign("y", num(5.0))],
                )],
                vec![assign("y", num(9.0))],
            ),
            ret(array(vec![ident("x"), ident("y")])),
        ];
        assert_eq!(agree(body), nums(&expected));
    }
}

#[test]
fn overloads_fall_back_through_shadowed_definitions() {
    let kind = |guard: Option<&str>, label: &str| {
        let p = match guard {
            Some(t) => typed_param("v", ident(t)),
            None => param("v"),
        };
        func("kind", vec![p], vec![ret(str_(label))])
    };
    let body = vec![
        kind(None, "other"),
        kind(Some("Integer"), "int"),
        kind(Some("String"), "string"),
        ret(array(vec![
            call(ident("kind"), vec![str_("s")]),
            call(ident("kind"), vec![num(3.0)]),
            call(ident("kind"), vec![num(0.5)]),
        ])),
    ];
    assert_eq!(agree(body), strs(&["string", "int", "other"]));
}

#[test]
fn expression_guards_fall_back_to_the_previous_definition() {
    let n = || ident("n");
    let body = vec![
        func("size", vec![param("n")], vec![ret(str_("small"))]),
        guarded_func(
            "size",
            vec![param("n")],
            Some(binary(BinaryOp::Gt, n(), num(10.0))),
            vec![ret(str_("big"))],
        ),
        ret(array(vec![call(ident("size"), vec![num(50.0)]), call(ident("size"), vec![num(2.0)])])),
    ];
    assert_eq!(agree(body), strs(&["big", "small"]));
}

#[test]
fn reduce_carries_its_accumulator() {
    let xs = array(vec![num(1.0), num(2.0), num(3.0)]);
    let body = vec![
        let_(
            "total",
            reduce(
                vec![assign("sum", num(0.0))],
                vec![range("x", xs)],
                vec![assign("sum", binary(BinaryOp::Add, ident("sum"), ident("x")))],
            ),
        ),
        ret(ident("total")),
    ];
    assert_eq!(agree(body), Value::Number(6.0));
}

#[test]
fn guarded_ranges_enumerate_in_order() {
    let xs = || array(vec![num(1.0), num(2.0), num(3.0)]);
    let step = binary(BinaryOp::Add, binary(BinaryOp::Add, ident("s"), ident("i")), ident("j"));
    let body = vec![ret(reduce(
        vec![assign("s", str_(""))],
        vec![
            range("i", xs()),
            guarded_range("j", xs(), binary(BinaryOp::Neq, ident("i"), ident("j"))),
        ],
        vec![assign("s", step)],
    ))];
    assert_eq!(agree(body), Value::from("121321233132"));
}

#[test]
fn fused_loops_return_the_first_pair_in_order() {
    let xs = || array(vec![num(1.0), num(2.0), num(3.0), num(4.0)]);
    let (i, j) = (|| ident("i"), || ident("j"));
    let body = vec![
        for_(
            vec![range("i", xs())],
            vec![for_(
                vec![guarded_range("j", xs(), binary(BinaryOp::Neq, i(), j()))],
                vec![if_(
                    binary(BinaryOp::Eq, binary(BinaryOp::Add, i(), j()), num(5.0)),
                    vec![ret(array(vec![i(), j()]))],
                    vec![],
                )],
                vec![],
            )],
            vec![],
        ),
        ret(str_("none")),
    ];
    assert_eq!(agree(body), nums(&[1.0, 4.0]));
}

#[test]
fn for_else_runs_only_for_empty_collections() {
    for (items, expected) in [(vec![], 9.0), (vec![num(1.0)], 1.0)] {
        let body = vec![
            let_("x", num(1.0)),
            for_(vec![range("i", array(items))], vec![], vec![assign("x", num(9.0))]),
            ret(ident("x")),
        ];
        assert_eq!(agree(body), Value::Number(expected));
    }
}

#[test]
fn loop_writes_do_not_leak() {
    let body = vec![
        let_("x", num(1.0)),
        for_(vec![range("i", array(vec![num(5.0), num(6.0)]))], vec![assign("x", ident("i"))], vec![]),
        ret(ident("x")),
    ];
    assert_eq!(agree(body), Value::Number(1.0));
}

#[test]
fn objects_iterate_as_key_value_pairs() {
    let obj = object(vec![("a", num(1.0)), ("b", num(2.0))]);
    let step = binary(BinaryOp::Add, binary(BinaryOp::Add, ident("s"), ident("k")), ident("v"));
    let body = vec![ret(reduce(
        vec![assign("s", str_(""))],
        vec![range_to(Target::Array(vec!["k".into(), "v".into()]), obj, None)],
        vec![assign("s", step)],
    ))];
    assert_eq!(agree(body), Value::from("a1b2"));
}

#[test]
fn closures_see_the_merged_version() {
    let body = vec![
        let_("flag", bool_(true)),
        let_("x", num(1.0)),
        if_(ident("flag"), vec![assign("x", num(2.0))], vec![]),
        let_("g", lambda(vec![], ident("x"))),
        ret(call(ident("g"), vec![])),
    ];
    assert_eq!(agree(body), Value::Number(2.0));
}

#[test]
fn functions_defined_inside_loops() {
    let v = || ident("v");
    let body = vec![ret(reduce(
        vec![assign("total", num(0.0))],
        vec![range("x", array(vec![num(1.0), num(2.0), num(3.0)]))],
        vec![
            func("double", vec![param("v")], vec![ret(binary(BinaryOp::Mul, v(), num(2.0)))]),
            assign(
                "total",
                binary(BinaryOp::Add, ident("total"), call(ident("double"), vec![ident("x")])),
            ),
        ],
    ))];
    assert_eq!(agree(body), Value::Number(12.0));
}

#[test]
fn recursion_reaches_its_own_name() {
    let n = || ident("n");
    let fact = func(
        "fact",
        vec![param("n")],
        vec![
            if_(binary(BinaryOp::Lte, n(), num(1.0)), vec![ret(num(1.0))], vec![]),
            ret(binary(
                BinaryOp::Mul,
                n(),
                call(ident("fact"), vec![binary(BinaryOp::Sub, n(), num(1.0))]),
            )),
        ],
    );
    assert_eq!(agree(vec![fact, ret(call(ident("fact"), vec![num(5.0)]))]), Value::Number(120.0));
}

#[test]
fn variadic_parameters_collect_the_tail() {
    let body = vec![
        func(
            "count",
            vec![param("first"), variadic("rest")],
            vec![ret(member(ident("rest"), ident("length")))],
        ),
        ret(call(ident("count"), vec![num(1.0), num(2.0), num(3.0)])),
    ];
    assert_eq!(agree(body), Value::Number(2.0));
}

#[test]
fn expression_match_picks_the_clause_value() {
    for (subject, expected) in [(1.0, "one"), (5.0, "many")] {
        let m = match_(
            ident("v"),
            vec![clause(vec![num(1.0)], vec![expr_stmt(str_("one"))])],
            vec![expr_stmt(str_("many"))],
        );
        let body = vec![let_("v", num(subject)), ret(m)];
        assert_eq!(agree(body), Value::from(expected));
    }
}

#[test]
fn collection_patterns_bind_their_locals() {
    let adult = object_pattern(vec![
        ("name", str_("x")),
        ("age", binary(BinaryOp::Gte, context(), num(18.0))),
    ]);
    let pair = array_pattern(vec![num(1.0), ident("Integer")]);
    let classify = |subject: Node| {
        match_(
            subject,
            vec![
                clause(vec![adult.clone()], vec![expr_stmt(str_("adult"))]),
                clause(vec![pair.clone()], vec![expr_stmt(str_("pair"))]),
            ],
            vec![expr_stmt(str_("other"))],
        )
    };
    let body = vec![ret(array(vec![
        classify(object(vec![("name", str_("x")), ("age", num(30.0))])),
        classify(object(vec![("name", str_("x")), ("age", num(12.0))])),
        classify(array(vec![num(1.0), num(2.0)])),
        classify(array(vec![num(1.0), num(2.5)])),
        classify(array(vec![num(1.0), num(2.0), num(3.0)])),
    ]))];
    assert_eq!(agree(body), strs(&["adult", "other", "pair", "other", "other"]));
}

#[test]
fn and_or_yield_the_deciding_operand() {
    let body = vec![
        let_("zero", num(0.0)),
        let_("empty", str_("")),
        ret(array(vec![
            or(ident("zero"), str_("d")),
            and(ident("empty"), num(5.0)),
            and(ident("zero"), ident("empty")),
            or(ident("empty"), num(7.0)),
            not(ident("zero")),
        ])),
    ];
    assert_eq!(
        agree(body),
        Value::Array(vec![
            Value::from("d"),
            Value::Number(5.0),
            Value::Number(0.0),
            Value::from(""),
            Value::Bool(true),
        ])
    );
}

#[test]
fn number_text_matches_the_engine_folded_or_not() {
    let body = vec![
        let_("big", num(1e21)),
        let_("small", num(1e-7)),
        ret(array(vec![
            binary(BinaryOp::Add, str_("n="), ident("big")),
            binary(BinaryOp::Add, str_("n="), ident("small")),
            binary(BinaryOp::Add, str_("n="), num(1e21)),
            binary(BinaryOp::Add, str_("n="), num(123456789012345680000.0)),
        ])),
    ];
    assert_eq!(agree(body), strs(&["n=1e+21", "n=1e-7", "n=1e+21", "n=123456789012345680000"]));
}

#[test]
fn members_of_number_literals_are_parenthesized() {
    let body = vec![ret(array(vec![
        member(num(1.0), ident("x")),
        member(str_("abc"), ident("length")),
    ]))];
    let c = compiled(body.clone());
    assert!(c.module.text.contains("(1).x"), "{}", c.module.text);
    assert_eq!(agree(body), Value::Array(vec![Value::Null, Value::Number(3.0)]));
}

#[test]
fn regex_matching_honors_flags() {
    let body = vec![
        let_("s", str_("HELLO")),
        ret(array(vec![
            binary(BinaryOp::Like, ident("s"), regex("^hel", "i")),
            binary(BinaryOp::Like, ident("s"), regex("^hel", "")),
        ])),
    ];
    assert_eq!(agree(body), Value::Array(vec![Value::Bool(true), Value::Bool(false)]));
}

#[test]
fn exports_publish_current_versions() {
    let body = vec![
        let_("a", num(1.0)),
        assign("a", num(2.0)),
        export_items(vec![item_as("a", "b")]),
        export_decl(let_("c", str_("three"))),
    ];
    let c = compiled(body);
    let run = execute(&c.module.text);
    assert_eq!(run.exports, interpret(&c).exports);
    assert_eq!(
        run.exports,
        Value::Object(vec![("b".into(), Value::Number(2.0)), ("c".into(), Value::from("three"))])
    );
}
