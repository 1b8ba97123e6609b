//! Diagnostics surfaced through `compile`, and compiler configuration.

use fate_compiler::compiler::ast::{Node, Resolver, Tree};
use fate_compiler::compiler::build::*;
use fate_compiler::compiler::span::Span;
use fate_compiler::config::{ConfigError, CONFIG_FILE};
use fate_compiler::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use fate_compiler::{compile, CompileError, CompileOptions};
use pretty_assertions::assert_eq;

fn errors(body: Vec<Node>) -> Vec<Diagnostic> {
    match compile(Tree::new(body), &CompileOptions::default()) {
        Err(CompileError::Diagnostics(errors)) => errors,
        Err(other) => panic!("unexpected failure: {}", other),
        Ok(c) => panic!("compiled unexpectedly:\n{}", c.module.text),
    }
}

fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
    diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn misspelled_reference_is_reported_with_a_suggestion() {
    let span = Span::new(21, 25, 2, 8);
    let errs = errors(vec![let_("total", num(0.0)), ret(ident("totl").with_span(span))]);
    assert_eq!(kinds(&errs), vec![DiagnosticKind::Declaration]);
    assert_eq!(errs[0].span, span);
    assert_eq!(errs[0].severity, Severity::Error);
    assert_eq!(errs[0].suggestions, vec!["did you mean 'total'?".to_string()]);

    let source = "let total = 0\nreturn totl";
    assert_eq!(
        errs[0].render_plain(source, "main.fate"),
        [
            "error[E0001]: 'totl' is used before it is declared",
            "  --> main.fate:2:8",
            "   |",
            "  2 | return totl",
            "   |        ^^^^",
            "   |",
            "   = help: did you mean 'total'?",
            "",
        ]
        .join("\n")
    );
}

#[test]
fn use_before_declaration_is_one_error() {
    let errs = errors(vec![ret(ident("later")), let_("later", num(1.0))]);
    assert_eq!(kinds(&errs), vec![DiagnosticKind::Declaration]);
    assert!(errs[0].message.contains("'later'"), "{}", errs[0].message);
}

#[test]
fn function_locals_stay_inside_the_function() {
    let errs = errors(vec![
        func("f", vec![param("a")], vec![let_("inner", ident("a")), ret(ident("inner"))]),
        ret(ident("inner")),
    ]);
    assert_eq!(kinds(&errs), vec![DiagnosticKind::Declaration]);
}

#[test]
fn placement_and_parameter_errors_are_collected_together() {
    let errs = errors(vec![
        let_("p", num(1.0)),
        let_("v", await_(Resolver::Value, ident("p"))),
        func("g", vec![variadic("rest"), param("x"), param("x")], vec![ret(ident("x"))]),
    ]);
    let mut found = kinds(&errs);
    found.sort_by_key(|k| k.code());
    assert_eq!(
        found,
        vec![DiagnosticKind::Usage, DiagnosticKind::Argument, DiagnosticKind::Argument]
    );
    assert!(errs.iter().any(|d| d.message.contains("inside a 'do' block")));
    assert!(errs.iter().any(|d| d.message.contains("duplicate parameter name 'x'")));
    assert!(errs.iter().any(|d| d.message.contains("must be the last parameter")));
}

#[test]
fn shadowing_warns_without_stopping_the_compile() {
    let compiled = compile(
        Tree::new(vec![
            func("f", vec![param("a")], vec![ret(num(0.0))]),
            func("f", vec![typed_param("a", ident("Number"))], vec![ret(num(1.0))]),
        ]),
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(kinds(&compiled.warnings), vec![DiagnosticKind::ShadowedFunction]);
    assert_eq!(compiled.warnings[0].kind.code(), "W0001");
    assert!(compiled.module.text.contains("return f.apply(this, arguments);"));
}

#[test]
fn config_table_drives_the_compile() {
    let options = CompileOptions::from_toml_str(
        r#"
        [compiler]
        passes = ["pattern", "validate"]
        globals = ["print"]
        inline-string-limit = 8
        strict-mode = false
        "#,
    )
    .unwrap();
    assert_eq!(options.indent, 2);

    let body = vec![expr_stmt(call(ident("print"), vec![str_("hello world")]))];
    let compiled = compile(Tree::new(body), &options).unwrap();
    let text = &compiled.module.text;
    assert!(!text.contains("use strict"), "{}", text);
    assert!(text.contains("const $print = $r.print;"), "{}", text);
    assert!(text.contains("const $l0 = \"hello world\";"), "{}", text);
    assert!(text.contains("$print($l0);"), "{}", text);
    assert_eq!(compiled.module.imports, vec!["print".to_string()]);
}

#[test]
fn unknown_pass_names_are_rejected() {
    let err = CompileOptions::from_toml_str("[compiler]\npasses = [\"inline\"]\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{}", err);
}

#[test]
fn config_file_is_found_in_an_ancestor() {
    let root = std::env::temp_dir().join(format!("fate-config-{}", std::process::id()));
    let nested = root.join("src").join("lib");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(root.join(CONFIG_FILE), "[compiler]\nindent = 4\n").unwrap();

    let found = CompileOptions::find_and_load(&nested).unwrap();
    std::fs::remove_dir_all(&root).unwrap();

    let (path, options) = found.expect("config not found");
    assert_eq!(path, root.join(CONFIG_FILE));
    assert_eq!(options.indent, 4);
    assert_eq!(options.passes, CompileOptions::default().passes);
}
