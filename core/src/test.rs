//! Tests for the Sigil Preprocessor.
// Copyright (C) 2024  Frankie Baffa
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use {
    crate::{
        context::Context,
        dialect::{
            DialectSpec,
            DialectTable,
            PatternSpec,
        },
        engine::{
            Engine,
            InclusionRule,
            Options,
        },
        error::{
            Error,
            Result,
        },
        eval::evaluate,
        file::FileSystem,
    },
    std::{
        collections::HashMap,
        fs::read_to_string,
        path::{
            Path,
            PathBuf,
        },
        sync::Arc,
    },
    serde_json::{
        json,
        Value as JsonValue,
    },
};

fn process(text: &str, ctx: &Context, tag: &str) -> String {
    Engine::new().process(text, ctx, tag, &Options::default()).unwrap()
}

fn world_ctx() -> Context {
    let mut ctx = Context::new();
    ctx.set("name", "World");
    ctx
}

// a dialect in the @@directive(...) style to exercise externally
// supplied tables
fn at_table() -> DialectTable {
    let mut table = DialectTable::builtin();
    table.insert("txt", DialectSpec {
        include: Some(PatternSpec::Ready(r"(.*)@@include\('([^']*)'\)".to_owned())),
        echo: Some(PatternSpec::Ready(r"@@echo\(([^\n)]*)\)".to_owned())),
        ..DialectSpec::default()
    }).unwrap();
    table
}

#[test]
fn eval_empty_is_true() {
    let ctx = Context::new();
    assert!(evaluate("", &ctx.flatten()).unwrap());
    assert!(evaluate("   ", &ctx.flatten()).unwrap());
}

#[test]
fn eval_single_equals_reads_as_equality() {
    let mut ctx = Context::new();
    ctx.set("env", "prod");
    ctx.set("n", 3);
    let flat = ctx.flatten();

    assert!(evaluate("env = 'prod'", &flat).unwrap());
    assert!(evaluate("env == 'prod'", &flat).unwrap());
    assert!(evaluate("n = 3", &flat).unwrap());
    assert!(!evaluate("env = 'dev'", &flat).unwrap());
}

#[test]
fn eval_inequality_survives_normalization() {
    let mut ctx = Context::new();
    ctx.set("n", 3);
    let flat = ctx.flatten();

    assert!(evaluate("n != 4", &flat).unwrap());
    assert!(evaluate("n <= 3", &flat).unwrap());
    assert!(evaluate("n >= 3", &flat).unwrap());
    assert!(evaluate("n < 4", &flat).unwrap());
    assert!(evaluate("n > 2", &flat).unwrap());
}

#[test]
fn eval_negation_complements() {
    let mut ctx = Context::new();
    ctx.set("a", 1);
    ctx.set("s", "x");
    let flat = ctx.flatten();

    for expr in ["a", "missing", "a = 1", "s = 'y'", "a && s", "a || missing"] {
        let plain = evaluate(expr, &flat).unwrap();
        let negated = evaluate(format!("!({expr})"), &flat).unwrap();
        assert_eq!(plain, !negated, "expression {expr:?}");
    }
}

#[test]
fn eval_dotted_paths_resolve() {
    let mut ctx = Context::new();
    ctx.set("nested", json!({ "b": { "c": 5 } }));
    let flat = ctx.flatten();

    assert!(evaluate("nested.b.c = 5", &flat).unwrap());
    assert!(evaluate("nested.b.c >= 5", &flat).unwrap());
    assert!(!evaluate("nested.b.missing", &flat).unwrap());
}

#[test]
fn eval_loose_numeric_comparison() {
    let mut ctx = Context::new();
    ctx.set("n", "5");
    ctx.set("on", true);
    let flat = ctx.flatten();

    assert!(evaluate("n = 5", &flat).unwrap());
    assert!(evaluate("n > 4", &flat).unwrap());
    assert!(evaluate("on = 1", &flat).unwrap());
    assert!(evaluate("on == true", &flat).unwrap());
}

#[test]
fn eval_groups_and_chains() {
    let mut ctx = Context::new();
    ctx.set("a", 1);
    ctx.set("s", "x");
    let flat = ctx.flatten();

    assert!(evaluate("(a = 1) && !(s = 'y')", &flat).unwrap());
    assert!(evaluate("missing || s", &flat).unwrap());
    assert!(!evaluate("a && missing", &flat).unwrap());
}

#[test]
fn eval_malformed_is_an_error() {
    let ctx = Context::new();
    let flat = ctx.flatten();

    assert!(matches!(evaluate("a ==", &flat), Err(Error::Evaluation(..))));
    assert!(matches!(evaluate("((a)", &flat), Err(Error::Evaluation(..))));
    assert!(matches!(evaluate("a b", &flat), Err(Error::Evaluation(..))));
}

#[test]
fn eval_mixed_relational_is_an_error() {
    let mut ctx = Context::new();
    ctx.set("a", 1);
    ctx.set("s", "x");
    let flat = ctx.flatten();

    assert!(matches!(evaluate("s > a", &flat), Err(Error::Evaluation(..))));
}

#[test]
fn flatten_1() {
    let mut ctx = Context::new();
    ctx.set("a", json!({ "b": 1 }));
    let flat = ctx.flatten();

    assert!(flat.get("a").unwrap().is_object());
    assert_eq!(&json!(1), flat.get("a.b").unwrap());
}

#[test]
fn flatten_intermediate_prefixes() {
    let mut ctx = Context::new();
    ctx.set("a", json!({ "b": { "c": "deep" } }));
    let flat = ctx.flatten();

    assert!(flat.contains("a"));
    assert!(flat.contains("a.b"));
    assert_eq!(&json!("deep"), flat.get("a.b.c").unwrap());
}

#[test]
fn idempotent_on_resolved_text() {
    let text = "plain <b>html</b> text\nwith nothing to resolve";
    assert_eq!(text, process(text, &Context::new(), "html"));
}

#[test]
fn echo_1() {
    let engine = Engine::with_dialects(at_table());
    let out = engine
        .process("Hello @@echo(name)!", &world_ctx(), "txt", &Options::default())
        .unwrap();
    assert_eq!("Hello World!", out);
}

#[test]
fn unknown_tag_falls_back_to_html() {
    assert_eq!(
        "World",
        process("<!-- @echo name -->", &world_ctx(), "weird")
    );
}

#[test]
fn echo_variable_and_literal() {
    let mut ctx = world_ctx();
    ctx.set("literal", "other");

    assert_eq!("World", process("<!-- @echo name -->", &ctx, "html"));
    assert_eq!("literal", process("<!-- @echo 'literal' -->", &ctx, "html"));
    assert_eq!("literal", process("<!-- @echo \"literal\" -->", &ctx, "html"));
}

#[test]
fn echo_missing_renders_empty() {
    assert_eq!("[]", process("[<!-- @echo ghost -->]", &Context::new(), "html"));
}

#[test]
fn echo_dotted_path() {
    let mut ctx = Context::new();
    ctx.set("site", json!({ "title": "T" }));
    assert_eq!("T", process("<!-- @echo site.title -->", &ctx, "html"));
}

#[test]
fn ifdef_keeps_falsy_values() {
    let mut ctx = Context::new();
    ctx.set("flag", false);

    assert_eq!(
        "A\nYES\nB",
        process("A\n<!-- @ifdef flag -->\nYES\n<!-- @endif -->\nB", &ctx, "html")
    );
}

#[test]
fn ifdef_ifndef_complement() {
    let defined = {
        let mut ctx = Context::new();
        ctx.set("flag", "on");
        ctx
    };
    let undefined = Context::new();

    let ifdef = "<!-- @ifdef flag -->BODY<!-- @endif -->";
    let ifndef = "<!-- @ifndef flag -->BODY<!-- @endif -->";

    assert_eq!("BODY", process(ifdef, &defined, "html"));
    assert_eq!("", process(ifndef, &defined, "html"));
    assert_eq!("", process(ifdef, &undefined, "html"));
    assert_eq!("BODY", process(ifndef, &undefined, "html"));
}

#[test]
fn exclude_1() {
    let text = "keep\n<!-- @exclude env='prod' -->\nsecret\n<!-- @endexclude -->\ntail";

    let mut prod = Context::new();
    prod.set("env", "prod");
    assert_eq!("keep\ntail", process(text, &prod, "html"));

    let mut dev = Context::new();
    dev.set("env", "dev");
    assert_eq!("keep\nsecret\ntail", process(text, &dev, "html"));
}

#[test]
fn if_1() {
    let text = "<!-- @if count > 2 -->MANY<!-- @endif -->";

    let mut many = Context::new();
    many.set("count", 5);
    assert_eq!("MANY", process(text, &many, "html"));

    let mut few = Context::new();
    few.set("count", 1);
    assert_eq!("", process(text, &few, "html"));
}

#[test]
fn malformed_test_expression_propagates() {
    let mut ctx = Context::new();
    ctx.set("a", 1);

    let err = Engine::new()
        .process("<!-- @if a && -->X<!-- @endif -->", &ctx, "html", &Options::default())
        .unwrap_err();
    assert!(matches!(err, Error::Evaluation(..)));
}

// same-kind nesting policy: one left-to-right pass, lazy bodies, so an
// outer opener pairs with the first closer and remainders pass through
#[test]
fn nested_same_kind_pairs_leftmost_shortest() {
    let text = "<!-- @if outer -->\nA\n<!-- @if inner -->\nB\n<!-- @endif -->\nC\n<!-- @endif -->";

    let mut on = Context::new();
    on.set("outer", 1);
    on.set("inner", 1);
    assert_eq!(
        "A\n<!-- @if inner -->\nB\nC\n<!-- @endif -->",
        process(text, &on, "html")
    );

    let off = Context::new();
    assert_eq!("C\n<!-- @endif -->", process(text, &off, "html"));
}

#[test]
fn exec_1() {
    let mut ctx = Context::new();
    ctx.set("name", "Grace");
    ctx.set_macro("greet", Arc::new(|params: &[JsonValue]| {
        let names = params.iter()
            .map(|p| p.as_str().unwrap_or_default().to_owned())
            .collect::<Vec<String>>();
        format!("Hello {}!", names.join(", "))
    }));

    assert_eq!(
        "Hello Ada, Grace!",
        process("<!-- @exec greet('Ada', name) -->", &ctx, "html")
    );
    // an unresolvable token passes through as raw text
    assert_eq!(
        "Hello someone!",
        process("<!-- @exec greet(someone) -->", &ctx, "html")
    );
}

#[test]
fn exec_missing_function_resolves_empty() {
    assert_eq!("", process("<!-- @exec nope(1, 2) -->", &Context::new(), "html"));
}

#[test]
fn include_indent_1() {
    let engine = Engine::with_dialects(at_table());
    let mut ctx = Context::new();
    ctx.set("srcDir", "test/include/at");

    let out = engine
        .process("  @@include('x.html')", &ctx, "txt", &Options::default())
        .unwrap();
    assert_eq!("  L1\n  L2", out);
}

#[test]
fn include_missing_marks_inline() {
    let engine = Engine::with_dialects(at_table());
    let mut ctx = Context::new();
    ctx.set("srcDir", "test/include/at");

    let out = engine
        .process("@@include('missing.html')", &ctx, "txt", &Options::default())
        .unwrap();
    assert!(out.starts_with('/'));
    assert!(out.ends_with("missing.html not found"));
}

#[test]
fn include_file_1() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    Engine::new()
        .process_file("test/include/1/page.html", &dest, &Context::new(), &Options::default())
        .unwrap();

    assert_eq!(
        "<div>\n  <p>One</p>\n  <p>Two</p>\n</div>",
        read_to_string(&dest).unwrap()
    );
}

#[test]
fn include_empty_leaves_no_blank_line() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    Engine::new()
        .process_file("test/include/empty/page.html", &dest, &Context::new(), &Options::default())
        .unwrap();

    assert_eq!("A\nB", read_to_string(&dest).unwrap());
}

#[test]
fn include_nested_indents_every_level() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    let mut ctx = Context::new();
    ctx.set("item", "X");

    Engine::new()
        .process_file("test/include/nested/outer.html", &dest, &ctx, &Options::default())
        .unwrap();

    assert_eq!(
        "<ul>\n  <li>X</li>\n  <li>last</li>\n</ul>",
        read_to_string(&dest).unwrap()
    );
}

#[test]
fn include_cycle_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    let err = Engine::new()
        .process_file("test/include/cycle/a.html", &dest, &Context::new(), &Options::default())
        .unwrap_err();
    assert!(matches!(err, Error::Circular(_)));
}

#[test]
fn ignore_include_skips_the_pass() {
    let engine = Engine::with_dialects(at_table());
    let mut ctx = Context::new();
    ctx.set("srcDir", "test/include/at");

    let options = Options {
        ignore_include: true,
        ..Options::default()
    };
    let out = engine.process("@@include('x.html')", &ctx, "txt", &options).unwrap();
    assert_eq!("@@include('x.html')", out);
}

struct MapFs(HashMap<PathBuf, String>);

impl FileSystem for MapFs {
    fn exists(&self, path: &Path) -> bool {
        self.0.contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<String> {
        match self.0.get(path) {
            Some(text) => Ok(text.clone()),
            None => Err(Error::IO(
                std::io::Error::from(std::io::ErrorKind::NotFound),
                path.into(),
            )),
        }
    }

    fn write(&self, _path: &Path, _contents: &str) -> Result<()> {
        Ok(())
    }
}

#[test]
fn filesystem_capability_swaps() {
    let mut files = HashMap::new();
    files.insert(
        PathBuf::from("/virtual/inner.html"),
        "<!-- @echo name -->".to_owned(),
    );

    let engine = Engine::new().with_filesystem(Arc::new(MapFs(files)));
    let mut ctx = world_ctx();
    ctx.set("srcDir", "/virtual");

    let out = engine
        .process("<!-- @include inner.html -->", &ctx, "html", &Options::default())
        .unwrap();
    assert_eq!("World", out);
}

#[test]
fn inclusion_processor_runs_on_includes() {
    let mut ctx = Context::new();
    ctx.set("srcDir", "test/include/1");

    let options = Options {
        inclusion_processor: Some(Arc::new(|body: &str, path: &std::path::Path, _cwd: &std::path::Path| {
            format!("{}<!-- via {} -->", body, path.file_name().unwrap().to_str().unwrap())
        })),
        ..Options::default()
    };

    let out = Engine::new()
        .process("  <!-- @include partial.html -->", &ctx, "html", &options)
        .unwrap();
    assert!(out.contains("via partial.html"));
}

#[test]
fn context_read_in_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctx.json");
    std::fs::write(&path, r#"{ "name": "File", "extra": 1 }"#).unwrap();

    let mut ctx = world_ctx();
    ctx.read_in(&path).unwrap();
    assert_eq!(Some(&json!("File")), ctx.get("name"));
    assert_eq!(Some(&json!(1)), ctx.get("extra"));
}

fn component_ctx(base: &str) -> Context {
    let mut ctx = Context::new();
    ctx.set("componentBase", base);
    ctx
}

#[test]
fn component_1() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    Engine::new()
        .process_file(
            "test/component/site/page.html",
            &dest,
            &component_ctx("test/component/site/widgets"),
            &Options::default(),
        )
        .unwrap();

    assert_eq!(
        "<main>\n  <div class=\"card\">Hello</div>  <div class=\"card\">Hello</div>\n</main>",
        read_to_string(&dest).unwrap()
    );
}

#[test]
fn component_without_base_is_skipped() {
    let text = "<!-- @component x -->";
    assert_eq!(text, process(text, &Context::new(), "html"));
}

#[test]
fn component_missing_marks_inline() {
    let out = process(
        "<!-- @component ghost -->",
        &component_ctx("test/component/loop"),
        "html",
    );
    assert!(out.ends_with("ghost.html not found"));
}

#[test]
fn component_loop_counts() {
    let ctx = component_ctx("test/component/loop");

    assert_eq!(
        "XXX",
        process(r#"<!-- @component x data-context='{"@loop": 3}' -->"#, &ctx, "html")
    );
    assert_eq!(
        "",
        process(r#"<!-- @component x data-context='{"@loop": 0}' -->"#, &ctx, "html")
    );
    // a non-numeric count means a single copy
    assert_eq!(
        "X",
        process(r#"<!-- @component x data-context='{"@loop": "lots"}' -->"#, &ctx, "html")
    );
}

#[test]
fn component_if_gate() {
    let unset = component_ctx("test/component/loop");
    let mut set = component_ctx("test/component/loop");
    set.set("flag", "on");

    let gated = r#"<!-- @component x data-context='{"@if": "flag"}' -->"#;
    assert_eq!("<!-- x if-excluded: flag -->", process(gated, &unset, "html"));
    assert_eq!("X", process(gated, &set, "html"));

    let negated = r#"<!-- @component x data-context='{"@if": "!flag"}' -->"#;
    assert_eq!("X", process(negated, &unset, "html"));
    assert_eq!("<!-- x if-excluded: !flag -->", process(negated, &set, "html"));
}

#[test]
fn component_context_stays_with_siblings() {
    let text = "<!-- @component a data-context='{\"secret\": \"S\"}' -->\n<!-- @component b -->";
    let out = process(text, &component_ctx("test/component/iso"), "html");
    assert_eq!("AS\nB", out);
}

#[test]
fn inclusion_processor_runs_on_components() {
    let options = Options {
        inclusion_processor: Some(Arc::new(|body: &str, path: &std::path::Path, _cwd: &std::path::Path| {
            format!("{}<!-- via {} -->", body, path.file_name().unwrap().to_str().unwrap())
        })),
        ..Options::default()
    };

    let out = Engine::new()
        .process("<!-- @component x -->", &component_ctx("test/component/loop"), "html", &options)
        .unwrap();
    assert_eq!("X<!-- via x.html -->", out);
}

#[test]
fn component_read_only_verification_accepts() {
    let options = Options {
        inclusion_rule: InclusionRule::ReadOnly,
        read_only_verify: Some(Arc::new(|text: &str| text.contains("@approved"))),
        ..Options::default()
    };

    let text = "<!-- @component ok -->";
    let out = Engine::new()
        .process(text, &component_ctx("test/component/ro"), "html", &options)
        .unwrap();
    assert_eq!(text, out);
}

#[test]
fn component_read_only_verification_rejects() {
    let options = Options {
        inclusion_rule: InclusionRule::ReadOnly,
        read_only_verify: Some(Arc::new(|text: &str| text.contains("@approved"))),
        ..Options::default()
    };

    let err = Engine::new()
        .process("<!-- @component bad -->", &component_ctx("test/component/ro"), "html", &options)
        .unwrap_err();
    assert!(matches!(err, Error::Verification(_)));
}

#[test]
fn component_read_only_verification_covers_nested_content() {
    let options = Options {
        inclusion_rule: InclusionRule::ReadOnly,
        read_only_verify: Some(Arc::new(|text: &str| text.contains("@approved"))),
        ..Options::default()
    };

    // nest.html itself is approved but pulls in an unapproved component
    let err = Engine::new()
        .process("<!-- @component nest -->", &component_ctx("test/component/ro"), "html", &options)
        .unwrap_err();
    assert!(matches!(err, Error::Verification(_)));
}

#[test]
fn unresolved_tokens_strip_at_outermost() {
    let ctx = Context::new();
    assert_eq!("A  B", process("A {{leftover}} B", &ctx, "html"));

    let options = Options {
        keep_unresolved_tokens: true,
        ..Options::default()
    };
    let out = Engine::new()
        .process("A {{leftover}} B", &ctx, "html", &options)
        .unwrap();
    assert_eq!("A {{leftover}} B", out);
}

#[test]
fn finalize_replaces_the_result() {
    let options = Options {
        finalize: Some(Arc::new(|out: String| format!("<!-- banner -->\n{out}"))),
        ..Options::default()
    };

    let out = Engine::new()
        .process("body", &Context::new(), "html", &options)
        .unwrap();
    assert_eq!("<!-- banner -->\nbody", out);
}

#[test]
fn dialect_table_from_json() {
    let table = DialectTable::from_json(
        r#"{ "ini": { "echo": ";@echo ([^\\n;]*);" } }"#
    ).unwrap();
    let engine = Engine::with_dialects(table);

    let out = engine.process(";@echo name;", &world_ctx(), "ini", &Options::default()).unwrap();
    assert_eq!("World", out);
}

#[test]
fn dialect_table_bad_pattern_is_an_error() {
    let err = DialectTable::from_json(
        r#"{ "ini": { "echo": "(unclosed" } }"#
    ).unwrap_err();
    assert!(matches!(err, Error::Pattern(..)));
}

#[test]
fn absent_directive_skips_the_pass() {
    // the js dialect defines no component pattern, so the directive
    // survives even with a component base in context
    let text = "<!-- @component x -->";
    let out = process(text, &component_ctx("test/component/loop"), "js");
    assert_eq!(text, out);
}

#[test]
fn js_dialect_block_comments() {
    assert_eq!(
        "var v = World;",
        process("var v = /* @echo name */;", &world_ctx(), "js")
    );
}

#[test]
fn process_file_1() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    let mut ctx = Context::new();
    ctx.set("greeting", "Hi");

    Engine::new()
        .process_file("test/file/src.html", &dest, &ctx, &Options::default())
        .unwrap();
    assert_eq!("Hi, world", read_to_string(&dest).unwrap());
}

#[test]
fn process_file_with_completes() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    let mut ctx = Context::new();
    ctx.set("greeting", "Hi");

    let mut outcome = None;
    Engine::new().process_file_with("test/file/src.html", &dest, &ctx, |r| {
        outcome = Some(r);
    });
    assert!(matches!(outcome, Some(Ok(()))));
    assert_eq!("Hi, world", read_to_string(&dest).unwrap());
}

#[test]
fn process_file_with_surfaces_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.html");

    let mut outcome = None;
    Engine::new().process_file_with("test/file/nope.html", &dest, &Context::new(), |r| {
        outcome = Some(r);
    });
    assert!(matches!(outcome, Some(Err(Error::IO(..)))));
}

#[test]
fn context_from_env_captures_variables() {
    std::env::set_var("SIGIL_TEST_VAR", "present");
    let ctx = Context::from_env();
    assert_eq!(Some(&json!("present")), ctx.get("SIGIL_TEST_VAR"));
}

#[test]
fn context_read_rejects_non_objects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctx.json");
    std::fs::write(&path, "[1, 2]").unwrap();

    assert!(matches!(Context::read(&path), Err(Error::NotAMap(_))));
}
