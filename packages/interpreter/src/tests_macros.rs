/// Macro engine tests: re-entry, scoping, built-in macros and recursion
use crate::action::{Action, ActionRegistry, ActionValue};
use crate::actor::actor_ref;
use crate::error::{InterpretError, WarningKind};
use crate::loader::MemoryLoader;
use crate::pipeline::{Interpreter, RenderOutput};
use crate::state::ParserState;
use crate::test_support::*;
use crate::InterpretResult;
use std::rc::Rc;

fn strict(source: &str) -> InterpretResult<RenderOutput> {
    render(source, ParserState::new())
}

fn root_texts(source: &str, state: ParserState) -> Vec<String> {
    texts(&render(source, state).unwrap().roots)
}

fn with_actions() -> Interpreter {
    let mut actions = ActionRegistry::new();
    actions.register_action(Action::new("makePanel", |_| Ok(ActionValue::Actor(actor_ref(Panel::default())))));
    actions.register_action(Action::new("enabled", |_| Ok(true.into())));
    actions.register_action(Action::new("disabled", |_| Ok(false.into())));
    Interpreter::new(syntax()).with_actions(actions)
}

#[test]
fn test_unconditional_expansions_are_independent() {
    let mut syntax = syntax();
    syntax.register_macro_fn("once", |ctx| ctx.expand_body()).unwrap();
    let interpreter = Interpreter::new(syntax);

    let sources = [
        r#"<@macro name="box"><panel><label text="x"/></panel></@macro><@box/><@box/>"#,
        r#"<@once><panel><label text="x"/></panel></@once><@once><panel><label text="x"/></panel></@once>"#,
    ];
    for source in sources {
        let output = interpreter.render("t", source, ParserState::new()).unwrap();
        assert_eq!(output.roots.len(), 2);
        assert!(!Rc::ptr_eq(&output.roots[0], &output.roots[1]));
        assert_eq!(output.roots[0].borrow().snapshot(), output.roots[1].borrow().snapshot());

        let first = children_of(&output.roots[0]);
        let second = children_of(&output.roots[1]);
        assert!(!Rc::ptr_eq(&first[0], &second[0]));
    }
}

#[test]
fn test_loop_expands_k_times_and_restores_variable() {
    let source = r#"<@loop times="3"><label text="{index}"/></@loop><label text="{index}"/>"#;
    let state = ParserState::new().with_variable("index", "outer");
    assert_eq!(root_texts(source, state), vec!["0", "1", "2", "outer"]);

    let err = strict(r#"<@loop 2><label text="{index}"/></@loop><label text="{index}"/>"#).unwrap_err();
    assert!(matches!(err, InterpretError::UnresolvedVariable { ref name, .. } if name == "index"));
}

#[test]
fn test_loop_zero_and_custom_variable() {
    let output = strict(r#"<@loop times="0"><label text="never"/></@loop>"#).unwrap();
    assert!(output.roots.is_empty());

    let source = r#"<@loop times="2" var="i"><@loop times="2" var="j"><label text="{i}{j}"/></@loop></@loop>"#;
    assert_eq!(root_texts(source, ParserState::new()), vec!["00", "01", "10", "11"]);

    let err = strict(r#"<@loop times="many"></@loop>"#).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { .. }));
}

#[test]
fn test_for_each_lockstep() {
    let source = r#"<@forEach item="a;b;c" n="x[1,3]"><label text="{item}{n}{index}"/></@forEach>"#;
    assert_eq!(root_texts(source, ParserState::new()), vec!["ax10", "bx21", "cx32"]);

    let source = r#"<@forEach n="[3,1]"><label text="{n}"/></@forEach>"#;
    assert_eq!(root_texts(source, ParserState::new()), vec!["3", "2", "1"]);

    let colors = vec!["red;dark".to_string(), "blue".to_string()];
    let state = ParserState::new().with_variable("colors", colors);
    let source = r#"<@forEach color="{colors}"><label text="{color}"/></@forEach>"#;
    assert_eq!(root_texts(source, state), vec!["red;dark", "blue"]);
}

#[test]
fn test_for_each_rejects_unequal_sequences() {
    let source = r#"<@forEach a="1;2" b="1"><label text="{a}"/></@forEach><label text="after"/>"#;
    let err = strict(source).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { ref message, .. } if message.contains("'b'")));

    let output = render(source, ParserState::lenient()).unwrap();
    assert_eq!(texts(&output.roots), vec!["after"]);
    assert_eq!(output.warnings[0].kind, WarningKind::Macro);
}

#[test]
fn test_expansion_limit() {
    let limited = || ParserState::new().with_max_expansions(3);
    let fits = r#"<@loop 3><label text="{index}"/></@loop><@forEach n="[1,3]"><label text="{n}"/></@forEach>"#;
    assert_eq!(root_texts(fits, limited()), vec!["0", "1", "2", "1", "2", "3"]);

    let err = render(r#"<@loop times="4"><label/></@loop>"#, limited()).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { ref name, ref message, .. }
        if name == "loop" && message.contains("limit of 3")));

    let huge = r#"<@forEach n="x[0,99999999999]"><label text="{n}"/></@forEach><label text="after"/>"#;
    let err = strict(huge).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { ref message, .. } if message.contains("10000")));
    let output = render(huge, ParserState::lenient()).unwrap();
    assert_eq!(texts(&output.roots), vec!["after"]);
    assert_eq!(output.warnings[0].kind, WarningKind::Macro);

    let items: Vec<String> = (0..4).map(|n| n.to_string()).collect();
    let state = limited().with_variable("items", items);
    let err = render(r#"<@forEach n="{items}"><label/></@forEach>"#, state).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { .. }));
}

#[test]
fn test_if_else() {
    let source = r#"<@if test="{count} > 2"><label text="big"/><@else/><label text="small"/></@if>"#;
    assert_eq!(root_texts(source, ParserState::new().with_variable("count", "3")), vec!["big"]);
    assert_eq!(root_texts(source, ParserState::new().with_variable("count", "1")), vec!["small"]);

    let source = r#"<@if {name} eq "Ann" and !{hidden}><label text="hi"/></@if>"#;
    let state = ParserState::new().with_variable("name", "Ann").with_variable("hidden", "false");
    assert_eq!(root_texts(source, state), vec!["hi"]);
}

#[test]
fn test_if_invokes_actions() {
    let interpreter = with_actions();
    let source = r#"<@if "$enabled"><label text="on"/></@if><@if "$disabled"><label text="off"/></@if>"#;
    let output = interpreter.render("t", source, ParserState::new()).unwrap();
    assert_eq!(texts(&output.roots), vec!["on"]);
}

#[test]
fn test_malformed_condition() {
    let source = r#"<@if test="1 &&"><label text="x"/></@if>"#;
    let err = strict(source).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { .. }));

    let output = render(source, ParserState::lenient()).unwrap();
    assert!(output.roots.is_empty());
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].kind, WarningKind::Macro);
}

#[test]
fn test_condition_variables_with_arbitrary_text() {
    let source = r#"
        <@assign greeting="Hello World"/>
        <@if test="{greeting} == 'Hello World'"><label text="greeting"/></@if>
        <@if test="{name} == {same} and {name}"><label text="name"/></@if>
        <@if test="{op} == 'or'"><label text="keyword"/></@if>
        <@if {greeting} ne "Goodbye World"><label text="positional"/></@if>
    "#;
    let state = || {
        ParserState::new()
            .with_variable("name", "O'Brien")
            .with_variable("same", "O'Brien")
            .with_variable("op", "or")
    };
    assert_eq!(root_texts(source, state()), vec!["greeting", "name", "keyword", "positional"]);
    assert!(render(source, state().with_strictness(crate::Strictness::Lenient))
        .unwrap()
        .warnings
        .is_empty());
}

#[test]
fn test_condition_with_unbound_variable() {
    let source = r#"<@if test="{missing} == ''"><label text="empty"/></@if>"#;
    let err = strict(source).unwrap_err();
    assert!(matches!(err, InterpretError::UnresolvedVariable { ref name, .. } if name == "missing"));

    let output = render(source, ParserState::lenient()).unwrap();
    assert_eq!(texts(&output.roots), vec!["empty"]);
    assert_eq!(output.warnings[0].kind, WarningKind::UnresolvedVariable);
}

#[test]
fn test_assign() {
    let source = r#"
        <@assign greeting="hi"/>
        <@assign who>{greeting} there</@assign>
        <label text="{who}"/>
    "#;
    assert_eq!(root_texts(source, ParserState::new()), vec!["hi there"]);

    // binds in the loop's own scope
    let source = r#"<@loop 1><@assign inner="x"/></@loop><label text="{inner}"/>"#;
    assert!(matches!(strict(source).unwrap_err(), InterpretError::UnresolvedVariable { .. }));

    assert!(matches!(strict("<@assign/>").unwrap_err(), InterpretError::Macro { .. }));
}

#[test]
fn test_comment_discards_body() {
    let output = strict(r#"<@comment><unknown/></@comment><label text="a"/>"#).unwrap();
    assert_eq!(texts(&output.roots), vec!["a"]);
}

#[test]
fn test_import() {
    let loader = MemoryLoader::new()
        .with("part.lml", r#"<label text="imported {x}"/>"#)
        .with("broken.lml", "<panel>");
    let interpreter = Interpreter::new(syntax()).with_loader(loader);
    let state = || ParserState::new().with_variable("x", "1");

    let output = interpreter
        .render("t", r#"<panel><@import path="part.lml"/></panel>"#, state())
        .unwrap();
    assert_eq!(texts(&children_of(&output.roots[0])), vec!["imported 1"]);

    let err = interpreter.render("t", r#"<@import "missing.lml"/>"#, state()).unwrap_err();
    assert!(matches!(err, InterpretError::Load { .. }));

    let output = interpreter
        .render("t", r#"<@import "missing.lml"/>"#, ParserState::lenient())
        .unwrap();
    assert_eq!(output.warnings[0].kind, WarningKind::Macro);

    let err = interpreter
        .render("t", r#"<@import "broken.lml"/>"#, ParserState::lenient())
        .unwrap_err();
    assert!(matches!(err, InterpretError::Syntax { ref template, .. } if template == "broken.lml"));
}

#[test]
fn test_template_macro_parameters() {
    let definition = r#"<@macro name="card" title subtitle="none{suffix}"><label text="{title}/{subtitle}"/></@macro>"#;
    let state = || ParserState::new().with_variable("suffix", "!");

    let source = format!(r#"{definition}<@card title="A"/><@card "B" subtitle="s"/>"#);
    assert_eq!(root_texts(&source, state()), vec!["A/none!", "B/s"]);

    let err = render(&format!("{definition}<@card/>"), state()).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { ref message, .. } if message.contains("title")));

    let err = render(&format!(r#"{definition}<@card title="x" bogus="y"/>"#), state()).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { ref message, .. } if message.contains("bogus")));

    // parameters do not leak
    let err = render(&format!(r#"{definition}<@card title="x"/><label text="{{title}}"/>"#), state()).unwrap_err();
    assert!(matches!(err, InterpretError::UnresolvedVariable { .. }));
}

#[test]
fn test_builtin_macros_cannot_be_redefined() {
    let err = strict(r#"<@macro name="loop"><label/></@macro>"#).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { .. }));
}

#[test]
fn test_recursion_is_fatal_in_lenient_mode() {
    let source = r#"<@macro name="again"><@again/></@macro><@again/>"#;
    let state = ParserState::lenient().with_max_macro_depth(8);
    let err = render(source, state).unwrap_err();
    match err {
        InterpretError::MacroRecursion { limit, stack } => {
            assert_eq!(limit, 8);
            assert_eq!(stack.len(), 9);
            assert!(stack.iter().all(|name| name == "@again"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_macro() {
    let err = strict("<@nothing/>").unwrap_err();
    assert!(matches!(err, InterpretError::UnknownTag { ref tag, .. } if tag == "@nothing"));

    let output = render(r#"<@nothing/><label text="a"/>"#, ParserState::lenient()).unwrap();
    assert_eq!(texts(&output.roots), vec!["a"]);
    assert_eq!(output.warnings[0].kind, WarningKind::UnknownTag);
}

#[test]
fn test_syntax_error_in_body_is_fatal() {
    let err = render(r#"<@loop times="1"><panel></@loop>"#, ParserState::lenient()).unwrap_err();
    assert!(matches!(err, InterpretError::Syntax { .. }));
}

#[test]
fn test_actor_macro() {
    let interpreter = with_actions();

    let output = interpreter
        .render("t", r#"<panel><@actor action="$makePanel" id="made"/></panel>"#, ParserState::new())
        .unwrap();
    let children = children_of(&output.roots[0]);
    assert_eq!(children.len(), 1);
    assert!(Rc::ptr_eq(&children[0], &output.ids["made"]));

    let output = interpreter
        .render("t", r#"<@actor "$nothing"/>"#, ParserState::lenient())
        .unwrap();
    assert!(output.roots.is_empty());
    assert_eq!(output.warnings[0].kind, WarningKind::UnresolvedAction);

    let err = interpreter
        .render("t", r#"<@actor "enabled"/>"#, ParserState::new())
        .unwrap_err();
    assert!(matches!(err, InterpretError::Macro { .. }));
}

#[test]
fn test_log_macro() {
    let state = ParserState::new().with_variable("x", "1");
    assert!(render(r#"<@log level="debug">value {x}</@log>"#, state).is_ok());

    let err = strict(r#"<@log level="loud" message="m"/>"#).unwrap_err();
    assert!(matches!(err, InterpretError::Macro { .. }));
}
