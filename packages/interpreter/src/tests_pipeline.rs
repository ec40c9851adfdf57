/// Construction pipeline tests: phases, dispatch, policies and strictness
use crate::actor::{actor_ref, with_actor_mut, Actor, ActorBuilder, ActorRef, Capability, ANY, BUILDER};
use crate::attributes::AttributeOutcome;
use crate::error::{InterpretError, InterpretResult, WarningKind};
use crate::pipeline::Interpreter;
use crate::state::{ParserState, Skins};
use crate::tags::{ActorTag, HandlerCore, TagHandler, TagProvider};
use crate::test_support::*;
use lml_parser::TagNode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BASE: Capability = Capability::new("base");
const DERIVED: Capability = Capability::new("derived");
const SIBLING: Capability = Capability::new("sibling");

/// Actor with per-instance capabilities that records which processors ran
#[derive(Debug)]
struct Recorder {
    caps: &'static [Capability],
    seen: Vec<&'static str>,
}

impl Actor for Recorder {
    fn capabilities(&self) -> &'static [Capability] {
        self.caps
    }
}

fn recording_tag(caps: &'static [Capability]) -> ActorTag {
    ActorTag::new(move |_, _| Ok(actor_ref(Recorder { caps, seen: Vec::new() })))
}

fn mark(actor: &ActorRef, who: &'static str) -> InterpretResult<()> {
    with_actor_mut::<Recorder, _>(actor, |recorder| recorder.seen.push(who))
        .ok_or_else(|| InterpretError::custom("not a recorder"))
}

fn seen(actor: &ActorRef) -> Vec<&'static str> {
    actor
        .borrow()
        .downcast_ref::<Recorder>()
        .map(|recorder| recorder.seen.clone())
        .unwrap_or_default()
}

fn panel(actor: &ActorRef) -> (String, Option<u32>, Vec<String>) {
    actor
        .borrow()
        .downcast_ref::<Panel>()
        .map(|panel| (panel.style.clone(), panel.width, panel.log.clone()))
        .unwrap_or_default()
}

fn push_log(actor: Option<&ActorRef>, entry: String) -> InterpretResult<()> {
    let actor = actor.ok_or_else(|| InterpretError::custom("no actor"))?;
    with_actor_mut::<Panel, _>(actor, |panel| panel.log.push(entry))
        .ok_or_else(|| InterpretError::custom("not a panel"))
}

/// Actor-less tag that attaches itself to the enclosing panel
struct ListenerTag;

struct ListenerHandler {
    core: HandlerCore,
}

impl TagProvider for ListenerTag {
    fn create(
        &self,
        state: &mut ParserState,
        _parent: Option<&dyn TagHandler>,
        node: &TagNode,
    ) -> InterpretResult<Box<dyn TagHandler>> {
        Ok(Box::new(ListenerHandler {
            core: HandlerCore::new(node, state),
        }))
    }
}

impl TagHandler for ListenerHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn instantiate(
        &mut self,
        _state: &mut ParserState,
        _builder: Box<dyn crate::actor::Builder>,
    ) -> InterpretResult<Option<ActorRef>> {
        Ok(None)
    }

    fn is_attachable(&self) -> bool {
        true
    }

    fn attach_to(&mut self, _state: &mut ParserState, parent: &mut dyn TagHandler) -> InterpretResult<()> {
        push_log(parent.core().actor(), "listener".to_string())
    }
}

fn lenient_errors(source: &str) -> Vec<WarningKind> {
    render(source, ParserState::lenient())
        .unwrap()
        .warnings
        .into_iter()
        .map(|warning| warning.kind)
        .collect()
}

#[test]
fn test_nested_construction_and_ids() {
    let output = render(
        r#"<panel id="main">
            <label text="a"/>
            <label>b</label>
            <panel id="inner"/>
        </panel>"#,
        ParserState::new(),
    )
    .unwrap();

    assert_eq!(output.roots.len(), 1);
    let children = children_of(&output.roots[0]);
    assert_eq!(children.len(), 3);
    assert_eq!(texts(&children[..2]), vec!["a", "b"]);

    let mut ids: Vec<_> = output.ids.keys().cloned().collect();
    ids.sort();
    assert_eq!(ids, vec!["inner", "main"]);
    assert!(std::rc::Rc::ptr_eq(&output.ids["inner"], &children[2]));
    assert!(output.warnings.is_empty());
}

#[test]
fn test_reregistering_an_id_overwrites() {
    let output = render(r#"<label id="a" text="1"/><label id="a" text="2"/>"#, ParserState::new()).unwrap();
    assert_eq!(output.roots.len(), 2);
    assert_eq!(text_of(&output.ids["a"]), "2");
}

#[test]
fn test_preseeded_actors_survive() {
    let outside = actor_ref(Text {
        text: "outside".to_string(),
        ..Text::default()
    });
    let output = render(r#"<label id="local"/>"#, ParserState::new().with_actor("outside", outside)).unwrap();
    assert_eq!(output.ids.len(), 2);
    assert_eq!(text_of(&output.ids["outside"]), "outside");
}

#[test]
fn test_most_specific_processor_wins() {
    let mut syntax = syntax();
    syntax.register_tag("derived", recording_tag(&[DERIVED, BASE])).unwrap();
    syntax.register_tag("sibling", recording_tag(&[SIBLING, BASE])).unwrap();
    syntax
        .register_attribute("kind", BASE, |_, _, actor, _| mark(actor, "base"))
        .unwrap();
    syntax
        .register_attribute("kind", DERIVED, |_, _, actor, _| mark(actor, "derived"))
        .unwrap();

    let output = Interpreter::new(syntax)
        .render("t", r#"<derived kind="x"/><sibling kind="x"/>"#, ParserState::new())
        .unwrap();

    assert_eq!(seen(&output.roots[0]), vec!["derived"]);
    assert_eq!(seen(&output.roots[1]), vec!["base"]);
}

#[test]
fn test_ambiguous_registration_is_a_configuration_error() {
    let mut syntax = syntax();
    syntax.register_attribute("kind", BASE, |_, _, _, _| Ok(())).unwrap();
    let err = syntax.register_attribute("kind", BASE, |_, _, _, _| Ok(())).unwrap_err();
    assert!(matches!(err, InterpretError::DuplicateRegistration { .. }));

    let err = syntax.register_tag("PANEL", recording_tag(&[BASE])).unwrap_err();
    assert!(matches!(err, InterpretError::DuplicateRegistration { kind: "tag", .. }));
}

#[test]
fn test_building_processors_run_before_instantiation() {
    let instantiated = Arc::new(AtomicUsize::new(0));
    let building_calls = Arc::new(AtomicUsize::new(0));
    let standard_calls = Arc::new(AtomicUsize::new(0));

    let mut syntax = syntax();
    syntax
        .register_tag("spied", {
            let instantiated = instantiated.clone();
            ActorTag::new(move |_, _| {
                instantiated.fetch_add(1, Ordering::SeqCst);
                Ok(actor_ref(Recorder {
                    caps: &[BASE],
                    seen: Vec::new(),
                }))
            })
        })
        .unwrap();

    for (name, outcome) in [
        ("caption", AttributeOutcome::FullyHandled),
        ("note", AttributeOutcome::PartiallyHandled),
    ] {
        let instantiated = instantiated.clone();
        let building_calls = building_calls.clone();
        syntax
            .register_building_attribute(name, BUILDER, move |_, builder, _| {
                assert_eq!(instantiated.load(Ordering::SeqCst), 0);
                assert!(builder.downcast_ref::<ActorBuilder>().is_some());
                building_calls.fetch_add(1, Ordering::SeqCst);
                Ok(outcome)
            })
            .unwrap();

        let standard_calls = standard_calls.clone();
        syntax
            .register_attribute(name, ANY, move |_, _, _, _| {
                standard_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    Interpreter::new(syntax)
        .render("t", r#"<spied caption="hello" note="later"/>"#, ParserState::new())
        .unwrap();

    assert_eq!(instantiated.load(Ordering::SeqCst), 1);
    assert_eq!(building_calls.load(Ordering::SeqCst), 2);
    // caption was consumed, note reaches the standard phase too
    assert_eq!(standard_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unknown_tag_strict_and_lenient() {
    let err = render(r#"<unknownTag foo="1"/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::UnknownTag { ref tag, .. } if tag == "unknownTag"));

    let output = render(r#"<unknownTag foo="1"/>"#, ParserState::lenient()).unwrap();
    assert!(output.roots.is_empty());
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].kind, WarningKind::UnknownTag);
    assert!(output.warnings[0].message.contains("unknownTag"));
}

#[test]
fn test_unknown_wrapper_passes_children_through() {
    let output = render(
        r#"<panel><wrapper><label text="a"/><label text="b"/></wrapper></panel>"#,
        ParserState::lenient(),
    )
    .unwrap();
    let children = children_of(&output.roots[0]);
    assert_eq!(texts(&children), vec!["a", "b"]);
    assert_eq!(output.warnings[0].path, "panel/wrapper");
}

#[test]
fn test_unsupported_attribute() {
    let err = render(r#"<panel colour="red"/>"#, ParserState::new()).unwrap_err();
    match err {
        InterpretError::UnsupportedAttribute { attribute, actor_type, .. } => {
            assert_eq!(attribute, "colour");
            assert_eq!(actor_type, "panel");
        }
        other => panic!("unexpected error: {other}"),
    }

    let output = render(r#"<panel colour="red" width="3"/>"#, ParserState::lenient()).unwrap();
    assert_eq!(output.roots.len(), 1);
    assert_eq!(panel(&output.roots[0]).1, Some(3));
    assert_eq!(output.warnings[0].kind, WarningKind::UnsupportedAttribute);
}

#[test]
fn test_failing_processor() {
    let err = render(r#"<panel width="wide"/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::AttributeFailed { ref attribute, .. } if attribute == "width"));

    let output = render(r#"<panel width="wide"/>"#, ParserState::lenient()).unwrap();
    assert_eq!(output.roots.len(), 1);
    assert_eq!(panel(&output.roots[0]).1, None);
    assert_eq!(lenient_errors(r#"<panel width="wide"/>"#), vec![WarningKind::Invocation]);
}

#[test]
fn test_close_callbacks_run_after_children_in_order() {
    let mut syntax = syntax();
    syntax
        .register_attribute("select", PANEL, |_, handler, _, value| {
            let value = value.to_string();
            handler.core_mut().on_close(move |_, actor| {
                let count = actor.map(|actor| children_of(actor).len()).unwrap_or(0);
                push_log(actor, format!("select {value} of {count}"))
            });
            Ok(())
        })
        .unwrap();
    syntax
        .register_attribute("pack", PANEL, |_, handler, _, _| {
            handler
                .core_mut()
                .on_close(|_, actor| push_log(actor, "pack".to_string()));
            Ok(())
        })
        .unwrap();

    let output = Interpreter::new(syntax)
        .render(
            "t",
            r#"<panel select="1" pack="true"><label text="a"/><label text="b"/></panel>"#,
            ParserState::new(),
        )
        .unwrap();
    assert_eq!(panel(&output.roots[0]).2, vec!["select 1 of 2", "pack"]);
}

#[test]
fn test_attachable_listener() {
    let mut syntax = syntax();
    syntax.register_tag("listener", ListenerTag).unwrap();
    let interpreter = Interpreter::new(syntax);

    let output = interpreter
        .render("t", r#"<panel><listener/><label text="a"/></panel>"#, ParserState::new())
        .unwrap();
    assert_eq!(panel(&output.roots[0]).2, vec!["listener"]);
    // attached, not inserted
    assert_eq!(children_of(&output.roots[0]).len(), 1);

    let err = interpreter
        .render("t", "<listener/>", ParserState::new())
        .unwrap_err();
    assert!(matches!(err, InterpretError::RejectedChild { ref parent, .. } if parent == "<root>"));
}

#[test]
fn test_text_policies() {
    let state = || ParserState::new().with_variable("name", "Ann");

    let output = render("hello {name}", state()).unwrap();
    assert_eq!(texts(&output.roots), vec!["hello Ann"]);

    let output = render("<panel>Hi {name}<panel/></panel>", state()).unwrap();
    let children = children_of(&output.roots[0]);
    assert_eq!(children.len(), 2);
    assert_eq!(text_of(&children[0]), "Hi Ann");

    let output = render("<label>Bye {name}</label>", state()).unwrap();
    assert_eq!(texts(&output.roots), vec!["Bye Ann"]);
}

#[test]
fn test_configured_text_tag() {
    let mut syntax = syntax();
    syntax
        .register_tag(
            "note",
            ActorTag::new(|_, _| Ok(actor_ref(Text::default()))).with_text(crate::tags::TextPolicy::AsAttribute),
        )
        .unwrap();
    let output = Interpreter::new(syntax)
        .render("t", "<panel>plain</panel>", ParserState::new().with_text_tag("note"))
        .unwrap();
    assert_eq!(texts(&children_of(&output.roots[0])), vec!["plain"]);
}

#[test]
fn test_label_rejects_children() {
    let err = render(r#"<label><panel/></label>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::RejectedChild { ref child, .. } if child == "panel"));
    assert_eq!(lenient_errors(r#"<label><panel/></label>"#), vec![WarningKind::RejectedChild]);
}

#[test]
fn test_skin_default_styles() {
    let mut skins = Skins::new();
    skins.set_default_style("dark", "panel", "night");
    let state = || ParserState::new().with_skins(skins.clone());

    let output = render(
        r#"<panel skin="dark"/><panel/><panel skin="dark" style="custom"/>"#,
        state(),
    )
    .unwrap();
    let styles: Vec<_> = output.roots.iter().map(|actor| panel(actor).0).collect();
    assert_eq!(styles, vec!["night", "default", "custom"]);

    let err = render(r#"<panel skin="missing"/>"#, state()).unwrap_err();
    assert!(matches!(err, InterpretError::AttributeFailed { ref attribute, .. } if attribute == "skin"));
}

#[test]
fn test_unresolved_variable() {
    let err = render(r#"<label text="{nope}"/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::UnresolvedVariable { ref name, .. } if name == "nope"));

    let output = render(r#"<label text="[{nope}]"/>"#, ParserState::lenient()).unwrap();
    assert_eq!(texts(&output.roots), vec!["[]"]);
    assert_eq!(output.warnings[0].kind, WarningKind::UnresolvedVariable);
}

#[test]
fn test_syntax_error_is_fatal_in_both_modes() {
    for state in [ParserState::new(), ParserState::lenient()] {
        let err = render("<panel><label></panel>", state).unwrap_err();
        assert!(matches!(err, InterpretError::Syntax { .. }));
        assert!(err.warning_kind().is_none());
    }
}

#[test]
fn test_render_output_json() {
    let output = render(r#"<panel id="p"><label text="x"/></panel>"#, ParserState::new()).unwrap();
    let json = output.to_json();
    assert_eq!(json["ids"]["p"], "panel");
    assert_eq!(json["roots"][0]["children"][0]["text"], "x");
    assert!(json["warnings"].as_array().is_some_and(Vec::is_empty));
}
