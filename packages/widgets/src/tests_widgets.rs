use crate::widget::*;
use crate::syntax;
use lml_interpreter::{
    Action, ActionError, ActionRegistry, ActionValue, InterpretError, Interpreter, ParserState,
    RenderOutput, Skins, WarningKind,
};
use std::cell::Cell;
use std::rc::Rc;

fn interpreter(actions: ActionRegistry) -> Interpreter {
    Interpreter::new(syntax().unwrap()).with_actions(actions)
}

fn render(source: &str, state: ParserState) -> Result<RenderOutput, InterpretError> {
    interpreter(ActionRegistry::new()).render("test", source, state)
}

fn counting_action(name: &str, result: bool) -> (Action, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let action = Action::new(name, move |args| {
        assert!(args.get::<ClickEvent>(0)?.is_some());
        seen.set(seen.get() + 1);
        Ok(result.into())
    })
    .param::<ClickEvent>();
    (action, calls)
}

#[test]
fn test_window_tree() {
    let output = render(
        r#"
        <window title="Settings" modal=true id="settings">
            <table pad="4">
                <label wrap=true>Volume</label>
                <textButton text="Apply" id="apply"/>
                <textButton id="cancel">Cancel</textButton>
            </table>
        </window>
        "#,
        ParserState::new(),
    )
    .unwrap();

    let json = output.to_json();
    let window = &json["roots"][0];
    assert_eq!(window["type"], "window");
    assert_eq!(window["title"], "Settings");
    assert_eq!(window["modal"], true);
    let table = &window["children"][0];
    assert_eq!(table["pad"], 4.0);
    assert_eq!(table["children"][0]["text"], "Volume");
    assert_eq!(table["children"][0]["wrap"], true);

    let texts: Vec<_> = ["apply", "cancel"]
        .iter()
        .map(|id| inspect_widget(&output.ids[*id], |w| w.text().map(str::to_string)).flatten())
        .collect();
    assert_eq!(texts, vec![Some("Apply".to_string()), Some("Cancel".to_string())]);
}

#[test]
fn test_inherited_processors() {
    let output = render(
        r##"<colorPicker title="Pick" color="#00ff00" visible=false/><textButton checked=true/>"##,
        ParserState::new(),
    )
    .unwrap();

    let picker = inspect_widget(&output.roots[0], |w| (w.kind.clone(), w.visible)).unwrap();
    assert_eq!(
        picker,
        (
            WidgetKind::ColorPicker {
                title: "Pick".to_string(),
                color: Color::new(0, 255, 0),
            },
            false
        )
    );
    let button = inspect_widget(&output.roots[1], |w| w.kind.clone()).unwrap();
    assert!(matches!(button, WidgetKind::TextButton { checked: true, .. }));

    // modal belongs to plain windows only
    let err = render(r#"<label modal=true/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::UnsupportedAttribute { .. }));
}

#[test]
fn test_invalid_values() {
    let err = render(r#"<table pad="wide"/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::AttributeFailed { ref attribute, .. } if attribute == "pad"));

    let output = render(r#"<colorPicker color="blue"/>"#, ParserState::lenient()).unwrap();
    assert_eq!(output.warnings[0].kind, WarningKind::Invocation);
    let color = inspect_widget(&output.roots[0], |w| w.kind.clone()).unwrap();
    assert!(matches!(color, WidgetKind::ColorPicker { color, .. } if color == Color::new(255, 255, 255)));
}

#[test]
fn test_tooltip_attaches_to_parent() {
    let output = render(
        r#"<button><tooltip>Saves {what}</tooltip></button>"#,
        ParserState::new().with_variable("what", "everything"),
    )
    .unwrap();
    let tooltip = inspect_widget(&output.roots[0], |w| w.tooltip.clone()).flatten();
    assert_eq!(tooltip.as_deref(), Some("Saves everything"));
    assert_eq!(inspect_widget(&output.roots[0], |w| w.children.len()), Some(0));

    let err = render("<tooltip>alone</tooltip>", ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::RejectedChild { .. }));
}

#[test]
fn test_click_listeners() {
    let (save, saves) = counting_action("save", false);
    let (once, onces) = counting_action("once", true);
    let mut actions = ActionRegistry::new();
    actions.register_action(save);
    actions.register_action(once);

    let output = interpreter(actions)
        .render(
            "t",
            r#"<textButton id="b" onClick="$save"><clickListener action="$once"/>Save</textButton>"#,
            ParserState::new(),
        )
        .unwrap();
    let button = &output.ids["b"];
    assert_eq!(inspect_widget(button, |w| w.listeners.len()), Some(2));

    assert_eq!(click(button).unwrap(), 2);
    assert_eq!(click(button).unwrap(), 1);
    assert_eq!((saves.get(), onces.get()), (2, 1));

    with_widget(button, |w| {
        if let WidgetKind::TextButton { disabled, .. } = &mut w.kind {
            *disabled = true;
        }
    });
    assert_eq!(click(button).unwrap(), 0);
    assert_eq!(saves.get(), 2);
}

#[test]
fn test_failing_listener_still_removes_finished_ones() {
    let (once, onces) = counting_action("once", true);
    let mut actions = ActionRegistry::new();
    actions.register_action(once);
    actions.register_action(
        Action::new("boom", |_| Err(ActionError::failed("boom"))).param::<ClickEvent>(),
    );

    let output = interpreter(actions)
        .render(
            "t",
            r#"<button id="b" onClick="$once"><clickListener action="$boom"/></button>"#,
            ParserState::new(),
        )
        .unwrap();
    let button = &output.ids["b"];

    let err = click(button).unwrap_err();
    assert!(matches!(err, ActionError::Failed(ref message) if message == "boom"));
    assert_eq!(onces.get(), 1);
    let remaining = inspect_widget(button, |w| w.listeners.iter().map(|l| l.id().to_string()).collect::<Vec<_>>());
    assert_eq!(remaining, Some(vec!["boom".to_string()]));
}

#[test]
fn test_listener_may_edit_the_listener_list() {
    let (once, onces) = counting_action("once", true);
    let mut actions = ActionRegistry::new();
    actions.register_action(once);
    // drops the first listener, which is itself
    actions.register_action(
        Action::new("shift", |args| {
            let event = args.require::<ClickEvent>(0)?;
            with_widget(&event.target, |w| w.listeners.remove(0));
            Ok(false.into())
        })
        .param::<ClickEvent>(),
    );

    let output = interpreter(actions)
        .render(
            "t",
            r#"<button id="b" onClick="$shift"><clickListener action="$once"/></button>"#,
            ParserState::new(),
        )
        .unwrap();
    let button = &output.ids["b"];

    assert_eq!(click(button).unwrap(), 2);
    assert_eq!(onces.get(), 1);
    assert_eq!(inspect_widget(button, |w| w.listeners.len()), Some(0));
}

#[test]
fn test_focus_resolves_after_children() {
    let output = render(
        r#"<table focus="second"><label name="first"/><label name="second"/></table>"#,
        ParserState::new(),
    )
    .unwrap();
    assert_eq!(inspect_widget(&output.roots[0], |w| w.focused), Some(Some(1)));
    assert_eq!(output.to_json()["roots"][0]["focused"], 1);

    let source = r#"<window focus="nobody"><label name="first"/></window>"#;
    let err = render(source, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::InvalidValue { ref attribute, ref value, .. }
        if attribute == "focus" && value == "nobody"));

    let output = render(source, ParserState::lenient()).unwrap();
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].kind, WarningKind::Invocation);
    assert_eq!(inspect_widget(&output.roots[0], |w| w.focused), Some(None));

    let err = render(r#"<table focus=""/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::AttributeFailed { ref attribute, .. } if attribute == "focus"));

    // tables only
    let err = render(r#"<label focus="x"/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::UnsupportedAttribute { .. }));
}

#[test]
fn test_flag_attributes_check_the_widget_kind() {
    let output = render(
        r#"<textButton disabled=TRUE checked=false visible=false/><label wrap=true/>"#,
        ParserState::new(),
    )
    .unwrap();
    let button = inspect_widget(&output.roots[0], |w| (w.kind.clone(), w.visible)).unwrap();
    assert!(matches!(button, (WidgetKind::TextButton { disabled: true, checked: false, .. }, false)));

    let err = render(r#"<button checked=maybe/>"#, ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::AttributeFailed { ref source, .. }
        if matches!(**source, InterpretError::InvalidValue { .. })));
}

#[test]
fn test_unresolved_listener_actions() {
    let source = r#"<button onClick="$missing"><clickListener action="$missing"/></button>"#;
    let err = render(source, ParserState::new()).unwrap_err();
    assert!(matches!(
        err,
        InterpretError::AttributeFailed { ref source, .. }
            if matches!(**source, InterpretError::UnresolvedAction { .. })
    ));

    let output = render(source, ParserState::lenient()).unwrap();
    assert_eq!(inspect_widget(&output.roots[0], |w| w.listeners.len()), Some(0));
    let kinds: Vec<_> = output.warnings.iter().map(|w| w.kind).collect();
    assert_eq!(kinds, vec![WarningKind::UnresolvedAction, WarningKind::UnresolvedAction]);

    let err = render("<button><clickListener/></button>", ParserState::new()).unwrap_err();
    assert!(matches!(err, InterpretError::Custom(ref message) if message.contains("action")));
}

#[test]
fn test_color_picker_close_convention() {
    let mut actions = ActionRegistry::new();
    actions.register_action(
        Action::new("keepIfRed", |args| {
            let color = args.require::<Color>(0)?;
            Ok(ActionValue::Bool(color.r == 255))
        })
        .param::<Color>(),
    );
    let interpreter = interpreter(actions);
    let picker = |source: &str| {
        interpreter
            .render("t", source, ParserState::new())
            .unwrap()
            .roots
            .remove(0)
    };

    let red = picker(r#"<colorPicker onResult="$keepIfRed"/>"#);
    assert!(!finish_color_pick(&red, Color::new(255, 0, 0)).unwrap());
    assert_eq!(inspect_widget(&red, |w| w.visible), Some(true));
    assert!(finish_color_pick(&red, Color::new(0, 0, 255)).unwrap());
    assert_eq!(inspect_widget(&red, |w| w.visible), Some(false));

    let plain = picker("<colorPicker/>");
    assert!(finish_color_pick(&plain, Color::new(1, 2, 3)).unwrap());
    let color = inspect_widget(&plain, |w| w.kind.clone()).unwrap();
    assert!(matches!(color, WidgetKind::ColorPicker { color, .. } if color == Color::new(1, 2, 3)));
}

#[test]
fn test_skin_styles() {
    let mut skins = Skins::new();
    skins.set_default_style("default", "label", "small");
    skins.set_default_style("dark", "label", "glow");
    let output = render(
        r#"<label/><label skin="dark"/><label style="big"/>"#,
        ParserState::new().with_skins(skins),
    )
    .unwrap();
    let styles: Vec<_> = output
        .roots
        .iter()
        .map(|actor| inspect_widget(actor, |w| (w.style.clone(), w.skin.clone())).unwrap())
        .collect();
    assert_eq!(
        styles,
        vec![
            ("small".to_string(), "default".to_string()),
            ("glow".to_string(), "dark".to_string()),
            ("big".to_string(), "default".to_string()),
        ]
    );
}

#[test]
fn test_macros_with_widgets() {
    let output = render(
        r#"
        <table>
            <@forEach item="Open;Save;Quit" key="menu[1,3]">
                <textButton name="{key}">{item}</textButton>
            </@forEach>
        </table>
        "#,
        ParserState::new(),
    )
    .unwrap();
    let names: Vec<_> = inspect_widget(&output.roots[0], |w| w.children.clone())
        .unwrap()
        .iter()
        .map(|child| inspect_widget(child, |w| (w.name.clone(), w.text().map(str::to_string))).unwrap())
        .collect();
    assert_eq!(names[2], (Some("menu3".to_string()), Some("Quit".to_string())));
    assert_eq!(names.len(), 3);
}
