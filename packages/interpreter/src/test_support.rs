/// Minimal actors and a syntax to exercise the pipeline in unit tests
use crate::actor::{actor_ref, with_actor_mut, Actor, ActorRef, Capability};
use crate::error::{InterpretError, InterpretResult};
use crate::pipeline::{Interpreter, RenderOutput};
use crate::state::ParserState;
use crate::syntax::Syntax;
use crate::tags::{ActorTag, ChildPolicy, TextPolicy};
use serde_json::json;

pub const WIDGET: Capability = Capability::new("widget");
pub const PANEL: Capability = Capability::new("panel");
pub const TEXT: Capability = Capability::new("text");

#[derive(Debug, Default)]
pub struct Panel {
    pub style: String,
    pub width: Option<u32>,
    pub children: Vec<ActorRef>,
    pub log: Vec<String>,
}

impl Actor for Panel {
    fn capabilities(&self) -> &'static [Capability] {
        &[PANEL, WIDGET]
    }

    fn add_child(&mut self, child: ActorRef) -> bool {
        self.children.push(child);
        true
    }

    fn snapshot(&self) -> serde_json::Value {
        let children: Vec<_> = self.children.iter().map(|c| c.borrow().snapshot()).collect();
        json!({ "type": "panel", "style": self.style, "children": children })
    }
}

#[derive(Debug, Default)]
pub struct Text {
    pub style: String,
    pub text: String,
}

impl Actor for Text {
    fn capabilities(&self) -> &'static [Capability] {
        &[TEXT, WIDGET]
    }

    fn snapshot(&self) -> serde_json::Value {
        json!({ "type": "text", "text": self.text })
    }
}

pub fn syntax() -> Syntax {
    let mut syntax = Syntax::with_defaults();
    syntax
        .register_tag(
            "panel",
            ActorTag::new(|builder, _| {
                Ok(actor_ref(Panel {
                    style: builder.base().style_or_default().to_string(),
                    ..Panel::default()
                }))
            }),
        )
        .unwrap();
    syntax
        .register_tag(
            "label",
            ActorTag::new(|builder, _| {
                Ok(actor_ref(Text {
                    style: builder.base().style_or_default().to_string(),
                    ..Text::default()
                }))
            })
            .with_children(ChildPolicy::Reject)
            .with_text(TextPolicy::AsAttribute),
        )
        .unwrap();
    syntax
        .register_attribute("text", TEXT, |_, _, actor, value| {
            with_actor_mut::<Text, _>(actor, |text| text.text = value.to_string())
                .ok_or_else(|| InterpretError::custom("not a text actor"))
        })
        .unwrap();
    syntax
        .register_attribute("width", PANEL, |_, _, actor, value| {
            let width = value
                .parse::<u32>()
                .map_err(|_| InterpretError::invalid_value("width", value, "expected a number"))?;
            with_actor_mut::<Panel, _>(actor, |panel| panel.width = Some(width))
                .ok_or_else(|| InterpretError::custom("not a panel"))
        })
        .unwrap();
    syntax
}

pub fn render(source: &str, state: ParserState) -> InterpretResult<RenderOutput> {
    Interpreter::new(syntax()).render("test", source, state)
}

pub fn text_of(actor: &ActorRef) -> String {
    actor
        .borrow()
        .downcast_ref::<Text>()
        .map(|text| text.text.clone())
        .unwrap_or_default()
}

pub fn children_of(actor: &ActorRef) -> Vec<ActorRef> {
    actor
        .borrow()
        .downcast_ref::<Panel>()
        .map(|panel| panel.children.clone())
        .unwrap_or_default()
}

pub fn texts(actors: &[ActorRef]) -> Vec<String> {
    actors.iter().map(text_of).collect()
}
