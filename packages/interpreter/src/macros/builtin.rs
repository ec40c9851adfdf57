use super::sequence::parse_sequence;
use super::{MacroContext, MacroHandler};
use crate::action::ActionValue;
use crate::error::InterpretResult;
use crate::expression::Condition;
use crate::value::Value;
use lml_parser::{tokenize, Token, MACRO_SIGIL};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Loop variable bound by `@loop` and `@forEach` unless told otherwise
pub const DEFAULT_LOOP_VARIABLE: &str = "index";

/// `<@if test="...">then<@else/>otherwise</@if>`
#[derive(Debug, Clone, Copy, Default)]
pub struct IfMacro;

impl MacroHandler for IfMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        // raw: `{name}` operands are resolved by the condition itself
        let source = match ctx.raw_attribute("test") {
            Some(test) => test.to_string(),
            None => ctx
                .node()
                .positional_attributes()
                .map(quote_positional)
                .collect::<Vec<_>>()
                .join(" "),
        };
        let condition = Condition::parse(&source).map_err(|err| ctx.fail(err.to_string()))?;
        let (then_branch, else_branch) = split_else(ctx.body());

        if condition.evaluate(ctx.state())? {
            ctx.expand(then_branch)
        } else if let Some(else_branch) = else_branch {
            ctx.expand(else_branch)
        } else {
            Ok(())
        }
    }
}

/// A positional attribute that was quoted because it holds whitespace keeps
/// being one operand
fn quote_positional(raw: &str) -> String {
    if !raw.contains(char::is_whitespace) {
        raw.to_string()
    } else if !raw.contains('\'') {
        format!("'{}'", raw)
    } else {
        format!("\"{}\"", raw)
    }
}

/// Split a body at its top-level `<@else/>`. Markers inside nested tags
/// belong to those tags.
fn split_else(body: &str) -> (&str, Option<&str>) {
    let Ok(tokens) = tokenize(body) else {
        return (body, None);
    };

    let mut depth = 0usize;
    for (token, range) in tokens {
        match token {
            Token::Open { self_closing: false, .. } => depth += 1,
            Token::Close { .. } => depth = depth.saturating_sub(1),
            Token::Open { body: tag, self_closing: true } if depth == 0 => {
                let name = tag.split_whitespace().next().unwrap_or_default();
                let is_else = name
                    .strip_prefix(MACRO_SIGIL)
                    .is_some_and(|name| name.eq_ignore_ascii_case("else"));
                if is_else {
                    return (&body[..range.start], Some(&body[range.end..]));
                }
            }
            _ => {}
        }
    }
    (body, None)
}

/// `<@loop times="3" var="i">`: expands the body `times` times
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopMacro;

impl MacroHandler for LoopMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        let times = ctx
            .attribute_or_first("times")?
            .ok_or_else(|| ctx.fail("missing 'times'"))?;
        let count: usize = times
            .trim()
            .parse()
            .map_err(|_| ctx.fail(format!("'{}' is not a repeat count", times)))?;
        let limit = ctx.state().max_expansions();
        if count > limit {
            return Err(ctx.fail(format!("{} repetitions exceed the limit of {}", count, limit)));
        }
        let var = ctx
            .attribute("var")?
            .unwrap_or_else(|| DEFAULT_LOOP_VARIABLE.to_string());

        for index in 0..count {
            ctx.scoped([(var.clone(), Value::from(index))], |ctx| ctx.expand_body())?;
        }
        Ok(())
    }
}

/// `<@forEach item="a;b;c" color="{colors}">`: one expansion per element,
/// every named sequence advanced in lockstep
#[derive(Debug, Clone, Copy, Default)]
pub struct ForEachMacro;

impl ForEachMacro {
    fn sequence(ctx: &mut MacroContext<'_, '_>, raw: &str) -> InterpretResult<Vec<String>> {
        let trimmed = raw.trim();
        if let Some(name) = trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if let Some(Value::Array(items)) = ctx.state().variable(name) {
                let items = items.clone();
                let limit = ctx.state().max_expansions();
                if items.len() > limit {
                    return Err(ctx.fail(format!("sequence has more than {} elements", limit)));
                }
                return Ok(items);
            }
        }
        let text = ctx.state().substitute(trimmed)?;
        let limit = ctx.state().max_expansions();
        parse_sequence(&text, limit).map_err(|message| ctx.fail(message))
    }
}

impl MacroHandler for ForEachMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        let node = ctx.node();
        let mut sequences = Vec::new();
        for (name, raw) in node.named_attributes() {
            sequences.push((name.to_string(), Self::sequence(ctx, raw)?));
        }

        let Some(len) = sequences.first().map(|(_, items)| items.len()) else {
            return Err(ctx.fail("needs at least one named sequence"));
        };
        if let Some((name, items)) = sequences.iter().find(|(_, items)| items.len() != len) {
            return Err(ctx.fail(format!(
                "sequence '{}' has {} elements, expected {}",
                name,
                items.len(),
                len
            )));
        }

        for index in 0..len {
            let bindings = std::iter::once((DEFAULT_LOOP_VARIABLE.to_string(), Value::from(index)))
                .chain(
                    sequences
                        .iter()
                        .map(|(name, items)| (name.clone(), Value::from(items[index].clone()))),
                );
            ctx.scoped(bindings, |ctx| ctx.expand_body())?;
        }
        Ok(())
    }
}

/// `<@assign name="value"/>` or `<@assign name>value</@assign>`: binds in
/// the enclosing scope
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignMacro;

impl MacroHandler for AssignMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        let named = ctx.named_attributes()?;
        let positional = ctx.positional()?;
        if named.is_empty() && positional.is_empty() {
            return Err(ctx.fail("nothing to assign"));
        }

        match positional.as_slice() {
            [] => {}
            [name] => {
                let body = ctx.body().trim();
                let value = ctx.state().substitute(body)?;
                ctx.state().set_variable(name.clone(), value);
            }
            _ => return Err(ctx.fail("a body can be assigned to one variable only")),
        }
        for (name, value) in named {
            ctx.state().set_variable(name, value);
        }
        Ok(())
    }
}

/// `<@comment>...</@comment>`: discards its body
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentMacro;

impl MacroHandler for CommentMacro {
    fn expand(&self, _ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        Ok(())
    }
}

/// `<@import path="menu.lml"/>`: splices another template in
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportMacro;

impl MacroHandler for ImportMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        let path = ctx
            .attribute_or_first("path")?
            .ok_or_else(|| ctx.fail("missing 'path'"))?;
        let source = ctx.interpreter().loader().load(&path)?;
        debug!(path = %path, "Importing template");
        ctx.expand_template(&path, &source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroParam {
    pub name: String,
    /// Raw default, substituted at each invocation
    pub default: Option<String>,
}

/// `<@macro name="card" title subtitle="none">body</@macro>`: defines
/// `<@card title="..."/>` for the rest of the parse
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroDefinition;

impl MacroHandler for MacroDefinition {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        let name = ctx
            .attribute("name")?
            .ok_or_else(|| ctx.fail("missing 'name'"))?;
        if ctx.interpreter().syntax().macro_handler(&name).is_some() {
            return Err(ctx.fail(format!("cannot redefine built-in macro '{}'", name)));
        }

        let params = ctx
            .node()
            .attributes
            .iter()
            .filter_map(|attr| match attr.name.as_deref() {
                Some(param) if param.eq_ignore_ascii_case("name") => None,
                Some(param) => Some(MacroParam {
                    name: param.to_string(),
                    default: Some(attr.value.clone()),
                }),
                None => Some(MacroParam {
                    name: attr.value.clone(),
                    default: None,
                }),
            })
            .collect();

        debug!(name = %name, "Defining template macro");
        let body = ctx.body().to_string();
        ctx.state().define_macro(
            &name,
            Arc::new(TemplateMacro {
                name: name.clone(),
                params,
                body,
            }),
        );
        Ok(())
    }
}

/// A macro defined in a template by `@macro`
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMacro {
    pub name: String,
    pub params: Vec<MacroParam>,
    pub body: String,
}

impl MacroHandler for TemplateMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        if !ctx.body().trim().is_empty() {
            return Err(ctx.fail("template macros take no body"));
        }
        for (arg, _) in ctx.node().named_attributes() {
            if !self.params.iter().any(|p| p.name.eq_ignore_ascii_case(arg)) {
                return Err(ctx.fail(format!("unknown parameter '{}'", arg)));
            }
        }
        let positional = ctx.positional()?;
        if positional.len() > self.params.len() {
            return Err(ctx.fail(format!(
                "takes {} arguments, {} given",
                self.params.len(),
                positional.len()
            )));
        }

        let mut bindings = Vec::with_capacity(self.params.len());
        for (index, param) in self.params.iter().enumerate() {
            let value = match ctx.attribute(&param.name)? {
                Some(value) => value,
                None => match (positional.get(index), &param.default) {
                    (Some(value), _) => value.clone(),
                    (None, Some(default)) => ctx.state().substitute(default)?,
                    (None, None) => {
                        return Err(ctx.fail(format!("missing parameter '{}'", param.name)))
                    }
                },
            };
            bindings.push((param.name.clone(), Value::from(value)));
        }

        ctx.scoped(bindings, |ctx| ctx.expand_template(&self.name, &self.body))
    }
}

/// `<@log level="debug">text</@log>`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMacro;

impl MacroHandler for LogMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        let message = match ctx.attribute("message")? {
            Some(message) => message,
            None => {
                let body = ctx.body().trim();
                ctx.state().substitute(body)?
            }
        };
        let level = ctx
            .attribute("level")?
            .unwrap_or_else(|| "info".to_string());
        let template = ctx.state().template_name().to_string();

        match level.to_ascii_lowercase().as_str() {
            "trace" => trace!(template = %template, "{}", message),
            "debug" => debug!(template = %template, "{}", message),
            "info" => info!(template = %template, "{}", message),
            "warn" => warn!(template = %template, "{}", message),
            "error" => error!(template = %template, "{}", message),
            _ => return Err(ctx.fail(format!("unknown log level '{}'", level))),
        }
        Ok(())
    }
}

/// `<@actor action="$createPreview" id="preview"/>`: places the actor an
/// action returns
#[derive(Debug, Clone, Copy, Default)]
pub struct ActorMacro;

impl MacroHandler for ActorMacro {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        let id = ctx
            .attribute_or_first("action")?
            .ok_or_else(|| ctx.fail("missing 'action'"))?;

        match ctx.state().invoke_action(&id, None)? {
            Some(ActionValue::Actor(actor)) => {
                if let Some(actor_id) = ctx.attribute("id")? {
                    ctx.state().register_actor(actor_id, actor.clone());
                }
                ctx.place_actor(actor)
            }
            Some(other) => Err(ctx.fail(format!("action '{}' returned {:?}, not an actor", id, other))),
            // unresolved or failed, already recovered
            None => Ok(()),
        }
    }
}
