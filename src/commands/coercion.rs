//! Conversion of command tokens into typed arguments
//!
//! Each [`ParamKind`] owns its conversion. Primitive kinds parse the token
//! (Rust's parsers are locale-independent); reference kinds resolve the token
//! as an entity name through the host's [`EntityResolver`].

use crate::errors::CommandError;
use crate::host::entities::{Component, ComponentType, Entity, EntityResolver};
use std::fmt;
use std::sync::Arc;

/// The closed set of parameter types a command may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    Float,
    Bool,
    Text,
    /// Token names an entity
    Entity,
    /// Token names an entity; the argument is its component of this type
    Component(ComponentType),
}

impl ParamKind {
    fn describe(&self) -> String {
        match self {
            ParamKind::Integer => "integer".to_string(),
            ParamKind::Float => "number".to_string(),
            ParamKind::Bool => "boolean".to_string(),
            ParamKind::Text => "text".to_string(),
            ParamKind::Entity => "entity".to_string(),
            ParamKind::Component(ty) => format!("{ty} component"),
        }
    }

    /// Convert one token. `None` means the token does not parse as this kind.
    fn convert(&self, token: &str, resolver: Option<&dyn EntityResolver>) -> Option<Argument> {
        match self {
            ParamKind::Integer => token.parse().ok().map(Argument::Integer),
            ParamKind::Float => token.parse().ok().map(Argument::Float),
            ParamKind::Bool => parse_bool(token).map(Argument::Bool),
            ParamKind::Text => Some(Argument::Text(token.to_string())),
            ParamKind::Entity => Some(Argument::Entity(find_entity(resolver, token))),
            ParamKind::Component(ty) => {
                let component = find_entity(resolver, token).and_then(|entity| {
                    resolver.and_then(|r| r.find_component(entity.as_ref(), *ty))
                });
                if component.is_none() {
                    log::debug!("no {ty} component on '{token}'; passing none");
                }
                Some(Argument::Component(component))
            }
        }
    }
}

fn parse_bool(token: &str) -> Option<bool> {
    if token.eq_ignore_ascii_case("true") {
        Some(true)
    } else if token.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn find_entity(resolver: Option<&dyn EntityResolver>, name: &str) -> Option<Arc<dyn Entity>> {
    let found = resolver.and_then(|r| r.find_entity_by_name(name));
    if found.is_none() {
        log::debug!("no entity named '{name}'; passing none");
    }
    found
}

/// One declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub optional: bool,
}

impl ParamSpec {
    pub fn required(kind: ParamKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn optional(kind: ParamKind) -> Self {
        Self {
            kind,
            optional: true,
        }
    }
}

/// A converted argument
#[derive(Clone)]
pub enum Argument {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Entity(Option<Arc<dyn Entity>>),
    Component(Option<Arc<dyn Component>>),
    /// An optional parameter the command line left out
    Default,
}

impl Argument {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Argument::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Argument::Float(f) => Some(*f),
            Argument::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Arc<dyn Entity>> {
        match self {
            Argument::Entity(entity) => entity.as_ref(),
            _ => None,
        }
    }

    pub fn as_component<T: Component>(&self) -> Option<&T> {
        match self {
            Argument::Component(Some(component)) => component.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Argument::Default)
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Integer(i) => write!(f, "Integer({i})"),
            Argument::Float(x) => write!(f, "Float({x})"),
            Argument::Bool(b) => write!(f, "Bool({b})"),
            Argument::Text(s) => write!(f, "Text({s:?})"),
            Argument::Entity(Some(entity)) => write!(f, "Entity({:?})", entity.name()),
            Argument::Entity(None) => f.write_str("Entity(None)"),
            Argument::Component(Some(_)) => f.write_str("Component(..)"),
            Argument::Component(None) => f.write_str("Component(None)"),
            Argument::Default => f.write_str("Default"),
        }
    }
}

/// Converts the tokens after a command name into an argument list
#[derive(Clone, Copy, Default)]
pub struct ParameterCoercer<'a> {
    resolver: Option<&'a dyn EntityResolver>,
}

impl<'a> ParameterCoercer<'a> {
    pub fn new(resolver: Option<&'a dyn EntityResolver>) -> Self {
        Self { resolver }
    }

    /// Check the token count against `params`, then convert each token.
    /// Any failure rejects the whole list.
    pub fn coerce(
        &self,
        params: &[ParamSpec],
        tokens: &[&str],
    ) -> Result<Vec<Argument>, CommandError> {
        let required = params.iter().filter(|p| !p.optional).count();
        let max = params.len();
        if tokens.len() < required || tokens.len() > max {
            return Err(CommandError::ArityMismatch {
                command: String::new(),
                min: required,
                max,
                actual: tokens.len(),
            });
        }

        params
            .iter()
            .enumerate()
            .map(|(index, param)| match tokens.get(index) {
                Some(token) => param.kind.convert(token, self.resolver).ok_or_else(|| {
                    CommandError::TypeConversion {
                        command: String::new(),
                        index,
                        token: token.to_string(),
                        expected: param.kind.describe(),
                    }
                }),
                None => Ok(Argument::Default),
            })
            .collect()
    }
}
