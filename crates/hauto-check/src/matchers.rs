//! Ready-made checks over the firing payload

use hauto_core::{Context, HautoError, HautoResult};
use serde_json::Value;
use std::fmt;

use crate::check::Check;

/// Split `domain.object_id` into its parts
///
/// Returns `None` unless there is exactly one separator and both halves
/// are lowercase alphanumeric with underscores, not starting or ending with
/// an underscore. The domain additionally may not contain `__`.
pub fn split_entity_id(entity_id: &str) -> Option<(&str, &str)> {
    let (domain, object_id) = entity_id.split_once('.')?;
    if object_id.contains('.') {
        return None;
    }
    if domain.contains("__") || !is_valid_slug(domain) || !is_valid_slug(object_id) {
        return None;
    }
    Some((domain, object_id))
}

fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntityMatch {
    EntityId(String),
    Domain(String),
}

/// Admits firings whose `payload["entity_id"]` names a given entity or
/// belongs to a given domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCheck {
    matcher: EntityMatch,
}

impl EntityCheck {
    /// Match on exactly one of `entity_id` or `domain`
    pub fn new(entity_id: Option<&str>, domain: Option<&str>) -> HautoResult<Self> {
        match (entity_id, domain) {
            (Some(entity_id), None) => Self::entity_id(entity_id),
            (None, Some(domain)) => Self::domain(domain),
            (Some(_), Some(_)) => Err(HautoError::config(
                "EntityCheck accepts either 'entity_id' or 'domain', but not both",
            )),
            (None, None) => Err(HautoError::config(
                "EntityCheck requires one of 'entity_id' or 'domain'",
            )),
        }
    }

    pub fn entity_id(entity_id: &str) -> HautoResult<Self> {
        if split_entity_id(entity_id).is_none() {
            return Err(HautoError::config(format!(
                "invalid entity id '{entity_id}', expected <domain>.<object_id>"
            )));
        }
        Ok(Self {
            matcher: EntityMatch::EntityId(entity_id.to_string()),
        })
    }

    pub fn domain(domain: &str) -> HautoResult<Self> {
        if domain.contains("__") || !is_valid_slug(domain) {
            return Err(HautoError::config(format!("invalid domain '{domain}'")));
        }
        Ok(Self {
            matcher: EntityMatch::Domain(domain.to_string()),
        })
    }

    /// Evaluate against the firing payload
    pub fn matches(&self, ctx: &Context) -> bool {
        let Some(entity_id) = ctx.get("entity_id").and_then(Value::as_str) else {
            return false;
        };

        match &self.matcher {
            EntityMatch::EntityId(wanted) => wanted == entity_id,
            EntityMatch::Domain(wanted) => split_entity_id(entity_id)
                .map(|(domain, _)| domain == wanted)
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for EntityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            EntityMatch::EntityId(id) => write!(f, "entity_id={id}"),
            EntityMatch::Domain(domain) => write!(f, "domain={domain}"),
        }
    }
}

impl From<EntityCheck> for Check {
    fn from(entity: EntityCheck) -> Self {
        let name = entity.to_string();
        Check::new(move |ctx| Ok(entity.matches(ctx))).named(name)
    }
}

/// Admits firings where `payload[key] == value`
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCheck {
    key: String,
    value: Value,
}

impl ValueCheck {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, ctx: &Context) -> bool {
        ctx.get(&self.key) == Some(&self.value)
    }
}

impl From<ValueCheck> for Check {
    fn from(value: ValueCheck) -> Self {
        let name = format!("{}=={}", value.key, value.value);
        Check::new(move |ctx| Ok(value.matches(ctx))).named(name)
    }
}
