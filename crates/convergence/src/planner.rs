//! Planning - ordering, filtering, and deciding per-component actions

use crate::component::{BoxedComponent, ManagedComponent};
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::types::{Action, ComponentState, Direction};
use serde::Serialize;
use std::collections::HashSet;

/// One decided step of a plan
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub id: String,
    pub description: String,
    pub component_type: String,
    pub rank: u32,
    pub state: ComponentState,
    pub action: Action,
    pub requires_privilege: bool,
    /// Set when detection failed and the state was assumed Absent
    pub inconclusive: Option<String>,
    /// Rollback only: auxiliary artifacts left behind by an absent component
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leftovers: Vec<String>,
}

impl PlannedStep {
    /// Whether carrying out this step changes the host
    pub fn mutates(&self) -> bool {
        self.action.is_mutation() || !self.leftovers.is_empty()
    }
}

/// Order components for a direction.
///
/// Install runs in ascending rank; rollback in descending rank so dependents
/// are removed before their dependencies. Equal ranks keep declaration order
/// (reversed for rollback).
pub fn order(
    components: &[BoxedComponent],
    direction: Direction,
) -> Result<Vec<&dyn ManagedComponent>> {
    let mut seen = HashSet::new();
    for component in components {
        let id = component.id();
        if !seen.insert(id.clone()) {
            return Err(Error::DuplicateComponent { id });
        }
    }

    let mut ordered: Vec<&dyn ManagedComponent> = components.iter().map(|c| c.as_ref()).collect();
    ordered.sort_by_key(|c| c.rank());
    if direction == Direction::Rollback {
        ordered.reverse();
    }
    Ok(ordered)
}

/// Detect a component, treating an inconclusive detection as Absent.
pub fn detect(component: &dyn ManagedComponent, ctx: &ApplyContext) -> (ComponentState, Option<String>) {
    match component.detect(ctx) {
        Ok(state) => {
            log::debug!("{}: detected {}", component.id(), state);
            (state, None)
        }
        Err(e) => {
            let e = Error::DetectionInconclusive {
                component: component.id(),
                message: e.to_string(),
            };
            log::warn!("{e}; treating as absent");
            (ComponentState::Absent, Some(e.to_string()))
        }
    }
}

/// Detect and decide for every component without acting.
pub fn plan(
    components: &[BoxedComponent],
    direction: Direction,
    ctx: &ApplyContext,
) -> Result<Vec<PlannedStep>> {
    let ordered = order(components, direction)?;
    Ok(ordered
        .into_iter()
        .map(|component| {
            let (state, inconclusive) = detect(component, ctx);
            let action = Action::decide(direction, &state);
            let leftovers = if direction == Direction::Rollback && action == Action::Skip {
                component.leftovers(ctx)
            } else {
                Vec::new()
            };
            PlannedStep {
                id: component.id(),
                description: component.description(),
                component_type: component.component_type().to_string(),
                rank: component.rank(),
                state,
                action,
                requires_privilege: component.requires_privilege(),
                inconclusive,
                leftovers,
            }
        })
        .collect())
}

/// Keep only components matching any of the targets.
///
/// Target format: "type", "type.id", or an id substring.
pub fn filter_by_targets(components: Vec<BoxedComponent>, targets: &[String]) -> Vec<BoxedComponent> {
    if targets.is_empty() {
        return components;
    }
    let parsed: Vec<_> = targets.iter().map(|t| parse_target(t)).collect();
    components
        .into_iter()
        .filter(|c| {
            parsed
                .iter()
                .any(|(ty, name)| matches_filter(c.as_ref(), ty.as_deref(), name.as_deref()))
        })
        .collect()
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        Some((ty, name)) if !name.contains('.') => (Some(ty.to_string()), Some(name.to_string())),
        Some(_) => (None, Some(target.to_string())),
        None => (None, Some(target.to_string())),
    }
}

/// Check a type word against a component, allowing common aliases
fn type_matches(component: &dyn ManagedComponent, word: &str) -> bool {
    match word {
        "packages" | "apt" => component.component_type().starts_with("apt"),
        "services" => component.component_type() == "service",
        _ => component.component_type() == word,
    }
}

/// Check if a component matches the filter criteria
fn matches_filter(
    component: &dyn ManagedComponent,
    component_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(ty) = component_type {
        return type_matches(component, ty) && name.is_none_or(|n| component.id().contains(n));
    }

    // A bare word matches either a type or an id
    name.is_none_or(|n| type_matches(component, n) || component.id().contains(n))
}
