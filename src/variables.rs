//! Final variable and dependency sets for a finished turn.
//!
//! Existing variables are never rewritten. Names that appear for the first
//! time, either declared by the stream or referenced by a step, become
//! AI-sourced variables whose value comes from the declaration, then the
//! workspace store, then empty.

use std::collections::HashSet;

use automation_model::{
    Dependency, EnvValue, EnvVariable, EnvironmentValues, StepFile, VariableSource,
    WorkspaceVariable,
};
use serde_json::Value;
use stream_api::DeclaredVariable;
use uuid::Uuid;

use crate::config::WorkspaceMode;

/// Union of the variable names used by `steps`, in first-use order.
pub fn referenced_variables(steps: &[StepFile]) -> Vec<String> {
    let mut seen = HashSet::new();
    steps
        .iter()
        .flat_map(|step| step.environment_variables_used.iter())
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Names that would be created for this turn, in declaration order.
pub fn new_variable_names(
    existing: &[EnvVariable],
    steps: &[StepFile],
    declared: &[DeclaredVariable],
) -> Vec<String> {
    let referenced = referenced_variables(steps);
    let mut seen: HashSet<&str> = existing.iter().map(|variable| variable.name.as_str()).collect();
    let mut names = Vec::new();
    for name in declared
        .iter()
        .map(|variable| variable.name.as_str())
        .chain(referenced.iter().map(String::as_str))
    {
        if seen.insert(name) {
            names.push(name.to_owned());
        }
    }
    names
}

/// Whether some new variable has no declared value and needs the store.
pub fn needs_store_lookup(
    existing: &[EnvVariable],
    steps: &[StepFile],
    declared: &[DeclaredVariable],
) -> bool {
    new_variable_names(existing, steps, declared)
        .iter()
        .any(|name| declared_value(declared, name).is_none())
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregation<'a> {
    pub existing: &'a [EnvVariable],
    pub steps: &'a [StepFile],
    pub declared: &'a [DeclaredVariable],
    pub stored: &'a [WorkspaceVariable],
    pub mode: WorkspaceMode,
    pub multi_environment: bool,
}

pub fn aggregate_variables(input: Aggregation<'_>) -> Vec<EnvVariable> {
    let mut variables = input.existing.to_vec();

    for name in new_variable_names(input.existing, input.steps, input.declared) {
        let value = declared_value(input.declared, &name)
            .or_else(|| {
                input
                    .stored
                    .iter()
                    .find(|stored| stored.name == name)
                    .map(|stored| &stored.value)
            })
            .map(|value| env_value_from_json(value, input.multi_environment))
            .unwrap_or_else(|| empty_value(input.multi_environment));
        variables.push(EnvVariable {
            id: Uuid::new_v4().to_string(),
            name,
            value,
            source: VariableSource::Ai,
        });
    }

    let referenced = referenced_variables(input.steps);
    if input.mode == WorkspaceMode::MultiFile && !referenced.is_empty() {
        variables.retain(|variable| referenced.contains(&variable.name));
    }
    variables
}

fn declared_value<'a>(declared: &'a [DeclaredVariable], name: &str) -> Option<&'a Value> {
    declared
        .iter()
        .rev()
        .filter(|variable| variable.name == name)
        .find_map(|variable| variable.value.as_ref())
}

fn empty_value(multi_environment: bool) -> EnvValue {
    if multi_environment {
        EnvValue::PerEnvironment(EnvironmentValues::default())
    } else {
        EnvValue::default()
    }
}

/// Shapes a raw value for the active environment mode: the `dev` slot when
/// inactive, the whole object (scalars land in `dev`) when active.
pub fn env_value_from_json(value: &Value, multi_environment: bool) -> EnvValue {
    let per_environment = match value {
        Value::Object(_) => serde_json::from_value::<EnvironmentValues>(value.clone()).ok(),
        _ => None,
    };

    match (per_environment, multi_environment) {
        (Some(values), true) => EnvValue::PerEnvironment(values),
        (Some(values), false) => EnvValue::Scalar(values.dev.unwrap_or_default()),
        (None, true) => EnvValue::PerEnvironment(EnvironmentValues {
            dev: scalar_text(value),
            ..EnvironmentValues::default()
        }),
        (None, false) => EnvValue::Scalar(scalar_text(value).unwrap_or_default()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) | Value::Array(_) => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Union by name; the existing entry wins.
pub fn merge_dependencies(existing: &[Dependency], incoming: &[Dependency]) -> Vec<Dependency> {
    let mut merged = existing.to_vec();
    for dependency in incoming {
        if !merged.iter().any(|known| known.name == dependency.name) {
            merged.push(dependency.clone());
        }
    }
    merged
}
