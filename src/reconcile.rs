use std::collections::{HashMap, HashSet};
use std::fmt;

use automation_model::{AssembledMessage, Dependency, Role, StepFile, StepStatus};
use serde_json::Value;
use tracing::{debug, info};

use crate::guard::{detect_placeholder, PlaceholderRule};
use crate::session::Workspace;

/// Step mutation requested by a tool response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    CreateStep {
        step_id: String,
        /// 1-based position requested by the model.
        index: Option<i64>,
        name: Option<String>,
    },
    UpdateStep {
        step_id: String,
        code: Option<String>,
        name: Option<String>,
        environment_variables_used: Option<Vec<String>>,
        dependencies: Vec<Dependency>,
    },
    DeleteStep {
        step_id: String,
    },
}

impl ToolAction {
    /// Parses a tool response body. Anything that is not a recognized action
    /// with a target id yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text.trim()).ok()?;
        let action = value.get("action").and_then(Value::as_str)?;
        let string_field = |field: &str| {
            value
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(ToOwned::to_owned)
        };
        let step_id = string_field("stepId").or_else(|| string_field("id"))?;

        match action {
            "create-step" => Some(Self::CreateStep {
                step_id,
                index: value.get("index").and_then(parse_index),
                name: string_field("name"),
            }),
            "update-step" | "update-step-code" => Some(Self::UpdateStep {
                step_id,
                code: value
                    .get("code")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
                name: string_field("name"),
                environment_variables_used: value
                    .get("environmentVariablesUsed")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::trim)
                            .filter(|name| !name.is_empty())
                            .map(ToOwned::to_owned)
                            .collect()
                    }),
                dependencies: value
                    .get("dependencies")
                    .and_then(Value::as_array)
                    .map(|entries| entries.iter().filter_map(parse_dependency).collect())
                    .unwrap_or_default(),
            }),
            "delete-step" => Some(Self::DeleteStep { step_id }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateStep { .. } => "create-step",
            Self::UpdateStep { .. } => "update-step",
            Self::DeleteStep { .. } => "delete-step",
        }
    }

    pub fn target_id(&self) -> &str {
        match self {
            Self::CreateStep { step_id, .. }
            | Self::UpdateStep { step_id, .. }
            | Self::DeleteStep { step_id } => step_id,
        }
    }
}

fn parse_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_dependency(entry: &Value) -> Option<Dependency> {
    if let Some(name) = entry.as_str().map(str::trim).filter(|name| !name.is_empty()) {
        return Some(Dependency::latest(name));
    }
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?;
    Some(match entry.get("version").and_then(Value::as_str) {
        Some(version) if !version.trim().is_empty() => Dependency::new(name, version.trim()),
        _ => Dependency::latest(name),
    })
}

/// Identity of one logical tool response: `action:targetId#responseId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey(String);

impl OperationKey {
    pub fn new(action: &str, target_id: &str, response_id: &str) -> Self {
        Self(format!("{action}:{target_id}#{response_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not a tool response carrying a recognized action (yet).
    Ignored,
    AlreadyApplied(OperationKey),
    Created {
        step_id: String,
        position: usize,
    },
    /// A create for an id that is already in the workspace.
    StepExists {
        step_id: String,
    },
    Updated {
        step_id: String,
        previous_code: String,
        code_changed: bool,
    },
    PlaceholderRejected {
        step_id: String,
        rule: PlaceholderRule,
    },
    Deleted {
        step: StepFile,
        removed_variables: Vec<String>,
    },
    MissingStep {
        step_id: String,
    },
}

impl ReconcileOutcome {
    /// Whether the workspace changed.
    pub fn mutated(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Updated { .. } | Self::Deleted { .. }
        )
    }
}

/// Applies tool responses to the step list, at most once per response.
#[derive(Debug, Clone, Default)]
pub struct StepReconciler {
    applied: HashSet<OperationKey>,
    step_names: HashMap<String, String>,
    pending_dependencies: Vec<Dependency>,
}

impl StepReconciler {
    /// Seeds the name cache from an existing step list.
    pub fn with_steps(steps: &[StepFile]) -> Self {
        let mut reconciler = Self::default();
        for step in steps {
            if !step.name.is_empty() {
                reconciler.step_names.insert(step.id.clone(), step.name.clone());
            }
        }
        reconciler
    }

    pub fn reconcile(
        &mut self,
        message: &AssembledMessage,
        workspace: &mut Workspace,
    ) -> ReconcileOutcome {
        if message.role != Role::Tool {
            return ReconcileOutcome::Ignored;
        }
        let Some(action) = ToolAction::parse(&message.text()) else {
            return ReconcileOutcome::Ignored;
        };

        let key = OperationKey::new(action.name(), action.target_id(), &message.id);
        if self.applied.contains(&key) {
            return ReconcileOutcome::AlreadyApplied(key);
        }

        let outcome = self.apply(action, workspace);
        debug!(%key, ?outcome, "reconciled tool response");
        self.applied.insert(key);
        outcome
    }

    pub fn apply(&mut self, action: ToolAction, workspace: &mut Workspace) -> ReconcileOutcome {
        match action {
            ToolAction::CreateStep {
                step_id,
                index,
                name,
            } => {
                if workspace.step(&step_id).is_some() {
                    return ReconcileOutcome::StepExists { step_id };
                }

                let name = name.unwrap_or_default();
                if !name.is_empty() {
                    self.step_names.insert(step_id.clone(), name.clone());
                }

                let len = workspace.steps.len() as i64;
                let position =
                    index.map_or(len, |index| index.saturating_sub(1).clamp(0, len)) as usize;
                workspace
                    .steps
                    .insert(position, StepFile::pending(&step_id, name));
                workspace.renumber();
                info!(step_id = %step_id, position, "created step");
                ReconcileOutcome::Created { step_id, position }
            }
            ToolAction::UpdateStep {
                step_id,
                code,
                name,
                environment_variables_used,
                dependencies,
            } => {
                let Some(step) = workspace.step_mut(&step_id) else {
                    return ReconcileOutcome::MissingStep { step_id };
                };

                if let Some(rule) = code.as_deref().and_then(detect_placeholder) {
                    info!(step_id = %step_id, rule = rule.as_str(), "rejected placeholder code");
                    return ReconcileOutcome::PlaceholderRejected { step_id, rule };
                }

                let previous_code = step.code.clone();
                let code_changed = code.as_ref().is_some_and(|code| *code != step.code);
                if let Some(code) = code {
                    step.code = code;
                    step.status = StepStatus::Ready;
                }
                if let Some(name) = name {
                    self.step_names.insert(step_id.clone(), name.clone());
                    step.name = name;
                } else if step.name.is_empty() {
                    if let Some(cached) = self.step_names.get(&step_id) {
                        step.name = cached.clone();
                    }
                }
                if let Some(used) = environment_variables_used {
                    step.environment_variables_used = used;
                }
                self.pending_dependencies.extend(dependencies);

                ReconcileOutcome::Updated {
                    step_id,
                    previous_code,
                    code_changed,
                }
            }
            ToolAction::DeleteStep { step_id } => {
                let Some(position) = workspace.steps.iter().position(|step| step.id == step_id)
                else {
                    return ReconcileOutcome::MissingStep { step_id };
                };

                let step = workspace.steps.remove(position);
                workspace.renumber();

                let removed_variables: Vec<String> = step
                    .environment_variables_used
                    .iter()
                    .filter(|name| !workspace.steps.iter().any(|other| other.uses_variable(name)))
                    .cloned()
                    .collect();
                workspace
                    .variables
                    .retain(|variable| !removed_variables.contains(&variable.name));

                info!(step_id = %step_id, removed = removed_variables.len(), "deleted step");
                ReconcileOutcome::Deleted {
                    step,
                    removed_variables,
                }
            }
        }
    }

    /// Display label for a step, from the cache or the live step list.
    pub fn display_name<'a>(&'a self, step_id: &str, workspace: &'a Workspace) -> Option<&'a str> {
        self.step_names
            .get(step_id)
            .map(String::as_str)
            .or_else(|| {
                workspace
                    .step(step_id)
                    .map(|step| step.name.as_str())
                    .filter(|name| !name.is_empty())
            })
    }

    pub fn is_applied(&self, key: &OperationKey) -> bool {
        self.applied.contains(key)
    }

    /// Dependencies declared by accepted updates since the last call.
    pub fn take_dependencies(&mut self) -> Vec<Dependency> {
        std::mem::take(&mut self.pending_dependencies)
    }
}
