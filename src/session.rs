//! Document state of one conversation and the synchronous frame pipeline.
//!
//! [`ChatSession`] owns everything a send can mutate. It is `Clone` so the
//! engine can snapshot it before a send and restore it when the send is
//! cancelled or superseded. Nothing here awaits; every method returns the
//! events the caller should publish.

use automation_model::{
    AssembledMessage, Dependency, DocumentCheckpoint, EnvVariable, StepFile, StepStatus,
    TriggerMode, WorkspaceVariable,
};
use stream_api::{CommitBody, CommitFile, CommitPayload, DeclaredVariable, StreamFrame};
use tracing::debug;

use crate::baseline::BaselineSet;
use crate::config::WorkspaceMode;
use crate::guard::{RetryController, RetryDecision};
use crate::merge::MessageLog;
use crate::observer::SessionEvent;
use crate::reconcile::{ReconcileOutcome, StepReconciler, ToolAction};
use crate::variables::{aggregate_variables, merge_dependencies, needs_store_lookup, Aggregation};

/// The ordered step list plus everything committed alongside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    pub steps: Vec<StepFile>,
    pub variables: Vec<EnvVariable>,
    pub dependencies: Vec<Dependency>,
    pub trigger_mode: Option<TriggerMode>,
    pub version: Option<u64>,
}

impl Workspace {
    pub fn step(&self, step_id: &str) -> Option<&StepFile> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut StepFile> {
        self.steps.iter_mut().find(|step| step.id == step_id)
    }

    /// Rewrites `order` as 1-based list positions.
    pub fn renumber(&mut self) {
        for (position, step) in self.steps.iter_mut().enumerate() {
            step.order = position + 1;
        }
    }

    /// Single-file mode stores the automation as the first step's code.
    pub fn single_file_code(&self) -> &str {
        self.steps.first().map_or("", |step| step.code.as_str())
    }

    pub fn commit_body(&self, mode: WorkspaceMode) -> CommitBody {
        match mode {
            WorkspaceMode::SingleFile => CommitBody::Code(self.single_file_code().to_owned()),
            WorkspaceMode::MultiFile => {
                CommitBody::Files(self.steps.iter().map(CommitFile::from).collect())
            }
        }
    }

    pub fn content_len(&self, mode: WorkspaceMode) -> usize {
        self.commit_body(mode).content_len()
    }
}

/// Automatic retry requested by a placeholder rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRetry {
    pub step_id: String,
    pub attempt: u32,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FrameEffects {
    pub events: Vec<SessionEvent>,
    pub retries: Vec<PendingRetry>,
    /// Set by an error frame; the send ends with this message.
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    automation_id: String,
    /// Messages of finished turns.
    history: Vec<AssembledMessage>,
    /// Messages of the turn in progress.
    log: MessageLog,
    workspace: Workspace,
    reconciler: StepReconciler,
    retries: RetryController,
    baselines: BaselineSet,
    declared: Vec<DeclaredVariable>,
    current_request: String,
    committed_len: usize,
}

impl ChatSession {
    pub fn new(automation_id: impl Into<String>) -> Self {
        Self {
            automation_id: automation_id.into(),
            history: Vec::new(),
            log: MessageLog::default(),
            workspace: Workspace::default(),
            reconciler: StepReconciler::default(),
            retries: RetryController::default(),
            baselines: BaselineSet::default(),
            declared: Vec::new(),
            current_request: String::new(),
            committed_len: 0,
        }
    }

    /// Resumes from a stored checkpoint; every step's code counts as accepted.
    pub fn from_checkpoint(checkpoint: DocumentCheckpoint, mode: WorkspaceMode) -> Self {
        let mut workspace = Workspace {
            steps: checkpoint.steps,
            variables: checkpoint.environment_variables,
            dependencies: checkpoint.dependencies,
            trigger_mode: checkpoint.trigger_mode,
            version: checkpoint.version,
        };
        workspace.renumber();

        let mut baselines = BaselineSet::default();
        for step in &workspace.steps {
            baselines.track(step.id.clone(), step.code.clone());
        }

        Self {
            reconciler: StepReconciler::with_steps(&workspace.steps),
            committed_len: workspace.content_len(mode),
            history: checkpoint.messages,
            baselines,
            workspace,
            ..Self::new(checkpoint.automation_id)
        }
    }

    pub fn with_max_auto_retries(mut self, max_auto_retries: u32) -> Self {
        self.retries = RetryController::new(max_auto_retries);
        self
    }

    pub fn automation_id(&self) -> &str {
        &self.automation_id
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn steps(&self) -> &[StepFile] {
        &self.workspace.steps
    }

    pub fn baselines(&self) -> &BaselineSet {
        &self.baselines
    }

    pub fn retries(&self) -> &RetryController {
        &self.retries
    }

    pub fn current_request(&self) -> &str {
        &self.current_request
    }

    pub fn committed_len(&self) -> usize {
        self.committed_len
    }

    /// Finished turns followed by the live turn.
    pub fn messages(&self) -> Vec<AssembledMessage> {
        self.history
            .iter()
            .chain(self.log.messages())
            .cloned()
            .collect()
    }

    pub fn checkpoint(&self) -> DocumentCheckpoint {
        DocumentCheckpoint {
            automation_id: self.automation_id.clone(),
            messages: self.messages(),
            steps: self.workspace.steps.clone(),
            environment_variables: self.workspace.variables.clone(),
            dependencies: self.workspace.dependencies.clone(),
            trigger_mode: self.workspace.trigger_mode,
            version: self.workspace.version,
        }
    }

    /// Opens a turn for `request`, echoing `message` into the conversation.
    pub fn begin_turn(&mut self, message: AssembledMessage, request: &str) -> Vec<SessionEvent> {
        self.current_request = request.to_owned();
        self.declared.clear();
        self.log.push(message);
        vec![SessionEvent::MessagesChanged {
            messages: self.messages(),
        }]
    }

    pub fn apply_frame(&mut self, frame: StreamFrame, diff_review: bool) -> FrameEffects {
        let mut effects = FrameEffects::default();
        match frame {
            StreamFrame::Ping => {}
            StreamFrame::Error { message } => effects.failure = Some(message),
            StreamFrame::ScheduleUpdate { mode } => {
                self.workspace.trigger_mode = Some(mode);
                effects.events.push(SessionEvent::ScheduleChanged { mode });
                effects.events.push(self.checkpoint_event());
            }
            StreamFrame::UsedVariables { variables } => {
                debug!(count = variables.len(), "variables declared by stream");
                self.declared.extend(variables);
            }
            StreamFrame::Delta(delta) => {
                let position = self.log.merge(delta);
                self.log.mark_completed_tool_calls(&mut self.history);
                if let Some(message) = self.log.at(position).cloned() {
                    self.reconcile_message(&message, diff_review, &mut effects);
                }
                effects.events.push(SessionEvent::MessagesChanged {
                    messages: self.messages(),
                });
            }
        }
        effects
    }

    fn reconcile_message(
        &mut self,
        message: &AssembledMessage,
        diff_review: bool,
        effects: &mut FrameEffects,
    ) {
        let outcome = self.reconciler.reconcile(message, &mut self.workspace);
        if outcome == ReconcileOutcome::Ignored {
            return;
        }
        if let Some(action) = ToolAction::parse(&message.text()) {
            let name = self
                .reconciler
                .display_name(action.target_id(), &self.workspace)
                .map(ToOwned::to_owned);
            if let Some(name) = name {
                self.log.set_step_name(&message.id, &name);
            }
        }

        match outcome {
            ReconcileOutcome::Created { step_id, .. } => {
                self.baselines.track(step_id, "");
                self.push_steps_changed(effects);
            }
            ReconcileOutcome::Updated {
                step_id,
                previous_code,
                code_changed,
            } => {
                if self.retries.clear(&step_id).is_some() {
                    debug!(step_id = %step_id, "placeholder rejections resolved");
                }
                if code_changed {
                    let code = self
                        .workspace
                        .step(&step_id)
                        .map(|step| step.code.clone())
                        .unwrap_or_default();
                    if diff_review {
                        self.baselines.enter_diff_mode(&step_id, &previous_code);
                        self.baselines.record_edit(&step_id, &code);
                        if let Some(stats) = self.baselines.diff_stats(&step_id) {
                            effects
                                .events
                                .push(SessionEvent::DiffPending { step_id, stats });
                        }
                    } else {
                        self.baselines.track(step_id, code);
                    }
                }
                self.push_steps_changed(effects);
            }
            ReconcileOutcome::PlaceholderRejected { step_id, rule } => {
                let Some(step) = self.workspace.step(&step_id).cloned() else {
                    return;
                };
                let decision = self.retries.record_rejection(&step, &self.current_request);
                let count = self
                    .retries
                    .record(&step_id)
                    .map_or(0, |record| record.count);
                effects.events.push(SessionEvent::PlaceholderRejected {
                    step_id: step_id.clone(),
                    rule,
                    count,
                });
                match decision {
                    RetryDecision::Auto { attempt, message } => {
                        effects.retries.push(PendingRetry {
                            step_id,
                            attempt,
                            message,
                        });
                    }
                    RetryDecision::Manual { message } => {
                        effects
                            .events
                            .push(SessionEvent::ManualRetryAvailable { step_id, message });
                    }
                }
            }
            ReconcileOutcome::Deleted {
                step,
                removed_variables,
            } => {
                self.baselines.remove(&step.id);
                self.retries.clear(&step.id);
                if !removed_variables.is_empty() {
                    effects.events.push(SessionEvent::VariablesChanged {
                        variables: self.workspace.variables.clone(),
                    });
                }
                self.push_steps_changed(effects);
            }
            ReconcileOutcome::Ignored
            | ReconcileOutcome::AlreadyApplied(_)
            | ReconcileOutcome::StepExists { .. }
            | ReconcileOutcome::MissingStep { .. } => {}
        }
    }

    fn push_steps_changed(&self, effects: &mut FrameEffects) {
        effects.events.push(SessionEvent::StepsChanged {
            steps: self.workspace.steps.clone(),
        });
        effects.events.push(self.checkpoint_event());
    }

    fn checkpoint_event(&self) -> SessionEvent {
        SessionEvent::Checkpoint(self.checkpoint())
    }

    /// Whether finishing this turn needs stored workspace variables.
    pub fn needs_variable_lookup(&self) -> bool {
        needs_store_lookup(
            &self.workspace.variables,
            &self.workspace.steps,
            &self.declared,
        )
    }

    /// Seals a turn that ended with an error. Declarations it made are dropped.
    pub fn abandon_turn(&mut self) {
        self.log.seal_all();
        self.log.mark_completed_tool_calls(&mut self.history);
        self.history.extend(self.log.drain());
        self.declared.clear();
        self.reconciler.take_dependencies();
    }

    /// Seals the turn and computes the final variable and dependency sets.
    pub fn finish_turn(
        &mut self,
        stored: &[WorkspaceVariable],
        mode: WorkspaceMode,
        multi_environment: bool,
    ) -> Vec<SessionEvent> {
        self.log.seal_all();
        self.log.mark_completed_tool_calls(&mut self.history);
        self.history.extend(self.log.drain());

        let mut events = Vec::new();
        let declared_dependencies = self.reconciler.take_dependencies();
        self.workspace.dependencies =
            merge_dependencies(&self.workspace.dependencies, &declared_dependencies);

        let variables = aggregate_variables(Aggregation {
            existing: &self.workspace.variables,
            steps: &self.workspace.steps,
            declared: &self.declared,
            stored,
            mode,
            multi_environment,
        });
        self.declared.clear();
        if variables != self.workspace.variables {
            self.workspace.variables = variables;
            events.push(SessionEvent::VariablesChanged {
                variables: self.workspace.variables.clone(),
            });
        }

        events.push(SessionEvent::MessagesChanged {
            messages: self.messages(),
        });
        events.push(self.checkpoint_event());
        events
    }

    /// Promotes the live content of `step_id` and returns it.
    pub fn accept(&mut self, step_id: &str) -> Option<String> {
        let content = self.baselines.accept(step_id)?;
        if let Some(step) = self.workspace.step_mut(step_id) {
            step.status = StepStatus::Ready;
        }
        Some(content)
    }

    /// Restores the accepted content of `step_id` into the step and returns it.
    pub fn reject(&mut self, step_id: &str) -> Option<String> {
        let content = self.baselines.reject(step_id)?;
        let step = self.workspace.step_mut(step_id)?;
        step.code = content.clone();
        Some(content)
    }

    /// A user edit. Under review it only moves the live side of the baseline.
    pub fn edit_step_code(&mut self, step_id: &str, code: &str) -> bool {
        let Some(step) = self.workspace.step_mut(step_id) else {
            return false;
        };
        step.code = code.to_owned();
        let under_review = self
            .baselines
            .get(step_id)
            .is_some_and(|baseline| baseline.in_diff_mode);
        if under_review {
            self.baselines.record_edit(step_id, code);
        } else {
            self.baselines.track(step_id, code);
        }
        true
    }

    pub fn manual_retry_message(&self, step_id: &str) -> Option<String> {
        let step = self.workspace.step(step_id)?;
        self.retries.manual_retry_message(step)
    }

    pub fn commit_payload(&self, mode: WorkspaceMode, description: &str) -> CommitPayload {
        CommitPayload {
            automation_id: self.automation_id.clone(),
            body: self.workspace.commit_body(mode),
            dependencies: self.workspace.dependencies.clone(),
            environment_variables: self.workspace.variables.clone(),
            change_description: description.to_owned(),
        }
    }

    /// Records a successful commit of `content_len` bytes.
    pub fn mark_committed(&mut self, version: Option<u64>, content_len: usize) {
        if version.is_some() {
            self.workspace.version = version;
        }
        self.committed_len = content_len;
    }
}
