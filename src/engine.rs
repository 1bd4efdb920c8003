//! Send orchestration around a [`ChatSession`].
//!
//! A [`ChatEngine`] owns one session behind a mutex that is never held across
//! an await. Each send snapshots the session, streams frames into it under the
//! lock and, when the stream ends cleanly, aggregates variables and commits.
//! A newer send, [`ChatEngine::cancel`] or [`ChatEngine::shutdown`] flips the
//! running send's cancellation flag and restores its snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use automation_model::{
    cancel_signal, AssembledMessage, CancelSignal, DocumentCheckpoint, EnvVariable, StepFile,
    WorkspaceVariable,
};
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use stream_api::client::await_or_cancel;
use stream_api::{ByteStream, ChatRequest, FrameDecoder, ImageAttachment, StreamApiError, StreamFrame};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::baseline::DiffStats;
use crate::commit::{CommitBackend, CommitManager, CommitOutcome, CommitRequest};
use crate::config::{EngineConfig, WorkspaceMode};
use crate::error::EngineError;
use crate::lock_unpoisoned;
use crate::observer::{SessionEvent, SessionObserver};
use crate::session::{ChatSession, PendingRetry};
use crate::timers::TimerSet;

/// Opens the chat stream for one request.
pub trait ChatTransport: Send + Sync {
    fn open(
        &self,
        request: ChatRequest,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<ByteStream, StreamApiError>>;
}

/// Source of stored workspace variables used to backfill new ones.
pub trait VariableStore: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<WorkspaceVariable>, StreamApiError>>;
}

/// Store with no variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyVariableStore;

impl VariableStore for EmptyVariableStore {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<WorkspaceVariable>, StreamApiError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendOrigin {
    #[default]
    User,
    AutoRetry,
    ManualRetry,
}

#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub message: String,
    pub step_id: Option<String>,
    pub images: Vec<ImageAttachment>,
    pub origin: SendOrigin,
}

impl SendRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }

    fn retry(step_id: String, message: String, origin: SendOrigin) -> Self {
        Self {
            message,
            step_id: Some(step_id),
            images: Vec::new(),
            origin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    pub generation: u64,
    pub frames: usize,
    /// A background commit was started for the finished turn.
    pub commit_started: bool,
}

struct ActiveSend {
    generation: u64,
    cancel: CancelSignal,
    snapshot: ChatSession,
}

struct EngineState {
    session: ChatSession,
    active: Option<ActiveSend>,
    generation: u64,
    /// Advances whenever pending automatic retries are dropped; retries armed
    /// under an older epoch never run.
    retry_epoch: u64,
    timers: TimerSet,
    commits: Vec<JoinHandle<()>>,
    shut_down: bool,
}

impl EngineState {
    fn is_active(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    /// Cancels the running send, restoring its snapshot.
    fn abort_active(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.cancel.store(true, Ordering::Release);
        self.session = active.snapshot;
        true
    }

    /// Drops every armed automatic retry. Steps that still carry a rejection
    /// record get a manual retry affordance instead.
    fn drop_retries(&mut self) -> Vec<SessionEvent> {
        self.retry_epoch += 1;
        self.timers
            .cancel_all()
            .into_iter()
            .filter_map(|step_id| self.manual_retry_event(step_id))
            .collect()
    }

    fn manual_retry_event(&self, step_id: String) -> Option<SessionEvent> {
        let message = self.session.manual_retry_message(&step_id)?;
        Some(SessionEvent::ManualRetryAvailable { step_id, message })
    }
}

struct RetryJob {
    epoch: u64,
    step_id: String,
    attempt: u32,
    message: String,
}

struct Shared {
    config: EngineConfig,
    transport: Arc<dyn ChatTransport>,
    variable_store: Arc<dyn VariableStore>,
    commits: CommitManager,
    observers: Vec<Arc<dyn SessionObserver>>,
    runtime: Handle,
    retry_tx: mpsc::UnboundedSender<RetryJob>,
    /// Retries whose timer fired but whose send has not returned yet.
    queued_retries: Arc<AtomicUsize>,
    state: Mutex<EngineState>,
}

impl Shared {
    fn emit(&self, event: &SessionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    fn emit_all(&self, events: &[SessionEvent]) {
        for event in events {
            self.emit(event);
        }
    }

    fn schedule_retry(&self, state: &mut EngineState, retry: PendingRetry) {
        let delay = self.config.auto_retry_delay;
        let tx = self.retry_tx.clone();
        let queued = self.queued_retries.clone();
        let job = RetryJob {
            epoch: state.retry_epoch,
            step_id: retry.step_id.clone(),
            attempt: retry.attempt,
            message: retry.message,
        };
        info!(step_id = %retry.step_id, attempt = retry.attempt, "scheduling automatic retry");
        state.timers.schedule(retry.step_id, delay, async move {
            queued.fetch_add(1, Ordering::AcqRel);
            if tx.send(job).is_err() {
                queued.fetch_sub(1, Ordering::AcqRel);
            }
        });
    }

    /// Builds a commit of the whole workspace and runs it in the background.
    fn spawn_commit(self: &Arc<Self>, state: &mut EngineState, target: &str) {
        let request = commit_request(&self.config, &state.session, target);
        let manager = self.commits.clone();
        let weak = Arc::downgrade(self);
        let handle = self.runtime.spawn(async move {
            let new_len = request.dedupe_key.new_len;
            let outcome = manager.submit(request).await;
            if let Some(shared) = weak.upgrade() {
                shared.record_commit(outcome, new_len);
            }
        });
        state.commits.retain(|handle| !handle.is_finished());
        state.commits.push(handle);
    }

    fn record_commit(&self, outcome: CommitOutcome, new_len: usize) {
        let mut events = Vec::new();
        if let CommitOutcome::Committed { version, .. } = &outcome {
            let mut state = lock_unpoisoned(&self.state);
            state.session.mark_committed(*version, new_len);
            events.push(SessionEvent::Checkpoint(state.session.checkpoint()));
        }
        events.push(SessionEvent::CommitFinished { outcome });
        self.emit_all(&events);
    }
}

fn commit_request(config: &EngineConfig, session: &ChatSession, target: &str) -> CommitRequest {
    let payload = session.commit_payload(config.workspace_mode, &config.change_description);
    CommitRequest::new(target, session.committed_len(), payload)
}

pub struct EngineBuilder {
    config: EngineConfig,
    session: Option<ChatSession>,
    transport: Option<Arc<dyn ChatTransport>>,
    commit_backend: Option<Arc<dyn CommitBackend>>,
    variable_store: Option<Arc<dyn VariableStore>>,
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            session: None,
            transport: None,
            commit_backend: None,
            variable_store: None,
            observers: Vec::new(),
        }
    }

    /// Continues from a stored document instead of an empty one.
    pub fn resume(mut self, checkpoint: DocumentCheckpoint) -> Self {
        self.session = Some(ChatSession::from_checkpoint(
            checkpoint,
            self.config.workspace_mode,
        ));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn commit_backend(mut self, backend: Arc<dyn CommitBackend>) -> Self {
        self.commit_backend = Some(backend);
        self
    }

    pub fn variable_store(mut self, store: Arc<dyn VariableStore>) -> Self {
        self.variable_store = Some(store);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Must run inside a tokio runtime; timers and commits are spawned on it.
    pub fn build(self) -> Result<ChatEngine, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let transport = self
            .transport
            .ok_or(EngineError::MissingCollaborator("a chat transport"))?;
        let commit_backend = self
            .commit_backend
            .ok_or(EngineError::MissingCollaborator("a commit backend"))?;
        let variable_store = self
            .variable_store
            .unwrap_or_else(|| Arc::new(EmptyVariableStore));

        let session = self
            .session
            .unwrap_or_else(|| ChatSession::new(self.config.automation_id.clone()))
            .with_max_auto_retries(self.config.max_auto_retries);
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            commits: CommitManager::new(commit_backend, self.config.commit),
            config: self.config,
            transport,
            variable_store,
            observers: self.observers,
            runtime: runtime.clone(),
            retry_tx,
            queued_retries: Arc::new(AtomicUsize::new(0)),
            state: Mutex::new(EngineState {
                session,
                active: None,
                generation: 0,
                retry_epoch: 0,
                timers: TimerSet::new(runtime.clone()),
                commits: Vec::new(),
                shut_down: false,
            }),
        });
        runtime.spawn(dispatch_retries(Arc::downgrade(&shared), retry_rx));

        Ok(ChatEngine { shared })
    }
}

async fn dispatch_retries(shared: Weak<Shared>, mut jobs: mpsc::UnboundedReceiver<RetryJob>) {
    while let Some(job) = jobs.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let stale = {
            let state = lock_unpoisoned(&shared.state);
            (state.retry_epoch != job.epoch)
                .then(|| state.manual_retry_event(job.step_id.clone()))
        };
        if let Some(event) = stale {
            debug!(step_id = %job.step_id, "discarding retry dropped by a newer send");
            shared.queued_retries.fetch_sub(1, Ordering::AcqRel);
            if let Some(event) = event {
                shared.emit(&event);
            }
            continue;
        }

        info!(step_id = %job.step_id, attempt = job.attempt, "sending automatic retry");
        let engine = ChatEngine { shared };
        let request = SendRequest::retry(job.step_id, job.message, SendOrigin::AutoRetry);
        if let Err(error) = engine.send_request(request).await {
            debug!(%error, "automatic retry did not complete");
        }
        engine.shared.queued_retries.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Clone)]
pub struct ChatEngine {
    shared: Arc<Shared>,
}

impl ChatEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub async fn send(&self, message: impl Into<String>) -> Result<SendSummary, EngineError> {
        self.send_request(SendRequest::new(message)).await
    }

    /// Runs one send to completion, superseding any send still running.
    pub async fn send_request(&self, request: SendRequest) -> Result<SendSummary, EngineError> {
        let (generation, cancel, chat_request, events) = self.begin_send(request)?;
        self.shared.emit_all(&events);

        let bytes = match self.shared.transport.open(chat_request, cancel.clone()).await {
            Ok(bytes) => bytes,
            Err(error) => return Err(self.fail(generation, error.into())),
        };
        match self.pump(generation, &cancel, bytes).await {
            Ok(frames) => self.complete(generation, &cancel, frames).await,
            Err(error) => Err(self.fail(generation, error)),
        }
    }

    fn begin_send(
        &self,
        request: SendRequest,
    ) -> Result<(u64, CancelSignal, ChatRequest, Vec<SessionEvent>), EngineError> {
        let config = &self.shared.config;
        let mut state = lock_unpoisoned(&self.shared.state);
        if state.shut_down {
            return Err(EngineError::ShutDown);
        }
        if state.abort_active() {
            info!("superseding running send");
        }
        // Retries of other steps armed alongside this one stay scheduled.
        let dropped = match (&request.origin, &request.step_id) {
            (SendOrigin::AutoRetry, Some(step_id)) => {
                state.timers.cancel(step_id);
                Vec::new()
            }
            _ => state.drop_retries(),
        };
        state.generation += 1;
        let generation = state.generation;
        let snapshot = state.session.clone();

        let workspace = state.session.workspace();
        let current_code = match (&request.step_id, config.workspace_mode) {
            (Some(step_id), _) => workspace
                .step(step_id)
                .map(|step| step.code.clone())
                .unwrap_or_default(),
            (None, WorkspaceMode::SingleFile) => workspace.single_file_code().to_owned(),
            (None, WorkspaceMode::MultiFile) => String::new(),
        };
        let mut chat_request = ChatRequest::new(
            state.session.automation_id(),
            request.message.clone(),
            config.model.clone(),
        )
        .with_current_code(current_code)
        .with_version(workspace.version);
        if let Some(step_id) = &request.step_id {
            chat_request = chat_request.with_step_id(step_id.clone());
        }
        for image in request.images {
            chat_request = chat_request.with_image(image);
        }

        let local = AssembledMessage::human(format!("local-{}", Uuid::new_v4()), &request.message);
        let mut events = dropped;
        events.push(SessionEvent::SendStarted { generation });
        events.extend(state.session.begin_turn(local, &request.message));

        let cancel = cancel_signal();
        state.active = Some(ActiveSend {
            generation,
            cancel: cancel.clone(),
            snapshot,
        });
        debug!(generation, origin = ?request.origin, "send started");
        Ok((generation, cancel, chat_request, events))
    }

    async fn pump(
        &self,
        generation: u64,
        cancel: &CancelSignal,
        mut bytes: ByteStream,
    ) -> Result<usize, EngineError> {
        let mut decoder = FrameDecoder::default();
        let mut frames = 0;
        while let Some(chunk) = await_or_cancel(bytes.next(), Some(cancel)).await? {
            let decoded = decoder.feed(&chunk?);
            frames += self.apply_frames(generation, cancel, decoded)?;
        }
        frames += self.apply_frames(generation, cancel, decoder.finish())?;
        Ok(frames)
    }

    fn apply_frames(
        &self,
        generation: u64,
        cancel: &CancelSignal,
        frames: Vec<StreamFrame>,
    ) -> Result<usize, EngineError> {
        if frames.is_empty() {
            return Ok(0);
        }

        let mut events = Vec::new();
        let mut failure = None;
        let mut applied = 0;
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            if cancel.load(Ordering::Acquire) || !state.is_active(generation) {
                return Err(EngineError::Cancelled);
            }
            for frame in frames {
                applied += 1;
                let effects = state
                    .session
                    .apply_frame(frame, self.shared.config.diff_review);
                events.extend(effects.events);
                for retry in effects.retries {
                    events.push(SessionEvent::AutoRetryScheduled {
                        step_id: retry.step_id.clone(),
                        attempt: retry.attempt,
                        delay: self.shared.config.auto_retry_delay,
                    });
                    self.shared.schedule_retry(&mut state, retry);
                }
                if let Some(message) = effects.failure {
                    failure = Some(message);
                    break;
                }
            }
        }
        self.shared.emit_all(&events);

        match failure {
            Some(message) => Err(EngineError::StreamFailed { message }),
            None => Ok(applied),
        }
    }

    async fn complete(
        &self,
        generation: u64,
        cancel: &CancelSignal,
        frames: usize,
    ) -> Result<SendSummary, EngineError> {
        let needs_lookup = {
            let state = lock_unpoisoned(&self.shared.state);
            state
                .is_active(generation)
                .then(|| state.session.needs_variable_lookup())
        };
        let Some(needs_lookup) = needs_lookup else {
            return Err(self.fail(generation, EngineError::Cancelled));
        };

        let stored = if needs_lookup {
            match await_or_cancel(self.shared.variable_store.fetch(), Some(cancel)).await {
                Ok(Ok(variables)) => variables,
                Ok(Err(error)) => {
                    warn!(%error, "workspace variable lookup failed");
                    Vec::new()
                }
                Err(error) => return Err(self.fail(generation, error.into())),
            }
        } else {
            Vec::new()
        };

        let config = &self.shared.config;
        let mut events;
        let commit_started;
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            let active = match state.active.take() {
                Some(active) if active.generation == generation => active,
                other => {
                    state.active = other;
                    drop(state);
                    return Err(self.fail(generation, EngineError::Cancelled));
                }
            };

            events = state.session.finish_turn(
                &stored,
                config.workspace_mode,
                config.multi_environment,
            );
            let changed = state.session.workspace() != active.snapshot.workspace();
            let review_pending = config.diff_review && state.session.baselines().any_differences();
            commit_started = changed && !review_pending;
            if commit_started {
                let target = state.session.automation_id().to_owned();
                self.shared.spawn_commit(&mut state, &target);
            } else if changed {
                debug!("commit deferred until pending changes are reviewed");
            }
        }

        events.push(SessionEvent::SendFinished {
            generation,
            cancelled: false,
        });
        self.shared.emit_all(&events);
        info!(generation, frames, commit_started, "send finished");
        Ok(SendSummary {
            generation,
            frames,
            commit_started,
        })
    }

    fn fail(&self, generation: u64, error: EngineError) -> EngineError {
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.is_active(generation) {
                if error.is_cancelled() {
                    state.abort_active();
                } else {
                    state.active = None;
                    state.session.abandon_turn();
                }
            }
        }

        let mut events = Vec::new();
        if let EngineError::UpgradeRequired { payload, .. } = &error {
            events.push(SessionEvent::UpgradeRequired {
                payload: payload.clone(),
            });
        }
        if let Some(text) = error.user_message() {
            warn!(generation, "send failed: {text}");
            events.push(SessionEvent::Status { text });
        }
        events.push(SessionEvent::SendFinished {
            generation,
            cancelled: error.is_cancelled(),
        });
        self.shared.emit_all(&events);
        error
    }

    /// Cancels the running send and restores the state from before it.
    pub fn cancel(&self) -> bool {
        let events = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if !state.abort_active() {
                return false;
            }
            let mut events = vec![
                SessionEvent::MessagesChanged {
                    messages: state.session.messages(),
                },
                SessionEvent::StepsChanged {
                    steps: state.session.steps().to_vec(),
                },
            ];
            events.extend(state.drop_retries());
            events
        };
        self.shared.emit_all(&events);
        true
    }

    /// Accepts the pending changes of `step_id` and commits when there were any.
    pub fn accept(&self, step_id: &str) -> Option<String> {
        let (content, events) = {
            let mut state = lock_unpoisoned(&self.shared.state);
            let had_differences = state.session.baselines().has_differences(step_id);
            let content = state.session.accept(step_id)?;
            if had_differences {
                self.shared.spawn_commit(&mut state, step_id);
            }
            let events = vec![
                SessionEvent::ChangesAccepted {
                    step_id: step_id.to_owned(),
                    content: content.clone(),
                },
                SessionEvent::StepsChanged {
                    steps: state.session.steps().to_vec(),
                },
                SessionEvent::Checkpoint(state.session.checkpoint()),
            ];
            (content, events)
        };
        self.shared.emit_all(&events);
        Some(content)
    }

    /// Restores the accepted content of `step_id`. Nothing is committed.
    pub fn reject(&self, step_id: &str) -> Option<String> {
        let (content, events) = {
            let mut state = lock_unpoisoned(&self.shared.state);
            let content = state.session.reject(step_id)?;
            let events = vec![
                SessionEvent::ChangesRejected {
                    step_id: step_id.to_owned(),
                    content: content.clone(),
                },
                SessionEvent::StepsChanged {
                    steps: state.session.steps().to_vec(),
                },
                SessionEvent::Checkpoint(state.session.checkpoint()),
            ];
            (content, events)
        };
        self.shared.emit_all(&events);
        Some(content)
    }

    pub fn edit_step_code(&self, step_id: &str, code: &str) -> Result<(), EngineError> {
        let events = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if !state.session.edit_step_code(step_id, code) {
                return Err(EngineError::UnknownStep {
                    step_id: step_id.to_owned(),
                });
            }
            vec![
                SessionEvent::StepsChanged {
                    steps: state.session.steps().to_vec(),
                },
                SessionEvent::Checkpoint(state.session.checkpoint()),
            ]
        };
        self.shared.emit_all(&events);
        Ok(())
    }

    /// Resends the composed retry request for a step whose automatic retries
    /// are used up.
    pub async fn retry_step(&self, step_id: &str) -> Result<SendSummary, EngineError> {
        let message = lock_unpoisoned(&self.shared.state)
            .session
            .manual_retry_message(step_id)
            .ok_or_else(|| EngineError::NoRetryPending {
                step_id: step_id.to_owned(),
            })?;
        self.send_request(SendRequest::retry(
            step_id.to_owned(),
            message,
            SendOrigin::ManualRetry,
        ))
        .await
    }

    /// Commits the current workspace and waits for the outcome.
    pub async fn save(&self) -> CommitOutcome {
        let request = {
            let state = lock_unpoisoned(&self.shared.state);
            commit_request(
                &self.shared.config,
                &state.session,
                state.session.automation_id(),
            )
        };
        let new_len = request.dedupe_key.new_len;
        let outcome = self.shared.commits.submit(request).await;
        self.shared.record_commit(outcome.clone(), new_len);
        outcome
    }

    /// Waits for every background commit started so far.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut lock_unpoisoned(&self.shared.state).commits);
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(error) = handle.await {
                    warn!(%error, "commit task ended abnormally");
                }
            }
        }
    }

    /// Cancels any running send and pending retries; later sends fail.
    pub fn shutdown(&self) {
        let mut state = lock_unpoisoned(&self.shared.state);
        state.shut_down = true;
        state.abort_active();
        state.retry_epoch += 1;
        state.timers.cancel_all();
    }

    pub fn is_sending(&self) -> bool {
        lock_unpoisoned(&self.shared.state).active.is_some()
    }

    /// Whether a send is running or an automatic retry is still due.
    pub fn is_busy(&self) -> bool {
        let state = lock_unpoisoned(&self.shared.state);
        state.active.is_some()
            || !state.timers.is_empty()
            || self.shared.queued_retries.load(Ordering::Acquire) > 0
    }

    pub fn has_pending_retry(&self, step_id: &str) -> bool {
        lock_unpoisoned(&self.shared.state).timers.contains(step_id)
    }

    pub fn has_differences(&self, step_id: &str) -> bool {
        lock_unpoisoned(&self.shared.state)
            .session
            .baselines()
            .has_differences(step_id)
    }

    pub fn any_differences(&self) -> bool {
        lock_unpoisoned(&self.shared.state)
            .session
            .baselines()
            .any_differences()
    }

    pub fn pending_files(&self) -> Vec<String> {
        lock_unpoisoned(&self.shared.state)
            .session
            .baselines()
            .pending_files()
    }

    pub fn diff_stats(&self, step_id: &str) -> Option<DiffStats> {
        lock_unpoisoned(&self.shared.state)
            .session
            .baselines()
            .diff_stats(step_id)
    }

    pub fn snapshot(&self) -> ChatSession {
        lock_unpoisoned(&self.shared.state).session.clone()
    }

    pub fn checkpoint(&self) -> DocumentCheckpoint {
        lock_unpoisoned(&self.shared.state).session.checkpoint()
    }

    pub fn steps(&self) -> Vec<StepFile> {
        lock_unpoisoned(&self.shared.state).session.steps().to_vec()
    }

    pub fn messages(&self) -> Vec<AssembledMessage> {
        lock_unpoisoned(&self.shared.state).session.messages()
    }

    pub fn variables(&self) -> Vec<EnvVariable> {
        lock_unpoisoned(&self.shared.state)
            .session
            .workspace()
            .variables
            .clone()
    }
}
