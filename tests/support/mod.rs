#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use automation_model::{CancelSignal, WorkspaceVariable};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use stepwright::{
    ChatEngine, ChatTransport, CommitBackend, EngineConfig, SessionEvent, SessionObserver,
    VariableStore,
};
use stream_api::{ByteStream, ChatRequest, CommitPayload, CommitReceipt, StreamApiError};
use tokio::time::Instant;

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("test mutex poisoned")
}

pub enum Script {
    /// Body chunks, then end of stream.
    Chunks(Vec<String>),
    /// Body chunks, then a stream that never ends.
    Hang(Vec<String>),
    Fail(StreamApiError),
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, script: Script) {
        lock(&self.scripts).push_back(script);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }
}

fn byte_chunks(chunks: Vec<String>) -> impl futures_util::Stream<Item = Result<Vec<u8>, StreamApiError>> {
    stream::iter(chunks.into_iter().map(|chunk| Ok(chunk.into_bytes())))
}

impl ChatTransport for ScriptedTransport {
    fn open(
        &self,
        request: ChatRequest,
        _cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<ByteStream, StreamApiError>> {
        lock(&self.requests).push(request);
        let script = lock(&self.scripts).pop_front();
        Box::pin(async move {
            match script {
                None => Ok(stream::empty().boxed()),
                Some(Script::Chunks(chunks)) => Ok(byte_chunks(chunks).boxed()),
                Some(Script::Hang(chunks)) => Ok(byte_chunks(chunks).chain(stream::pending()).boxed()),
                Some(Script::Fail(error)) => Err(error),
            }
        })
    }
}

/// Commit backend answering from a queue; an empty queue means success.
#[derive(Default)]
pub struct ScriptedCommits {
    results: Mutex<VecDeque<Result<CommitReceipt, StreamApiError>>>,
    calls: Mutex<Vec<(Instant, CommitPayload)>>,
}

impl ScriptedCommits {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_statuses(statuses: &[u16]) -> Arc<Self> {
        let backend = Self::default();
        for status in statuses {
            lock(&backend.results)
                .push_back(Err(StreamApiError::http_status(*status, "scripted failure")));
        }
        Arc::new(backend)
    }

    pub fn payloads(&self) -> Vec<CommitPayload> {
        lock(&self.calls).iter().map(|(_, payload)| payload.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Milliseconds between consecutive calls.
    pub fn gaps_ms(&self) -> Vec<u128> {
        let calls = lock(&self.calls);
        calls
            .windows(2)
            .map(|pair| (pair[1].0 - pair[0].0).as_millis())
            .collect()
    }
}

impl CommitBackend for ScriptedCommits {
    fn commit(&self, payload: CommitPayload) -> BoxFuture<'_, Result<CommitReceipt, StreamApiError>> {
        let attempt = {
            let mut calls = lock(&self.calls);
            calls.push((Instant::now(), payload));
            calls.len() as u64
        };
        let result = lock(&self.results).pop_front().unwrap_or(Ok(CommitReceipt {
            version: Some(attempt),
        }));
        Box::pin(async move { result })
    }
}

pub struct StaticVariables {
    variables: Vec<WorkspaceVariable>,
    fetches: Mutex<usize>,
}

impl StaticVariables {
    pub fn new(variables: Vec<WorkspaceVariable>) -> Arc<Self> {
        Arc::new(Self {
            variables,
            fetches: Mutex::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        *lock(&self.fetches)
    }
}

impl VariableStore for StaticVariables {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<WorkspaceVariable>, StreamApiError>> {
        *lock(&self.fetches) += 1;
        let variables = self.variables.clone();
        Box::pin(async move { Ok(variables) })
    }
}

#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<SessionEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        lock(&self.events).clone()
    }

    pub fn count(&self, predicate: impl Fn(&SessionEvent) -> bool) -> usize {
        lock(&self.events).iter().filter(|event| predicate(event)).count()
    }
}

impl SessionObserver for EventLog {
    fn on_event(&self, event: &SessionEvent) {
        lock(&self.events).push(event.clone());
    }
}

pub struct Harness {
    pub engine: ChatEngine,
    pub transport: Arc<ScriptedTransport>,
    pub commits: Arc<ScriptedCommits>,
    pub events: Arc<EventLog>,
}

pub fn harness(config: EngineConfig, scripts: Vec<Script>) -> Harness {
    let transport = ScriptedTransport::new(scripts);
    let commits = ScriptedCommits::new();
    let events = EventLog::new();
    let engine = ChatEngine::builder(config)
        .transport(transport.clone())
        .commit_backend(commits.clone())
        .observer(events.clone())
        .build()
        .expect("engine builds inside a runtime");
    Harness {
        engine,
        transport,
        commits,
        events,
    }
}

pub fn line(value: Value) -> String {
    format!("{value}\n")
}

/// A complete tool response frame carrying `body` as its text content.
pub fn tool(id: &str, body: Value) -> String {
    line(json!({
        "id": id,
        "type": "tool",
        "data": {"content": body.to_string(), "tool_call_id": format!("call-{id}")}
    }))
}

pub fn ai(id: &str, text: &str) -> String {
    line(json!({"id": id, "type": "ai", "data": {"content": text}}))
}

pub fn create_step(id: &str, step_id: &str, name: &str) -> String {
    tool(id, json!({"action": "create-step", "id": step_id, "name": name}))
}

pub fn update_code(id: &str, step_id: &str, code: &str) -> String {
    tool(id, json!({"action": "update-step-code", "stepId": step_id, "code": code}))
}

pub const PLACEHOLDER_CODE: &str = "fetch(url);\n// ... rest of code unchanged";
