use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use automation_model::{EnvVariable, StepFile};
use document_store::DocumentStoreError;
use stepwright::{
    ChatEngine, ChatTransport, CommitBackend, CommitOutcome, EngineBuilder, EngineError,
    SessionEvent, VariableStore,
};
use stream_api::{AutomationApiClient, StreamApiError};
use thiserror::Error;
use tracing::{info, warn};

use crate::commands::Command;
use crate::config::{CliConfig, ConfigError};
use crate::journal::JournalObserver;
use crate::replay::{MemoryCommits, ReplayTransport};

const RETRY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read capture {path}: {source}")]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Journal(#[from] DocumentStoreError),

    #[error(transparent)]
    Client(#[from] StreamApiError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepFile>,
    pub variables: Vec<EnvVariable>,
    /// Steps still waiting for accept or reject.
    pub pending_review: Vec<String>,
    pub committed_version: Option<u64>,
    pub statuses: Vec<String>,
    pub journaled: usize,
}

impl RunReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let lines = step.code.lines().count();
            out.push_str(&format!(
                "{}. {} ({}) [{:?}] {lines} lines\n",
                step.order, step.name, step.id, step.status
            ));
        }
        for variable in &self.variables {
            out.push_str(&format!("var {} ({:?})\n", variable.name, variable.source));
        }
        for step_id in &self.pending_review {
            out.push_str(&format!("pending review: {step_id}\n"));
        }
        if let Some(version) = self.committed_version {
            out.push_str(&format!("committed version {version}\n"));
        }
        for status in &self.statuses {
            out.push_str(&format!("status: {status}\n"));
        }
        out
    }
}

struct Collaborators {
    transport: Arc<dyn ChatTransport>,
    commits: Arc<dyn CommitBackend>,
    variables: Option<Arc<dyn VariableStore>>,
}

fn collaborators(command: &Command, config: &CliConfig) -> Result<Collaborators, CliError> {
    match command {
        Command::Replay {
            capture,
            chunk_size,
            ..
        } => {
            let transport = ReplayTransport::from_file(capture, *chunk_size).map_err(|source| {
                CliError::Capture {
                    path: capture.clone(),
                    source,
                }
            })?;
            Ok(Collaborators {
                transport: Arc::new(transport),
                commits: Arc::new(MemoryCommits::new()),
                variables: None,
            })
        }
        Command::Send { .. } => {
            let client = Arc::new(AutomationApiClient::new(config.api.clone())?);
            Ok(Collaborators {
                transport: client.clone(),
                commits: client.clone(),
                variables: Some(client),
            })
        }
        Command::Help => Err(CliError::Usage("help has nothing to run".to_owned())),
    }
}

pub async fn run(command: Command, config: CliConfig) -> Result<RunReport, CliError> {
    let (message, accept) = match &command {
        Command::Replay {
            message, accept, ..
        }
        | Command::Send { message, accept } => (message.clone(), *accept),
        Command::Help => return Err(CliError::Usage("help has nothing to run".to_owned())),
    };
    let parts = collaborators(&command, &config)?;

    let mut builder = EngineBuilder::new(config.engine.clone())
        .transport(parts.transport)
        .commit_backend(parts.commits);
    if let Some(store) = parts.variables {
        builder = builder.variable_store(store);
    }

    let journal = match &config.journal_dir {
        Some(root) => {
            let (observer, resume) =
                JournalObserver::open_or_create(root, &config.engine.automation_id)?;
            if let Some(checkpoint) = resume {
                info!(steps = checkpoint.steps.len(), "resuming from journal");
                builder = builder.resume(checkpoint);
            }
            let observer = Arc::new(observer);
            builder = builder.observer(observer.clone());
            Some(observer)
        }
        None => None,
    };

    let statuses = Arc::new(std::sync::Mutex::new(Vec::new()));
    builder = builder.observer(Arc::new({
        let statuses = statuses.clone();
        move |event: &SessionEvent| log_event(event, &statuses)
    }));

    let engine = builder.build()?;
    let result = drive(&engine, &message, accept).await;
    engine.shutdown();
    result?;

    let checkpoint = engine.checkpoint();
    let statuses = match statuses.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    Ok(RunReport {
        steps: checkpoint.steps,
        variables: checkpoint.environment_variables,
        pending_review: engine.pending_files(),
        committed_version: checkpoint.version,
        statuses,
        journaled: journal.map_or(0, |journal| journal.len()),
    })
}

async fn drive(engine: &ChatEngine, message: &str, accept: bool) -> Result<(), CliError> {
    engine.send(message).await?;

    // Automatic placeholder retries run on the engine's own timers.
    while engine.is_busy() {
        tokio::time::sleep(RETRY_POLL_INTERVAL).await;
    }

    if accept {
        for step_id in engine.pending_files() {
            engine.accept(&step_id);
        }
    }
    engine.settle().await;
    Ok(())
}

fn log_event(event: &SessionEvent, statuses: &std::sync::Mutex<Vec<String>>) {
    match event {
        SessionEvent::Status { text } => {
            warn!("{text}");
            if let Ok(mut statuses) = statuses.lock() {
                statuses.push(text.clone());
            }
        }
        SessionEvent::ManualRetryAvailable { step_id, .. } => {
            let text = format!("step {step_id} still contains placeholder code; retry manually");
            warn!("{text}");
            if let Ok(mut statuses) = statuses.lock() {
                statuses.push(text);
            }
        }
        SessionEvent::CommitFinished {
            outcome: CommitOutcome::Failed(failure),
        } => {
            let text = failure.user_message().to_owned();
            warn!(retries = failure.retries, "{text}");
            if let Ok(mut statuses) = statuses.lock() {
                statuses.push(text);
            }
        }
        SessionEvent::CommitFinished { outcome } => info!(?outcome, "commit finished"),
        SessionEvent::DiffPending { step_id, stats } => {
            info!(step_id = %step_id, added = stats.added, removed = stats.removed, "changes awaiting review");
        }
        _ => {}
    }
}
