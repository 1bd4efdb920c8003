use std::path::Path;
use std::sync::Mutex;

use automation_model::DocumentCheckpoint;
use document_store::{DocumentJournal, DocumentStoreError};
use stepwright::{SessionEvent, SessionObserver};
use tracing::warn;

/// Appends every checkpoint the engine publishes to a document journal.
///
/// Write failures are logged and do not interrupt the session.
pub struct JournalObserver {
    journal: Mutex<DocumentJournal>,
}

impl JournalObserver {
    pub fn new(journal: DocumentJournal) -> Self {
        Self {
            journal: Mutex::new(journal),
        }
    }

    /// Opens the latest journal for `automation_id` under `root`, creating one
    /// when none exists, and returns the last stored checkpoint with it.
    pub fn open_or_create(
        root: &Path,
        automation_id: &str,
    ) -> Result<(Self, Option<DocumentCheckpoint>), DocumentStoreError> {
        let journal = match DocumentJournal::open_latest(root, automation_id) {
            Ok(journal) => journal,
            Err(DocumentStoreError::NoJournalFound { .. }) => {
                DocumentJournal::create_new(root, automation_id)?
            }
            Err(error) => return Err(error),
        };
        let resume = journal.latest().map(|record| record.checkpoint.clone());
        Ok((Self::new(journal), resume))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DocumentJournal> {
        match self.journal.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SessionObserver for JournalObserver {
    fn on_event(&self, event: &SessionEvent) {
        let SessionEvent::Checkpoint(checkpoint) = event else {
            return;
        };
        let mut journal = self.lock();
        let unchanged = journal
            .latest()
            .is_some_and(|record| record.checkpoint == *checkpoint);
        if unchanged {
            return;
        }
        if let Err(error) = journal.append(checkpoint.clone(), None) {
            warn!(path = %journal.path().display(), "failed to journal checkpoint: {error}");
        }
    }
}
