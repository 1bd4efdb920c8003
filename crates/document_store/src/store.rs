use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use automation_model::DocumentCheckpoint;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DocumentStoreError, JournalProblem};
use crate::paths::{journal_file_name, journal_root};
use crate::schema::{CheckpointRecord, JournalHeader, JsonLine, JOURNAL_VERSION};

pub struct DocumentJournal {
    path: PathBuf,
    file: File,
    header: JournalHeader,
    records: Vec<CheckpointRecord>,
}

impl DocumentJournal {
    /// Creates `<root>/.stepwright/journals/<created_at>_<journal_id>.jsonl`
    /// and writes its header line.
    pub fn create_new(root: &Path, automation_id: &str) -> Result<Self, DocumentStoreError> {
        let root = absolute_root(root)?;
        let created_at = now_rfc3339()?;
        let journal_id = Uuid::new_v4().to_string();
        let header = JournalHeader::v1(&journal_id, automation_id.trim(), &created_at);

        let dir = journal_root(&root);
        fs::create_dir_all(&dir)
            .map_err(|source| DocumentStoreError::io("creating journal directory", &dir, source))?;

        let path = dir.join(journal_file_name(&created_at, &journal_id));
        validate_header_line(&path, 1, &header)?;

        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|source| DocumentStoreError::io("creating journal file", &path, source))?;

        let mut journal = Self {
            path,
            file,
            header: header.clone(),
            records: Vec::new(),
        };
        journal.write_line(&JsonLine::Journal(header))?;
        debug!(path = %journal.path.display(), "created document journal");
        Ok(journal)
    }

    pub fn open(path: &Path) -> Result<Self, DocumentStoreError> {
        let path = path.to_path_buf();
        let read_file = File::open(&path)
            .map_err(|source| DocumentStoreError::io("opening journal file", &path, source))?;
        let reader = BufReader::new(read_file);

        let mut header: Option<JournalHeader> = None;
        let mut records: Vec<CheckpointRecord> = Vec::new();
        let mut seen_ids = HashSet::new();

        for (line_index, line_result) in reader.lines().enumerate() {
            let line_number = line_index + 1;
            let line = line_result
                .map_err(|source| DocumentStoreError::io("reading journal line", &path, source))?;
            let parsed = parse_json_line(&path, line_number, &line)?;

            if line_number == 1 {
                match parsed {
                    JsonLine::Journal(parsed_header) => {
                        validate_header_line(&path, line_number, &parsed_header)?;
                        header = Some(parsed_header);
                    }
                    JsonLine::Checkpoint(_) => {
                        return Err(DocumentStoreError::corrupt(
                            path,
                            line_number,
                            JournalProblem::HeaderExpected,
                        ));
                    }
                }

                continue;
            }

            let JsonLine::Checkpoint(record) = parsed else {
                return Err(DocumentStoreError::corrupt(
                    path,
                    line_number,
                    JournalProblem::CheckpointExpected,
                ));
            };

            validate_rfc3339(&path, line_number, "ts", &record.ts)?;
            if let Some(previous) = records.last() {
                if record.seq <= previous.seq {
                    return Err(DocumentStoreError::corrupt(
                        path,
                        line_number,
                        JournalProblem::NonIncreasingSequence {
                            previous: previous.seq,
                            found: record.seq,
                        },
                    ));
                }
            }
            if !seen_ids.insert(record.id.clone()) {
                return Err(DocumentStoreError::corrupt(
                    path,
                    line_number,
                    JournalProblem::DuplicateId(record.id),
                ));
            }
            records.push(record);
        }

        let header = header.ok_or_else(|| {
            DocumentStoreError::corrupt(&path, 1, JournalProblem::MissingHeader)
        })?;
        for record in &records {
            ensure_same_automation(&path, &header, &record.checkpoint)?;
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| {
                DocumentStoreError::io("opening journal file for append", &path, source)
            })?;

        Ok(Self {
            path,
            file,
            header,
            records,
        })
    }

    /// Opens the most recently created journal for `automation_id` under `root`.
    pub fn open_latest(root: &Path, automation_id: &str) -> Result<Self, DocumentStoreError> {
        let root = absolute_root(root)?;
        let dir = journal_root(&root);
        let not_found = || DocumentStoreError::NoJournalFound {
            root: root.clone(),
            automation_id: automation_id.to_owned(),
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(source) => {
                return Err(DocumentStoreError::io("listing journal directory", &dir, source))
            }
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|source| DocumentStoreError::io("listing journal directory", &dir, source))?;
            let path = entry.path();
            if path.extension().is_some_and(|extension| extension == "jsonl") {
                candidates.push(path);
            }
        }
        // File names start with the creation timestamp, so name order is age order.
        candidates.sort();

        for path in candidates.into_iter().rev() {
            match Self::open(&path) {
                Ok(journal) if journal.header.automation_id == automation_id.trim() => {
                    return Ok(journal);
                }
                Ok(_) => {}
                Err(error) => warn!(path = %path.display(), "skipping unreadable journal: {error}"),
            }
        }

        Err(not_found())
    }

    /// Appends a checkpoint with the next sequence number.
    pub fn append(
        &mut self,
        checkpoint: DocumentCheckpoint,
        label: Option<&str>,
    ) -> Result<&CheckpointRecord, DocumentStoreError> {
        ensure_same_automation(&self.path, &self.header, &checkpoint)?;

        let record = CheckpointRecord {
            id: Uuid::new_v4().to_string(),
            seq: self.records.last().map_or(1, |record| record.seq + 1),
            ts: now_rfc3339()?,
            label: label.map(ToOwned::to_owned),
            checkpoint,
        };
        self.write_line(&JsonLine::Checkpoint(record.clone()))?;
        self.records.push(record);

        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn header(&self) -> &JournalHeader {
        &self.header
    }

    #[must_use]
    pub fn records(&self) -> &[CheckpointRecord] {
        &self.records
    }

    #[must_use]
    pub fn latest(&self) -> Option<&CheckpointRecord> {
        self.records.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn write_line(&mut self, line: &JsonLine) -> Result<(), DocumentStoreError> {
        let mut encoded = serde_json::to_string(line)
            .map_err(|source| DocumentStoreError::Encode {
                path: self.path.clone(),
                source,
            })?;
        encoded.push('\n');
        self.file
            .write_all(encoded.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| DocumentStoreError::io("appending journal line", &self.path, source))
    }
}

fn absolute_root(root: &Path) -> Result<PathBuf, DocumentStoreError> {
    if root.is_absolute() {
        return Ok(root.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|source| DocumentStoreError::io("resolving current directory", root, source))?;
    Ok(cwd.join(root))
}

fn now_rfc3339() -> Result<String, DocumentStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(DocumentStoreError::Clock)
}

fn ensure_same_automation(
    path: &Path,
    header: &JournalHeader,
    checkpoint: &DocumentCheckpoint,
) -> Result<(), DocumentStoreError> {
    if checkpoint.automation_id == header.automation_id {
        return Ok(());
    }
    Err(DocumentStoreError::AutomationMismatch {
        path: path.to_path_buf(),
        expected: header.automation_id.clone(),
        found: checkpoint.automation_id.clone(),
    })
}

pub(crate) fn parse_json_line(
    path: &Path,
    line_number: usize,
    line: &str,
) -> Result<JsonLine, DocumentStoreError> {
    serde_json::from_str::<JsonLine>(line)
        .map_err(|source| DocumentStoreError::Decode {
            path: path.to_path_buf(),
            line: line_number,
            source,
        })
}

pub(crate) fn validate_header_line(
    path: &Path,
    line_number: usize,
    header: &JournalHeader,
) -> Result<(), DocumentStoreError> {
    if header.version != JOURNAL_VERSION {
        return Err(DocumentStoreError::corrupt(
            path,
            line_number,
            JournalProblem::UnsupportedVersion(header.version),
        ));
    }

    if header.automation_id.trim().is_empty() {
        return Err(DocumentStoreError::corrupt(
            path,
            line_number,
            JournalProblem::EmptyAutomationId,
        ));
    }

    validate_rfc3339(path, line_number, "created_at", &header.created_at)
}

pub(crate) fn validate_rfc3339(
    path: &Path,
    line_number: usize,
    field: &'static str,
    value: &str,
) -> Result<(), DocumentStoreError> {
    if OffsetDateTime::parse(value, &Rfc3339).is_err() {
        return Err(DocumentStoreError::corrupt(
            path,
            line_number,
            JournalProblem::InvalidTimestamp {
                field,
                value: value.to_owned(),
            },
        ));
    }

    Ok(())
}
