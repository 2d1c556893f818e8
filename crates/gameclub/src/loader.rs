//! Bulk loading of the club's CSV exports.
//!
//! A data directory holds three files, ingested in this order:
//! `players.csv`, `schedule.csv` and `game_records.csv`. Each starts with a
//! header row naming the record's fields; blank lines are ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use csv::{StringRecord, Trim};
use gameclub_engine::{EngineError, GameRecord, IngestOutcome, Ingestor, Player, Schedule};
use gameclub_store::Store;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

/// Progress is logged every this many records.
const PROGRESS_INTERVAL: usize = 500;

/// Expected extension of every data file.
const DATA_EXTENSION: &str = "csv";

/// Errors that end a load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A data file is missing or has the wrong shape.
    #[error("{}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// A data file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row is not a valid record.
    #[error("{file} line {line}: {source}")]
    Decode {
        file: DataFile,
        line: u64,
        #[source]
        source: csv::Error,
    },

    /// A record was rejected and the policy is to abort.
    #[error("{file} line {line}: {source}")]
    Rejected {
        file: DataFile,
        line: u64,
        #[source]
        source: EngineError,
    },

    /// The store failed; nothing further can be ingested.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// What to do with a record that cannot be ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicy {
    /// Log the record and continue.
    #[default]
    Skip,
    /// Stop the load.
    Abort,
}

/// The data files, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFile {
    Players,
    Schedule,
    GameRecords,
}

impl DataFile {
    pub const ALL: [DataFile; 3] = [DataFile::Players, DataFile::Schedule, DataFile::GameRecords];

    pub fn file_name(self) -> &'static str {
        match self {
            DataFile::Players => "players.csv",
            DataFile::Schedule => "schedule.csv",
            DataFile::GameRecords => "game_records.csv",
        }
    }
}

impl fmt::Display for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Per-file load counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub file: DataFile,
    /// Records applied to the store.
    pub loaded: usize,
    /// Duplicates skipped by the engine's duplicate policy.
    pub skipped: usize,
    /// Records dropped under [`ErrorPolicy::Skip`].
    pub failed: usize,
}

impl LoadSummary {
    fn new(file: DataFile) -> Self {
        Self {
            file,
            loaded: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn processed(&self) -> usize {
        self.loaded + self.skipped + self.failed
    }
}

/// Check that `path` exists, is a regular file and has the data extension.
pub fn validate_path(path: PathBuf) -> Result<PathBuf, LoadError> {
    let invalid = |path, reason| Err(LoadError::InvalidPath { path, reason });
    if !path.exists() {
        return invalid(path, "does not exist");
    }
    if !path.is_file() {
        return invalid(path, "is not a file");
    }
    if path.extension().and_then(|ext| ext.to_str()) != Some(DATA_EXTENSION) {
        return invalid(path, "is not a CSV file");
    }
    Ok(path)
}

/// Validate every data file, then ingest them in order.
pub async fn load_dir<S: Store>(
    ingestor: &Ingestor<S>,
    dir: &Path,
    policy: ErrorPolicy,
) -> Result<Vec<LoadSummary>, LoadError> {
    // Fail before touching the store if any file is missing.
    let paths = DataFile::ALL
        .into_iter()
        .map(|file| validate_path(dir.join(file.file_name())).map(|path| (file, path)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut summaries = Vec::with_capacity(paths.len());
    for (file, path) in paths {
        summaries.push(load_file(ingestor, file, &path, policy).await?);
    }
    Ok(summaries)
}

/// Ingest one data file.
#[tracing::instrument(skip(ingestor, path), fields(file = %file))]
pub async fn load_file<S: Store>(
    ingestor: &Ingestor<S>,
    file: DataFile,
    path: &Path,
    policy: ErrorPolicy,
) -> Result<LoadSummary, LoadError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Decode {
            file,
            line: 1,
            source,
        })?
        .clone();

    let mut summary = LoadSummary::new(file);
    for row in reader.records() {
        let (line, result) = match row {
            Ok(record) => (
                record.position().map_or(0, |pos| pos.line()),
                ingest_row(ingestor, file, &headers, &record).await,
            ),
            Err(source) => (
                source.position().map_or(0, |pos| pos.line()),
                Err(RowError::Decode(source)),
            ),
        };

        match result {
            Ok(IngestOutcome::Applied) => summary.loaded += 1,
            Ok(IngestOutcome::Skipped) => summary.skipped += 1,
            Err(RowError::Decode(source)) => {
                if policy == ErrorPolicy::Abort {
                    return Err(LoadError::Decode { file, line, source });
                }
                warn!(line, error = %source, "skipping undecodable record");
                summary.failed += 1;
            }
            Err(RowError::Engine(source)) if source.is_recoverable() => {
                if policy == ErrorPolicy::Abort {
                    return Err(LoadError::Rejected { file, line, source });
                }
                warn!(line, error = %source, "skipping rejected record");
                summary.failed += 1;
            }
            Err(RowError::Engine(source)) => return Err(source.into()),
        }

        if summary.processed() % PROGRESS_INTERVAL == 0 {
            info!(processed = summary.processed(), "loading");
        }
    }

    info!(
        loaded = summary.loaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "completed processing"
    );
    Ok(summary)
}

enum RowError {
    Decode(csv::Error),
    Engine(EngineError),
}

fn decode<T: DeserializeOwned>(headers: &StringRecord, record: &StringRecord) -> Result<T, RowError> {
    record.deserialize(Some(headers)).map_err(RowError::Decode)
}

async fn ingest_row<S: Store>(
    ingestor: &Ingestor<S>,
    file: DataFile,
    headers: &StringRecord,
    record: &StringRecord,
) -> Result<IngestOutcome, RowError> {
    let outcome = match file {
        DataFile::Players => {
            let player: Player = decode(headers, record)?;
            ingestor.add_player(&player).await
        }
        DataFile::Schedule => {
            let schedule: Schedule = decode(headers, record)?;
            ingestor.add_schedule(&schedule).await
        }
        DataFile::GameRecords => {
            let record: GameRecord = decode(headers, record)?;
            ingestor.add_game_record(&record).await
        }
    };
    outcome.map_err(RowError::Engine)
}
