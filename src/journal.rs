use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::address::NormalizedAddress;
use crate::config::AppConfig;
use crate::errors::{ResolveError, ResolveResult};
use crate::resolver::ResolveRequest;

const JOURNAL_FILE_NAME: &str = "resolutions.jsonl";
const ROTATION_PREFIX: &str = "resolutions-";

pub struct ResolutionJournal {
    state: Mutex<JournalState>,
    journal_path: PathBuf,
    batch_size: usize,
    max_file_bytes: u64,
    max_file_count: usize,
}

struct JournalState {
    queue: Vec<JournalRecord>,
    active_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct JournalRecord {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub outcome: &'static str,
    pub place_id: Option<String>,
    pub address1: Option<String>,
    pub precision: Option<&'static str>,
    pub degraded: Vec<&'static str>,
    pub elapsed_ms: u64,
}

impl JournalRecord {
    pub(crate) fn success(
        request: &ResolveRequest,
        address: &NormalizedAddress,
        degraded: &[&'static str],
        elapsed: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            latitude: request.coordinate.latitude,
            longitude: request.coordinate.longitude,
            outcome: "success",
            place_id: address.place_id.clone(),
            address1: address.address1.clone(),
            precision: Some(address.location_type.as_tag()),
            degraded: degraded.to_vec(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub(crate) fn failure(
        request: &ResolveRequest,
        error: &ResolveError,
        elapsed: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            latitude: request.coordinate.latitude,
            longitude: request.coordinate.longitude,
            outcome: outcome_tag(error),
            place_id: None,
            address1: None,
            precision: None,
            degraded: Vec::new(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

fn outcome_tag(error: &ResolveError) -> &'static str {
    match error {
        ResolveError::Configuration(_) => "configuration_error",
        ResolveError::Provider(_) => "provider_error",
        ResolveError::NoResults => "no_results",
        ResolveError::Cancelled => "cancelled",
        ResolveError::Io(_) | ResolveError::Json(_) => "internal_error",
    }
}

impl ResolutionJournal {
    pub fn new<P: AsRef<Path>>(dir: P, config: &AppConfig) -> ResolveResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let journal_path = dir.join(JOURNAL_FILE_NAME);
        let active_bytes = fs::metadata(&journal_path).map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            state: Mutex::new(JournalState {
                queue: Vec::new(),
                active_bytes,
            }),
            journal_path,
            batch_size: config.journal_batch_size.max(1),
            max_file_bytes: config.journal_max_bytes,
            max_file_count: config.journal_max_files.max(1),
        })
    }

    pub fn record(&self, record: JournalRecord) -> ResolveResult<()> {
        let mut state = self.state.lock();
        state.queue.push(record);
        if state.queue.len() >= self.batch_size {
            self.persist_locked(&mut state)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> ResolveResult<()> {
        let mut state = self.state.lock();
        self.persist_locked(&mut state)
    }

    pub fn queue_depth(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    fn persist_locked(&self, state: &mut JournalState) -> ResolveResult<()> {
        if state.queue.is_empty() {
            return Ok(());
        }

        let mut batch = Vec::new();
        for record in &state.queue {
            serde_json::to_writer(&mut batch, record)?;
            batch.push(b'\n');
        }

        if state.active_bytes + batch.len() as u64 > self.max_file_bytes {
            self.rotate()?;
            state.active_bytes = 0;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)?;
        file.write_all(&batch)?;
        file.flush()?;

        state.active_bytes += batch.len() as u64;
        state.queue.clear();
        Ok(())
    }

    fn rotate(&self) -> ResolveResult<()> {
        if self.max_file_count <= 1 {
            File::create(&self.journal_path)?;
            return Ok(());
        }

        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let rotated = self
            .journal_path
            .with_file_name(format!("{ROTATION_PREFIX}{stamp}.jsonl"));
        match fs::rename(&self.journal_path, &rotated) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        self.prune_rotations()?;
        File::create(&self.journal_path)?;
        Ok(())
    }

    fn prune_rotations(&self) -> ResolveResult<()> {
        let parent = match self.journal_path.parent() {
            Some(parent) => parent,
            None => return Ok(()),
        };
        let mut rotations: Vec<String> = fs::read_dir(parent)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(ROTATION_PREFIX) && name.ends_with(".jsonl"))
            .collect();

        // Timestamped names sort oldest first.
        rotations.sort();
        let keep = self.max_file_count - 1;
        while rotations.len() > keep {
            let victim = rotations.remove(0);
            let _ = fs::remove_file(parent.join(victim));
        }
        Ok(())
    }
}
