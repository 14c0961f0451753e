//! Upload modal: local validation, simulated progress and completion.

use crate::api::ModelApi;
use crate::error::{ApiError, UploadError};
use crate::model::ModelDescriptor;
use crate::store::ModelStore;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Interval between simulated progress steps.
pub const PROGRESS_TICK: Duration = Duration::from_millis(300);
/// Delay between a successful upload and the modal closing.
pub const CLOSE_DELAY: Duration = Duration::from_millis(500);
/// Simulated progress never passes this until the server answers.
const PROGRESS_CEILING: u16 = 90;
const MAX_STEP: u64 = 10;

/// Accepts only existing files with an `.ifc` extension (any case).
pub fn validate_ifc_path(path: &Path) -> Result<(), UploadError> {
    let is_ifc = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ifc"));
    if !is_ifc {
        return Err(UploadError::NotIfc {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(UploadError::Missing {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Perceived-progress indicator. Not tied to bytes sent.
#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    percent: u16,
    state: u64,
}

impl SimulatedProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(RandomState::new().build_hasher().finish())
    }

    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            percent: 0,
            // xorshift must not start at zero
            state: seed | 1,
        }
    }

    #[must_use]
    pub fn percent(&self) -> u16 {
        self.percent
    }

    /// Advances by a pseudo-random step in `0..10`, capped at 90.
    pub fn tick(&mut self) -> u16 {
        if self.percent < PROGRESS_CEILING {
            let step = (self.next() % MAX_STEP) as u16;
            self.percent = (self.percent + step).min(PROGRESS_CEILING);
        }
        self.percent
    }

    pub fn complete(&mut self) {
        self.percent = 100;
    }

    pub fn reset(&mut self) {
        self.percent = 0;
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadPhase {
    Idle,
    Uploading,
    Completed { descriptor: ModelDescriptor, at: Instant },
    Failed(String),
}

/// State of the upload modal.
#[derive(Debug)]
pub struct UploadModal {
    open: bool,
    input: String,
    phase: UploadPhase,
    progress: SimulatedProgress,
    last_tick: Option<Instant>,
}

impl UploadModal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: false,
            input: String::new(),
            phase: UploadPhase::Idle,
            progress: SimulatedProgress::new(),
            last_tick: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn phase(&self) -> &UploadPhase {
        &self.phase
    }

    #[must_use]
    pub fn progress(&self) -> u16 {
        self.progress.percent()
    }

    #[must_use]
    pub fn is_uploading(&self) -> bool {
        self.phase == UploadPhase::Uploading
    }

    pub fn open(&mut self) {
        self.open = true;
        if !self.is_uploading() {
            self.phase = UploadPhase::Idle;
            self.progress.reset();
        }
    }

    /// Closes the modal unless an upload is in flight.
    pub fn close(&mut self) -> bool {
        if self.is_uploading() {
            return false;
        }
        self.open = false;
        self.input.clear();
        self.phase = UploadPhase::Idle;
        true
    }

    pub fn push_char(&mut self, c: char) {
        if !self.is_uploading() {
            self.input.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if !self.is_uploading() {
            self.input.pop();
        }
    }

    /// Validates the typed path and enters the uploading phase. The caller
    /// sends the returned path to the server.
    pub fn submit(&mut self, store: &ModelStore, now: Instant) -> Result<PathBuf, UploadError> {
        if self.is_uploading() {
            return Err(UploadError::Busy);
        }

        let path = PathBuf::from(self.input.trim());
        if let Err(err) = check_upload(&path, store) {
            tracing::warn!(path = %path.display(), error = %err, "Upload rejected");
            self.phase = UploadPhase::Failed(err.to_string());
            return Err(err);
        }

        self.phase = UploadPhase::Uploading;
        self.progress.reset();
        self.last_tick = Some(now);
        Ok(path)
    }

    /// Advances simulated progress. Returns `true` when the modal should
    /// close.
    pub fn tick(&mut self, now: Instant) -> bool {
        match &self.phase {
            UploadPhase::Uploading => {
                let due = match self.last_tick {
                    Some(last) => now.duration_since(last) >= PROGRESS_TICK,
                    None => true,
                };
                if due {
                    self.progress.tick();
                    self.last_tick = Some(now);
                }
                false
            }
            UploadPhase::Completed { at, .. } => self.open && now.duration_since(*at) >= CLOSE_DELAY,
            UploadPhase::Idle | UploadPhase::Failed(_) => false,
        }
    }

    /// Applies the server answer. A model the server accepted counts as
    /// uploaded even when the local list is already full; on failure the
    /// modal stays open with the message.
    pub fn finish(
        &mut self,
        result: Result<ModelDescriptor, ApiError>,
        store: &mut ModelStore,
        now: Instant,
    ) -> Result<ModelDescriptor, UploadError> {
        self.last_tick = None;
        match result {
            Ok(descriptor) => {
                register(store, &descriptor);
                self.progress.complete();
                self.phase = UploadPhase::Completed {
                    descriptor: descriptor.clone(),
                    at: now,
                };
                Ok(descriptor)
            }
            Err(source) => {
                let err = UploadError::from(source);
                tracing::error!(error = %err, "Upload failed");
                self.progress.reset();
                self.phase = UploadPhase::Failed(user_message(&err));
                Err(err)
            }
        }
    }
}

impl Default for UploadModal {
    fn default() -> Self {
        Self::new()
    }
}

fn check_upload(path: &Path, store: &ModelStore) -> Result<(), UploadError> {
    if !store.can_add() {
        return Err(UploadError::CapReached { cap: store.cap() });
    }
    validate_ifc_path(path)
}

/// Adds an uploaded model to the store. A full store only skips the local
/// entry; the model still exists on the server.
fn register(store: &mut ModelStore, descriptor: &ModelDescriptor) {
    if let Err(err) = store.add(descriptor.clone()) {
        tracing::warn!(id = %descriptor.id, error = %err, "Model uploaded but not listed locally");
    }
}

fn user_message(err: &UploadError) -> String {
    match err {
        UploadError::Api { source } => format!("Upload failed: {}", source.user_message()),
        other => other.to_string(),
    }
}

/// Validates, uploads and registers a model in one blocking call.
pub fn upload_with(
    api: &dyn ModelApi,
    path: &Path,
    store: &mut ModelStore,
) -> Result<ModelDescriptor, UploadError> {
    check_upload(path, store)?;
    let descriptor = api.upload_model(path)?;
    register(store, &descriptor);
    Ok(descriptor)
}
