//! Lifecycle and selection synchronisation for one viewer engine.
//!
//! The adapter is the only owner of its engine. Loads are identified by a
//! [`LoadTicket`]; starting a new load cancels the previous ticket and any
//! result that arrives for it afterwards is dropped.

use super::engine::{DecodedModel, ModelKey, SceneItem, ViewerEngine};
use super::scene::{CameraPose, TerminalScene};
use crate::error::EngineError;
use crate::model::SelectionSet;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a worker checks between phases of a load.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Identifies one model load.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    key: ModelKey,
    path: String,
    token: CancelToken,
}

impl LoadTicket {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerState {
    Uninitialized,
    Initializing,
    Ready,
    LoadingModel { generation: u64 },
    ModelLoaded { key: ModelKey },
    Disposed,
}

/// Express ID → local ID for one loaded model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMap {
    locals: HashMap<u64, u32>,
}

impl IdMap {
    pub fn from_pairs<I: IntoIterator<Item = (u64, u32)>>(pairs: I) -> Self {
        Self {
            locals: pairs.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn local(&self, express_id: u64) -> Option<u32> {
        self.locals.get(&express_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    /// Local IDs of the selection plus the number of express IDs this
    /// model does not contain.
    #[must_use]
    pub fn map_selection(&self, selection: &SelectionSet) -> (BTreeSet<u32>, usize) {
        let mut unmapped = 0;
        let mut locals = BTreeSet::new();
        for &express_id in selection.ids() {
            match self.local(express_id) {
                Some(local) => {
                    locals.insert(local);
                }
                None => unmapped += 1,
            }
        }
        (locals, unmapped)
    }
}

/// Outcome of one selection sync. Failures are reported here and logged,
/// never returned as errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightReport {
    pub cleared: bool,
    pub requests: Vec<(ModelKey, BTreeSet<u32>)>,
    pub failed: Vec<ModelKey>,
    pub unmapped: usize,
}

pub struct ViewerAdapter<E: ViewerEngine> {
    engine: E,
    state: ViewerState,
    generation: u64,
    active: Option<LoadTicket>,
    progress: f32,
    id_maps: HashMap<ModelKey, IdMap>,
    selection: SelectionSet,
}

impl<E: ViewerEngine> ViewerAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: ViewerState::Uninitialized,
            generation: 0,
            active: None,
            progress: 0.0,
            id_maps: HashMap::new(),
            selection: SelectionSet::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Load progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.state, ViewerState::LoadingModel { .. })
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state == ViewerState::Disposed
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            ViewerState::Ready | ViewerState::LoadingModel { .. } | ViewerState::ModelLoaded { .. }
        )
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Sets up the engine. Runs once; later calls return `Ok(())`.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.state != ViewerState::Uninitialized {
            return Ok(());
        }

        self.state = ViewerState::Initializing;
        match self.engine.setup() {
            Ok(()) => {
                self.state = ViewerState::Ready;
                tracing::debug!("Viewer initialized");
                Ok(())
            }
            Err(err) => {
                self.state = ViewerState::Uninitialized;
                log_engine_error("viewer setup", &err);
                Err(err)
            }
        }
    }

    /// Starts loading the model at `path`. Tears down previously loaded
    /// models and cancels an in-flight load. Returns `None` when the adapter
    /// is not initialized or already disposed.
    pub fn begin_load(&mut self, path: &str) -> Option<LoadTicket> {
        if !self.is_initialized() {
            tracing::warn!(path, state = ?self.state, "Model load requested before viewer is ready");
            return None;
        }

        self.cancel_active();
        self.remove_models();

        self.generation += 1;
        let ticket = LoadTicket {
            generation: self.generation,
            key: model_key_for(path),
            path: path.to_string(),
            token: CancelToken::new(),
        };
        tracing::info!(path, generation = ticket.generation, "Loading model");

        self.active = Some(ticket.clone());
        self.state = ViewerState::LoadingModel {
            generation: ticket.generation,
        };
        self.progress = 0.0;
        Some(ticket)
    }

    /// Records load progress. Never moves backwards.
    pub fn report_progress(&mut self, ticket: &LoadTicket, fraction: f32) {
        if self.is_current(ticket) {
            self.progress = self.progress.max(fraction.clamp(0.0, 1.0));
        }
    }

    /// Completes a load. Results for superseded or cancelled tickets are
    /// discarded and yield `Ok(None)`.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<DecodedModel, EngineError>,
    ) -> Result<Option<ModelKey>, EngineError> {
        if !self.is_current(ticket) {
            tracing::debug!(generation = ticket.generation, "Discarding stale model load");
            return Ok(None);
        }
        self.active = None;

        let added = result.and_then(|model| self.engine.add_model(model));
        let key = match added {
            Ok(key) => key,
            Err(err) => {
                self.state = ViewerState::Ready;
                self.progress = 0.0;
                log_engine_error("model load", &err);
                return Err(err);
            }
        };

        let map = self.query_id_map(&key);
        tracing::info!(model = %key, items = map.len(), "Model loaded");
        self.id_maps.insert(key.clone(), map);
        self.state = ViewerState::ModelLoaded { key: key.clone() };
        self.progress = 1.0;

        if !self.selection.is_empty() {
            self.apply_selection();
        }
        Ok(Some(key))
    }

    /// Drops the loaded model (and any in-flight load) without disposing.
    pub fn unload(&mut self) {
        if !self.is_initialized() {
            return;
        }
        self.cancel_active();
        self.remove_models();
        self.state = ViewerState::Ready;
        self.progress = 0.0;
    }

    /// Replaces the selection and re-highlights it in every loaded model.
    pub fn sync_selection(&mut self, selection: &SelectionSet) -> HighlightReport {
        if self.is_disposed() {
            return HighlightReport::default();
        }

        self.selection = selection.clone();
        if !self.is_initialized() {
            tracing::debug!("Viewer not ready, selection kept for later");
            return HighlightReport::default();
        }
        self.apply_selection()
    }

    /// Releases the engine. Safe to call any number of times.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.cancel_active();
        self.id_maps.clear();
        self.selection.clear();
        self.engine.dispose();
        self.state = ViewerState::Disposed;
        tracing::debug!("Viewer disposed");
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.state
            == ViewerState::LoadingModel {
                generation: ticket.generation,
            }
            && !ticket.is_cancelled()
    }

    fn cancel_active(&mut self) {
        if let Some(previous) = self.active.take() {
            previous.token.cancel();
            tracing::debug!(generation = previous.generation, "Cancelled superseded load");
        }
    }

    fn remove_models(&mut self) {
        for key in self.engine.model_keys() {
            self.engine.remove_model(&key);
        }
        self.id_maps.clear();
    }

    fn query_id_map(&self, key: &ModelKey) -> IdMap {
        match self.engine.id_table(key) {
            Ok(pairs) => IdMap::from_pairs(pairs),
            Err(err) => {
                log_engine_error("id table query", &err);
                IdMap::default()
            }
        }
    }

    fn apply_selection(&mut self) -> HighlightReport {
        let mut report = HighlightReport::default();

        match self.engine.clear_highlights() {
            Ok(()) => report.cleared = true,
            Err(err) => log_engine_error("clearing highlights", &err),
        }
        if self.selection.is_empty() {
            return report;
        }

        for key in self.engine.model_keys() {
            if !self.id_maps.contains_key(&key) {
                let map = self.query_id_map(&key);
                self.id_maps.insert(key.clone(), map);
            }
            let (locals, unmapped) = self
                .id_maps
                .get(&key)
                .map_or_else(|| (BTreeSet::new(), self.selection.len()), |m| m.map_selection(&self.selection));
            report.unmapped += unmapped;

            if unmapped > 0 {
                tracing::debug!(model = %key, unmapped, "Selected IDs missing from model");
            }
            if locals.is_empty() {
                continue;
            }

            if let Err(err) = self.engine.highlight(&key, &locals) {
                log_engine_error("highlight", &err);
                report.failed.push(key.clone());
            }
            report.requests.push((key, locals));
        }

        report
    }
}

impl ViewerAdapter<TerminalScene> {
    /// Highlighted items for display.
    #[must_use]
    pub fn highlighted_items(&self) -> Vec<&SceneItem> {
        self.engine.highlighted_items()
    }

    /// Name, schema and item count of the loaded model.
    #[must_use]
    pub fn loaded_model(&self) -> Option<(&ModelKey, &str, usize)> {
        self.engine
            .models()
            .next()
            .map(|m| (&m.key, m.schema.as_str(), m.items.len()))
    }

    #[must_use]
    pub fn grid_y(&self) -> Option<f64> {
        self.engine.grid_y()
    }

    #[must_use]
    pub fn camera(&self) -> Option<CameraPose> {
        self.engine.camera()
    }
}

impl<E: ViewerEngine> Drop for ViewerAdapter<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Engine key for a model file: its file stem.
fn model_key_for(path: &str) -> ModelKey {
    let trimmed = path.split(['?', '#']).next().unwrap_or(path);
    let stem = Path::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("model");
    ModelKey(stem.to_string())
}

fn log_engine_error(context: &str, err: &EngineError) {
    if err.is_benign() {
        tracing::debug!(error = %err, "{context} reported a known engine warning");
    } else {
        tracing::error!(error = %err, "{context} failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Calls {
        setup: usize,
        dispose: usize,
        clear: usize,
        id_table: usize,
        highlights: Vec<(ModelKey, BTreeSet<u32>)>,
        models: BTreeMap<ModelKey, Vec<(u64, u32)>>,
        failing: HashSet<ModelKey>,
        fail_setup: bool,
    }

    #[derive(Debug, Clone, Default)]
    struct FakeEngine(Rc<RefCell<Calls>>);

    impl ViewerEngine for FakeEngine {
        fn setup(&mut self) -> Result<(), EngineError> {
            let mut calls = self.0.borrow_mut();
            calls.setup += 1;
            if calls.fail_setup {
                return Err(EngineError::Setup {
                    message: "no surface".to_string(),
                });
            }
            Ok(())
        }

        fn add_model(&mut self, model: DecodedModel) -> Result<ModelKey, EngineError> {
            let pairs = model.items.iter().map(|i| (i.express_id, i.local_id)).collect();
            self.0.borrow_mut().models.insert(model.key.clone(), pairs);
            Ok(model.key)
        }

        fn remove_model(&mut self, key: &ModelKey) {
            self.0.borrow_mut().models.remove(key);
        }

        fn model_keys(&self) -> Vec<ModelKey> {
            self.0.borrow().models.keys().cloned().collect()
        }

        fn id_table(&self, key: &ModelKey) -> Result<Vec<(u64, u32)>, EngineError> {
            let mut calls = self.0.borrow_mut();
            calls.id_table += 1;
            calls.models.get(key).cloned().ok_or(EngineError::UnknownModel {
                model: key.to_string(),
            })
        }

        fn clear_highlights(&mut self) -> Result<(), EngineError> {
            self.0.borrow_mut().clear += 1;
            Ok(())
        }

        fn highlight(&mut self, key: &ModelKey, local_ids: &BTreeSet<u32>) -> Result<(), EngineError> {
            let mut calls = self.0.borrow_mut();
            calls.highlights.push((key.clone(), local_ids.clone()));
            if calls.failing.contains(key) {
                return Err(EngineError::Highlight {
                    model: key.to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }

        fn dispose(&mut self) {
            self.0.borrow_mut().dispose += 1;
        }
    }

    fn decoded(key: &str, pairs: &[(u64, u32)]) -> DecodedModel {
        DecodedModel {
            key: ModelKey::from(key),
            schema: "IFC4".to_string(),
            items: pairs
                .iter()
                .map(|&(express_id, local_id)| SceneItem {
                    local_id,
                    express_id,
                    entity_type: "IFCWALL".to_string(),
                    global_id: None,
                    name: None,
                    storey: None,
                })
                .collect(),
            storeys: Vec::new(),
            unit_scale: 1.0,
        }
    }

    fn ready_adapter() -> (ViewerAdapter<FakeEngine>, Rc<RefCell<Calls>>) {
        let engine = FakeEngine::default();
        let calls = Rc::clone(&engine.0);
        let mut adapter = ViewerAdapter::new(engine);
        adapter.init().unwrap();
        (adapter, calls)
    }

    fn identity(ids: &[u64]) -> Vec<(u64, u32)> {
        ids.iter().map(|&id| (id, id as u32)).collect()
    }

    #[test]
    fn init_runs_setup_once() {
        let (mut adapter, calls) = ready_adapter();
        assert_eq!(adapter.state(), &ViewerState::Ready);
        adapter.init().unwrap();
        assert_eq!(calls.borrow().setup, 1);
    }

    #[test]
    fn failed_setup_leaves_adapter_uninitialized() {
        let engine = FakeEngine::default();
        engine.0.borrow_mut().fail_setup = true;
        let mut adapter = ViewerAdapter::new(engine);
        assert!(adapter.init().is_err());
        assert_eq!(adapter.state(), &ViewerState::Uninitialized);
        assert!(adapter.begin_load("/ifc/a.ifc").is_none());
    }

    #[test]
    fn one_highlight_request_per_loaded_model() {
        let (mut adapter, calls) = ready_adapter();
        {
            let mut c = calls.borrow_mut();
            c.models.insert(ModelKey::from("a"), identity(&[12, 45, 99]));
            c.models.insert(ModelKey::from("b"), identity(&[12, 45]));
        }

        let report = adapter.sync_selection(&SelectionSet::flattened([12, 45]));

        let expected: BTreeSet<u32> = BTreeSet::from([12, 45]);
        let calls = calls.borrow();
        assert_eq!(calls.clear, 1);
        assert_eq!(
            calls.highlights,
            vec![
                (ModelKey::from("a"), expected.clone()),
                (ModelKey::from("b"), expected)
            ]
        );
        assert!(report.cleared);
        assert_eq!(report.requests.len(), 2);
        assert_eq!(report.unmapped, 0);
    }

    #[test]
    fn express_ids_are_translated_through_the_id_table() {
        let (mut adapter, calls) = ready_adapter();
        let ticket = adapter.begin_load("http://localhost:8000/ifc/office.ifc").unwrap();
        assert_eq!(ticket.key(), &ModelKey::from("office"));
        adapter
            .finish_load(&ticket, Ok(decoded("office", &[(12, 0), (45, 1), (310, 2)])))
            .unwrap();

        let report = adapter.sync_selection(&SelectionSet::flattened([310, 12, 777]));
        assert_eq!(
            calls.borrow().highlights,
            vec![(ModelKey::from("office"), BTreeSet::from([0, 2]))]
        );
        assert_eq!(report.unmapped, 1);
    }

    #[test]
    fn id_table_is_queried_once_per_model() {
        let (mut adapter, calls) = ready_adapter();
        let ticket = adapter.begin_load("/ifc/a.ifc").unwrap();
        adapter.finish_load(&ticket, Ok(decoded("a", &identity(&[1, 2])))).unwrap();

        adapter.sync_selection(&SelectionSet::flattened([1]));
        adapter.sync_selection(&SelectionSet::flattened([2]));
        assert_eq!(calls.borrow().id_table, 1);
    }

    #[test]
    fn empty_selection_only_clears() {
        let (mut adapter, calls) = ready_adapter();
        calls.borrow_mut().models.insert(ModelKey::from("a"), identity(&[1]));

        let report = adapter.sync_selection(&SelectionSet::new());
        assert_eq!(calls.borrow().clear, 1);
        assert!(calls.borrow().highlights.is_empty());
        assert!(report.requests.is_empty());
    }

    #[test]
    fn failing_model_does_not_block_others() {
        let (mut adapter, calls) = ready_adapter();
        {
            let mut c = calls.borrow_mut();
            c.models.insert(ModelKey::from("a"), identity(&[5]));
            c.models.insert(ModelKey::from("b"), identity(&[5]));
            c.failing.insert(ModelKey::from("a"));
        }

        let report = adapter.sync_selection(&SelectionSet::flattened([5]));
        assert_eq!(report.failed, vec![ModelKey::from("a")]);
        assert_eq!(calls.borrow().highlights.len(), 2);
    }

    #[test]
    fn selection_before_load_is_applied_when_model_arrives() {
        let (mut adapter, calls) = ready_adapter();
        let ticket = adapter.begin_load("/ifc/a.ifc").unwrap();
        adapter.sync_selection(&SelectionSet::flattened([7]));
        assert!(calls.borrow().highlights.is_empty());

        adapter.finish_load(&ticket, Ok(decoded("a", &[(7, 3)]))).unwrap();
        assert_eq!(
            calls.borrow().highlights,
            vec![(ModelKey::from("a"), BTreeSet::from([3]))]
        );
    }

    #[test]
    fn selection_before_init_is_gated() {
        let engine = FakeEngine::default();
        let calls = Rc::clone(&engine.0);
        let mut adapter = ViewerAdapter::new(engine);

        let report = adapter.sync_selection(&SelectionSet::flattened([1]));
        assert_eq!(report, HighlightReport::default());
        assert_eq!(calls.borrow().clear, 0);
        assert_eq!(adapter.selection().ids(), &[1]);
    }

    #[test]
    fn new_load_supersedes_previous_one() {
        let (mut adapter, calls) = ready_adapter();
        let first = adapter.begin_load("/ifc/first.ifc").unwrap();
        let second = adapter.begin_load("/ifc/second.ifc").unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        let stale = adapter.finish_load(&first, Ok(decoded("first", &[(1, 1)]))).unwrap();
        assert_eq!(stale, None);
        assert!(calls.borrow().models.is_empty());
        assert!(adapter.is_loading());

        let key = adapter.finish_load(&second, Ok(decoded("second", &[(1, 1)]))).unwrap();
        assert_eq!(key, Some(ModelKey::from("second")));
        assert_eq!(
            adapter.state(),
            &ViewerState::ModelLoaded {
                key: ModelKey::from("second")
            }
        );
    }

    #[test]
    fn loading_clears_previous_model() {
        let (mut adapter, calls) = ready_adapter();
        let ticket = adapter.begin_load("/ifc/a.ifc").unwrap();
        adapter.finish_load(&ticket, Ok(decoded("a", &[(1, 1)]))).unwrap();

        adapter.begin_load("/ifc/b.ifc").unwrap();
        assert!(calls.borrow().models.is_empty());
    }

    #[test]
    fn progress_is_monotonic_and_ignores_stale_tickets() {
        let (mut adapter, _) = ready_adapter();
        let first = adapter.begin_load("/ifc/a.ifc").unwrap();
        adapter.report_progress(&first, 0.4);
        adapter.report_progress(&first, 0.2);
        assert!((adapter.progress() - 0.4).abs() < f32::EPSILON);
        adapter.report_progress(&first, 7.0);
        assert!((adapter.progress() - 1.0).abs() < f32::EPSILON);

        let second = adapter.begin_load("/ifc/b.ifc").unwrap();
        assert!(adapter.progress().abs() < f32::EPSILON);
        adapter.report_progress(&first, 0.9);
        assert!(adapter.progress().abs() < f32::EPSILON);
        adapter.report_progress(&second, 0.3);
        assert!((adapter.progress() - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn failed_load_stops_loading() {
        let (mut adapter, _) = ready_adapter();
        let ticket = adapter.begin_load("/ifc/a.ifc").unwrap();
        let err = adapter
            .finish_load(
                &ticket,
                Err(EngineError::Decode {
                    model: "a".to_string(),
                    message: "missing DATA section".to_string(),
                }),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
        assert_eq!(adapter.state(), &ViewerState::Ready);
        assert!(!adapter.is_loading());
    }

    #[test]
    fn dispose_releases_engine_exactly_once() {
        let (mut adapter, calls) = ready_adapter();
        let ticket = adapter.begin_load("/ifc/a.ifc").unwrap();
        adapter.dispose();
        adapter.dispose();
        assert!(ticket.is_cancelled());

        let clears_before = calls.borrow().clear;
        let report = adapter.sync_selection(&SelectionSet::flattened([1, 2]));
        assert_eq!(report, HighlightReport::default());
        assert_eq!(calls.borrow().clear, clears_before);
        assert!(adapter.begin_load("/ifc/b.ifc").is_none());
        assert_eq!(adapter.finish_load(&ticket, Ok(decoded("a", &[]))).unwrap(), None);

        drop(adapter);
        assert_eq!(calls.borrow().dispose, 1);
    }

    #[test]
    fn drop_disposes() {
        let (adapter, calls) = ready_adapter();
        drop(adapter);
        assert_eq!(calls.borrow().dispose, 1);
    }

    #[test]
    fn model_key_uses_file_stem() {
        assert_eq!(model_key_for("http://h/ifc/duplex.ifc?v=2"), ModelKey::from("duplex"));
        assert_eq!(model_key_for(""), ModelKey::from("model"));
    }
}
