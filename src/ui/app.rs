use crate::api::ModelApi;
use crate::error::UploadError;
use crate::model::{ModelDescriptor, SelectionSet};
use crate::store::{ModelStore, StoreEvent, SubscriptionId};
use crate::table::{QuantityTable, SortKey, TableSelection};
use crate::tasks::{TaskEvent, Worker};
use crate::upload::UploadModal;
use crate::viewer::{ModelDecoder, TerminalScene, ViewerAdapter};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{DefaultTerminal, Frame};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FocusPanel {
    Models,
    Table,
}

pub struct App {
    pub store: ModelStore,
    store_events: Receiver<StoreEvent>,
    subscription: Option<SubscriptionId>,
    worker: Worker,
    tasks: Receiver<TaskEvent>,
    pub focus_panel: FocusPanel,
    pub selected_model: usize,
    pub active_model: Option<String>,
    fetch_request: u64,
    pub table: QuantityTable,
    pub table_loading: bool,
    pub selection: TableSelection,
    pub selected_row: usize, // display position, not row index
    pub selected_level: usize,
    pub sort: Option<SortKey>,
    pub viewer: ViewerAdapter<TerminalScene>,
    pub upload: UploadModal,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    #[must_use]
    pub fn new(api: Arc<dyn ModelApi>, decoder: Arc<dyn ModelDecoder>, model_cap: usize) -> Self {
        let (tx, tasks) = mpsc::channel();
        let mut store = ModelStore::new(model_cap);
        let (subscription, store_events) = store.subscribe();

        let mut viewer = ViewerAdapter::new(TerminalScene::new());
        let status = viewer
            .init()
            .err()
            .map(|e| format!("Viewer unavailable: {e}"));

        Self {
            store,
            store_events,
            subscription: Some(subscription),
            worker: Worker::new(api, decoder, tx),
            tasks,
            focus_panel: FocusPanel::Models,
            selected_model: 0,
            active_model: None,
            fetch_request: 0,
            table: QuantityTable::default(),
            table_loading: false,
            selection: TableSelection::new(),
            selected_row: 0,
            selected_level: 0,
            sort: None,
            viewer,
            upload: UploadModal::new(),
            status,
            should_quit: false,
        }
    }

    /// Opens `model_id` once the list has arrived instead of the first one.
    #[must_use]
    pub fn with_initial_model(mut self, model_id: Option<String>) -> Self {
        if let Some(id) = model_id {
            self.activate_model(&id);
        }
        self
    }

    pub fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.worker.list_models();

        while !self.should_quit {
            terminal.draw(|frame| self.draw(frame))?;
            self.handle_events()?;
            self.drain_tasks();
            self.tick(Instant::now());
        }

        self.shutdown();
        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        super::dashboard::draw_dashboard(frame, self);
    }

    fn handle_events(&mut self) -> Result<()> {
        if !event::poll(POLL_INTERVAL)? {
            return Ok(());
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                self.handle_key(key.code);
            }
        }
        Ok(())
    }

    fn drain_tasks(&mut self) {
        while let Ok(task) = self.tasks.try_recv() {
            self.handle_task(task);
        }
    }

    pub fn tick(&mut self, now: Instant) {
        if self.upload.tick(now) {
            self.upload.close();
        }
    }

    /// Leaves the store and releases the viewer.
    pub fn shutdown(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.store.unsubscribe(id);
        }
        self.viewer.dispose();
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        if self.upload.is_open() {
            self.handle_upload_keys(code);
            return;
        }

        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => self.toggle_focus(),
            KeyCode::Esc => self.clear_selection(),
            KeyCode::Char('u') => self.open_upload(),
            KeyCode::Char('s') => self.cycle_sort(),
            KeyCode::Char('r') => self.reverse_sort(),
            KeyCode::Up | KeyCode::Char('k') => self.navigate_up(),
            KeyCode::Down | KeyCode::Char('j') => self.navigate_down(),
            KeyCode::Left | KeyCode::Char('h') => self.previous_level(),
            KeyCode::Right | KeyCode::Char('l') => self.next_level(),
            KeyCode::Enter => self.enter(),
            KeyCode::Char(' ') => self.click_level(),
            _ => {}
        }
    }

    fn handle_upload_keys(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.upload.close();
            }
            KeyCode::Enter => self.submit_upload(),
            KeyCode::Backspace => self.upload.pop_char(),
            KeyCode::Char(c) => self.upload.push_char(c),
            _ => {}
        }
    }

    pub fn handle_task(&mut self, task: TaskEvent) {
        match task {
            TaskEvent::ModelsListed(Ok(models)) => self.store.set_models(models),
            TaskEvent::ModelsListed(Err(err)) => {
                tracing::error!(error = %err, "Failed to list models");
                self.store.load_failed(err.user_message());
            }
            TaskEvent::QuantitiesFetched {
                request,
                id,
                result,
            } => {
                if request != self.fetch_request {
                    tracing::debug!(id, request, "Discarding stale quantity data");
                    return;
                }
                self.table_loading = false;
                match result {
                    Ok(data) => {
                        tracing::info!(id, rows = data.data.len(), "Quantity data loaded");
                        self.table = QuantityTable::from_data(&data);
                    }
                    Err(err) => {
                        tracing::error!(id, error = %err, "Failed to fetch quantity data");
                        self.table = QuantityTable::default();
                        self.status = Some(format!("Failed to load quantities: {}", err.user_message()));
                    }
                }
                self.reset_table_cursor();
            }
            TaskEvent::RecordFetched {
                request,
                id,
                result,
            } => {
                if request != self.fetch_request {
                    tracing::debug!(id, request, "Discarding stale model record");
                    return;
                }
                match result {
                    Ok(record) if !record.geometry_path.is_empty() => {
                        if let Some(ticket) = self.viewer.begin_load(&record.geometry_path) {
                            self.worker.load_geometry(ticket);
                        }
                    }
                    Ok(_) => {
                        tracing::warn!(id, "Model record has no geometry file");
                        self.viewer.unload();
                    }
                    Err(err) => {
                        tracing::error!(id, error = %err, "Failed to fetch model record");
                        self.viewer.unload();
                        self.status = Some(format!("Failed to load model: {}", err.user_message()));
                    }
                }
            }
            TaskEvent::LoadProgress { ticket, fraction } => {
                self.viewer.report_progress(&ticket, fraction);
            }
            TaskEvent::ModelDecoded { ticket, result } => {
                if let Err(err) = self.viewer.finish_load(&ticket, result) {
                    if !err.is_benign() {
                        self.status = Some(format!("Failed to display model: {err}"));
                    }
                }
            }
            TaskEvent::Uploaded(result) => {
                // Store events report the success.
                match self.upload.finish(result, &mut self.store, Instant::now()) {
                    Ok(model) if self.store.find(&model.id).is_none() => {
                        self.status = Some(format!("Uploaded {}, refreshing model list", model.name));
                        self.worker.list_models();
                    }
                    Ok(_) => {}
                    Err(UploadError::Api { source }) => {
                        self.status = Some(format!("Upload failed: {}", source.user_message()));
                    }
                    Err(_) => {}
                }
            }
        }

        self.drain_store_events();
    }

    fn drain_store_events(&mut self) {
        while let Ok(event) = self.store_events.try_recv() {
            match event {
                StoreEvent::Replaced(models) => {
                    self.selected_model = self.selected_model.min(models.len().saturating_sub(1));
                    if self.active_model.is_none() {
                        if let Some(first) = models.first() {
                            let id = first.id.clone();
                            self.activate_model(&id);
                        }
                    }
                }
                StoreEvent::Added(model) => {
                    self.status = Some(format!("Uploaded {}", model.name));
                }
                StoreEvent::LoadFailed(message) => {
                    self.status = Some(format!("Failed to load models: {message}"));
                }
            }
        }
    }

    /// Switches the page to another model.
    pub fn activate_model(&mut self, id: &str) {
        if self.active_model.as_deref() == Some(id) {
            return;
        }
        tracing::info!(id, "Activating model");

        self.active_model = Some(id.to_string());
        self.fetch_request += 1;
        // The previous model's geometry must not land after the switch.
        self.viewer.unload();
        self.table = QuantityTable::default();
        self.table_loading = true;
        self.reset_table_cursor();
        if let Some(index) = self.store.models().iter().position(|m| m.id == id) {
            self.selected_model = index;
        }
        self.worker.fetch_model(self.fetch_request, id);
    }

    #[must_use]
    pub fn active_descriptor(&self) -> Option<&ModelDescriptor> {
        self.active_model.as_deref().and_then(|id| self.store.find(id))
    }

    /// Row indices in display order.
    #[must_use]
    pub fn display_rows(&self) -> Vec<usize> {
        self.table.sorted_indices(self.sort)
    }

    #[must_use]
    pub fn cursor_level(&self) -> Option<&str> {
        self.table.levels().get(self.selected_level).map(String::as_str)
    }

    fn reset_table_cursor(&mut self) {
        self.selected_row = 0;
        self.selected_level = 0;
        self.selection.clear();
        self.sync_viewer();
    }

    fn sync_viewer(&mut self) {
        let report = self.viewer.sync_selection(self.selection.ids());
        if !report.failed.is_empty() {
            tracing::debug!(failed = report.failed.len(), "Some models could not be highlighted");
        }
    }

    fn toggle_focus(&mut self) {
        self.focus_panel = match self.focus_panel {
            FocusPanel::Models => FocusPanel::Table,
            FocusPanel::Table => FocusPanel::Models,
        };
    }

    fn navigate_up(&mut self) {
        match self.focus_panel {
            FocusPanel::Models => self.selected_model = self.selected_model.saturating_sub(1),
            FocusPanel::Table => self.selected_row = self.selected_row.saturating_sub(1),
        }
    }

    fn navigate_down(&mut self) {
        match self.focus_panel {
            FocusPanel::Models => {
                if self.selected_model < self.store.models().len().saturating_sub(1) {
                    self.selected_model += 1;
                }
            }
            FocusPanel::Table => {
                if self.selected_row < self.table.rows().len().saturating_sub(1) {
                    self.selected_row += 1;
                }
            }
        }
    }

    fn previous_level(&mut self) {
        self.selected_level = self.selected_level.saturating_sub(1);
    }

    fn next_level(&mut self) {
        if self.selected_level < self.table.levels().len().saturating_sub(1) {
            self.selected_level += 1;
        }
    }

    fn enter(&mut self) {
        match self.focus_panel {
            FocusPanel::Models => {
                if let Some(id) = self.store.models().get(self.selected_model).map(|m| m.id.clone()) {
                    self.activate_model(&id);
                    self.focus_panel = FocusPanel::Table;
                }
            }
            FocusPanel::Table => {
                if let Some(&index) = self.display_rows().get(self.selected_row) {
                    self.selection.click_row(&self.table, index);
                    self.sync_viewer();
                }
            }
        }
    }

    fn click_level(&mut self) {
        if self.focus_panel != FocusPanel::Table {
            return;
        }
        if let Some(level) = self.cursor_level().map(str::to_string) {
            self.selection.click_level(&self.table, &level);
            self.sync_viewer();
        }
    }

    fn clear_selection(&mut self) {
        self.selection.clear();
        self.sync_viewer();
    }

    fn cycle_sort(&mut self) {
        let columns = self.table.columns().len();
        self.sort = match self.sort {
            None if columns > 0 => Some(SortKey {
                column: 0,
                descending: false,
            }),
            Some(sort) if sort.column + 1 < columns => Some(SortKey {
                column: sort.column + 1,
                descending: false,
            }),
            _ => None,
        };
        self.selected_row = 0;
    }

    fn reverse_sort(&mut self) {
        if let Some(sort) = self.sort.as_mut() {
            sort.descending = !sort.descending;
        }
    }

    fn open_upload(&mut self) {
        if self.store.can_add() {
            self.upload.open();
        } else {
            self.status = Some(format!("Model limit reached ({} models)", self.store.cap()));
        }
    }

    fn submit_upload(&mut self) {
        match self.upload.submit(&self.store, Instant::now()) {
            Ok(path) => {
                self.worker.upload(path);
            }
            Err(err) => tracing::debug!(error = %err, "Upload not submitted"),
        }
    }

    /// IDs currently highlighted, for the header.
    #[must_use]
    pub fn selection_ids(&self) -> &SelectionSet {
        self.selection.ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::model::{ModelRecord, QuantityData};
    use crate::parser::ifc::tests::DUPLEX;
    use crate::parser::StepDecoder;
    use crate::table::tests::sample_table;
    use crate::upload::UploadPhase;
    use crate::viewer::ViewerState;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    struct OfflineApi;

    impl ModelApi for OfflineApi {
        fn list_models(&self) -> Result<Vec<ModelDescriptor>, ApiError> {
            Ok(Vec::new())
        }

        fn fetch_quantities(&self, _id: &str) -> Result<QuantityData, ApiError> {
            Ok(QuantityData::default())
        }

        fn fetch_model(&self, id: &str) -> Result<ModelRecord, ApiError> {
            Err(ApiError::Status {
                url: format!("ifc/{id}"),
                status: 404,
                detail: None,
            })
        }

        fn upload_model(&self, path: &Path) -> Result<ModelDescriptor, ApiError> {
            Ok(model(&path.display().to_string()))
        }

        fn fetch_model_file(&self, _path: &str) -> Result<Vec<u8>, ApiError> {
            Ok(DUPLEX.as_bytes().to_vec())
        }
    }

    fn record(id: &str, geometry_path: &str) -> ModelRecord {
        ModelRecord {
            id: id.to_string(),
            filename: format!("{id}.ifc"),
            file_path: None,
            geometry_path: geometry_path.to_string(),
            uploaded_at: None,
            parsed_data: QuantityData::default(),
        }
    }

    /// Waits for the decode result of the load the worker is running.
    fn next_decoded(app: &App) -> TaskEvent {
        loop {
            match app.tasks.recv_timeout(Duration::from_secs(10)) {
                Ok(event @ TaskEvent::ModelDecoded { .. }) => return event,
                Ok(_) => {}
                Err(err) => panic!("no decoded model: {err}"),
            }
        }
    }

    fn model(id: &str) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: format!("{id}.ifc"),
            path: None,
            element_count: 10,
        }
    }

    fn app(cap: usize) -> App {
        App::new(Arc::new(OfflineApi), Arc::new(StepDecoder), cap)
    }

    fn app_with_table() -> App {
        let mut app = app(3);
        app.handle_task(TaskEvent::ModelsListed(Ok(vec![model("a")])));
        app.table = sample_table();
        app.focus_panel = FocusPanel::Table;
        app
    }

    #[test]
    fn first_model_is_activated_when_list_arrives() {
        let mut app = app(3);
        app.handle_task(TaskEvent::ModelsListed(Ok(vec![model("a"), model("b")])));
        assert_eq!(app.active_model.as_deref(), Some("a"));
        assert!(app.table_loading);
        assert_eq!(app.fetch_request, 1);
    }

    #[test]
    fn list_failure_is_shown() {
        let mut app = app(3);
        app.handle_task(TaskEvent::ModelsListed(Err(ApiError::Status {
            url: "ifc".to_string(),
            status: 500,
            detail: None,
        })));
        assert_eq!(app.status.as_deref(), Some("Failed to load models: server returned 500"));
        assert!(!app.store.is_loading());
    }

    #[test]
    fn stale_quantities_are_dropped() {
        let mut app = app(3);
        app.handle_task(TaskEvent::ModelsListed(Ok(vec![model("a"), model("b")])));
        app.activate_model("b");

        let stale = QuantityData {
            data: sample_table().rows().to_vec(),
            ..QuantityData::default()
        };
        app.handle_task(TaskEvent::QuantitiesFetched {
            request: 1,
            id: "a".to_string(),
            result: Ok(stale),
        });
        assert!(app.table.is_empty());
        assert!(app.table_loading);

        app.handle_task(TaskEvent::QuantitiesFetched {
            request: 2,
            id: "b".to_string(),
            result: Ok(QuantityData::default()),
        });
        assert!(!app.table_loading);
    }

    #[test]
    fn enter_on_row_selects_its_ids() {
        let mut app = app_with_table();
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.selection_ids().ids(), &[12, 45, 310]);
        assert_eq!(app.viewer.selection().ids(), &[12, 45, 310]);
    }

    #[test]
    fn space_toggles_level_and_clears_row() {
        let mut app = app_with_table();
        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Right);
        app.handle_key(KeyCode::Char(' '));

        assert_eq!(app.selection.selected_level(), Some("02 - Floor"));
        assert_eq!(app.selection.selected_row(), None);
        assert_eq!(app.selection_ids().ids(), &[310, 400, 401, 402, 403]);

        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.selection.selected_level(), None);
        assert!(app.selection_ids().is_empty());
    }

    #[test]
    fn enter_follows_sorted_order() {
        let mut app = app_with_table();
        // Total column, descending: beams first.
        app.sort = Some(SortKey {
            column: 2,
            descending: true,
        });
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.selection_ids().ids(), &[400, 401, 402, 403]);
    }

    #[test]
    fn sort_cycles_through_columns() {
        let mut app = app_with_table();
        app.handle_key(KeyCode::Char('s'));
        assert_eq!(
            app.sort,
            Some(SortKey {
                column: 0,
                descending: false
            })
        );
        app.handle_key(KeyCode::Char('r'));
        assert!(app.sort.is_some_and(|s| s.descending));
    }

    #[test]
    fn upload_hidden_at_cap() {
        let mut app = app(1);
        app.handle_task(TaskEvent::ModelsListed(Ok(vec![model("a")])));
        app.handle_key(KeyCode::Char('u'));
        assert!(!app.upload.is_open());
        assert_eq!(app.status.as_deref(), Some("Model limit reached (1 models)"));
    }

    #[test]
    fn upload_success_registers_model() {
        let mut app = app(3);
        app.handle_task(TaskEvent::ModelsListed(Ok(vec![model("a")])));
        app.handle_key(KeyCode::Char('u'));
        assert!(app.upload.is_open());

        app.handle_task(TaskEvent::Uploaded(Ok(model("b"))));
        assert_eq!(app.store.models().len(), 2);
        assert!(matches!(app.upload.phase(), UploadPhase::Completed { .. }));
        assert_eq!(app.status.as_deref(), Some("Uploaded b.ifc"));
    }

    #[test]
    fn upload_over_cap_is_not_reported_as_failure() {
        let mut app = app(1);
        app.handle_task(TaskEvent::ModelsListed(Ok(vec![model("a")])));

        app.handle_task(TaskEvent::Uploaded(Ok(model("b"))));
        assert!(matches!(app.upload.phase(), UploadPhase::Completed { .. }));
        assert_eq!(app.status.as_deref(), Some("Uploaded b.ifc, refreshing model list"));
    }

    #[test]
    fn geometry_of_previous_model_is_dropped_after_switch() {
        let mut app = app(3);
        app.handle_task(TaskEvent::ModelsListed(Ok(vec![model("a"), model("b")])));
        app.handle_task(TaskEvent::RecordFetched {
            request: 1,
            id: "a".to_string(),
            result: Ok(record("a", "/ifc/a.ifc")),
        });
        assert!(app.viewer.is_loading());
        let decoded_a = next_decoded(&app);

        app.activate_model("b");
        assert!(!app.viewer.is_loading());

        app.handle_task(decoded_a);
        assert_eq!(app.active_model.as_deref(), Some("b"));
        assert_eq!(app.viewer.state(), &ViewerState::Ready);
        assert!(app.viewer.loaded_model().is_none());
    }

    #[test]
    fn shutdown_unsubscribes_and_disposes() {
        let mut app = app(3);
        assert_eq!(app.store.subscriber_count(), 1);
        app.shutdown();
        assert_eq!(app.store.subscriber_count(), 0);
        assert!(app.viewer.is_disposed());
    }
}
