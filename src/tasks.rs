//! Background work for the UI thread.
//!
//! Every network call and model decode runs on its own short-lived thread
//! and reports back through a channel the event loop drains. Results carry
//! the request number or load ticket they were started with so the UI can
//! drop superseded answers.

use crate::api::ModelApi;
use crate::error::{ApiError, EngineError};
use crate::model::{ModelDescriptor, ModelRecord, QuantityData};
use crate::viewer::{DecodedModel, LoadTicket, ModelDecoder};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub enum TaskEvent {
    ModelsListed(Result<Vec<ModelDescriptor>, ApiError>),
    QuantitiesFetched {
        request: u64,
        id: String,
        result: Result<QuantityData, ApiError>,
    },
    RecordFetched {
        request: u64,
        id: String,
        result: Result<ModelRecord, ApiError>,
    },
    LoadProgress {
        ticket: LoadTicket,
        fraction: f32,
    },
    ModelDecoded {
        ticket: LoadTicket,
        result: Result<DecodedModel, EngineError>,
    },
    Uploaded(Result<ModelDescriptor, ApiError>),
}

#[derive(Clone)]
pub struct Worker {
    api: Arc<dyn ModelApi>,
    decoder: Arc<dyn ModelDecoder>,
    tx: Sender<TaskEvent>,
}

impl Worker {
    pub fn new(api: Arc<dyn ModelApi>, decoder: Arc<dyn ModelDecoder>, tx: Sender<TaskEvent>) -> Self {
        Self { api, decoder, tx }
    }

    pub fn list_models(&self) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(TaskEvent::ModelsListed(api.list_models()));
        })
    }

    /// Fetches the quantity table and the model record of `id`.
    pub fn fetch_model(&self, request: u64, id: &str) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let id = id.to_string();
        thread::spawn(move || {
            let result = api.fetch_quantities(&id);
            if tx
                .send(TaskEvent::QuantitiesFetched {
                    request,
                    id: id.clone(),
                    result,
                })
                .is_err()
            {
                return;
            }
            let result = api.fetch_model(&id);
            let _ = tx.send(TaskEvent::RecordFetched { request, id, result });
        })
    }

    /// Downloads and decodes the model file of a load ticket. The ticket's
    /// token is checked between download and decode and again before
    /// reporting; a cancelled load reports nothing.
    pub fn load_geometry(&self, ticket: LoadTicket) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let decoder = Arc::clone(&self.decoder);
        let tx = self.tx.clone();
        thread::spawn(move || {
            if ticket.is_cancelled() {
                return;
            }
            let bytes = match api.fetch_model_file(ticket.path()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    let _ = tx.send(TaskEvent::ModelDecoded {
                        ticket,
                        result: Err(EngineError::from(err)),
                    });
                    return;
                }
            };

            if ticket.is_cancelled() {
                tracing::debug!(generation = ticket.generation(), "Load cancelled after download");
                return;
            }

            let mut report = |fraction: f32| {
                if !ticket.is_cancelled() {
                    let _ = tx.send(TaskEvent::LoadProgress {
                        ticket: ticket.clone(),
                        fraction,
                    });
                }
            };
            let result = decoder.decode(ticket.key(), &bytes, &mut report);

            if ticket.is_cancelled() {
                tracing::debug!(generation = ticket.generation(), "Load cancelled after decode");
                return;
            }
            let _ = tx.send(TaskEvent::ModelDecoded { ticket, result });
        })
    }

    pub fn upload(&self, path: PathBuf) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(TaskEvent::Uploaded(api.upload_model(&path)));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ifc::tests::DUPLEX;
    use crate::parser::StepDecoder;
    use crate::viewer::{TerminalScene, ViewerAdapter};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::mpsc::{self, Receiver};

    struct StaticApi;

    impl ModelApi for StaticApi {
        fn list_models(&self) -> Result<Vec<ModelDescriptor>, ApiError> {
            Ok(vec![ModelDescriptor {
                id: "1".to_string(),
                name: "duplex.ifc".to_string(),
                path: None,
                element_count: 3,
            }])
        }

        fn fetch_quantities(&self, _id: &str) -> Result<QuantityData, ApiError> {
            Ok(QuantityData::default())
        }

        fn fetch_model(&self, id: &str) -> Result<ModelRecord, ApiError> {
            Err(ApiError::Status {
                url: format!("ifc/{id}"),
                status: 404,
                detail: Some("IFC file not found".to_string()),
            })
        }

        fn upload_model(&self, _path: &Path) -> Result<ModelDescriptor, ApiError> {
            unimplemented!()
        }

        fn fetch_model_file(&self, _path: &str) -> Result<Vec<u8>, ApiError> {
            Ok(DUPLEX.as_bytes().to_vec())
        }
    }

    fn worker() -> (Worker, Receiver<TaskEvent>) {
        let (tx, rx) = mpsc::channel();
        (Worker::new(Arc::new(StaticApi), Arc::new(StepDecoder), tx), rx)
    }

    fn ready_adapter() -> ViewerAdapter<TerminalScene> {
        let mut adapter = ViewerAdapter::new(TerminalScene::new());
        adapter.init().unwrap();
        adapter
    }

    #[test]
    fn fetch_reports_both_halves_with_request_number() {
        let (worker, rx) = worker();
        worker.fetch_model(4, "1").join().unwrap();

        let events: Vec<TaskEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            TaskEvent::QuantitiesFetched { request: 4, result: Ok(_), .. }
        ));
        assert!(matches!(
            &events[1],
            TaskEvent::RecordFetched { request: 4, result: Err(ApiError::Status { status: 404, .. }), .. }
        ));
    }

    #[test]
    fn geometry_load_ends_with_decoded_model() {
        let (worker, rx) = worker();
        let mut adapter = ready_adapter();
        let ticket = adapter.begin_load("/ifc/duplex.ifc").unwrap();
        worker.load_geometry(ticket).join().unwrap();

        let events: Vec<TaskEvent> = rx.try_iter().collect();
        let Some(TaskEvent::ModelDecoded { ticket, result }) = events.into_iter().last() else {
            panic!("expected a decoded model");
        };
        let key = adapter.finish_load(&ticket, result).unwrap();
        assert_eq!(key.map(|k| k.0), Some("duplex".to_string()));
    }

    #[test]
    fn cancelled_load_reports_nothing() {
        let (worker, rx) = worker();
        let mut adapter = ready_adapter();
        let first = adapter.begin_load("/ifc/first.ifc").unwrap();
        adapter.begin_load("/ifc/second.ifc").unwrap();

        worker.load_geometry(first).join().unwrap();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn list_models_sends_result() {
        let (worker, rx) = worker();
        worker.list_models().join().unwrap();
        match rx.try_recv().unwrap() {
            TaskEvent::ModelsListed(Ok(models)) => assert_eq!(models.len(), 1),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
