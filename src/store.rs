//! Process-wide list of available models.
//!
//! Views that care about the list subscribe when they are mounted and
//! unsubscribe when they go away; every change is pushed to each live
//! subscriber as a [`StoreEvent`].

use crate::error::UploadError;
use crate::model::ModelDescriptor;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The whole list was (re)loaded.
    Replaced(Vec<ModelDescriptor>),
    /// A model was registered, usually after an upload.
    Added(ModelDescriptor),
    /// Loading the list failed; the store keeps its previous content.
    LoadFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
pub struct ModelStore {
    models: Vec<ModelDescriptor>,
    loading: bool,
    cap: usize,
    subscribers: Vec<(SubscriptionId, Sender<StoreEvent>)>,
    next_subscription: u64,
}

impl ModelStore {
    /// Empty store in the loading state.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            models: Vec::new(),
            loading: true,
            cap,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<StoreEvent>) {
        let (tx, rx) = mpsc::channel();
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, tx));
        (id, rx)
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Whether another model may be registered.
    #[must_use]
    pub fn can_add(&self) -> bool {
        self.models.len() < self.cap
    }

    pub fn set_models(&mut self, models: Vec<ModelDescriptor>) {
        tracing::debug!(count = models.len(), "Model list replaced");
        self.models = models;
        self.loading = false;
        self.notify(&StoreEvent::Replaced(self.models.clone()));
    }

    pub fn load_failed(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.notify(&StoreEvent::LoadFailed(message.into()));
    }

    pub fn add(&mut self, model: ModelDescriptor) -> Result<(), UploadError> {
        if !self.can_add() {
            return Err(UploadError::CapReached { cap: self.cap });
        }
        tracing::info!(id = %model.id, name = %model.name, "Model registered");
        self.models.push(model.clone());
        self.notify(&StoreEvent::Added(model));
        Ok(())
    }

    fn notify(&mut self, event: &StoreEvent) {
        // Receivers dropped without unsubscribing are pruned here.
        self.subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}
