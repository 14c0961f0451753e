//! REST access to the IFC quantity backend.

pub mod client;

pub use client::ApiClient;

use crate::error::ApiError;
use crate::model::{ModelDescriptor, ModelRecord, QuantityData};
use std::path::Path;

/// Operations the viewer needs from the backend.
///
/// Every call is a single request; there are no retries and no caching.
pub trait ModelApi: Send + Sync {
    /// `GET /ifc`
    fn list_models(&self) -> Result<Vec<ModelDescriptor>, ApiError>;

    /// `GET /geometry/{id}`
    fn fetch_quantities(&self, id: &str) -> Result<QuantityData, ApiError>;

    /// `GET /ifc/{id}`
    fn fetch_model(&self, id: &str) -> Result<ModelRecord, ApiError>;

    /// `POST /ifc` with the file as multipart field `file`.
    fn upload_model(&self, path: &Path) -> Result<ModelDescriptor, ApiError>;

    /// Raw bytes of a served IFC file.
    fn fetch_model_file(&self, path: &str) -> Result<Vec<u8>, ApiError>;
}
