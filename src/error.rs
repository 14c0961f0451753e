//! Error types for IFC Quantity Viewer.

use std::path::PathBuf;
use thiserror::Error;

/// Messages the decoder emits for geometry it skips. They are expected for
/// many real-world files and are logged at debug level only.
const BENIGN_ENGINE_MESSAGES: &[&str] = &["initialize fragments", "Unsupported trimmings", "bad bound"];

/// Errors returned by the REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("request to '{url}' returned {status}{}", detail_suffix(.detail))]
    Status {
        url: String,
        status: u16,
        detail: Option<String>,
    },

    /// The response body was not the expected JSON document.
    #[error("unexpected response from '{url}': {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A local file could not be attached to a multipart request.
    #[error("failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    /// Short message for the status line.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Status { status, .. } => format!("server returned {status}"),
            Self::Transport { .. } => "could not reach the server".to_string(),
            Self::Decode { .. } => "server sent an unexpected response".to_string(),
            Self::FileRead { path, .. } => format!("could not read {}", path.display()),
        }
    }
}

/// Errors raised by the viewer engine and model decoding.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Render surface, scene, camera, grid or highlighter could not be set up.
    #[error("viewer setup failed: {message}")]
    Setup { message: String },

    /// The IFC bytes could not be decoded into a model.
    #[error("failed to decode model '{model}': {message}")]
    Decode { model: String, message: String },

    /// The model file could not be fetched.
    #[error("failed to fetch model file: {source}")]
    Fetch {
        #[from]
        source: ApiError,
    },

    /// The engine rejected a highlight request.
    #[error("failed to highlight items in model '{model}': {message}")]
    Highlight { model: String, message: String },

    /// The engine has no model with this key.
    #[error("model '{model}' is not loaded")]
    UnknownModel { model: String },

    /// The engine was used before setup.
    #[error("viewer is not initialized")]
    NotInitialized,
}

impl EngineError {
    /// Known-noisy engine messages that do not indicate a real failure.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        let message = self.to_string();
        BENIGN_ENGINE_MESSAGES.iter().any(|m| message.contains(m))
    }
}

/// Errors that can occur before or during an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Only `.ifc` files are accepted.
    #[error("please upload a valid .ifc file (got '{path}')")]
    NotIfc { path: PathBuf },

    /// The selected file does not exist.
    #[error("file '{path}' does not exist")]
    Missing { path: PathBuf },

    /// The model cap is reached.
    #[error("model limit reached ({cap} models)")]
    CapReached { cap: usize },

    /// An upload is already in flight.
    #[error("an upload is already in progress")]
    Busy,

    /// The server rejected the upload or could not be reached.
    #[error("upload failed: {source}")]
    Api {
        #[from]
        source: ApiError,
    },
}

/// Errors that can occur when parsing STEP text.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The STEP format is invalid or malformed.
    #[error("invalid STEP format: {message}")]
    InvalidStep { message: String },
}

/// Errors that can occur when exporting data.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to create the output file.
    #[error("failed to create file '{path}': {source}")]
    FileCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write data to the file.
    #[error("failed to write data: {message}")]
    WriteError { message: String },

    /// Failed to serialize data to JSON.
    #[error("JSON serialization failed: {source}")]
    JsonSerialize {
        #[from]
        source: serde_json::Error,
    },

    /// Failed to write CSV data.
    #[error("CSV write failed: {source}")]
    CsvWrite {
        #[from]
        source: csv::Error,
    },
}
