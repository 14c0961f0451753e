use super::ModelApi;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::{ModelDescriptor, ModelRecord, QuantityData, UploadResponse};
use reqwest::blocking::{multipart::Form, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

/// Blocking HTTP client for the backend REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    origin: String,
    base: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| ApiError::Transport {
                url: config.api_url.clone(),
                source,
            })?;

        Ok(Self {
            origin: config.api_url.clone(),
            base: config.api_base(),
            http,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn route(&self, route: &str) -> String {
        format!("{}/{}", self.base, route.trim_start_matches('/'))
    }

    /// Absolute URL of a served file. Backend records usually carry a full
    /// URL; bare paths are resolved against the backend origin.
    #[must_use]
    pub fn resolve_asset(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.origin, path.trim_start_matches('/'))
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        tracing::debug!(url, "GET");
        let response = self.http.get(url).send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        decode_json(url, check_status(url, response)?)
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let detail = error_detail(&body);
    tracing::warn!(url, status = status.as_u16(), detail = ?detail, "Request rejected");
    Err(ApiError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        detail,
    })
}

fn decode_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
    let body = response.text().map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

/// `detail` of a `{detail}` error body. Validation errors carry a list,
/// which is kept as compact JSON.
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(detail) => Some(detail),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl ModelApi for ApiClient {
    fn list_models(&self) -> Result<Vec<ModelDescriptor>, ApiError> {
        self.get_json(&self.route("ifc"))
    }

    fn fetch_quantities(&self, id: &str) -> Result<QuantityData, ApiError> {
        self.get_json(&self.route(&format!("geometry/{id}")))
    }

    fn fetch_model(&self, id: &str) -> Result<ModelRecord, ApiError> {
        self.get_json(&self.route(&format!("ifc/{id}")))
    }

    fn upload_model(&self, path: &Path) -> Result<ModelDescriptor, ApiError> {
        let url = self.route("ifc");
        let form = Form::new()
            .file("file", path)
            .map_err(|source| ApiError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(url = %url, file = %path.display(), "Uploading model");
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        let created: UploadResponse = decode_json(&url, check_status(&url, response)?)?;
        Ok(created.into())
    }

    fn fetch_model_file(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.resolve_asset(path);
        tracing::debug!(url = %url, "Fetching model file");
        let response = self.http.get(&url).send().map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        let bytes = check_status(&url, response)?
            .bytes()
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}
