use super::quantity::{QuantityData, QuantityMetadata};
use serde::{Deserialize, Serialize};

/// An uploaded IFC model as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(alias = "filename")]
    pub name: String,
    #[serde(default, alias = "localmachin_path")]
    pub path: Option<String>,
    #[serde(default, alias = "elements")]
    pub element_count: u64,
}

/// Full model document returned by `GET /ifc/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub file_path: Option<String>,
    /// URL of the IFC file served by the backend.
    #[serde(default, rename = "localmachin_path")]
    pub geometry_path: String,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub parsed_data: QuantityData,
}

/// Body returned by `POST /ifc`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: QuantityMetadata,
}

impl From<UploadResponse> for ModelDescriptor {
    fn from(response: UploadResponse) -> Self {
        Self {
            id: response.id,
            name: response.filename,
            path: None,
            element_count: response.summary.total_processed_elements.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn list_entry_uses_backend_field_names() {
        let json = r#"{"id": "65f0", "filename": "duplex", "uploaded_at": "2024-03-01T10:00:00", "elements": 412}"#;
        let descriptor: ModelDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(
            descriptor,
            ModelDescriptor {
                id: "65f0".to_string(),
                name: "duplex".to_string(),
                path: None,
                element_count: 412,
            }
        );
    }

    #[test]
    fn upload_response_becomes_descriptor() {
        let json = r#"{
            "status": "uploaded",
            "id": "abc",
            "filename": "office",
            "summary": {"total_processed_elements": 90, "all_levels": ["01 - Ground"]}
        }"#;
        let response: UploadResponse = serde_json::from_str(json).unwrap();
        let descriptor = ModelDescriptor::from(response);
        assert_eq!(descriptor.id, "abc");
        assert_eq!(descriptor.name, "office");
        assert_eq!(descriptor.element_count, 90);
    }

    #[test]
    fn record_exposes_geometry_path() {
        let json = r#"{
            "id": "abc",
            "filename": "office",
            "file_path": "/srv/ifc/office.ifc",
            "localmachin_path": "http://localhost:8000/ifc/office.ifc",
            "parsed_data": {"data": [], "metadata": {"all_levels": []}}
        }"#;
        let record: ModelRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.geometry_path, "http://localhost:8000/ifc/office.ifc");
    }
}
