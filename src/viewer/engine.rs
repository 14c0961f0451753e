//! The seam between the adapter and the scene that actually holds models.

use crate::error::EngineError;
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a model inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelKey(pub String);

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// One selectable element of a decoded model.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneItem {
    /// Engine-internal ID, only meaningful within its model.
    pub local_id: u32,
    /// STEP instance number, the ID the backend reports.
    pub express_id: u64,
    pub entity_type: String,
    pub global_id: Option<String>,
    pub name: Option<String>,
    pub storey: Option<String>,
}

/// A building storey with its elevation in model units.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneStorey {
    pub name: String,
    pub elevation: f64,
}

/// Output of a [`ModelDecoder`], ready to be added to an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedModel {
    pub key: ModelKey,
    pub schema: String,
    pub items: Vec<SceneItem>,
    pub storeys: Vec<SceneStorey>,
    /// Metres per model length unit.
    pub unit_scale: f64,
}

/// Turns raw IFC bytes into a model. Runs off the UI thread.
pub trait ModelDecoder: Send + Sync {
    fn decode(
        &self,
        key: &ModelKey,
        bytes: &[u8],
        progress: &mut dyn FnMut(f32),
    ) -> Result<DecodedModel, EngineError>;
}

/// The scene the adapter drives. Owned by exactly one adapter.
pub trait ViewerEngine {
    /// Creates render surface, scene, camera, grid and highlighter.
    fn setup(&mut self) -> Result<(), EngineError>;

    /// Adds a decoded model to the scene and returns its key.
    fn add_model(&mut self, model: DecodedModel) -> Result<ModelKey, EngineError>;

    fn remove_model(&mut self, key: &ModelKey);

    /// Keys of every model currently in the scene.
    fn model_keys(&self) -> Vec<ModelKey>;

    /// `(express_id, local_id)` pairs of a loaded model.
    fn id_table(&self, key: &ModelKey) -> Result<Vec<(u64, u32)>, EngineError>;

    fn clear_highlights(&mut self) -> Result<(), EngineError>;

    fn highlight(&mut self, key: &ModelKey, local_ids: &BTreeSet<u32>) -> Result<(), EngineError>;

    /// Releases every engine resource.
    fn dispose(&mut self);
}
