//! Terminal scene: holds decoded models and the highlight state the
//! dashboard draws.

use super::engine::{DecodedModel, ModelKey, SceneItem, ViewerEngine};
use crate::error::EngineError;
use std::collections::{BTreeMap, BTreeSet};

/// Lowest model point assumed when a model has no storeys.
const FALLBACK_MIN_Y: f64 = -1.0;
/// Gap between the lowest storey and the grid.
const GRID_OFFSET: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: [f64; 3],
    pub target: [f64; 3],
}

const INITIAL_CAMERA: CameraPose = CameraPose {
    position: [78.0, 20.0, -2.2],
    target: [26.0, -4.0, 25.0],
};

#[derive(Debug, Default)]
pub struct TerminalScene {
    ready: bool,
    disposed: bool,
    camera: Option<CameraPose>,
    grid_y: Option<f64>,
    models: BTreeMap<ModelKey, DecodedModel>,
    highlighted: BTreeMap<ModelKey, BTreeSet<u32>>,
}

impl TerminalScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn camera(&self) -> Option<CameraPose> {
        self.camera
    }

    /// Grid height in metres; `None` before setup.
    #[must_use]
    pub fn grid_y(&self) -> Option<f64> {
        self.grid_y
    }

    pub fn models(&self) -> impl Iterator<Item = &DecodedModel> {
        self.models.values()
    }

    /// Highlighted items in model then local-ID order.
    #[must_use]
    pub fn highlighted_items(&self) -> Vec<&SceneItem> {
        self.highlighted
            .iter()
            .filter_map(|(key, ids)| self.models.get(key).map(|model| (model, ids)))
            .flat_map(|(model, ids)| {
                model
                    .items
                    .iter()
                    .filter(move |item| ids.contains(&item.local_id))
            })
            .collect()
    }

    fn place_grid(&mut self, model: &DecodedModel) {
        let min_y = model
            .storeys
            .iter()
            .map(|s| s.elevation * model.unit_scale)
            .min_by(f64::total_cmp)
            .unwrap_or(FALLBACK_MIN_Y);
        self.grid_y = Some(min_y - GRID_OFFSET);
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        if self.ready {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }
}

impl ViewerEngine for TerminalScene {
    fn setup(&mut self) -> Result<(), EngineError> {
        if self.disposed {
            return Err(EngineError::Setup {
                message: "scene was disposed".to_string(),
            });
        }
        self.camera = Some(INITIAL_CAMERA);
        self.grid_y = Some(0.0);
        self.ready = true;
        Ok(())
    }

    fn add_model(&mut self, model: DecodedModel) -> Result<ModelKey, EngineError> {
        self.ensure_ready()?;
        let key = model.key.clone();
        self.place_grid(&model);
        self.highlighted.remove(&key);
        self.models.insert(key.clone(), model);
        Ok(key)
    }

    fn remove_model(&mut self, key: &ModelKey) {
        self.models.remove(key);
        self.highlighted.remove(key);
    }

    fn model_keys(&self) -> Vec<ModelKey> {
        self.models.keys().cloned().collect()
    }

    fn id_table(&self, key: &ModelKey) -> Result<Vec<(u64, u32)>, EngineError> {
        let model = self.models.get(key).ok_or_else(|| EngineError::UnknownModel {
            model: key.to_string(),
        })?;
        Ok(model
            .items
            .iter()
            .map(|item| (item.express_id, item.local_id))
            .collect())
    }

    fn clear_highlights(&mut self) -> Result<(), EngineError> {
        self.ensure_ready()?;
        self.highlighted.clear();
        Ok(())
    }

    fn highlight(&mut self, key: &ModelKey, local_ids: &BTreeSet<u32>) -> Result<(), EngineError> {
        self.ensure_ready()?;
        let model = self.models.get(key).ok_or_else(|| EngineError::UnknownModel {
            model: key.to_string(),
        })?;

        let known: BTreeSet<u32> = model.items.iter().map(|item| item.local_id).collect();
        if let Some(missing) = local_ids.iter().find(|id| !known.contains(id)) {
            return Err(EngineError::Highlight {
                model: key.to_string(),
                message: format!("no item with local id {missing}"),
            });
        }

        self.highlighted.insert(key.clone(), local_ids.clone());
        Ok(())
    }

    fn dispose(&mut self) {
        self.models.clear();
        self.highlighted.clear();
        self.camera = None;
        self.grid_y = None;
        self.ready = false;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::engine::SceneStorey;
    use pretty_assertions::assert_eq;

    fn item(local_id: u32, express_id: u64) -> SceneItem {
        SceneItem {
            local_id,
            express_id,
            entity_type: "IFCWALL".to_string(),
            global_id: None,
            name: Some(format!("Wall {express_id}")),
            storey: None,
        }
    }

    fn model(key: &str, storeys: Vec<SceneStorey>) -> DecodedModel {
        DecodedModel {
            key: ModelKey::from(key),
            schema: "IFC4".to_string(),
            items: vec![item(0, 12), item(1, 45), item(2, 310)],
            storeys,
            unit_scale: 0.001,
        }
    }

    fn storey(name: &str, elevation: f64) -> SceneStorey {
        SceneStorey {
            name: name.to_string(),
            elevation,
        }
    }

    #[test]
    fn models_require_setup() {
        let mut scene = TerminalScene::new();
        assert!(matches!(
            scene.add_model(model("a", Vec::new())),
            Err(EngineError::NotInitialized)
        ));
        scene.setup().unwrap();
        assert_eq!(scene.camera(), Some(INITIAL_CAMERA));
        assert_eq!(scene.add_model(model("a", Vec::new())).unwrap(), ModelKey::from("a"));
    }

    #[test]
    fn grid_sits_below_lowest_storey() {
        let mut scene = TerminalScene::new();
        scene.setup().unwrap();

        scene.add_model(model("a", Vec::new())).unwrap();
        assert!((scene.grid_y().unwrap() + 1.1).abs() < 1e-9);

        let storeys = vec![storey("Level 2", 3000.0), storey("Basement", -2500.0)];
        scene.add_model(model("b", storeys)).unwrap();
        assert!((scene.grid_y().unwrap() + 2.6).abs() < 1e-9);
    }

    #[test]
    fn grid_follows_model_length_unit() {
        let mut scene = TerminalScene::new();
        scene.setup().unwrap();

        let metres = DecodedModel {
            unit_scale: 1.0,
            ..model("m", vec![storey("Ground", 0.0), storey("Basement", -3.0)])
        };
        scene.add_model(metres).unwrap();
        assert!((scene.grid_y().unwrap() + 3.1).abs() < 1e-9);
    }

    #[test]
    fn highlight_tracks_items() {
        let mut scene = TerminalScene::new();
        scene.setup().unwrap();
        let key = scene.add_model(model("a", Vec::new())).unwrap();

        scene.highlight(&key, &BTreeSet::from([0, 2])).unwrap();
        let items = scene.highlighted_items();
        let names: Vec<&str> = items.iter().filter_map(|i| i.name.as_deref()).collect();
        assert_eq!(names, vec!["Wall 12", "Wall 310"]);

        scene.clear_highlights().unwrap();
        assert!(scene.highlighted_items().is_empty());
    }

    #[test]
    fn unknown_local_ids_are_rejected() {
        let mut scene = TerminalScene::new();
        scene.setup().unwrap();
        let key = scene.add_model(model("a", Vec::new())).unwrap();
        let err = scene.highlight(&key, &BTreeSet::from([7])).unwrap_err();
        assert!(matches!(err, EngineError::Highlight { .. }));
        assert!(matches!(
            scene.highlight(&ModelKey::from("zzz"), &BTreeSet::from([0])),
            Err(EngineError::UnknownModel { .. })
        ));
    }

    #[test]
    fn dispose_releases_everything() {
        let mut scene = TerminalScene::new();
        scene.setup().unwrap();
        scene.add_model(model("a", Vec::new())).unwrap();
        scene.dispose();
        assert!(scene.model_keys().is_empty());
        assert_eq!(scene.camera(), None);
        assert!(scene.setup().is_err());
    }
}
