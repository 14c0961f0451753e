use crate::error::EngineError;
use crate::parser::step::{StepEntity, StepFile, StepValue};
use crate::viewer::engine::{DecodedModel, ModelDecoder, ModelKey, SceneItem, SceneStorey};
use std::collections::HashMap;

/// Instance entities that become selectable scene items.
const ELEMENT_ENTITIES: &[&str] = &[
    "IFCWALL",
    "IFCWALLSTANDARDCASE",
    "IFCDOOR",
    "IFCWINDOW",
    "IFCSLAB",
    "IFCROOF",
    "IFCCOLUMN",
    "IFCBEAM",
    "IFCMEMBER",
    "IFCPLATE",
    "IFCSTAIR",
    "IFCSTAIRFLIGHT",
    "IFCRAMP",
    "IFCRAILING",
    "IFCCOVERING",
    "IFCCURTAINWALL",
    "IFCFOOTING",
    "IFCFURNISHINGELEMENT",
    "IFCFURNITURE",
    "IFCFLOWFIXTURE",
    "IFCFLOWTERMINAL",
    "IFCSANITARYTERMINAL",
    "IFCBUILDINGELEMENTPROXY",
];

/// Share of the progress bar spent on STEP parsing; the rest covers item
/// extraction.
const PARSE_SHARE: f32 = 0.9;

/// Decodes IFC STEP text into scene items.
///
/// Local IDs are assigned densely in express-ID order, so they differ from
/// the express IDs the backend reports and must be looked up through
/// [`ViewerEngine::id_table`](crate::viewer::engine::ViewerEngine::id_table).
#[derive(Debug, Default, Clone, Copy)]
pub struct StepDecoder;

impl ModelDecoder for StepDecoder {
    fn decode(
        &self,
        key: &ModelKey,
        bytes: &[u8],
        progress: &mut dyn FnMut(f32),
    ) -> Result<DecodedModel, EngineError> {
        let content = String::from_utf8_lossy(bytes);
        let step = StepFile::parse_with_progress(&content, &mut |p| progress(p * PARSE_SHARE))
            .map_err(|e| EngineError::Decode {
                model: key.to_string(),
                message: e.to_string(),
            })?;

        let unit_scale = length_unit_scale(&step);
        let storeys = extract_storeys(&step);
        let element_to_storey = extract_spatial_containment(&step);

        let items: Vec<SceneItem> = step
            .entities
            .values()
            .filter(|e| ELEMENT_ENTITIES.contains(&e.entity_type.as_str()))
            .enumerate()
            .map(|(index, e)| SceneItem {
                local_id: index as u32,
                express_id: e.id,
                entity_type: e.entity_type.clone(),
                global_id: e.string_at(0).map(str::to_string),
                name: e.string_at(2).map(str::to_string),
                storey: element_to_storey
                    .get(&e.id)
                    .and_then(|storey_id| storeys.get(storey_id))
                    .map(|s| s.name.clone()),
            })
            .collect();

        let mut storeys: Vec<SceneStorey> = storeys.into_values().collect();
        storeys.sort_by(|a, b| a.elevation.total_cmp(&b.elevation));

        tracing::debug!(
            model = %key,
            schema = %step.schema,
            items = items.len(),
            storeys = storeys.len(),
            unit_scale,
            "Decoded IFC model"
        );
        progress(1.0);

        Ok(DecodedModel {
            key: key.clone(),
            schema: step.schema,
            items,
            storeys,
            unit_scale,
        })
    }
}

/// Metres per model length unit, from the first `IFCSIUNIT` or
/// `IFCCONVERSIONBASEDUNIT` of type `.LENGTHUNIT.`. Files without one are
/// taken to be in metres.
fn length_unit_scale(step_file: &StepFile) -> f64 {
    let is_length =
        |e: &&StepEntity| matches!(e.value(1), Some(StepValue::Enum(kind)) if kind == "LENGTHUNIT");

    // Index 2 = Prefix, index 3 = Name
    if let Some(unit) = step_file.entities_of_type("IFCSIUNIT").find(is_length) {
        return match unit.value(2) {
            Some(StepValue::Enum(prefix)) => si_prefix_scale(prefix).unwrap_or_else(|| {
                tracing::warn!(prefix = %prefix, "Unknown SI prefix, assuming metres");
                1.0
            }),
            _ => 1.0,
        };
    }

    // Index 2 = Name
    if let Some(unit) = step_file.entities_of_type("IFCCONVERSIONBASEDUNIT").find(is_length) {
        match unit.string_at(2).map(str::to_ascii_uppercase).as_deref() {
            Some("FOOT") => return 0.3048,
            Some("INCH") => return 0.0254,
            other => tracing::warn!(name = ?other, "Unknown length unit, assuming metres"),
        }
    }

    1.0
}

fn si_prefix_scale(prefix: &str) -> Option<f64> {
    let scale = match prefix {
        "KILO" => 1e3,
        "HECTO" => 1e2,
        "DECA" => 1e1,
        "DECI" => 1e-1,
        "CENTI" => 1e-2,
        "MILLI" => 1e-3,
        "MICRO" => 1e-6,
        _ => return None,
    };
    Some(scale)
}

/// Storey entity ID → name and elevation.
fn extract_storeys(step_file: &StepFile) -> HashMap<u64, SceneStorey> {
    step_file
        .entities_of_type("IFCBUILDINGSTOREY")
        .map(|e| {
            let name = e
                .string_at(2)
                .map_or_else(|| format!("Storey #{}", e.id), str::to_string);
            // Index 9 = Elevation
            let elevation = e.value(9).and_then(StepValue::as_real).unwrap_or(0.0);
            (e.id, SceneStorey { name, elevation })
        })
        .collect()
}

/// Element → storey from IFCRELCONTAINEDINSPATIALSTRUCTURE.
fn extract_spatial_containment(step_file: &StepFile) -> HashMap<u64, u64> {
    let mut element_to_storey = HashMap::new();

    for rel in step_file.entities_of_type("IFCRELCONTAINEDINSPATIALSTRUCTURE") {
        // Index 4 = RelatedElements, index 5 = RelatingStructure
        let Some(structure) = rel.value(5).and_then(StepValue::as_reference) else {
            continue;
        };
        for element in rel.value(4).map(StepValue::references).unwrap_or_default() {
            element_to_storey.insert(element, structure);
        }
    }

    element_to_storey
}
