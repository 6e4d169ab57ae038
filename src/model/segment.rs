use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a segment. Unique across the whole study set.
pub type SegmentId = String;

// ---------------------------------------------------------------------------
// Segment: one delineated region of interest at one timepoint
// ---------------------------------------------------------------------------

/// A labeled 3-D region of interest detected within one series at one point
/// in time. Segments point back at the earlier segments they continue through
/// `lesion_segments`; the graph builders invert those references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment identifier. Empty when the record carried none.
    #[serde(default)]
    pub id: SegmentId,
    /// Display label, e.g. "Segment #3".
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub name: String,
    /// Volume in mm³.
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub axial_diameter: Option<f64>,
    #[serde(default)]
    pub coronal_diameter: Option<f64>,
    #[serde(default)]
    pub sagittal_diameter: Option<f64>,
    #[serde(default)]
    pub affected_organs: Option<String>,
    #[serde(default)]
    pub classification: Option<Classification>,
    #[serde(default)]
    pub lesion_type: Option<LesionType>,
    #[serde(default, alias = "is_target_lession")]
    pub is_target_lesion: bool,
    /// Ids of earlier segments this one is a continuation of.
    #[serde(default, deserialize_with = "nullable_ids")]
    pub lesion_segments: Vec<SegmentId>,
}

impl Segment {
    /// Create a segment with the given id and label and no parents.
    pub fn new(id: impl Into<SegmentId>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            name: label.clone(),
            label,
            ..Default::default()
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_axial_diameter(mut self, diameter: f64) -> Self {
        self.axial_diameter = Some(diameter);
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn with_lesion_type(mut self, lesion_type: LesionType) -> Self {
        self.lesion_type = Some(lesion_type);
        self
    }

    pub fn with_affected_organs(mut self, organs: impl Into<String>) -> Self {
        self.affected_organs = Some(organs.into());
        self
    }

    /// Declare an earlier segment this one descends from.
    pub fn with_parent(mut self, parent_id: impl Into<SegmentId>) -> Self {
        self.lesion_segments.push(parent_id.into());
        self
    }

    /// Volume with a missing value counted as zero.
    pub fn volume_or_zero(&self) -> f64 {
        self.volume.unwrap_or(0.0)
    }

    /// Parent ids that can produce an edge: empty strings are skipped.
    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.lesion_segments
            .iter()
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

/// `lesion_segments: null` is treated the same as a missing field.
fn nullable_ids<'de, D>(deserializer: D) -> Result<Vec<SegmentId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ids: Option<Vec<SegmentId>> = Option::deserialize(deserializer)?;
    Ok(ids.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Classification and lesion type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "target", alias = "Target")]
    Target,
    #[serde(rename = "non-target", alias = "Non-Target")]
    NonTarget,
    #[serde(rename = "new-lesion", alias = "New Lesion")]
    NewLesion,
    #[serde(rename = "other", other)]
    Other,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::Target => "Target",
            Classification::NonTarget => "Non-Target",
            Classification::NewLesion => "New Lesion",
            Classification::Other => "Other",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LesionType {
    #[serde(rename = "mass", alias = "Mass")]
    Mass,
    #[serde(rename = "lymph_node", alias = "Lymph node")]
    LymphNode,
    #[serde(rename = "metastasis", alias = "Metastasis")]
    Metastasis,
    #[serde(rename = "other", other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_api_record() {
        let segment: Segment = serde_json::from_value(json!({
            "id": "cb05600b",
            "label": "Segment #1",
            "name": "Segment #1",
            "volume": 17771.77,
            "axial_diameter": null,
            "affected_organs": "Liver",
            "is_target_lession": true,
            "classification": null,
            "lesion_segments": ["e5e80482"]
        }))
        .unwrap();

        assert_eq!(segment.id, "cb05600b");
        assert!(segment.is_target_lesion);
        assert_eq!(segment.classification, None);
        assert_eq!(segment.axial_diameter, None);
        assert_eq!(segment.lesion_segments, vec!["e5e80482".to_string()]);
    }

    #[test]
    fn test_missing_and_null_relationships_are_empty() {
        let missing: Segment = serde_json::from_value(json!({ "id": "a" })).unwrap();
        let null: Segment =
            serde_json::from_value(json!({ "id": "b", "lesion_segments": null })).unwrap();
        assert!(missing.lesion_segments.is_empty());
        assert!(null.lesion_segments.is_empty());
    }

    #[test]
    fn test_missing_id_deserializes_empty() {
        let segment: Segment = serde_json::from_value(json!({ "label": "x" })).unwrap();
        assert!(!segment.has_id());
    }

    #[test]
    fn test_classification_spellings() {
        let wire: Classification = serde_json::from_value(json!("non-target")).unwrap();
        let display: Classification = serde_json::from_value(json!("New Lesion")).unwrap();
        let unknown: Classification = serde_json::from_value(json!("borderline")).unwrap();
        assert_eq!(wire, Classification::NonTarget);
        assert_eq!(display, Classification::NewLesion);
        assert_eq!(unknown, Classification::Other);
        assert_eq!(Classification::NonTarget.to_string(), "Non-Target");
    }

    #[test]
    fn test_lesion_type_spellings() {
        let node: LesionType = serde_json::from_value(json!("lymph_node")).unwrap();
        let tumor: LesionType = serde_json::from_value(json!("Tumor")).unwrap();
        assert_eq!(node, LesionType::LymphNode);
        assert_eq!(tumor, LesionType::Other);
    }

    #[test]
    fn test_parent_ids_skip_empty() {
        let segment = Segment::new("b", "B").with_parent("a").with_parent("");
        let parents: Vec<&str> = segment.parent_ids().collect();
        assert_eq!(parents, vec!["a"]);
        assert_eq!(segment.volume_or_zero(), 0.0);
    }
}
