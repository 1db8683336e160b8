//! Result document written as `spectrogram_assets.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level result document of one run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpectrogramAssets {
    /// Recording length in milliseconds.
    pub duration: f64,
    /// Lowest rendered frequency, Hz.
    pub freq_min: u32,
    /// Highest rendered frequency, Hz.
    pub freq_max: u32,
    pub normal: NormalAssets,
    pub compressed: CompressedAssets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionOutput>,
    /// Noise filter applied to the masks before contouring, percent of full scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_filter_threshold: Option<f64>,
}

/// Tiles of the full-length spectrogram.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalAssets {
    pub paths: Vec<String>,
    pub width: u32,
    pub height: u32,
    /// Pixel width of each tile.
    pub widths: Vec<u32>,
}

/// Tiles, masks and segment geometry of the compressed spectrogram.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CompressedAssets {
    pub paths: Vec<String>,
    pub masks: Vec<String>,
    pub width: u32,
    pub height: u32,
    /// Pixel width of each segment in compressed space.
    pub widths: Vec<u32>,
    /// Segment start times, ms of the original recording.
    pub starts: Vec<u64>,
    /// Segment stop times, ms of the original recording.
    pub stops: Vec<u64>,
    pub segments: Vec<SegmentContours>,
    /// Contour drawings of the whole compressed image, when exported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub svgs: Vec<String>,
}

/// Contours attributed to one segment.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SegmentContours {
    pub segment_index: usize,
    pub contour_count: usize,
    /// Lowest contour frequency in Hz, `None` without contours.
    pub freq_min: Option<f64>,
    /// Highest contour frequency in Hz, `None` without contours.
    pub freq_max: Option<f64>,
    pub width_px: u32,
    pub start_ms: u64,
    pub stop_ms: u64,
    pub contours: Vec<ContourRecord>,
}

/// One closed iso-intensity curve, in (ms, Hz).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ContourRecord {
    pub level: f64,
    pub curve: Vec<[f64; 2]>,
    /// Position within the owning segment.
    pub index: usize,
}

/// Classifier result.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use cs_core::Prediction;
/// let confs = BTreeMap::from([("APAL".to_string(), 0.1), ("EPFU".to_string(), 0.9)]);
/// let prediction = Prediction { label: "EPFU".into(), score: 0.9, confs };
/// let out = prediction.to_output();
/// assert_eq!(out.confidences[0].label, "EPFU");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
    pub confs: BTreeMap<String, f64>,
}

impl Prediction {
    /// Serializable form with confidences sorted descending (ties by label).
    #[must_use]
    pub fn to_output(&self) -> PredictionOutput {
        let mut confidences: Vec<Confidence> = self
            .confs
            .iter()
            .map(|(label, &value)| Confidence {
                label: label.clone(),
                value,
            })
            .collect();
        confidences.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
        PredictionOutput {
            label: self.label.clone(),
            score: self.score,
            confidences,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionOutput {
    pub label: String,
    pub score: f64,
    pub confidences: Vec<Confidence>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Confidence {
    pub label: String,
    pub value: f64,
}
