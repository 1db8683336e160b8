//! Output post-processing: probability normalisation, tile averaging and
//! label decoding.

use std::collections::BTreeMap;

use cs_core::Prediction;
use ndarray::{Array2, Axis};

use crate::error::ClassifyError;
use crate::labels::LabelMap;

/// Row already reads as a probability vector.
fn is_probability(row: &[f32]) -> bool {
    let sum: f32 = row.iter().sum();
    row.iter().all(|&v| v >= 0.0) && (sum - 1.0).abs() <= 1e-3
}

/// In-place numerically stable softmax.
fn softmax(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
}

/// Softmax every row that is not already a probability vector, then average
/// the rows column-wise.
///
/// `outputs` is row-major `[rows, classes]`.
///
/// # Errors
/// Fails when `outputs` is empty or not a whole number of rows.
pub fn mean_probabilities(outputs: &[f32], classes: usize) -> Result<Vec<f32>, ClassifyError> {
    if classes == 0 || outputs.is_empty() || outputs.len() % classes != 0 {
        return Err(ClassifyError::Inference(format!(
            "sortie de {} valeurs pour {classes} classes",
            outputs.len()
        )));
    }
    let mut rows = Array2::from_shape_vec((outputs.len() / classes, classes), outputs.to_vec())
        .map_err(|e| ClassifyError::Inference(e.to_string()))?;
    for mut row in rows.rows_mut() {
        if let Some(row) = row.as_slice_mut()
            && !is_probability(row)
        {
            softmax(row);
        }
    }
    rows.mean_axis(Axis(0))
        .map(|mean| mean.to_vec())
        .ok_or_else(|| ClassifyError::Inference("aucune sortie".into()))
}

/// Map averaged scores to a [`Prediction`]: argmax label (first on ties),
/// its score, and every label's confidence.
///
/// # Errors
/// Returns [`ClassifyError::LabelMismatch`] when lengths differ.
///
/// # Example
/// ```
/// use cs_classify::{LabelMap, decode_prediction};
/// let labels = LabelMap::from_labels(vec!["APAL".into(), "EPFU".into(), "LABO".into()]);
/// let p = decode_prediction(&[0.1, 0.7, 0.2], &labels).unwrap();
/// assert_eq!(p.label, "EPFU");
/// assert!((p.score - 0.7).abs() < 1e-6);
/// ```
pub fn decode_prediction(mean: &[f32], labels: &LabelMap) -> Result<Prediction, ClassifyError> {
    if mean.len() != labels.len() || mean.is_empty() {
        return Err(ClassifyError::LabelMismatch {
            outputs: mean.len(),
            labels: labels.len(),
        });
    }
    let mut best = 0;
    for (i, &v) in mean.iter().enumerate() {
        if v > mean[best] {
            best = i;
        }
    }
    let confs: BTreeMap<String, f64> = labels
        .labels()
        .iter()
        .zip(mean)
        .map(|(label, &v)| (label.clone(), f64::from(v)))
        .collect();
    Ok(Prediction {
        label: labels.labels()[best].clone(),
        score: f64::from(mean[best]),
        confs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bats() -> LabelMap {
        LabelMap::from_labels(vec!["APAL".into(), "EPFU".into(), "LABO".into()])
    }

    #[test]
    fn probabilities_pass_through_unchanged() {
        let mean = mean_probabilities(&[0.1, 0.7, 0.2, 0.3, 0.5, 0.2], 3).unwrap();
        assert!((mean[0] - 0.2).abs() < 1e-6);
        assert!((mean[1] - 0.6).abs() < 1e-6);
        assert!((mean[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn logits_are_softmaxed_per_row() {
        let mean = mean_probabilities(&[2.0, -1.0, 0.0], 3).unwrap();
        let sum: f32 = mean.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(mean[0] > mean[2] && mean[2] > mean[1]);
    }

    #[test]
    fn ragged_output_is_rejected() {
        assert!(mean_probabilities(&[0.5, 0.5, 0.0, 1.0], 3).is_err());
        assert!(mean_probabilities(&[], 3).is_err());
    }

    #[test]
    fn decoded_confidences_sorted_by_value() {
        let prediction = decode_prediction(&[0.1, 0.7, 0.2], &bats()).unwrap();
        let out = prediction.to_output();
        let order: Vec<&str> = out.confidences.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(order, ["EPFU", "LABO", "APAL"]);
        let sum: f64 = prediction.confs.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ties_pick_the_first_label() {
        let prediction = decode_prediction(&[0.4, 0.4, 0.2], &bats()).unwrap();
        assert_eq!(prediction.label, "APAL");
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(matches!(
            decode_prediction(&[0.5, 0.5], &bats()),
            Err(ClassifyError::LabelMismatch { outputs: 2, labels: 3 })
        ));
    }
}
