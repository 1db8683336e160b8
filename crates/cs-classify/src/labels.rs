use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ClassifyError;

/// Index → species label mapping carried in the model metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct RawLabelMap {
    forward: BTreeMap<String, String>,
    #[allow(dead_code)]
    backward: BTreeMap<String, serde_json::Value>,
}

impl LabelMap {
    /// Parse `{"forward": {"0": "APAL", ...}, "backward": {"APAL": 0, ...}}`.
    ///
    /// # Errors
    /// Fails on malformed JSON or when `forward` skips an index.
    ///
    /// # Example
    /// ```
    /// use cs_classify::LabelMap;
    /// let map = LabelMap::from_json(r#"{"forward":{"1":"EPFU","0":"APAL"},"backward":{"APAL":0,"EPFU":1}}"#).unwrap();
    /// assert_eq!(map.labels(), ["APAL", "EPFU"]);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ClassifyError> {
        let raw: RawLabelMap =
            serde_json::from_str(json).map_err(|e| ClassifyError::Metadata(e.to_string()))?;
        let labels = (0..raw.forward.len())
            .map(|i| {
                raw.forward
                    .get(&i.to_string())
                    .cloned()
                    .ok_or_else(|| ClassifyError::Metadata(format!("index {i} absent de forward")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if labels.is_empty() {
            return Err(ClassifyError::Metadata("forward vide".into()));
        }
        Ok(Self { labels })
    }

    /// First metadata value that parses as a label map.
    ///
    /// # Errors
    /// Fails when no value parses.
    pub fn from_metadata<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<Self, ClassifyError> {
        let mut last = ClassifyError::Metadata("aucune propriété de métadonnées".into());
        for value in values {
            match Self::from_json(value) {
                Ok(map) => return Ok(map),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// Build directly from an ordered label list.
    #[must_use]
    pub fn from_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
