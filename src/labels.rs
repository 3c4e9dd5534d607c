use std::collections::HashMap;

/// Fixed bidirectional mapping between class indices and class names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    index_to_label: Vec<String>,
    label_to_index: HashMap<String, usize>,
}

impl LabelMap {
    /// Build from class names ordered by model output index
    #[must_use]
    pub fn new(labels: Vec<String>) -> Self {
        let label_to_index = labels
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self {
            index_to_label: labels,
            label_to_index,
        }
    }

    #[must_use]
    pub fn label(&self, index: usize) -> Option<&str> {
        self.index_to_label.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn index(&self, label: &str) -> Option<usize> {
        self.label_to_index.get(label).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index_to_label.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index_to_label.is_empty()
    }

    /// Arg-max of a prediction vector mapped to its class name
    #[must_use]
    pub fn resolve(&self, scores: &[f64]) -> Option<(usize, &str)> {
        let index = argmax(scores)?;
        self.label(index).map(|label| (index, label))
    }
}

/// Index of the first maximal element, ignoring NaN
#[must_use]
pub fn argmax(scores: &[f64]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, top)) if top >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
