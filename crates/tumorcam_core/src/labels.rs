//! Ordered class names of a classifier head.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Classes of the brain MRI model, in output-unit order.
pub const DEFAULT_LABELS: [&str; 4] = ["glioma", "meningioma", "notumor", "pituitary"];

/// Ordered, unique, non-empty set of class names.
///
/// The position of a name is the index of the classifier output unit it
/// belongs to.
///
/// # Example
///
/// ```rust
/// use tumorcam_core::LabelSet;
///
/// let labels = LabelSet::new(["cat", "dog"]).unwrap();
/// assert_eq!(labels.index_of("dog").unwrap(), 1);
/// assert_eq!(labels.get(0), Some("cat"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Create a label set from class names.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is empty, a name is blank, or a name repeats.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(CoreError::EmptyLabelSet);
        }

        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(CoreError::EmptyLabel(i));
            }
            if names[..i].contains(name) {
                return Err(CoreError::DuplicateLabel(name.clone()));
            }
        }

        Ok(Self { names })
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: construction rejects empty sets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Class name of an output unit.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Output unit of a class name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownLabel`] if the name is not in the set.
    pub fn index_of(&self, label: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|name| name == label)
            .ok_or_else(|| CoreError::UnknownLabel(label.to_string()))
    }

    /// Whether the set contains a class name.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.names.iter().any(|name| name == label)
    }

    /// Iterate over class names in output-unit order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            names: DEFAULT_LABELS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = CoreError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(labels: LabelSet) -> Self {
        labels.names
    }
}
