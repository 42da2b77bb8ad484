//! Evaluation axes for one quiz session.
//!
//! Axes are generated once per session (2–6 of them) and never change afterwards.
//! Everything downstream addresses axes by their position in declaration order;
//! the order also breaks ties in the dispersion ranker.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const MIN_AXES: usize = 2;
pub const MAX_AXES: usize = 6;
/// Display names longer than this are rejected.
pub const MAX_AXIS_NAME_CHARS: usize = 20;

/// One evaluation dimension, e.g. "Exploration" with direction label "curious ↔ cautious".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub direction_label: String,
}

impl AxisDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            direction_label: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_direction_label(mut self, label: impl Into<String>) -> Self {
        self.direction_label = label.into();
        self
    }
}

/// Validated, ordered axis set. Construction enforces the 2–6 count invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSet {
    axes: Vec<AxisDefinition>,
}

impl AxisSet {
    pub fn new(axes: Vec<AxisDefinition>) -> Result<Self, EngineError> {
        if axes.is_empty() {
            return Err(EngineError::structural("no axes provided"));
        }
        if !(MIN_AXES..=MAX_AXES).contains(&axes.len()) {
            return Err(EngineError::AxisCount {
                count: axes.len(),
                min: MIN_AXES,
                max: MAX_AXES,
            });
        }

        let mut seen = HashSet::with_capacity(axes.len());
        for axis in &axes {
            if axis.id.trim().is_empty() {
                return Err(EngineError::structural("axis id must be non-empty"));
            }
            if axis.name.trim().is_empty() {
                return Err(EngineError::structural(format!(
                    "axis '{}' has an empty name",
                    axis.id
                )));
            }
            if axis.name.chars().count() > MAX_AXIS_NAME_CHARS {
                return Err(EngineError::structural(format!(
                    "axis '{}' name exceeds {MAX_AXIS_NAME_CHARS} characters",
                    axis.id
                )));
            }
            if !seen.insert(axis.id.as_str()) {
                return Err(EngineError::structural(format!(
                    "duplicate axis id '{}'",
                    axis.id
                )));
            }
        }

        Ok(Self { axes })
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Always false for a constructed set; present for API completeness.
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AxisDefinition> {
        self.axes.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisDefinition> {
        self.axes.iter()
    }

    pub fn as_slice(&self) -> &[AxisDefinition] {
        &self.axes
    }
}
