//! Fixed six-entry taxonomy served whenever a run cannot finish on its own.
//!
//! Entries are compile-time constants and are never re-validated at runtime.

use crate::cells::{CellKind, TypeCell};
use crate::classify::Polarity;
use crate::types::{NameSource, TypeRecord};

#[derive(Debug, Clone, Copy)]
pub struct PresetType {
    pub name: &'static str,
    pub description: &'static str,
    pub polarity_a: Polarity,
    pub polarity_b: Polarity,
    pub kind: CellKind,
}

impl PresetType {
    pub fn cell(&self) -> TypeCell {
        match self.kind {
            CellKind::Base => TypeCell::base(self.polarity_a, self.polarity_b),
            CellKind::NeutralVariant => TypeCell::neutral_variant(self.polarity_a, self.polarity_b),
            CellKind::EdgeVariant => TypeCell::edge_variant(self.polarity_a, self.polarity_b),
        }
    }
}

pub const PRESET_TAXONOMY: [PresetType; 6] = [
    PresetType {
        name: "Trailblazer",
        description: "Leans hard into both traits and sets the pace for everyone else.",
        polarity_a: Polarity::High,
        polarity_b: Polarity::High,
        kind: CellKind::Base,
    },
    PresetType {
        name: "Strategist",
        description: "Commits fully to one direction while keeping the other in check.",
        polarity_a: Polarity::High,
        polarity_b: Polarity::Low,
        kind: CellKind::Base,
    },
    PresetType {
        name: "Guardian",
        description: "Holds back where others rush and invests where others hesitate.",
        polarity_a: Polarity::Low,
        polarity_b: Polarity::High,
        kind: CellKind::Base,
    },
    PresetType {
        name: "Observer",
        description: "Watches quietly and acts only once the picture is clear.",
        polarity_a: Polarity::Low,
        polarity_b: Polarity::Low,
        kind: CellKind::Base,
    },
    PresetType {
        name: "Harmonizer",
        description: "Keeps every trait in balance and adapts to whatever the story needs.",
        polarity_a: Polarity::Neutral,
        polarity_b: Polarity::Neutral,
        kind: CellKind::NeutralVariant,
    },
    PresetType {
        name: "Catalyst",
        description: "Drives one trait to the edge and lets the rest settle around it.",
        polarity_a: Polarity::High,
        polarity_b: Polarity::Neutral,
        kind: CellKind::EdgeVariant,
    },
];

/// Placeholder axis labels when the run failed before axes were known.
const UNKNOWN_AXES: [&str; 2] = ["axisA", "axisB"];

/// Materialize the preset taxonomy, tagged with the run's primary axes when known.
pub fn preset_records(primary_axes: &[String]) -> Vec<TypeRecord> {
    let (id_a, id_b) = match primary_axes {
        [a, b, ..] => (a.as_str(), b.as_str()),
        _ => (UNKNOWN_AXES[0], UNKNOWN_AXES[1]),
    };
    let dominant_axes: Vec<String> = primary_axes.iter().take(2).cloned().collect();

    PRESET_TAXONOMY
        .iter()
        .map(|preset| TypeRecord {
            name: preset.name.to_string(),
            description: preset.description.to_string(),
            dominant_axes: dominant_axes.clone(),
            polarity_tags: vec![
                format!("{id_a}:{}", preset.polarity_a.as_str()),
                format!("{id_b}:{}", preset.polarity_b.as_str()),
            ],
            cell: preset.cell(),
            source: NameSource::Preset,
        })
        .collect()
}
