//! Type cells: the 2×2 base grid plus up to two derived cells.

mod expander;
mod heuristic;

pub use expander::expand_cells;
pub use heuristic::{plan_cells, AxisSlot, CellBias, CellPlan, BASE_CELL_COUNT, MAX_CELL_COUNT};

use serde::{Deserialize, Serialize};

use crate::classify::{Polarity, PolarityPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Base,
    NeutralVariant,
    EdgeVariant,
}

/// A candidate classification bucket over the two primary axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCell {
    pub polarity_a: Polarity,
    pub polarity_b: Polarity,
    /// Set on every derived cell; each one carries at least one Neutral pole.
    pub is_neutral_variant: bool,
    pub kind: CellKind,
}

impl TypeCell {
    pub fn base(polarity_a: Polarity, polarity_b: Polarity) -> Self {
        Self {
            polarity_a,
            polarity_b,
            is_neutral_variant: false,
            kind: CellKind::Base,
        }
    }

    pub fn neutral_variant(polarity_a: Polarity, polarity_b: Polarity) -> Self {
        Self {
            polarity_a,
            polarity_b,
            is_neutral_variant: true,
            kind: CellKind::NeutralVariant,
        }
    }

    pub fn edge_variant(polarity_a: Polarity, polarity_b: Polarity) -> Self {
        Self {
            polarity_a,
            polarity_b,
            is_neutral_variant: true,
            kind: CellKind::EdgeVariant,
        }
    }

    /// The four base cells in output order: HH, HL, LH, LL.
    pub fn base_grid() -> [TypeCell; BASE_CELL_COUNT] {
        use Polarity::{High, Low};
        [
            TypeCell::base(High, High),
            TypeCell::base(High, Low),
            TypeCell::base(Low, High),
            TypeCell::base(Low, Low),
        ]
    }

    pub fn matches(&self, pair: &PolarityPair) -> bool {
        self.polarity_a == pair.axis_a && self.polarity_b == pair.axis_b
    }

    /// Short code such as `HL` or `NN`, used in logs and traces.
    pub fn code(&self) -> String {
        fn letter(p: Polarity) -> char {
            match p {
                Polarity::High => 'H',
                Polarity::Low => 'L',
                Polarity::Neutral => 'N',
            }
        }
        [letter(self.polarity_a), letter(self.polarity_b)]
            .iter()
            .collect()
    }
}
