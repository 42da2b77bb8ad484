use crate::classify::{Polarity, ScoreAnalysis};

use super::heuristic::{AxisSlot, CellPlan};
use super::TypeCell;

/// Materialize the planned cells: base grid, then Neutral variant, then edge variant.
pub fn expand_cells(plan: &CellPlan, analysis: &ScoreAnalysis) -> Vec<TypeCell> {
    let mut cells: Vec<TypeCell> = TypeCell::base_grid().to_vec();

    match plan.bias {
        Some(bias) => {
            let lean = |pole: Polarity| match bias.axis {
                AxisSlot::A => (pole, Polarity::Neutral),
                AxisSlot::B => (Polarity::Neutral, pole),
            };
            if plan.neutral_variant {
                let (a, b) = lean(bias.pole);
                cells.push(TypeCell::neutral_variant(a, b));
            }
            if plan.edge_variant {
                let (a, b) = lean(bias.pole.opposite());
                cells.push(TypeCell::edge_variant(a, b));
            }
        }
        None => {
            if plan.neutral_variant {
                cells.push(TypeCell::neutral_variant(
                    Polarity::Neutral,
                    Polarity::Neutral,
                ));
            }
            if plan.edge_variant {
                let dev_a = analysis.deviation_a();
                let dev_b = analysis.deviation_b();
                let cell = if dev_a.abs() >= dev_b.abs() {
                    TypeCell::edge_variant(Polarity::from_sign(dev_a), Polarity::Neutral)
                } else {
                    TypeCell::edge_variant(Polarity::Neutral, Polarity::from_sign(dev_b))
                };
                cells.push(cell);
            }
        }
    }

    debug_assert!(cells.len() == plan.type_count());
    cells
}
