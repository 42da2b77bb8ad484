//! Type naming: proposal, local validation, one retry, plain-name fallback.

mod machine;
mod plain;
mod proposer;
mod validator;

pub use machine::{AcceptedName, CellNaming, Discard, NamingState, MAX_PROPOSAL_ATTEMPTS};
pub use plain::plain_name;
pub use proposer::{
    parse_name_response, LlmNameProposer, NameProposal, NameProposer, NameRequest, ProposerError,
};
pub use validator::{name_len, stem, NameRegistry, NameRejection, BANNED_WORDS};

use crate::axes::AxisDefinition;
use crate::cells::TypeCell;
use crate::classify::Polarity;

/// `"{axis id}:{polarity}"` for both primaries, e.g. `["exploration:high", "convergence:low"]`.
pub fn polarity_tags(cell: &TypeCell, axis_a: &AxisDefinition, axis_b: &AxisDefinition) -> Vec<String> {
    vec![
        format!("{}:{}", axis_a.id, cell.polarity_a.as_str()),
        format!("{}:{}", axis_b.id, cell.polarity_b.as_str()),
    ]
}

fn pole_phrase(polarity: Polarity, axis: &AxisDefinition) -> String {
    let name = axis.name.to_lowercase();
    let phrase = match polarity {
        Polarity::High => format!("high {name}"),
        Polarity::Low => format!("low {name}"),
        Polarity::Neutral => format!("balanced {name}"),
    };
    match axis.direction_label.trim() {
        "" => phrase,
        label => format!("{phrase} ({label})"),
    }
}

/// Description used when the proposer supplied none.
pub fn describe_cell(cell: &TypeCell, axis_a: &AxisDefinition, axis_b: &AxisDefinition) -> String {
    format!(
        "Combines {} with {}.",
        pole_phrase(cell.polarity_a, axis_a),
        pole_phrase(cell.polarity_b, axis_b)
    )
}
