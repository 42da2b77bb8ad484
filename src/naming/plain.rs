//! Deterministic names built from polarity tags and axis names.

use crate::axes::AxisDefinition;
use crate::cells::TypeCell;
use crate::classify::Polarity;

const ABBREVIATION_LETTERS: usize = 3;
const FALLBACK_ABBREVIATION: &str = "Ax";

fn pole_token(polarity: Polarity) -> &'static str {
    match polarity {
        Polarity::High => "Hi",
        Polarity::Low => "Lo",
        Polarity::Neutral => "Mid",
    }
}

/// First three letters of the axis name, capitalized: "Exploration" → "Exp".
fn abbreviate(name: &str) -> String {
    let letters: Vec<char> = name.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < ABBREVIATION_LETTERS {
        return FALLBACK_ABBREVIATION.to_string();
    }
    let mut out: String = letters[0].to_uppercase().collect();
    out.extend(
        letters[1..ABBREVIATION_LETTERS]
            .iter()
            .flat_map(|c| c.to_lowercase()),
    );
    out.retain(char::is_alphabetic);
    out
}

/// Plain name for `cell`, e.g. `HiExp LoCon`.
///
/// Never calls a proposer. If the two words exceed `max_chars` letters the
/// longer word is shortened one letter at a time.
pub fn plain_name(
    cell: &TypeCell,
    axis_a: &AxisDefinition,
    axis_b: &AxisDefinition,
    max_chars: usize,
) -> String {
    let mut words: Vec<Vec<char>> = [
        (cell.polarity_a, axis_a),
        (cell.polarity_b, axis_b),
    ]
    .iter()
    .map(|(pole, axis)| {
        format!("{}{}", pole_token(*pole), abbreviate(&axis.name))
            .chars()
            .collect()
    })
    .collect();

    while words.iter().map(Vec::len).sum::<usize>() > max_chars {
        let longest = words
            .iter()
            .enumerate()
            .max_by_key(|(i, w)| (w.len(), std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        if words[longest].len() <= 1 {
            // Both words are down to their initial; drop the second.
            words.truncate(1);
            break;
        }
        words[longest].pop();
    }

    words
        .iter()
        .map(|w| w.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}
