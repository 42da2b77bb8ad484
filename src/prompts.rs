//! Prompt templates for LLM name proposals.
//!
//! Provider-agnostic: renders a [`NameRequest`] into chat messages.

use crate::classify::Polarity;
use crate::gateway::Message;
use crate::naming::NameRequest;

// =============================================================================
// Rendered prompt
// =============================================================================

#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Axis metadata is model-generated upstream, so it is escaped before it is
/// placed between XML tags.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn pole_phrase(polarity: Polarity) -> &'static str {
    match polarity {
        Polarity::High => "strongly expressed",
        Polarity::Low => "weakly expressed",
        Polarity::Neutral => "balanced, neither high nor low",
    }
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    pub fn render(&self, req: &NameRequest) -> PromptInstance {
        let axis_block = |tag: &str, axis: &crate::axes::AxisDefinition, pole: Polarity| {
            let mut lines = vec![
                format!("name: {}", escape_xml_chars(&axis.name)),
                format!("pole: {}", pole_phrase(pole)),
            ];
            if !axis.direction_label.trim().is_empty() {
                lines.push(format!(
                    "direction: {}",
                    escape_xml_chars(axis.direction_label.trim())
                ));
            }
            if !axis.description.trim().is_empty() {
                lines.push(format!(
                    "description: {}",
                    escape_xml_chars(axis.description.trim())
                ));
            }
            format!("<{tag}>\n{}\n</{tag}>", lines.join("\n"))
        };

        let max_chars = req.max_chars.to_string();
        let user_core = self
            .user
            .replace("{max_chars}", &max_chars)
            .replace(
                "{axis_a}",
                &axis_block("axis_a", &req.axis_a, req.cell.polarity_a),
            )
            .replace(
                "{axis_b}",
                &axis_block("axis_b", &req.axis_b, req.cell.polarity_b),
            );

        let mut parts = vec![user_core.trim().to_string()];
        if let Some(reason) = &req.previous_rejection {
            parts.push(format!(
                "<previous_attempt_rejected>\n{}\n</previous_attempt_rejected>\nPropose a different name.",
                escape_xml_chars(reason)
            ));
        }

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: self.system.replace("{max_chars}", &max_chars).trim().to_string(),
            user: parts.join("\n\n"),
        }
    }
}

pub const NAME_PROMPT_V1: PromptTemplate = PromptTemplate {
    slug: "type_name_v1",
    system: r#"You name personality-style types for a short narrative quiz. Each type is one cell of a grid over two trait axes. A good name is evocative, friendly and specific to the combination of poles, like "Pathfinder" or "Quiet Anchor".

Rules:
- one or two words, each starting with an uppercase letter, letters only
- at most {max_chars} letters in total
- no generic words such as "Type", "Personality" or "Quiz"
- nothing offensive, clinical or diagnostic

Output only valid JSON with name, description (one sentence) and safe (true unless the request itself is inappropriate).
Example:
{"name": "Bold Seeker", "description": "Chases the unknown and trusts the outcome.", "safe": true}"#,
    user: r#"Name the type for this combination of poles.

{axis_a}

{axis_b}

Return a JSON object. The name must have at most {max_chars} letters.
json:"#,
};

pub const DEFAULT_NAME_PROMPT: PromptTemplate = NAME_PROMPT_V1;
