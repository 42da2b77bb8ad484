//! The name-proposal capability and its OpenRouter-backed implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::axes::AxisDefinition;
use crate::cells::TypeCell;
use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, ProviderError};
use crate::prompts::{PromptTemplate, DEFAULT_NAME_PROMPT};

/// Everything a proposer sees for one attempt on one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct NameRequest {
    pub session_id: String,
    pub run_id: Uuid,
    pub cell: TypeCell,
    pub axis_a: AxisDefinition,
    pub axis_b: AxisDefinition,
    /// 1 for the first proposal, 2 for the retry.
    pub attempt: u8,
    /// Why attempt 1 was rejected, when this is the retry.
    pub previous_rejection: Option<String>,
    pub max_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameProposal {
    pub name: String,
    pub safety_ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl NameProposal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            safety_ok: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn unsafe_flagged(mut self) -> Self {
        self.safety_ok = false;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProposerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("unparsable proposal: {0}")]
    Parse(String),
    #[error("proposal timed out after {0:?}")]
    Timeout(Duration),
}

/// Opaque, time-boxed source of candidate names.
///
/// The engine calls this at most twice per cell and validates every result
/// itself; implementations need not check length, syntax or uniqueness.
#[async_trait]
pub trait NameProposer: Send + Sync {
    async fn propose_name(&self, request: &NameRequest) -> Result<NameProposal, ProposerError>;
}

// =============================================================================
// LLM-backed proposer
// =============================================================================

const DEFAULT_PROPOSAL_TIMEOUT: Duration = Duration::from_secs(20);

/// Proposes names through a [`ChatGateway`].
pub struct LlmNameProposer<G: ChatGateway> {
    gateway: Arc<G>,
    model: ChatModel,
    template: PromptTemplate,
    timeout: Duration,
}

impl<G: ChatGateway> LlmNameProposer<G> {
    pub fn new(gateway: Arc<G>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: ChatModel::openrouter(model),
            template: DEFAULT_NAME_PROMPT,
            timeout: DEFAULT_PROPOSAL_TIMEOUT,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<G: ChatGateway> NameProposer for LlmNameProposer<G> {
    async fn propose_name(&self, request: &NameRequest) -> Result<NameProposal, ProposerError> {
        let prompt = self.template.render(request);
        let attribution = Attribution::new("naming::propose")
            .with_session(request.session_id.clone())
            .with_run(request.run_id);
        // Retries get a little more variety.
        let temperature = if request.attempt > 1 { 0.9 } else { 0.7 };
        let chat = ChatRequest::new(self.model.clone(), prompt.to_messages(), attribution)
            .temperature(temperature)
            .max_tokens(120)
            .json();

        let response = match tokio::time::timeout(self.timeout, self.gateway.chat(chat)).await {
            Err(_) => return Err(ProposerError::Timeout(self.timeout)),
            Ok(Err(ProviderError::Refused { message, .. })) => {
                debug!(cell = %request.cell.code(), %message, "proposal refused by provider");
                return Ok(NameProposal {
                    name: String::new(),
                    safety_ok: false,
                    description: None,
                });
            }
            Ok(result) => result?,
        };

        parse_name_response(&response.content)
    }
}

#[derive(Debug, Deserialize)]
struct NameResponseJson {
    name: Option<String>,
    description: Option<String>,
    safe: Option<bool>,
    refused: Option<bool>,
}

/// Parse `{"name": ..., "description": ..., "safe": ...}` from a model reply.
///
/// `refused: true` or `safe: false` yields a proposal with `safety_ok = false`.
pub fn parse_name_response(raw: &str) -> Result<NameProposal, ProposerError> {
    let json_str = extract_json(raw);
    let parsed: NameResponseJson =
        serde_json::from_str(json_str).map_err(|e| ProposerError::Parse(e.to_string()))?;

    let safety_ok = !parsed.refused.unwrap_or(false) && parsed.safe.unwrap_or(true);
    let name = match parsed.name {
        Some(name) => name,
        None if !safety_ok => String::new(),
        None => return Err(ProposerError::Parse("missing 'name'".into())),
    };

    Ok(NameProposal {
        name,
        safety_ok,
        description: parsed
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}

/// First balanced `{...}` object in `raw`; models sometimes wrap JSON in prose.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find('{') else {
        return trimmed;
    };
    let remainder = &trimmed[start..];
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &remainder[..=i];
                }
            }
            _ => {}
        }
    }
    trimmed
}
