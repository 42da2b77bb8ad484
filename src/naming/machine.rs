//! Per-cell naming state machine.
//!
//! ```text
//! Proposing ─▶ Validating ─▶ Accepted
//!                  │
//!                  ▼
//!              Retrying ─▶ Validating ─▶ Accepted
//!                              │
//!                              ▼
//!                        PlainFallback ─▶ Accepted | Exhausted
//! ```
//!
//! A proposer error counts as a failed attempt and skips validation.

use crate::cells::TypeCell;
use crate::types::NameSource;

use super::proposer::{NameProposal, ProposerError};
use super::validator::{NameRegistry, NameRejection};

pub const MAX_PROPOSAL_ATTEMPTS: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedName {
    pub name: String,
    pub description: Option<String>,
    pub source: NameSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NamingState {
    /// Waiting for the first proposal.
    Proposing,
    /// Holding a proposal that has not been checked yet.
    Validating { attempt: u8, proposal: NameProposal },
    /// Waiting for the second proposal.
    Retrying { reason: String },
    /// Both proposals failed; the plain name is next.
    PlainFallback,
    Accepted(AcceptedName),
    /// Even the plain name was rejected. The cell yields no record.
    Exhausted,
}

/// A name that failed validation, kept for run metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Discard {
    pub name: String,
    pub rejection: NameRejection,
}

#[derive(Debug, Clone)]
pub struct CellNaming {
    cell: TypeCell,
    state: NamingState,
}

impl CellNaming {
    pub fn new(cell: TypeCell) -> Self {
        Self {
            cell,
            state: NamingState::Proposing,
        }
    }

    pub fn cell(&self) -> &TypeCell {
        &self.cell
    }

    pub fn state(&self) -> &NamingState {
        &self.state
    }

    /// Attempt number and previous rejection when a proposal is due.
    pub fn pending_attempt(&self) -> Option<(u8, Option<String>)> {
        match &self.state {
            NamingState::Proposing => Some((1, None)),
            NamingState::Retrying { reason } => Some((MAX_PROPOSAL_ATTEMPTS, Some(reason.clone()))),
            _ => None,
        }
    }

    pub fn needs_plain_name(&self) -> bool {
        matches!(self.state, NamingState::PlainFallback)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, NamingState::Accepted(_) | NamingState::Exhausted)
    }

    /// Feed the proposer's answer for the pending attempt.
    pub fn receive(&mut self, result: Result<NameProposal, ProposerError>) {
        let Some((attempt, _)) = self.pending_attempt() else {
            return;
        };
        self.state = match result {
            Ok(proposal) => NamingState::Validating { attempt, proposal },
            Err(err) => self.after_failure(attempt, err.to_string()),
        };
    }

    /// No proposer configured: go straight to the plain name.
    pub fn skip_to_plain(&mut self) {
        if self.pending_attempt().is_some() {
            self.state = NamingState::PlainFallback;
        }
    }

    /// Validate the held proposal against the run's registry.
    pub fn validate(&mut self, registry: &mut NameRegistry, max_chars: usize) -> Option<Discard> {
        let (attempt, proposal) = match std::mem::replace(&mut self.state, NamingState::Exhausted) {
            NamingState::Validating { attempt, proposal } => (attempt, proposal),
            other => {
                self.state = other;
                return None;
            }
        };
        match registry.try_accept(&proposal.name, proposal.safety_ok, max_chars) {
            Ok(name) => {
                self.state = NamingState::Accepted(AcceptedName {
                    name,
                    description: proposal.description,
                    source: NameSource::Generated,
                });
                None
            }
            Err(rejection) => {
                let discard = Discard {
                    name: proposal.name.trim().to_string(),
                    rejection,
                };
                self.state = self.after_failure(attempt, discard.rejection.to_string());
                Some(discard)
            }
        }
    }

    /// Try the deterministic plain name. Never consults the proposer.
    pub fn apply_plain(
        &mut self,
        plain: &str,
        registry: &mut NameRegistry,
        max_chars: usize,
    ) -> Option<Discard> {
        if !self.needs_plain_name() {
            return None;
        }
        match registry.try_accept(plain, true, max_chars) {
            Ok(name) => {
                self.state = NamingState::Accepted(AcceptedName {
                    name,
                    description: None,
                    source: NameSource::Plain,
                });
                None
            }
            Err(rejection) => {
                self.state = NamingState::Exhausted;
                Some(Discard {
                    name: plain.to_string(),
                    rejection,
                })
            }
        }
    }

    pub fn into_accepted(self) -> Option<(TypeCell, AcceptedName)> {
        match self.state {
            NamingState::Accepted(accepted) => Some((self.cell, accepted)),
            _ => None,
        }
    }

    fn after_failure(&self, attempt: u8, reason: String) -> NamingState {
        if attempt < MAX_PROPOSAL_ATTEMPTS {
            NamingState::Retrying { reason }
        } else {
            NamingState::PlainFallback
        }
    }
}
