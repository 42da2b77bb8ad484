//! Local validation of proposed type names.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// One or two capitalized alphabetic words separated by a single space.
static NAME_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\p{Lu}\p{L}*( \p{Lu}\p{L}*)?$").expect("name syntax regex is valid")
});

/// Generic, meta or placeholder words a type name may not contain.
pub const BANNED_WORDS: &[&str] = &[
    "type",
    "types",
    "personality",
    "archetype",
    "category",
    "test",
    "quiz",
    "result",
    "profile",
    "user",
    "player",
    "null",
    "none",
    "undefined",
    "unknown",
    "default",
    "sample",
    "example",
    "placeholder",
    "admin",
    "error",
    "untitled",
];

/// Suffixes stripped longest-first; `ies` becomes `y`.
const SUFFIXES: &[(&str, &str)] = &[
    ("ness", ""),
    ("ings", ""),
    ("ing", ""),
    ("ers", ""),
    ("ies", "y"),
    ("es", ""),
    ("er", ""),
    ("ed", ""),
    ("ly", ""),
    ("s", ""),
];

/// A stripped stem must keep at least this many characters.
const MIN_STEM_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameRejection {
    #[error("proposer flagged the name as unsafe")]
    Unsafe,
    #[error("name is empty")]
    Empty,
    #[error("name has {chars} letters, limit is {max}")]
    TooLong { chars: usize, max: usize },
    #[error("name must be one or two capitalized alphabetic words")]
    Syntax,
    #[error("name contains banned word '{0}'")]
    Banned(String),
    #[error("name duplicates '{0}'")]
    Duplicate(String),
    #[error("name shares stem '{stem}' with '{existing}'")]
    StemCollision { stem: String, existing: String },
}

impl NameRejection {
    /// Stable code for logs and traces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsafe => "unsafe",
            Self::Empty => "empty",
            Self::TooLong { .. } => "too_long",
            Self::Syntax => "syntax",
            Self::Banned(_) => "banned_word",
            Self::Duplicate(_) => "duplicate",
            Self::StemCollision { .. } => "stem_collision",
        }
    }
}

/// Lowercase and strip one common English suffix per word.
pub fn stem(word: &str) -> String {
    let lower = word.to_lowercase();
    for (suffix, replacement) in SUFFIXES {
        if let Some(base) = lower.strip_suffix(suffix) {
            if base.chars().count() + replacement.chars().count() >= MIN_STEM_CHARS {
                return format!("{base}{replacement}");
            }
        }
    }
    lower
}

fn stem_key(name: &str) -> String {
    name.split(' ').map(stem).collect::<Vec<_>>().join(" ")
}

/// Letters counted against the length limit; spaces excluded.
pub fn name_len(name: &str) -> usize {
    name.chars().filter(|c| *c != ' ').count()
}

/// Run-local registry of accepted names.
///
/// Uniqueness is case-insensitive and by stem; checks read the registry and
/// only [`NameRegistry::accept`] mutates it.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    accepted: Vec<String>,
    lowercase: HashSet<String>,
    stems: HashMap<String, String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `name` against every rule. Returns the trimmed name on success.
    pub fn validate(
        &self,
        name: &str,
        safety_ok: bool,
        max_chars: usize,
    ) -> Result<String, NameRejection> {
        if !safety_ok {
            return Err(NameRejection::Unsafe);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(NameRejection::Empty);
        }
        let chars = name_len(name);
        if chars > max_chars {
            return Err(NameRejection::TooLong {
                chars,
                max: max_chars,
            });
        }
        if !NAME_SYNTAX.is_match(name) {
            return Err(NameRejection::Syntax);
        }
        if let Some(word) = name
            .split(' ')
            .map(str::to_lowercase)
            .find(|w| BANNED_WORDS.contains(&w.as_str()))
        {
            return Err(NameRejection::Banned(word));
        }
        if self.lowercase.contains(&name.to_lowercase()) {
            return Err(NameRejection::Duplicate(name.to_string()));
        }
        let key = stem_key(name);
        if let Some(existing) = self.stems.get(&key) {
            return Err(NameRejection::StemCollision {
                stem: key,
                existing: existing.clone(),
            });
        }
        Ok(name.to_string())
    }

    /// Record an already-validated name.
    pub fn accept(&mut self, name: &str) {
        self.lowercase.insert(name.to_lowercase());
        self.stems.insert(stem_key(name), name.to_string());
        self.accepted.push(name.to_string());
    }

    /// Validate and, on success, accept in one step.
    pub fn try_accept(
        &mut self,
        name: &str,
        safety_ok: bool,
        max_chars: usize,
    ) -> Result<String, NameRejection> {
        let name = self.validate(name, safety_ok, max_chars)?;
        self.accept(&name);
        Ok(name)
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}
