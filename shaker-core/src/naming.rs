//! Cocktail name validation and the name-repair ladder.
//!
//! The ladder escalates from free to costly to guaranteed:
//!
//! 1. keep the generated name if it validates
//! 2. recombine words from the recipe's color and concept (local, no network)
//! 3. ask the text service for a new name, listing the terms to avoid
//! 4. a fixed phrase with a time-derived suffix, accepted without validation
//!
//! Rungs 1, 2 and 4 are pure functions of `LadderInput`; rung 3 is carried out
//! by `RecipeGenerator`, which owns the text service.

use std::sync::LazyLock;

use chrono::{DateTime, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::Denylist;

/// Names that are obviously template fallbacks: a stock word plus digits.
static GENERIC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(cocktail|mocktail|drink|original|special|signature|custom|recipe|untitled|name)\s*[-_#]?\s*\d*\s*$",
    )
    .expect("Invalid generic name regex")
});

/// Phrase used by the last rung.
pub const FALLBACK_PHRASE: &str = "Tonight's Inspiration";

/// Poetic fragments for local recombination.
const FRAGMENTS: &[&str] = &[
    "Velvet", "Moonlit", "Whispering", "Golden Hour", "Starlit", "Ember", "Silver", "Wandering",
];

/// Nouns used when the recipe offers no usable keywords.
const FALLBACK_NOUNS: &[&str] = &["Reverie", "Serenade", "Horizon", "Bloom", "Lullaby"];

/// Words that make poor name material even though they are long enough.
const STOPWORDS: &[&str] = &[
    "this", "that", "with", "your", "from", "into", "like", "have", "will", "their", "about",
    "color", "colour", "cocktail", "drink", "glass",
];

/// Why a name was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameVerdict {
    Accepted,
    Empty,
    Generic,
    Denylisted(String),
}

impl NameVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, NameVerdict::Accepted)
    }
}

/// Where the final name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    Generated,
    Recombined,
    Regenerated,
    Fallback,
}

/// Accept/reject classifier for candidate names. Pure; holds only the denylist.
#[derive(Debug, Clone, Default)]
pub struct NameValidator {
    denylist: Denylist,
}

impl NameValidator {
    pub fn new(denylist: Denylist) -> Self {
        Self { denylist }
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    pub fn check(&self, name: &str) -> NameVerdict {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return NameVerdict::Empty;
        }
        if GENERIC_NAME.is_match(trimmed) {
            return NameVerdict::Generic;
        }
        if let Some(term) = self.denylist.find_in(trimmed) {
            return NameVerdict::Denylisted(term.to_string());
        }
        NameVerdict::Accepted
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.check(name).is_accepted()
    }
}

/// What the local rungs can see.
#[derive(Debug, Clone)]
pub struct LadderInput<'a> {
    pub original: &'a str,
    pub concept: &'a str,
    pub color: &'a str,
    pub now: DateTime<Utc>,
}

/// One step of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rung {
    Keep,
    Recombine { attempt: usize },
    AskAgain,
    Fallback,
}

impl Rung {
    /// The full ladder with `local_attempts` recombination rungs.
    pub fn ladder(local_attempts: usize) -> Vec<Rung> {
        let mut rungs = Vec::with_capacity(local_attempts + 3);
        rungs.push(Rung::Keep);
        rungs.extend((0..local_attempts).map(|attempt| Rung::Recombine { attempt }));
        rungs.push(Rung::AskAgain);
        rungs.push(Rung::Fallback);
        rungs
    }

    /// Candidate from a local rung. `AskAgain` needs the text service and yields `None` here.
    pub fn candidate(&self, input: &LadderInput<'_>) -> Option<String> {
        match self {
            Rung::Keep => Some(input.original.trim().to_string()),
            Rung::Recombine { attempt } => recombine(input, *attempt),
            Rung::AskAgain => None,
            Rung::Fallback => Some(fallback_name(input.now)),
        }
    }

    /// Whether a candidate from this rung must pass the validator.
    pub fn needs_validation(&self) -> bool {
        !matches!(self, Rung::Fallback)
    }

    pub fn source(&self) -> NameSource {
        match self {
            Rung::Keep => NameSource::Generated,
            Rung::Recombine { .. } => NameSource::Recombined,
            Rung::AskAgain => NameSource::Regenerated,
            Rung::Fallback => NameSource::Fallback,
        }
    }
}

/// Pull title-cased keywords out of free text, color first.
pub fn keywords(input: &LadderInput<'_>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in input
        .color
        .split(|c: char| !c.is_alphabetic())
        .chain(input.concept.split(|c: char| !c.is_alphabetic()))
    {
        if word.chars().count() < 4 {
            continue;
        }
        let lower = word.to_lowercase();
        if STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        let titled = title_case(&lower);
        if !out.contains(&titled) {
            out.push(titled);
        }
    }
    out
}

/// Deterministic recombination for the given attempt.
pub fn recombine(input: &LadderInput<'_>, attempt: usize) -> Option<String> {
    let words = keywords(input);
    let fragment = FRAGMENTS[attempt % FRAGMENTS.len()];
    let noun = if words.is_empty() {
        FALLBACK_NOUNS[attempt % FALLBACK_NOUNS.len()].to_string()
    } else {
        words[attempt % words.len()].clone()
    };

    if fragment.eq_ignore_ascii_case(&noun) {
        return None;
    }
    Some(format!("{} {}", fragment, noun))
}

/// Last-resort name. Always succeeds.
pub fn fallback_name(now: DateTime<Utc>) -> String {
    format!("{} {:02}", FALLBACK_PHRASE, now.second())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
