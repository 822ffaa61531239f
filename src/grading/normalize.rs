//! Maps a raw submitted answer onto one of the four choice identifiers.
//!
//! Clients send either the letter itself or the literal option text. Matching
//! order is: letter, exact text, case-insensitive text, then a fallback to `A`.

use crate::models::exam::Choice;

/// Which rule produced the normalized choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Letter,
    ExactText,
    CaseInsensitiveText,
    /// Nothing matched; the choice defaulted to `A`.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    pub choice: Choice,
    pub matched: MatchKind,
}

impl Normalized {
    pub fn is_fallback(&self) -> bool {
        self.matched == MatchKind::Fallback
    }
}

/// Normalizes `raw` against the question's option texts (A–D order).
pub fn normalize_answer(raw: &str, options: [&str; 4]) -> Normalized {
    let value = raw.trim().to_uppercase();

    if let Some(choice) = Choice::from_letter(&value) {
        return Normalized {
            choice,
            matched: MatchKind::Letter,
        };
    }

    if let Some(index) = options.iter().position(|opt| *opt == value) {
        return Normalized {
            choice: Choice::ALL[index],
            matched: MatchKind::ExactText,
        };
    }

    let lowered = value.to_lowercase();
    if let Some(index) = options
        .iter()
        .position(|opt| opt.trim().to_lowercase() == lowered)
    {
        return Normalized {
            choice: Choice::ALL[index],
            matched: MatchKind::CaseInsensitiveText,
        };
    }

    Normalized {
        choice: Choice::A,
        matched: MatchKind::Fallback,
    }
}
