//! Core types for the persona level system.
//!
//! A persona level is a named configuration bundle controlling the tone and
//! register of generated text. The table is compiled in, ordered, and
//! immutable; selection state lives in durable storage.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Persona Level
// ─────────────────────────────────────────────────────────────────

/// One entry of the static persona table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaLevel {
    /// Ordinal position, starting at 1.
    pub level: u32,

    /// Display name shown in level pickers.
    pub name: String,

    /// Prompt fragment steering the register of generated text.
    pub context: String,

    /// Short human-readable description of the register.
    pub description: String,

    /// Optional extra guidance appended to the instruction.
    #[serde(default)]
    pub details: String,
}

impl PersonaLevel {
    /// Compose the shared-context instruction handed to a capability.
    ///
    /// Joins context and description, and appends details when present, so
    /// the instruction always contains the level's context and description
    /// substrings.
    pub fn shared_context(&self) -> String {
        let mut instruction = format!("{}. {}", self.context, self.description);
        if !self.details.is_empty() {
            instruction.push_str(". ");
            instruction.push_str(&self.details);
        }
        instruction
    }
}

impl fmt::Display for PersonaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.name)
    }
}

// ─────────────────────────────────────────────────────────────────
// Built-in Table
// ─────────────────────────────────────────────────────────────────

/// The compiled-in persona table, in ordinal order.
pub fn builtin_levels() -> Vec<PersonaLevel> {
    fn entry(level: u32, name: &str, context: &str, description: &str, details: &str) -> PersonaLevel {
        PersonaLevel {
            level,
            name: name.to_string(),
            context: context.to_string(),
            description: description.to_string(),
            details: details.to_string(),
        }
    }

    vec![
        entry(
            1,
            "Curious Child",
            "Explain this to a curious five-year-old",
            "Uses simple words, playful comparisons, and very short sentences",
            "Avoids jargon entirely; ties every concept to toys, food, or playground situations",
        ),
        entry(
            2,
            "Student",
            "Explain this to a high-school student",
            "Builds on everyday science and history lessons",
            "Introduces proper terminology but defines each term the first time it appears",
        ),
        entry(
            3,
            "Professional",
            "Explain this to a busy professional",
            "Leads with the practical takeaway and keeps background brief",
            "Assumes general workplace literacy and prefers concrete examples over theory",
        ),
        entry(
            4,
            "Domain Expert",
            "Explain this to a domain expert in a formal technical register",
            "Uses precise terminology and quantitative detail",
            "Skips introductory framing; states mechanisms and trade-offs directly",
        ),
        entry(
            5,
            "Academic",
            "Explain this in the style of an academic survey",
            "Structured and rigorous, careful about caveats and counterexamples",
            "",
        ),
    ]
}

/// Look up a table entry by ordinal, falling back to the first entry.
///
/// An unknown ordinal is not an error; the first entry is the documented
/// default for any missing, malformed, or out-of-table selection.
pub fn level_or_first(levels: &[PersonaLevel], ordinal: u32) -> &PersonaLevel {
    levels
        .iter()
        .find(|l| l.level == ordinal)
        .unwrap_or(&levels[0])
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
