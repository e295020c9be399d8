//! Core data model types for prescreen.
//!
//! These are the fundamental types the whole system uses to represent
//! candidates, questions, difficulty tiers and question banks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Difficulty tier of a question.
///
/// Serialized as its integer level (1, 2 or 3).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Difficulty {
    #[default]
    Easy = 1,
    Medium = 2,
    Hard = 3,
}

impl Difficulty {
    /// All tiers in ascending order.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Integer level (1..=3).
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Points a question at this tier is worth.
    pub fn points(self) -> u32 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 15,
        }
    }

    /// Seconds the candidate gets to answer a question at this tier.
    pub fn time_budget_secs(self) -> u32 {
        match self {
            Difficulty::Easy => 45,
            Difficulty::Medium => 60,
            Difficulty::Hard => 90,
        }
    }

    /// One tier up, capped at `Hard`.
    pub fn raise(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Hard => Difficulty::Hard,
        }
    }

    /// One tier down, floored at `Easy`.
    pub fn lower(self) -> Self {
        match self {
            Difficulty::Easy | Difficulty::Medium => Difficulty::Easy,
            Difficulty::Hard => Difficulty::Medium,
        }
    }

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "basic",
            Difficulty::Medium => "intermediate",
            Difficulty::Hard => "advanced",
        }
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Difficulty::Easy),
            2 => Ok(Difficulty::Medium),
            3 => Ok(Difficulty::Hard),
            other => Err(format!("difficulty must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> Self {
        d.level()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "easy" | "basic" => Ok(Difficulty::Easy),
            "2" | "medium" | "intermediate" => Ok(Difficulty::Medium),
            "3" | "hard" | "advanced" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Self-reported years of experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperienceBand {
    #[serde(rename = "0-2 years")]
    Junior,
    #[serde(rename = "2-5 years")]
    Mid,
    #[serde(rename = "5-8 years")]
    Senior,
    #[serde(rename = "8+ years")]
    Veteran,
}

impl fmt::Display for ExperienceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperienceBand::Junior => write!(f, "0-2 years"),
            ExperienceBand::Mid => write!(f, "2-5 years"),
            ExperienceBand::Senior => write!(f, "5-8 years"),
            ExperienceBand::Veteran => write!(f, "8+ years"),
        }
    }
}

impl FromStr for ExperienceBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let band = normalized.trim_end_matches("years").trim();
        match band {
            "0-2" => Ok(ExperienceBand::Junior),
            "2-5" => Ok(ExperienceBand::Mid),
            "5-8" => Ok(ExperienceBand::Senior),
            "8+" => Ok(ExperienceBand::Veteran),
            _ => Err(format!("unknown experience band: {s}")),
        }
    }
}

/// The person being interviewed. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Role applied for; selects the question bank.
    pub role: String,
    /// Years of experience.
    pub experience: ExperienceBand,
}

impl Candidate {
    /// Check that the required fields are filled in.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".into());
        }
        if self.email.trim().is_empty() {
            return Err("email is required".into());
        }
        if !self.email.contains('@') {
            return Err(format!("email '{}' is not valid", self.email));
        }
        if self.role.trim().is_empty() {
            return Err("role is required".into());
        }
        Ok(())
    }
}

/// A single interview question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within its bank.
    pub id: String,
    /// The prompt shown to the candidate.
    pub text: String,
    /// Tier the question belongs to.
    pub difficulty: Difficulty,
    /// Rubric the evaluator grades against.
    #[serde(default)]
    pub reference_answer: Option<String>,
    /// Free-form topic tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A role-specific collection of questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    /// Unique identifier for this bank.
    pub id: String,
    /// Role the bank serves (e.g. "Software Developer").
    pub role: String,
    /// Description of the bank.
    #[serde(default)]
    pub description: String,
    /// The questions, across all tiers.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionBank {
    /// Questions at one tier.
    pub fn at(&self, difficulty: Difficulty) -> impl Iterator<Item = &Question> {
        self.questions
            .iter()
            .filter(move |q| q.difficulty == difficulty)
    }
}
