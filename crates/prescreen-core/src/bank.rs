//! TOML question bank loader and the bank-backed question source.
//!
//! A bank file looks like:
//!
//! ```toml
//! [bank]
//! id = "software-developer"
//! role = "Software Developer"
//!
//! [[questions]]
//! id = "sd-oop"
//! difficulty = 1
//! text = "What is object-oriented programming?"
//! reference_answer = "A paradigm based on objects ..."
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crate::model::{Difficulty, Question, QuestionBank};
use crate::scoring::worst_case_demand;
use crate::traits::{QuestionRequest, QuestionSource};

#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    role: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    difficulty: u8,
    text: String,
    #[serde(default)]
    reference_answer: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank`.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let difficulty = Difficulty::try_from(q.difficulty)
                .map_err(|e| anyhow::anyhow!("question '{}': {}", q.id, e))?;
            Ok(Question {
                id: q.id,
                text: q.text,
                difficulty,
                reference_answer: q.reference_answer,
                tags: q.tags,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank {
        id: parsed.bank.id,
        role: parsed.bank.role,
        description: parsed.bank.description,
        questions,
    })
}

/// Recursively load all `.toml` banks from a directory, in path order.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    let mut banks = Vec::new();
    for path in paths {
        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// Load a single bank file or every bank under a directory.
pub fn load_banks(path: &Path) -> Result<Vec<QuestionBank>> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        Ok(vec![parse_bank(path)?])
    }
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a bank for common issues.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for question in &bank.questions {
        if !seen_ids.insert(&question.id) {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: format!("duplicate question ID: {}", question.id),
            });
        }
    }

    for question in &bank.questions {
        if question.text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "question text is empty".into(),
            });
        }
        let missing_reference = question
            .reference_answer
            .as_deref()
            .is_none_or(|r| r.trim().is_empty());
        if missing_reference {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "no reference_answer; evaluators will grade without a rubric".into(),
            });
        }
    }

    // A session never repeats a question, so each tier needs enough supply
    // for the longest streak a 10-question session can spend there.
    for difficulty in Difficulty::ALL {
        let supply = bank.at(difficulty).count() as u32;
        let demand = worst_case_demand(difficulty);
        if supply < demand {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "only {supply} level-{difficulty} questions; a session may need {demand}"
                ),
            });
        }
    }

    warnings
}

/// Question source drawing random, non-repeating questions from banks.
pub struct QuestionBankSource {
    banks: Vec<QuestionBank>,
    rng: Mutex<StdRng>,
}

impl QuestionBankSource {
    pub fn new(banks: Vec<QuestionBank>) -> Self {
        Self {
            banks,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic question order for tests.
    pub fn with_seed(banks: Vec<QuestionBank>, seed: u64) -> Self {
        Self {
            banks,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Roles covered by the loaded banks.
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.banks.iter().map(|b| b.role.as_str()).collect();
        roles.sort_unstable();
        roles.dedup();
        roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.banks.iter().any(|b| b.role.eq_ignore_ascii_case(role))
    }
}

#[async_trait]
impl QuestionSource for QuestionBankSource {
    async fn next_question(&self, request: &QuestionRequest) -> Result<Option<Question>> {
        if !self.has_role(&request.role) {
            anyhow::bail!(
                "no question bank for role '{}' (available: {})",
                request.role,
                self.roles().join(", ")
            );
        }

        let candidates: Vec<&Question> = self
            .banks
            .iter()
            .filter(|b| b.role.eq_ignore_ascii_case(&request.role))
            .flat_map(|b| b.at(request.difficulty))
            .filter(|q| !request.exclude.contains(&q.id))
            .collect();

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow::anyhow!("question picker lock poisoned"))?;
        Ok(candidates.choose(&mut *rng).map(|q| (*q).clone()))
    }
}
