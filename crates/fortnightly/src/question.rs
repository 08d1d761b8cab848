//! Core question types for fortnightly.
//!
//! This module defines the question record, its category tag, and the
//! ordering every question list is shown in.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fortnight::FortnightId;

/// The category a question is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tag {
    /// Day-to-day operations.
    Operations,
    /// Regulatory and policy matters.
    Compliance,
    /// Tools, systems and engineering.
    Technology,
    /// Anything else.
    #[default]
    General,
    /// The fellows program.
    #[serde(rename = "Fellows Program")]
    FellowsProgram,
    /// Company results and direction.
    #[serde(rename = "Company Success")]
    CompanySuccess,
}

impl Tag {
    /// Every tag, in the order they are offered to users.
    pub const ALL: [Tag; 6] = [
        Tag::Operations,
        Tag::Compliance,
        Tag::Technology,
        Tag::General,
        Tag::FellowsProgram,
        Tag::CompanySuccess,
    ];

    /// The label stored in the database and shown to users.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Operations => "Operations",
            Self::Compliance => "Compliance",
            Self::Technology => "Technology",
            Self::General => "General",
            Self::FellowsProgram => "Fellows Program",
            Self::CompanySuccess => "Company Success",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tag {
    type Err = Error;

    /// Accepts the label in any case, with spaces, dashes or underscores
    /// between words (`"Fellows Program"`, `"fellows-program"`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect();
        Self::ALL
            .into_iter()
            .find(|tag| {
                tag.label()
                    .chars()
                    .filter(|c| *c != ' ')
                    .collect::<String>()
                    .eq_ignore_ascii_case(&wanted)
            })
            .ok_or_else(|| Error::UnknownTag(s.to_string()))
    }
}

/// Opaque identifier assigned to a question by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QuestionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A stored question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier assigned by the store.
    pub id: QuestionId,

    /// When the store accepted the question.
    pub created_at: DateTime<Utc>,

    /// The question itself. Never empty.
    pub question_text: String,

    /// Optional background from the asker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Category.
    pub tag: Tag,

    /// The fortnight the question was asked in.
    pub fortnight_id: FortnightId,

    /// Number of votes received.
    pub votes: u32,

    /// Whether the question has been answered. Set outside this crate.
    pub is_answered: bool,

    /// The answer, when one has been recorded. Set outside this crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Question {
    /// The answer to show, if the question is marked answered.
    #[must_use]
    pub fn visible_answer(&self) -> Option<&str> {
        if self.is_answered {
            self.answer.as_deref()
        } else {
            None
        }
    }
}

/// A question that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    /// The question itself.
    pub question_text: String,
    /// Optional background from the asker.
    pub context: Option<String>,
    /// Category.
    pub tag: Tag,
    /// The fortnight the question belongs to.
    pub fortnight_id: FortnightId,
}

impl NewQuestion {
    /// Build a new question, trimming the text and dropping blank context.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `question_text` is empty or whitespace.
    pub fn new(
        question_text: &str,
        context: Option<&str>,
        tag: Tag,
        fortnight_id: FortnightId,
    ) -> Result<Self> {
        let question_text = question_text.trim();
        if question_text.is_empty() {
            return Err(Error::validation("question_text", "must not be empty"));
        }
        let context = context
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Ok(Self {
            question_text: question_text.to_string(),
            context,
            tag,
            fortnight_id,
        })
    }
}

/// Display order: most votes first, then most recent first.
#[must_use]
pub fn display_order(a: &Question, b: &Question) -> Ordering {
    b.votes
        .cmp(&a.votes)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Sort questions into display order.
pub fn sort_for_display(questions: &mut [Question]) {
    questions.sort_by(display_order);
}
