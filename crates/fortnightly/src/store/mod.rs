//! Storage layer for fortnightly.
//!
//! [`QuestionStore`] is the seam between the board and wherever questions are
//! persisted. Every call is async so a slow store only suspends the action that
//! issued it. [`SqliteStore`] is the shipped implementation.

pub mod migrations;
pub mod schema;
mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::error::Result;
use crate::fortnight::FortnightId;
use crate::question::{NewQuestion, Question, QuestionId};

pub use sqlite::{DbConnection, SqliteStore};

/// Persistence operations the board relies on.
///
/// Any store-side failure (constraint violation, lost connection, poisoned
/// lock) is reported as an error for which [`crate::Error::is_persistence`]
/// holds.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Store a new question.
    ///
    /// The store assigns `id` and `created_at`, starts `votes` at zero and
    /// leaves the question unanswered.
    async fn insert(&self, question: NewQuestion) -> Result<Question>;

    /// All questions in `fortnight`, most votes first, ties newest first.
    ///
    /// An empty fortnight is an empty vector, not an error.
    async fn list(&self, fortnight: FortnightId) -> Result<Vec<Question>>;

    /// Fetch a single question.
    async fn get(&self, id: &QuestionId) -> Result<Option<Question>>;

    /// Overwrite the vote count of a question with an absolute value.
    ///
    /// Returns the number of rows affected.
    async fn set_votes(&self, id: &QuestionId, votes: u32) -> Result<u64>;

    /// Delete a question.
    ///
    /// Returns the number of rows affected, so a missing question (0) can be
    /// told apart from a failure.
    async fn delete(&self, id: &QuestionId) -> Result<u64>;
}
