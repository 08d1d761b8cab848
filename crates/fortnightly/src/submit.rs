//! Question submission.
//!
//! A [`QuestionForm`] holds what the user has typed so far. [`Submitter`]
//! validates it, stamps it with the current fortnight, stores it and, on
//! success, clears the form and announces a [`SubmissionEvent`] so the board
//! can refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fortnight::{current_bucket_id, FortnightId};
use crate::question::{NewQuestion, Question, Tag};
use crate::store::QuestionStore;

/// Message shown when a submission could not be stored.
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit your question. Please try again.";

/// Default buffer capacity for the submission channel.
const DEFAULT_CAPACITY: usize = 16;

/// Announces that a question was stored and the list should be re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEvent {
    /// Increases with every successful submission from the same submitter.
    pub refresh_token: u64,
}

/// Create the channel that carries [`SubmissionEvent`]s to the board.
#[must_use]
pub fn submission_channel() -> (
    mpsc::Sender<SubmissionEvent>,
    mpsc::Receiver<SubmissionEvent>,
) {
    mpsc::channel(DEFAULT_CAPACITY)
}

/// The question a user is composing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionForm {
    /// The question itself.
    pub question_text: String,
    /// Optional background; blank means none.
    pub context: String,
    /// Selected category.
    pub tag: Tag,
    default_tag: Tag,
}

impl QuestionForm {
    /// An empty form preselecting `default_tag`.
    #[must_use]
    pub fn new(default_tag: Tag) -> Self {
        Self {
            question_text: String::new(),
            context: String::new(),
            tag: default_tag,
            default_tag,
        }
    }

    /// Reset every field, including the tag.
    pub fn clear(&mut self) {
        *self = Self::new(self.default_tag);
    }

    /// Check if nothing has been typed yet.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.question_text.trim().is_empty() && self.context.trim().is_empty()
    }

    /// Validate the form and build the record to store.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the question text is empty.
    pub fn to_new_question(&self, fortnight_id: FortnightId) -> Result<NewQuestion> {
        NewQuestion::new(
            &self.question_text,
            Some(self.context.as_str()),
            self.tag,
            fortnight_id,
        )
    }
}

/// Stores questions and announces each successful submission.
pub struct Submitter {
    store: Arc<dyn QuestionStore>,
    events: Option<mpsc::Sender<SubmissionEvent>>,
    clock: fn() -> FortnightId,
    next_token: AtomicU64,
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("has_listener", &self.events.is_some())
            .field("next_token", &self.next_token)
            .finish_non_exhaustive()
    }
}

impl Submitter {
    /// A submitter that stamps questions with today's fortnight and
    /// announces nothing.
    #[must_use]
    pub fn new(store: Arc<dyn QuestionStore>) -> Self {
        Self {
            store,
            events: None,
            clock: current_bucket_id,
            next_token: AtomicU64::new(1),
        }
    }

    /// Announce successful submissions on `events`.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<SubmissionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Use `clock` instead of the system date to pick the fortnight.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> FortnightId) -> Self {
        self.clock = clock;
        self
    }

    /// Submit the form.
    ///
    /// On success the form is cleared and a [`SubmissionEvent`] is sent. On
    /// any failure the form is left untouched so the user can retry.
    ///
    /// # Errors
    ///
    /// Returns a validation error, without touching the store, if the
    /// question text is empty. Returns a persistence error if the store
    /// rejects the question.
    pub async fn submit(&self, form: &mut QuestionForm) -> Result<Question> {
        let fortnight_id = (self.clock)();
        let new_question = form.to_new_question(fortnight_id)?;

        let question = match self.store.insert(new_question).await {
            Ok(question) => question,
            Err(e) => {
                warn!(error = %e, "Failed to submit question");
                return Err(e);
            }
        };

        info!(id = %question.id, fortnight = %fortnight_id, tag = %question.tag, "Question submitted");
        form.clear();
        self.announce().await;
        Ok(question)
    }

    async fn announce(&self) {
        let Some(events) = &self.events else {
            return;
        };
        let refresh_token = self.next_token.fetch_add(1, Ordering::Relaxed);
        if events
            .send(SubmissionEvent { refresh_token })
            .await
            .is_err()
        {
            debug!(refresh_token, "No listener for submission event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::TestStore;

    fn fixed_clock() -> FortnightId {
        FortnightId::reference()
    }

    fn filled_form() -> QuestionForm {
        let mut form = QuestionForm::new(Tag::General);
        form.question_text = "When is the offsite?".to_string();
        form.context = "Planning travel".to_string();
        form.tag = Tag::Operations;
        form
    }

    #[test]
    fn test_form_defaults() {
        let form = QuestionForm::new(Tag::Technology);
        assert!(form.is_blank());
        assert_eq!(form.tag, Tag::Technology);
    }

    #[test]
    fn test_form_clear_restores_default_tag() {
        let mut form = QuestionForm::new(Tag::Compliance);
        form.question_text = "x".to_string();
        form.tag = Tag::Operations;
        form.clear();
        assert!(form.is_blank());
        assert_eq!(form.tag, Tag::Compliance);
    }

    #[test]
    fn test_form_blank_context_is_none() {
        let mut form = QuestionForm::new(Tag::General);
        form.question_text = "Q".to_string();
        form.context = "  ".to_string();
        let new = form.to_new_question(FortnightId::reference()).unwrap();
        assert!(new.context.is_none());
    }

    #[tokio::test]
    async fn test_submit_stores_and_clears() {
        let store = TestStore::new();
        let submitter = Submitter::new(store.clone()).with_clock(fixed_clock);
        let mut form = filled_form();

        let question = submitter.submit(&mut form).await.unwrap();

        assert_eq!(question.fortnight_id, FortnightId::reference());
        assert_eq!(question.tag, Tag::Operations);
        assert_eq!(question.context.as_deref(), Some("Planning travel"));
        assert_eq!(question.votes, 0);
        assert!(form.is_blank());
        assert_eq!(form.tag, Tag::General);

        let stored = store.inner.list(FortnightId::reference()).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_uses_current_fortnight_by_default() {
        let store = TestStore::new();
        let submitter = Submitter::new(store.clone());
        let mut form = filled_form();

        let question = submitter.submit(&mut form).await.unwrap();
        assert_eq!(question.fortnight_id, current_bucket_id());
    }

    #[tokio::test]
    async fn test_submit_empty_text_never_reaches_store() {
        let store = TestStore::new();
        let submitter = Submitter::new(store.clone()).with_clock(fixed_clock);
        let mut form = QuestionForm::new(Tag::General);
        form.question_text = "   ".to_string();
        form.context = "only context".to_string();

        let err = submitter.submit(&mut form).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.insert_calls(), 0);
        assert_eq!(form.context, "only context");
    }

    #[tokio::test]
    async fn test_submit_failure_preserves_form() {
        let store = TestStore::new();
        TestStore::fail(&store.fail_inserts, true);
        let (tx, mut rx) = submission_channel();
        let submitter = Submitter::new(store.clone())
            .with_clock(fixed_clock)
            .with_events(tx);
        let mut form = filled_form();

        let err = submitter.submit(&mut form).await.unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(form, filled_form());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_submit_announces_with_increasing_tokens() {
        let store = TestStore::new();
        let (tx, mut rx) = submission_channel();
        let submitter = Submitter::new(store.clone())
            .with_clock(fixed_clock)
            .with_events(tx);

        let mut form = filled_form();
        submitter.submit(&mut form).await.unwrap();
        let mut form = filled_form();
        submitter.submit(&mut form).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(second.refresh_token > first.refresh_token);
    }

    #[tokio::test]
    async fn test_submit_without_listener_still_succeeds() {
        let store = TestStore::new();
        let (tx, rx) = submission_channel();
        drop(rx);
        let submitter = Submitter::new(store.clone())
            .with_clock(fixed_clock)
            .with_events(tx);
        let mut form = filled_form();

        assert!(submitter.submit(&mut form).await.is_ok());
    }
}
