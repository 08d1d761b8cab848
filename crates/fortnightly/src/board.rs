//! The question board: one fortnight's list, kept in step with the store.
//!
//! The board owns the in-memory list the user sees and the per-row action
//! state. Store calls never hold the board's lock, so votes and deletes on
//! different rows, and list refreshes, can all be in flight at once.
//!
//! # Consistency rules
//!
//! - A vote only changes the local count after the store confirms it.
//! - A delete only removes the local row after the store confirms it, then
//!   re-fetches the whole list.
//! - Every fetch is numbered. A response older than one already applied, or
//!   for a fortnight the board has since moved away from, is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::fortnight::FortnightId;
use crate::question::{sort_for_display, Question, QuestionId};
use crate::store::QuestionStore;
use crate::submit::SubmissionEvent;

/// Message shown in place of the list when it cannot be loaded.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load questions. Please try again later.";

/// Message shown when a delete fails.
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete question. Please try again.";

/// Progress of one kind of action on one row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum ActionState {
    /// Nothing running.
    #[default]
    Idle,
    /// A store call is outstanding; repeat requests are dropped.
    InFlight,
    /// The last attempt failed. A new attempt may start.
    Failed(String),
}

impl ActionState {
    /// Check if a store call is outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }
}

/// Action state for a single question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowState {
    /// State of voting on this question.
    pub vote: ActionState,
    /// State of deleting this question.
    pub delete: ActionState,
}

impl RowState {
    fn is_idle(&self) -> bool {
        !self.vote.is_in_flight() && !self.delete.is_in_flight()
    }
}

/// Result of a vote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The store accepted the vote; the question now has `votes` votes.
    Counted {
        /// New vote count.
        votes: u32,
    },
    /// A vote for this question was already in flight; this one was dropped.
    AlreadyInFlight,
    /// The question is not in the current list.
    NotListed,
    /// The store did not record the vote. The count is unchanged.
    Failed,
}

/// Result of a delete request that did not fail in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The question was deleted and the list re-fetched.
    Deleted,
    /// The user declined the confirmation; nothing was sent to the store.
    Cancelled,
    /// A delete for this question was already in flight.
    AlreadyInFlight,
    /// The question is not in the current list.
    NotListed,
    /// The store had no such question. The list was re-fetched to catch up.
    Missing,
}

/// Result of a fetch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched list replaced the current one.
    Applied {
        /// Number of questions now listed.
        count: usize,
    },
    /// A newer fetch had already been applied, so this one was dropped.
    Stale,
}

/// Asks the user to confirm a delete before anything is sent to the store.
///
/// Only consulted once the question is known to be listed and no other
/// delete of it is in flight. Plain closures work as confirmers.
#[async_trait]
pub trait ConfirmDelete: Send {
    /// Return `true` to go ahead with deleting `question`.
    async fn confirm(&mut self, question: &Question) -> bool;
}

#[async_trait]
impl<F> ConfirmDelete for F
where
    F: FnMut(&Question) -> bool + Send,
{
    async fn confirm(&mut self, question: &Question) -> bool {
        self(question)
    }
}

/// What the board currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    /// Fortnight being shown.
    pub fortnight: FortnightId,
    /// Questions in display order. Empty when `error` is set.
    pub questions: Vec<Question>,
    /// Message to show instead of the list.
    pub error: Option<String>,
    /// A fetch is outstanding.
    pub loading: bool,
}

#[derive(Debug)]
struct BoardState {
    fortnight: FortnightId,
    questions: Vec<Question>,
    error: Option<String>,
    rows: HashMap<QuestionId, RowState>,
    issued_fetch: u64,
    applied_fetch: u64,
}

impl BoardState {
    fn find_mut(&mut self, id: &QuestionId) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| &q.id == id)
    }

    fn row(&mut self, id: &QuestionId) -> &mut RowState {
        self.rows.entry(id.clone()).or_default()
    }
}

/// One fortnight's question list and the actions on it.
pub struct QuestionBoard {
    store: Arc<dyn QuestionStore>,
    state: Mutex<BoardState>,
}

impl std::fmt::Debug for QuestionBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionBoard")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl QuestionBoard {
    /// Create a board for `fortnight`. Nothing is fetched until
    /// [`QuestionBoard::refresh`] is called.
    #[must_use]
    pub fn new(store: Arc<dyn QuestionStore>, fortnight: FortnightId) -> Self {
        Self {
            store,
            state: Mutex::new(BoardState {
                fortnight,
                questions: Vec::new(),
                error: None,
                rows: HashMap::new(),
                issued_fetch: 0,
                applied_fetch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fortnight being shown.
    #[must_use]
    pub fn fortnight(&self) -> FortnightId {
        self.lock().fortnight
    }

    /// Questions in display order.
    #[must_use]
    pub fn questions(&self) -> Vec<Question> {
        self.lock().questions.clone()
    }

    /// Snapshot of everything the board shows.
    #[must_use]
    pub fn view(&self) -> BoardView {
        let state = self.lock();
        BoardView {
            fortnight: state.fortnight,
            questions: state.questions.clone(),
            error: state.error.clone(),
            loading: state.issued_fetch > state.applied_fetch,
        }
    }

    /// Action state of one question.
    #[must_use]
    pub fn row_state(&self, id: &QuestionId) -> RowState {
        self.lock().rows.get(id).cloned().unwrap_or_default()
    }

    /// Switch to `fortnight` and fetch its questions.
    ///
    /// # Errors
    ///
    /// Returns the store error if the fetch fails; the board then shows
    /// [`LOAD_FAILED_MESSAGE`] and an empty list.
    pub async fn set_fortnight(&self, fortnight: FortnightId) -> Result<RefreshOutcome> {
        {
            let mut state = self.lock();
            if state.fortnight != fortnight {
                state.fortnight = fortnight;
                state.questions.clear();
                state.error = None;
                state.rows.retain(|_, row| !row.is_idle());
            }
        }
        self.refresh().await
    }

    /// Re-fetch the current fortnight.
    ///
    /// # Errors
    ///
    /// Returns the store error if the fetch fails; the board then shows
    /// [`LOAD_FAILED_MESSAGE`] and an empty list.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let (seq, fortnight) = {
            let mut state = self.lock();
            state.issued_fetch += 1;
            (state.issued_fetch, state.fortnight)
        };

        debug!(%fortnight, seq, "Fetching questions");
        let result = self.store.list(fortnight).await;

        let mut guard = self.lock();
        let state = &mut *guard;
        if seq < state.applied_fetch || state.fortnight != fortnight {
            debug!(%fortnight, seq, applied = state.applied_fetch, "Dropping stale fetch");
            return Ok(RefreshOutcome::Stale);
        }
        state.applied_fetch = seq;

        match result {
            Ok(questions) => {
                debug!(%fortnight, count = questions.len(), "Fetched questions");
                state
                    .rows
                    .retain(|id, row| !row.is_idle() || questions.iter().any(|q| &q.id == id));
                state.questions = questions;
                state.error = None;
                Ok(RefreshOutcome::Applied {
                    count: state.questions.len(),
                })
            }
            Err(e) => {
                error!(%fortnight, error = %e, "Failed to fetch questions");
                state.questions.clear();
                state.error = Some(LOAD_FAILED_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    /// Add one vote to a listed question.
    ///
    /// The new count is written as an absolute value. A failure is logged and
    /// recorded in the row state; it is not returned as an error.
    pub async fn vote(&self, id: &QuestionId) -> VoteOutcome {
        let next = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let Some(current) = state.find_mut(id).map(|q| q.votes) else {
                debug!(%id, "Vote for unlisted question ignored");
                return VoteOutcome::NotListed;
            };
            let row = state.row(id);
            if row.vote.is_in_flight() {
                debug!(%id, "Vote already in flight, dropping");
                return VoteOutcome::AlreadyInFlight;
            }
            let Some(next) = current.checked_add(1) else {
                warn!(%id, votes = current, "Vote not recorded: count at maximum");
                row.vote = ActionState::Failed("vote count at maximum".to_string());
                return VoteOutcome::Failed;
            };
            row.vote = ActionState::InFlight;
            next
        };

        let result = self.store.set_votes(id, next).await;

        let mut guard = self.lock();
        let state = &mut *guard;
        match result {
            Ok(0) => {
                warn!(%id, "Vote not recorded: question no longer exists");
                state.row(id).vote = ActionState::Failed("question no longer exists".to_string());
                VoteOutcome::Failed
            }
            Ok(_) => {
                if let Some(question) = state.find_mut(id) {
                    question.votes = next;
                }
                sort_for_display(&mut state.questions);
                state.row(id).vote = ActionState::Idle;
                debug!(%id, votes = next, "Vote recorded");
                VoteOutcome::Counted { votes: next }
            }
            Err(e) => {
                warn!(%id, error = %e, "Failed to record vote");
                state.row(id).vote = ActionState::Failed(e.to_string());
                VoteOutcome::Failed
            }
        }
    }

    /// Delete a listed question after the user confirms.
    ///
    /// # Errors
    ///
    /// Returns the store error if the delete fails. The list is left as it
    /// was; callers should show [`DELETE_FAILED_MESSAGE`].
    pub async fn delete(
        &self,
        id: &QuestionId,
        confirm: &mut dyn ConfirmDelete,
    ) -> Result<DeleteOutcome> {
        let question = {
            let state = self.lock();
            if state.rows.get(id).is_some_and(|row| row.delete.is_in_flight()) {
                return Ok(DeleteOutcome::AlreadyInFlight);
            }
            state.questions.iter().find(|q| &q.id == id).cloned()
        };
        let Some(question) = question else {
            debug!(%id, "Delete for unlisted question ignored");
            return Ok(DeleteOutcome::NotListed);
        };

        if !confirm.confirm(&question).await {
            debug!(%id, "Delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        {
            let mut state = self.lock();
            let row = state.row(id);
            if row.delete.is_in_flight() {
                return Ok(DeleteOutcome::AlreadyInFlight);
            }
            row.delete = ActionState::InFlight;
        }

        let result = self.store.delete(id).await;

        let outcome = {
            let mut state = self.lock();
            match result {
                Ok(0) => {
                    info!(%id, "Question was already gone, reconciling");
                    state.row(id).delete = ActionState::Idle;
                    DeleteOutcome::Missing
                }
                Ok(_) => {
                    info!(%id, "Question deleted");
                    state.questions.retain(|q| &q.id != id);
                    state.rows.remove(id);
                    DeleteOutcome::Deleted
                }
                Err(e) => {
                    error!(%id, error = %e, "Failed to delete question");
                    state.row(id).delete = ActionState::Failed(e.to_string());
                    return Err(e);
                }
            }
        };

        // The refresh reports its own failure through the view.
        let _ = self.refresh().await;
        Ok(outcome)
    }

    /// Refresh once for every submission announced on `events`, until every
    /// sender is dropped.
    pub async fn listen(&self, mut events: mpsc::Receiver<SubmissionEvent>) {
        while let Some(event) = events.recv().await {
            debug!(refresh_token = event.refresh_token, "Submission received");
            let _ = self.refresh().await;
        }
        debug!("Submission channel closed");
    }
}
