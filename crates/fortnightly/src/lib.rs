//! `fortnightly` - An anonymous question board for fortnightly All Hands meetings
//!
//! Questions are grouped into two-week windows anchored at a fixed Monday.
//! This library provides the fortnight calculation, the question store, the
//! submission flow and the board that keeps a fortnight's list in step with
//! the store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod fortnight;
pub mod logging;
pub mod question;
pub mod store;
pub mod submit;

pub use board::{BoardView, DeleteOutcome, QuestionBoard, RefreshOutcome, VoteOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use fortnight::{current_bucket_id, FortnightId};
pub use logging::init_logging;
pub use question::{NewQuestion, Question, QuestionId, Tag};
pub use store::{QuestionStore, SqliteStore};
pub use submit::{QuestionForm, SubmissionEvent, Submitter};
