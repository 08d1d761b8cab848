//! Interactive session: a line-oriented front end over one board.
//!
//! The session owns a [`QuestionForm`], a [`Submitter`] wired to the board
//! through the submission channel, and the board itself. Every failure is
//! reported on the output and the loop carries on.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, warn};

use crate::board::{
    ConfirmDelete, DeleteOutcome, QuestionBoard, VoteOutcome, DELETE_FAILED_MESSAGE, LOAD_FAILED_MESSAGE,
};
use crate::error::{Error, Result};
use crate::fortnight::{current_bucket_id, FortnightId};
use crate::question::{Question, Tag};
use crate::store::QuestionStore;
use crate::submit::{submission_channel, QuestionForm, Submitter, SUBMIT_FAILED_MESSAGE};

use super::commands::OutputFormat;
use super::render::render_list;

const PROMPT: &str = "> ";

const HELP: &str = "\
Commands:
  ask <text>        set the question text
  context [text]    set or clear the context note
  tag [name]        set the tag, or list the tags
  form              show the question being composed
  clear             discard the question being composed
  submit            submit the question
  list              show the questions
  refresh           re-fetch and show the questions
  vote <n>          vote for question n
  delete <n>        delete question n
  next | prev       move to the next or previous fortnight
  today             move to the current fortnight
  help              show this help
  quit              leave the session";

/// Settings for an interactive session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Fortnight shown when the session starts.
    pub fortnight: FortnightId,
    /// Tag preselected on the question form.
    pub default_tag: Tag,
    /// Ask before deleting.
    pub confirm_deletes: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fortnight: current_bucket_id(),
            default_tag: Tag::default(),
            confirm_deletes: true,
        }
    }
}

/// Run an interactive session until `quit` or end of input.
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails. Store
/// failures are reported on `out` and the session continues.
pub async fn run_session<R, W>(
    store: Arc<dyn QuestionStore>,
    options: SessionOptions,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    let (tx, rx) = submission_channel();
    let board = Arc::new(QuestionBoard::new(store.clone(), options.fortnight));
    let listener = {
        let board = board.clone();
        tokio::spawn(async move { board.listen(rx).await })
    };

    let mut session = Session {
        board,
        submitter: Submitter::new(store).with_events(tx),
        form: QuestionForm::new(options.default_tag),
        confirm_deletes: options.confirm_deletes,
        lines: input.lines(),
        out,
    };
    let result = session.run().await;

    // Dropping the submitter closes the channel and ends the listener.
    drop(session);
    let joined = listener.await;
    result?;
    joined.map_err(|e| Error::internal(format!("submission listener failed: {e}")))
}

struct Session<'a, R, W> {
    board: Arc<QuestionBoard>,
    submitter: Submitter,
    form: QuestionForm,
    confirm_deletes: bool,
    lines: Lines<R>,
    out: &'a mut W,
}

impl<R, W> Session<'_, R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    async fn run(&mut self) -> Result<()> {
        writeln!(self.out, "Fortnightly All Hands questions. Type 'help' for commands.")?;
        self.refresh().await?;

        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;
            let Some(line) = self.lines.next_line().await? else {
                writeln!(self.out)?;
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (command, rest) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(c, r)| (c, r.trim()));
            debug!(command, "Session command");

            match command.to_ascii_lowercase().as_str() {
                "ask" => self.ask(rest)?,
                "context" => self.context(rest)?,
                "tag" => self.tag(rest)?,
                "form" => self.show_form()?,
                "clear" => {
                    self.form.clear();
                    writeln!(self.out, "Form cleared.")?;
                }
                "submit" => self.submit().await?,
                "list" => self.show_list()?,
                "refresh" => self.refresh().await?,
                "vote" => self.vote(rest).await?,
                "delete" => self.delete(rest).await?,
                "next" => self.move_to(self.board.fortnight().next()).await?,
                "prev" | "previous" => self.move_to(self.board.fortnight().previous()).await?,
                "today" => self.move_to(current_bucket_id()).await?,
                "help" | "?" => writeln!(self.out, "{HELP}")?,
                "quit" | "exit" => break,
                other => writeln!(self.out, "Unknown command '{other}'. Type 'help' for commands.")?,
            }
        }
        Ok(())
    }

    fn ask(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            writeln!(self.out, "Usage: ask <text>")?;
            return Ok(());
        }
        self.form.question_text = text.to_string();
        writeln!(self.out, "Question set. Type 'submit' to send it.")?;
        Ok(())
    }

    fn context(&mut self, text: &str) -> Result<()> {
        self.form.context = text.to_string();
        if text.is_empty() {
            writeln!(self.out, "Context cleared.")?;
        } else {
            writeln!(self.out, "Context set.")?;
        }
        Ok(())
    }

    fn tag(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            for tag in Tag::ALL {
                let marker = if tag == self.form.tag { "*" } else { " " };
                writeln!(self.out, " {marker} {tag}")?;
            }
            return Ok(());
        }
        match name.parse::<Tag>() {
            Ok(tag) => {
                self.form.tag = tag;
                writeln!(self.out, "Tag set to {tag}.")?;
            }
            Err(e) => writeln!(self.out, "{e}. Type 'tag' to list tags.")?,
        }
        Ok(())
    }

    fn show_form(&mut self) -> Result<()> {
        let text = if self.form.question_text.trim().is_empty() {
            "(empty)"
        } else {
            self.form.question_text.as_str()
        };
        writeln!(self.out, "Question: {text}")?;
        if !self.form.context.trim().is_empty() {
            writeln!(self.out, "Context:  {}", self.form.context)?;
        }
        writeln!(self.out, "Tag:      {}", self.form.tag)?;
        Ok(())
    }

    async fn submit(&mut self) -> Result<()> {
        match self.submitter.submit(&mut self.form).await {
            Ok(question) => writeln!(
                self.out,
                "Question submitted for {}.",
                question.fortnight_id.format_range()
            )?,
            Err(e) if e.is_validation() => writeln!(self.out, "Cannot submit: {e}")?,
            Err(_) => writeln!(self.out, "{SUBMIT_FAILED_MESSAGE}")?,
        }
        Ok(())
    }

    fn show_list(&mut self) -> Result<()> {
        let rendered = render_list(&self.board.view(), OutputFormat::Plain)?;
        writeln!(self.out, "{rendered}")?;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        // A failed fetch leaves the load error in the view.
        let _ = self.board.refresh().await;
        self.show_list()
    }

    async fn move_to(&mut self, fortnight: FortnightId) -> Result<()> {
        let _ = self.board.set_fortnight(fortnight).await;
        self.show_list()
    }

    /// Resolve a 1-based row number against the current view.
    fn pick(&mut self, arg: &str, usage: &str) -> Result<Option<Question>> {
        let questions = self.board.questions();
        let picked = arg
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| questions.into_iter().nth(index));
        if picked.is_none() {
            writeln!(self.out, "Usage: {usage} <n>, where n is a number from 'list'.")?;
        }
        Ok(picked)
    }

    async fn vote(&mut self, arg: &str) -> Result<()> {
        let Some(question) = self.pick(arg, "vote")? else {
            return Ok(());
        };
        match self.board.vote(&question.id).await {
            VoteOutcome::Counted { votes } => {
                writeln!(self.out, "Voted. \"{}\" now has {votes}.", question.question_text)?;
            }
            VoteOutcome::AlreadyInFlight => writeln!(self.out, "Vote already in progress.")?,
            VoteOutcome::NotListed => writeln!(self.out, "That question is no longer listed.")?,
            VoteOutcome::Failed => writeln!(self.out, "Vote was not recorded.")?,
        }
        Ok(())
    }

    async fn delete(&mut self, arg: &str) -> Result<()> {
        let Some(question) = self.pick(arg, "delete")? else {
            return Ok(());
        };
        let mut prompt = DeletePrompt::new(&mut self.lines, &mut *self.out, self.confirm_deletes);

        match self.board.delete(&question.id, &mut prompt).await {
            Ok(DeleteOutcome::Deleted) => writeln!(self.out, "Question deleted.")?,
            Ok(DeleteOutcome::Cancelled) => writeln!(self.out, "Delete cancelled.")?,
            Ok(DeleteOutcome::AlreadyInFlight) => writeln!(self.out, "Delete already in progress.")?,
            Ok(DeleteOutcome::NotListed) => writeln!(self.out, "That question is no longer listed.")?,
            Ok(DeleteOutcome::Missing) => {
                writeln!(self.out, "That question was already deleted. List refreshed.")?;
            }
            Err(_) => writeln!(self.out, "{DELETE_FAILED_MESSAGE}")?,
        }
        if self.board.view().error.as_deref() == Some(LOAD_FAILED_MESSAGE) {
            writeln!(self.out, "{LOAD_FAILED_MESSAGE}")?;
        }
        Ok(())
    }
}

/// Asks `Delete "<text>"? ... [y/N]` on `out` and reads the answer from `lines`.
///
/// The board only calls this once the question is listed and idle, so the
/// prompt is never shown for a delete that would not be sent. A disabled
/// prompt confirms without asking. Unreadable input counts as no.
pub struct DeletePrompt<'a, R, W> {
    lines: &'a mut Lines<R>,
    out: &'a mut W,
    enabled: bool,
}

impl<'a, R, W> DeletePrompt<'a, R, W> {
    /// Prompt on `out`, reading answers from `lines`.
    pub fn new(lines: &'a mut Lines<R>, out: &'a mut W, enabled: bool) -> Self {
        Self {
            lines,
            out,
            enabled,
        }
    }

    async fn ask(&mut self, question: &Question) -> std::io::Result<bool>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        write!(
            self.out,
            "Delete \"{}\"? This cannot be undone. [y/N] ",
            question.question_text
        )?;
        self.out.flush()?;
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(is_yes(&answer))
    }
}

impl<R, W> std::fmt::Debug for DeletePrompt<'_, R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletePrompt")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R, W> ConfirmDelete for DeletePrompt<'_, R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    async fn confirm(&mut self, question: &Question) -> bool {
        if !self.enabled {
            return true;
        }
        match self.ask(question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Delete prompt failed, treating as no");
                false
            }
        }
    }
}

/// Check if a prompt answer means yes.
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
