//! Text rendering for board views and single questions.

use std::fmt::Write as _;

use crate::board::BoardView;
use crate::error::Result;
use crate::fortnight::FortnightId;
use crate::question::Question;

use super::commands::OutputFormat;

/// Shown when a fortnight has no questions.
pub const EMPTY_MESSAGE: &str = "No questions for this fortnight yet. Be the first to ask!";

/// Widest question text shown in table output.
const TABLE_TEXT_WIDTH: usize = 60;

/// Title line for a fortnight.
#[must_use]
pub fn render_header(fortnight: FortnightId) -> String {
    format!(
        "Questions for {}\n{}",
        fortnight.format_long(),
        fortnight.format_range()
    )
}

/// Render what the board shows in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_list(view: &BoardView, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(view)?);
    }

    let mut out = render_header(view.fortnight);
    out.push_str("\n\n");

    if let Some(error) = &view.error {
        out.push_str(error);
        return Ok(out);
    }
    if view.questions.is_empty() {
        out.push_str(EMPTY_MESSAGE);
        return Ok(out);
    }

    match format {
        OutputFormat::Table => render_table(&mut out, &view.questions),
        _ => render_plain(&mut out, &view.questions),
    }
    Ok(out.trim_end().to_string())
}

fn render_plain(out: &mut String, questions: &[Question]) {
    for (index, question) in questions.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. {} [{}] ({}) asked {}",
            index + 1,
            question.question_text,
            question.tag,
            votes_label(question.votes),
            question.created_at.format("%b %-d %H:%M UTC")
        );
        if let Some(context) = &question.context {
            let _ = writeln!(out, "    Context: {context}");
        }
        if let Some(answer) = question.visible_answer() {
            let _ = writeln!(out, "    Answer: {answer}");
        }
    }
}

fn render_table(out: &mut String, questions: &[Question]) {
    let _ = writeln!(
        out,
        "{:>3}  {:>5}  {:<16}  {:<width$}  ID",
        "#",
        "VOTES",
        "TAG",
        "QUESTION",
        width = TABLE_TEXT_WIDTH
    );
    for (index, question) in questions.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:>5}  {:<16}  {:<width$}  {}",
            index + 1,
            question.votes,
            question.tag.label(),
            truncate(&question.question_text, TABLE_TEXT_WIDTH),
            question.id,
            width = TABLE_TEXT_WIDTH
        );
    }
}

/// Render a single question with every field.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_question(question: &Question, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(question)?);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", question.question_text);
    let _ = writeln!(out);
    let _ = writeln!(out, "ID:        {}", question.id);
    let _ = writeln!(out, "Tag:       {}", question.tag);
    let _ = writeln!(out, "Votes:     {}", question.votes);
    let _ = writeln!(
        out,
        "Fortnight: {} ({})",
        question.fortnight_id,
        question.fortnight_id.format_range()
    );
    let _ = writeln!(
        out,
        "Asked:     {}",
        question.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(context) = &question.context {
        let _ = writeln!(out, "Context:   {context}");
    }
    match question.visible_answer() {
        Some(answer) => {
            let _ = writeln!(out, "Answer:    {answer}");
        }
        None => {
            let _ = writeln!(out, "Answer:    (not answered yet)");
        }
    }
    Ok(out.trim_end().to_string())
}

fn votes_label(votes: u32) -> String {
    if votes == 1 {
        "1 vote".to_string()
    } else {
        format!("{votes} votes")
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
