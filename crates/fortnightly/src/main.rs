//! `fortnightly` - CLI for the All Hands question board
//!
//! This binary provides one-shot commands for asking, listing, voting on and
//! deleting questions, plus an interactive session.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing::debug;

use fortnightly::board::{DeleteOutcome, DELETE_FAILED_MESSAGE, LOAD_FAILED_MESSAGE};
use fortnightly::cli::render::{render_list, render_question};
use fortnightly::cli::session::{run_session, DeletePrompt, SessionOptions};
use fortnightly::cli::{
    AskCommand, Cli, Command, ConfigCommand, CurrentCommand, DeleteCommand, ListCommand,
    SessionCommand, ShowCommand, VoteCommand,
};
use fortnightly::submit::SUBMIT_FAILED_MESSAGE;
use fortnightly::{
    current_bucket_id, init_logging, Config, Question, QuestionBoard, QuestionForm, QuestionId,
    QuestionStore, SqliteStore, Submitter, VoteOutcome,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Current(cmd) => handle_current(&cmd),
        Command::Ask(cmd) => handle_ask(&config, cmd).await,
        Command::List(cmd) => handle_list(&config, &cmd).await,
        Command::Show(cmd) => handle_show(&config, &cmd).await,
        Command::Vote(cmd) => handle_vote(&config, &cmd).await,
        Command::Delete(cmd) => handle_delete(&config, &cmd).await,
        Command::Session(cmd) => handle_session(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn QuestionStore>> {
    let path = config.database_path();
    debug!(path = %path.display(), "Opening question store");
    let store = SqliteStore::open(&path, config.busy_timeout())
        .with_context(|| format!("failed to open question store at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Load a question and a board showing its fortnight.
async fn board_for(
    store: Arc<dyn QuestionStore>,
    id: &QuestionId,
) -> anyhow::Result<(QuestionBoard, Question)> {
    let Some(question) = store.get(id).await? else {
        bail!("no question with id {id}");
    };
    let board = QuestionBoard::new(store, question.fortnight_id);
    board.refresh().await.context(LOAD_FAILED_MESSAGE)?;
    Ok((board, question))
}

fn handle_current(cmd: &CurrentCommand) -> anyhow::Result<()> {
    let current = current_bucket_id();
    if cmd.json {
        let value = serde_json::json!({
            "fortnight_id": current,
            "start": current.start(),
            "end": current.end(),
            "range": current.format_range(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Current fortnight: {current} ({})", current.format_range());
    }
    Ok(())
}

async fn handle_ask(config: &Config, cmd: AskCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let mut form = QuestionForm::new(cmd.tag.unwrap_or_else(|| config.default_tag()));
    form.question_text = cmd.text;
    form.context = cmd.context.unwrap_or_default();

    let question = match Submitter::new(store).submit(&mut form).await {
        Ok(question) => question,
        Err(e) if e.is_validation() => return Err(e).context("cannot submit question"),
        Err(e) => return Err(e).context(SUBMIT_FAILED_MESSAGE),
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&question)?);
    } else {
        println!(
            "Question submitted for {} (id {}).",
            question.fortnight_id.format_range(),
            question.id
        );
    }
    Ok(())
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let board = QuestionBoard::new(store, cmd.fortnight.unwrap_or_else(current_bucket_id));
    let refreshed = board.refresh().await;

    println!("{}", render_list(&board.view(), cmd.format)?);
    refreshed.context(LOAD_FAILED_MESSAGE)?;
    Ok(())
}

async fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = QuestionId::from(cmd.id.as_str());
    let Some(question) = store.get(&id).await? else {
        bail!("no question with id {id}");
    };
    println!("{}", render_question(&question, cmd.json)?);
    Ok(())
}

async fn handle_vote(config: &Config, cmd: &VoteCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = QuestionId::from(cmd.id.as_str());
    let (board, question) = board_for(store, &id).await?;

    match board.vote(&id).await {
        VoteOutcome::Counted { votes } => {
            println!("Voted. \"{}\" now has {votes}.", question.question_text);
            Ok(())
        }
        VoteOutcome::NotListed => bail!("question {id} is no longer listed"),
        VoteOutcome::AlreadyInFlight | VoteOutcome::Failed => {
            bail!("vote for question {id} was not recorded")
        }
    }
}

async fn handle_delete(config: &Config, cmd: &DeleteCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = QuestionId::from(cmd.id.as_str());
    let (board, _) = board_for(store, &id).await?;

    let ask = !cmd.yes && config.board.confirm_deletes;
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    let mut prompt = DeletePrompt::new(&mut lines, &mut stdout, ask);

    match board.delete(&id, &mut prompt).await.context(DELETE_FAILED_MESSAGE)? {
        DeleteOutcome::Deleted => println!("Question deleted."),
        DeleteOutcome::Cancelled => println!("Delete cancelled."),
        DeleteOutcome::Missing => println!("That question was already deleted."),
        DeleteOutcome::NotListed => bail!("question {id} is no longer listed"),
        DeleteOutcome::AlreadyInFlight => bail!("delete of question {id} already in progress"),
    }
    Ok(())
}

async fn handle_session(config: &Config, cmd: &SessionCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let options = SessionOptions {
        fortnight: cmd.fortnight.unwrap_or_else(current_bucket_id),
        default_tag: config.default_tag(),
        confirm_deletes: config.board.confirm_deletes,
    };
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    run_session(store, options, input, &mut std::io::stdout()).await?;
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Busy timeout (ms):  {}", config.storage.busy_timeout_ms);
                println!();
                println!("[Board]");
                println!("  Default tag:        {}", config.default_tag());
                println!("  Confirm deletes:    {}", config.board.confirm_deletes);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
