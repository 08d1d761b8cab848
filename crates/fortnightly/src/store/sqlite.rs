use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::migrations;
use super::QuestionStore;
use crate::error::{Error, Result};
use crate::fortnight::FortnightId;
use crate::question::{NewQuestion, Question, QuestionId, Tag};

/// Shared handle to the underlying connection.
pub type DbConnection = Arc<Mutex<Connection>>;

const SELECT_COLUMNS: &str = r"
SELECT id, created_at, question_text, context, tag, fortnight_id, votes, is_answered, answer
FROM questions
";

/// `SQLite`-backed question store.
///
/// Cloning is cheap; clones share one connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: DbConnection,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// then brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store, mostly useful for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the connection on the blocking thread pool.
    ///
    /// `SQLite` calls block, for as long as the busy timeout when another
    /// connection holds the lock, so they never run on an executor thread.
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            op(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("store task failed: {e}")))?
    }

    fn row_to_question(row: &rusqlite::Row) -> rusqlite::Result<Question> {
        let created_at_str: String = row.get(1)?;
        let tag_str: String = row.get(4)?;
        let fortnight_str: String = row.get(5)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let tag: Tag = tag_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.to_string().into())
        })?;
        let fortnight_id: FortnightId = fortnight_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.to_string().into())
        })?;

        Ok(Question {
            id: QuestionId::from(row.get::<_, String>(0)?),
            created_at,
            question_text: row.get(2)?,
            context: row.get(3)?,
            tag,
            fortnight_id,
            votes: row.get(6)?,
            is_answered: row.get(7)?,
            answer: row.get(8)?,
        })
    }
}

fn lock(conn: &DbConnection) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| Error::persistence(format!("connection lock poisoned: {e}")))
}

fn affected_rows(affected: usize) -> u64 {
    u64::try_from(affected).unwrap_or(u64::MAX)
}

#[async_trait]
impl QuestionStore for SqliteStore {
    async fn insert(&self, question: NewQuestion) -> Result<Question> {
        self.with_conn(move |conn| {
            let id = QuestionId::generate();
            let created_at = Utc::now().trunc_subsecs(6);

            conn.execute(
                r"
                INSERT INTO questions (id, created_at, question_text, context, tag, fortnight_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
                params![
                    id.as_str(),
                    created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                    question.question_text,
                    question.context,
                    question.tag.label(),
                    question.fortnight_id.to_string(),
                ],
            )?;

            debug!(%id, fortnight = %question.fortnight_id, "Inserted question");
            Ok(Question {
                id,
                created_at,
                question_text: question.question_text,
                context: question.context,
                tag: question.tag,
                fortnight_id: question.fortnight_id,
                votes: 0,
                is_answered: false,
                answer: None,
            })
        })
        .await
    }

    async fn list(&self, fortnight: FortnightId) -> Result<Vec<Question>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE fortnight_id = ?1 \
                 ORDER BY votes DESC, created_at DESC, rowid DESC"
            ))?;

            let questions = stmt
                .query_map([fortnight.to_string()], Self::row_to_question)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            debug!(%fortnight, count = questions.len(), "Listed questions");
            Ok(questions)
        })
        .await
    }

    async fn get(&self, id: &QuestionId) -> Result<Option<Question>> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let question = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    [id.as_str()],
                    Self::row_to_question,
                )
                .optional()?;
            Ok(question)
        })
        .await
    }

    async fn set_votes(&self, id: &QuestionId, votes: u32) -> Result<u64> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let affected = conn.execute(
                "UPDATE questions SET votes = ?1 WHERE id = ?2",
                params![votes, id.as_str()],
            )?;
            debug!(%id, votes, affected, "Updated vote count");
            Ok(affected_rows(affected))
        })
        .await
    }

    async fn delete(&self, id: &QuestionId) -> Result<u64> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM questions WHERE id = ?1", [id.as_str()])?;
            debug!(%id, affected, "Deleted question");
            Ok(affected_rows(affected))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn new_question(text: &str, fortnight: FortnightId) -> NewQuestion {
        NewQuestion::new(text, None, Tag::General, fortnight).unwrap()
    }

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = create_test_store();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
    }

    #[tokio::test]
    async fn test_insert_assigns_defaults() {
        let store = create_test_store();
        let q = store
            .insert(new_question("Hello?", FortnightId::reference()))
            .await
            .unwrap();

        assert_eq!(q.votes, 0);
        assert!(!q.is_answered);
        assert!(q.answer.is_none());

        let fetched = store.get(&q.id).await.unwrap().unwrap();
        assert_eq!(fetched.question_text, "Hello?");
        assert_eq!(fetched.fortnight_id, FortnightId::reference());
        assert_eq!(fetched.created_at, q.created_at);
    }

    #[tokio::test]
    async fn test_insert_roundtrips_context_and_tag() {
        let store = create_test_store();
        let new = NewQuestion::new(
            "What's next?",
            Some("Roadmap"),
            Tag::FellowsProgram,
            FortnightId::reference(),
        )
        .unwrap();
        let q = store.insert(new).await.unwrap();

        let fetched = store.get(&q.id).await.unwrap().unwrap();
        assert_eq!(fetched.context.as_deref(), Some("Roadmap"));
        assert_eq!(fetched.tag, Tag::FellowsProgram);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = create_test_store();
        let result = store.get(&QuestionId::from("missing")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_fortnight() {
        let store = create_test_store();
        let here = FortnightId::reference();
        let there = here.next();

        store.insert(new_question("One", here)).await.unwrap();
        store.insert(new_question("Two", here)).await.unwrap();
        store.insert(new_question("Elsewhere", there)).await.unwrap();

        assert_eq!(store.list(here).await.unwrap().len(), 2);
        assert_eq!(store.list(there).await.unwrap().len(), 1);
        assert!(store.list(here.previous()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_by_votes_then_recency() {
        let store = create_test_store();
        let fortnight = FortnightId::reference();

        let a = store.insert(new_question("A", fortnight)).await.unwrap();
        let b = store.insert(new_question("B", fortnight)).await.unwrap();
        let c = store.insert(new_question("C", fortnight)).await.unwrap();

        store.set_votes(&a.id, 5).await.unwrap();
        store.set_votes(&b.id, 5).await.unwrap();
        store.set_votes(&c.id, 3).await.unwrap();

        let listed = store.list(fortnight).await.unwrap();
        let texts: Vec<&str> = listed.iter().map(|q| q.question_text.as_str()).collect();
        assert_eq!(texts, vec!["B", "A", "C"]);
    }

    #[tokio::test]
    async fn test_set_votes_absolute() {
        let store = create_test_store();
        let q = store
            .insert(new_question("Vote me", FortnightId::reference()))
            .await
            .unwrap();

        assert_eq!(store.set_votes(&q.id, 7).await.unwrap(), 1);
        assert_eq!(store.get(&q.id).await.unwrap().unwrap().votes, 7);
    }

    #[tokio::test]
    async fn test_set_votes_missing_row() {
        let store = create_test_store();
        let affected = store
            .set_votes(&QuestionId::from("missing"), 1)
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = create_test_store();
        let q = store
            .insert(new_question("To delete", FortnightId::reference()))
            .await
            .unwrap();

        assert_eq!(store.delete(&q.id).await.unwrap(), 1);
        assert!(store.get(&q.id).await.unwrap().is_none());
        assert_eq!(store.delete(&q.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_blank_text() {
        let store = create_test_store();
        let mut new = new_question("placeholder", FortnightId::reference());
        new.question_text = "   ".to_string();

        let err = store.insert(new).await.unwrap_err();
        assert!(err.is_persistence());
    }

    #[tokio::test]
    async fn test_unreadable_row_is_an_error() {
        let store = create_test_store();
        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "INSERT INTO questions (id, created_at, question_text, tag, fortnight_id)
                 VALUES ('x', 'yesterday', 'Q', 'General', '2025-04-07')",
                [],
            )
            .unwrap();
        }
        let err = store.list(FortnightId::reference()).await.unwrap_err();
        assert!(err.is_persistence());
    }

    #[tokio::test]
    async fn test_unicode_content() {
        let store = create_test_store();
        let q = store
            .insert(new_question("Hello 世界 🌍", FortnightId::reference()))
            .await
            .unwrap();
        let fetched = store.get(&q.id).await.unwrap().unwrap();
        assert_eq!(fetched.question_text, "Hello 世界 🌍");
    }

    #[tokio::test]
    async fn test_open_file_based() {
        let db_path = std::env::temp_dir().join(format!(
            "fortnightly_test_{}.db",
            std::process::id()
        ));

        let store = SqliteStore::open(&db_path, Duration::from_millis(1000)).unwrap();
        store
            .insert(new_question("Persisted", FortnightId::reference()))
            .await
            .unwrap();
        assert_eq!(store.path(), db_path);
        drop(store);

        let reopened = SqliteStore::open(&db_path, Duration::from_millis(1000)).unwrap();
        assert_eq!(
            reopened.list(FortnightId::reference()).await.unwrap().len(),
            1
        );

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn test_locked_database_does_not_block_the_runtime() {
        let db_path = std::env::temp_dir().join(format!(
            "fortnightly_locked_{}.db",
            std::process::id()
        ));
        let busy_timeout = Duration::from_millis(1500);
        let store = SqliteStore::open(&db_path, busy_timeout).unwrap();
        let q = store
            .insert(new_question("Locked out?", FortnightId::reference()))
            .await
            .unwrap();

        let blocker = Connection::open(&db_path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let started = std::time::Instant::now();
        let waited = tokio::time::timeout(Duration::from_millis(50), store.set_votes(&q.id, 1)).await;
        assert!(waited.is_err(), "write should still be waiting on the lock");
        assert!(started.elapsed() < busy_timeout);

        blocker.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(store.set_votes(&q.id, 2).await.unwrap(), 1);
        assert_eq!(store.get(&q.id).await.unwrap().unwrap().votes, 2);

        drop(blocker);
        drop(store);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("fortnightly_nested_{}", std::process::id()));
        let nested_path = root.join("nested/db.sqlite");
        let _ = std::fs::remove_dir_all(&root);

        let store = SqliteStore::open(&nested_path, Duration::from_millis(1000)).unwrap();
        assert!(nested_path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&root);
    }
}
