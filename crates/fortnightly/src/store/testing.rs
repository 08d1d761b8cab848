//! A controllable store for exercising failure and in-flight paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{QuestionStore, SqliteStore};
use crate::error::{Error, Result};
use crate::fortnight::FortnightId;
use crate::question::{NewQuestion, Question, QuestionId};

/// Wraps an in-memory [`SqliteStore`], counting calls, injecting failures
/// and optionally holding calls open until the test releases them.
#[derive(Debug)]
pub(crate) struct TestStore {
    pub(crate) inner: SqliteStore,
    pub(crate) fail_inserts: AtomicBool,
    pub(crate) fail_lists: AtomicBool,
    pub(crate) fail_votes: AtomicBool,
    pub(crate) fail_deletes: AtomicBool,
    hold_votes: AtomicBool,
    hold_deletes: AtomicBool,
    hold_lists: AtomicBool,
    vote_gate: Semaphore,
    delete_gate: Semaphore,
    list_gates: Mutex<Vec<Arc<Semaphore>>>,
    insert_calls: AtomicUsize,
    list_calls: AtomicUsize,
    vote_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl TestStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteStore::open_in_memory().expect("failed to create test store"),
            fail_inserts: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            fail_votes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            hold_votes: AtomicBool::new(false),
            hold_deletes: AtomicBool::new(false),
            hold_lists: AtomicBool::new(false),
            vote_gate: Semaphore::new(0),
            delete_gate: Semaphore::new(0),
            list_gates: Mutex::new(Vec::new()),
            insert_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            vote_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    /// Make every subsequent `set_votes` wait for [`TestStore::release_votes`].
    pub(crate) fn hold_votes(&self) {
        self.hold_votes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_votes(&self, permits: usize) {
        self.vote_gate.add_permits(permits);
    }

    /// Make every subsequent `delete` wait for [`TestStore::release_deletes`].
    pub(crate) fn hold_deletes(&self) {
        self.hold_deletes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_deletes(&self, permits: usize) {
        self.delete_gate.add_permits(permits);
    }

    /// Make every subsequent `list` read its rows, then wait until its gate
    /// is released with [`TestStore::release_list`].
    pub(crate) fn hold_lists(&self) {
        self.hold_lists.store(true, Ordering::SeqCst);
    }

    /// Release the `index`-th held list call (0-based, in call order).
    pub(crate) fn release_list(&self, index: usize) {
        let gates = self.list_gates.lock().unwrap();
        gates[index].add_permits(1);
    }

    pub(crate) fn held_lists(&self) -> usize {
        self.list_gates.lock().unwrap().len()
    }

    pub(crate) fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vote_calls(&self) -> usize {
        self.vote_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::persistence(format!("{what} rejected by test store")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QuestionStore for TestStore {
    async fn insert(&self, question: NewQuestion) -> Result<Question> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_inserts, "insert")?;
        self.inner.insert(question).await
    }

    async fn list(&self, fortnight: FortnightId) -> Result<Vec<Question>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let result = match Self::check(&self.fail_lists, "list") {
            Ok(()) => self.inner.list(fortnight).await,
            Err(e) => Err(e),
        };
        if self.hold_lists.load(Ordering::SeqCst) {
            let gate = Arc::new(Semaphore::new(0));
            self.list_gates.lock().unwrap().push(gate.clone());
            let _permit = gate.acquire().await.expect("gate closed");
        }
        result
    }

    async fn get(&self, id: &QuestionId) -> Result<Option<Question>> {
        self.inner.get(id).await
    }

    async fn set_votes(&self, id: &QuestionId, votes: u32) -> Result<u64> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_votes.load(Ordering::SeqCst) {
            let _permit = self.vote_gate.acquire().await.expect("gate closed");
        }
        Self::check(&self.fail_votes, "vote")?;
        self.inner.set_votes(id, votes).await
    }

    async fn delete(&self, id: &QuestionId) -> Result<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_deletes.load(Ordering::SeqCst) {
            let _permit = self.delete_gate.acquire().await.expect("gate closed");
        }
        Self::check(&self.fail_deletes, "delete")?;
        self.inner.delete(id).await
    }
}
