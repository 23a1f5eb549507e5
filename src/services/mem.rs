//! In-memory transactional engine, compiled for tests only.
//!
//! A tiny key-value store with staged-write transactions so the unit-of-work
//! mechanism can be exercised hermetically: a transaction buffers its writes
//! and applies them on commit or discards them on rollback. Every handle
//! operation crosses a real suspension point so concurrent units of work
//! genuinely interleave, and each transaction carries a unique id so tests
//! can assert handle identity.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::uow::TxEngine;

#[derive(Debug)]
pub struct MemError(String);

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem engine error: {}", self.0)
    }
}

impl std::error::Error for MemError {}

type Row = (String, String, Value);

#[derive(Default)]
struct MemDb {
    rows: Mutex<BTreeMap<(String, String), Value>>,
}

impl MemDb {
    fn apply(&self, staged: Vec<Row>) {
        let mut rows = self.rows.lock().unwrap();
        for (table, key, value) in staged {
            rows.insert((table, key), value);
        }
    }
}

struct MemTx {
    id: u64,
    db: Arc<MemDb>,
    // `None` once the transaction committed or rolled back.
    staged: Mutex<Option<Vec<Row>>>,
}

#[derive(Clone)]
pub struct MemHandle {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Tx(Arc<MemTx>),
    Direct(Arc<MemDb>),
}

impl MemHandle {
    /// Identity of the backing transaction; `None` for a default handle.
    pub fn tx_id(&self) -> Option<u64> {
        match &self.inner {
            Inner::Tx(tx) => Some(tx.id),
            Inner::Direct(_) => None,
        }
    }

    pub async fn put(&self, table: &str, key: &str, row: Value) -> Result<(), MemError> {
        tokio::task::yield_now().await;
        match &self.inner {
            Inner::Tx(tx) => {
                let mut staged = tx.staged.lock().unwrap();
                staged
                    .as_mut()
                    .ok_or_else(|| MemError("transaction already finished".into()))?
                    .push((table.to_string(), key.to_string(), row));
                Ok(())
            }
            Inner::Direct(db) => {
                db.rows
                    .lock()
                    .unwrap()
                    .insert((table.to_string(), key.to_string()), row);
                Ok(())
            }
        }
    }

    /// Read-your-writes: inside a transaction the staged rows win over the
    /// base store.
    pub async fn get(&self, table: &str, key: &str) -> Option<Value> {
        tokio::task::yield_now().await;
        match &self.inner {
            Inner::Tx(tx) => {
                let staged = tx.staged.lock().unwrap();
                let from_staged = staged.as_ref().and_then(|rows| {
                    rows.iter()
                        .rev()
                        .find(|(t, k, _)| t == table && k == key)
                        .map(|(_, _, v)| v.clone())
                });
                from_staged.or_else(|| {
                    tx.db
                        .rows
                        .lock()
                        .unwrap()
                        .get(&(table.to_string(), key.to_string()))
                        .cloned()
                })
            }
            Inner::Direct(db) => db
                .rows
                .lock()
                .unwrap()
                .get(&(table.to_string(), key.to_string()))
                .cloned(),
        }
    }
}

pub struct MemEngine {
    db: Arc<MemDb>,
    next_tx_id: AtomicU64,
}

impl MemEngine {
    pub fn new() -> Self {
        Self {
            db: Arc::new(MemDb::default()),
            next_tx_id: AtomicU64::new(1),
        }
    }

    /// Committed rows in `table` (staged writes are invisible here).
    pub fn row_count(&self, table: &str) -> usize {
        self.rows_in(table, |_| true)
    }

    pub fn rows_in(&self, table: &str, predicate: impl Fn(&Value) -> bool) -> usize {
        self.db
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((t, _), row)| t == table && predicate(row))
            .count()
    }

    pub fn row(&self, table: &str, key: &str) -> Option<Value> {
        self.db
            .rows
            .lock()
            .unwrap()
            .get(&(table.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TxEngine for MemEngine {
    type Handle = MemHandle;
    type Error = MemError;

    async fn begin(&self) -> Result<MemHandle, MemError> {
        tokio::task::yield_now().await;
        Ok(MemHandle {
            inner: Inner::Tx(Arc::new(MemTx {
                id: self.next_tx_id.fetch_add(1, Ordering::Relaxed),
                db: self.db.clone(),
                staged: Mutex::new(Some(Vec::new())),
            })),
        })
    }

    async fn commit(&self, handle: MemHandle) -> Result<(), MemError> {
        tokio::task::yield_now().await;
        if let Inner::Tx(tx) = handle.inner {
            // `take` makes teardown exactly-once; a second commit or
            // rollback observes the spent state and does nothing.
            if let Some(staged) = tx.staged.lock().unwrap().take() {
                tx.db.apply(staged);
            }
        }
        Ok(())
    }

    async fn rollback(&self, handle: MemHandle) -> Result<(), MemError> {
        tokio::task::yield_now().await;
        if let Inner::Tx(tx) = handle.inner {
            tx.staged.lock().unwrap().take();
        }
        Ok(())
    }

    fn default_handle(&self) -> MemHandle {
        MemHandle {
            inner: Inner::Direct(self.db.clone()),
        }
    }
}
