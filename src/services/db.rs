//! Postgres transaction engine
//!
//! Binds the unit-of-work mechanism to sqlx/Postgres. The ambient handle is
//! either one live transaction, shared by every collaborator in the unit of
//! work, or the pool itself when no transaction is active (each use then
//! checks out its own pooled connection).
//!
//! Domain functions stay on the generic Executor pattern:
//!
//! ```ignore
//! use sqlx::{Executor, Postgres};
//!
//! pub async fn my_query<'e, E>(executor: E, id: i64) -> Result<MyType, sqlx::Error>
//! where
//!     E: Executor<'e, Database = Postgres>,
//! {
//!     sqlx::query_as("SELECT * FROM my_table WHERE id = $1")
//!         .bind(id)
//!         .fetch_one(executor)
//!         .await
//! }
//! ```
//!
//! Callers resolve the ambient handle immediately before each use:
//!
//! ```ignore
//! let handle = uow.current();
//! let mut conn = handle.conn().await?;
//! my_query(conn.executor(), id).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::uow::{TxEngine, UnitOfWork};

pub type PgUnitOfWork = UnitOfWork<PgEngine>;

type PgTx = Transaction<'static, Postgres>;

// `None` once the transaction committed or rolled back; `take` at teardown
// keeps commit-or-rollback exactly-once.
type SharedTx = Arc<Mutex<Option<PgTx>>>;

#[derive(Debug)]
pub enum HandleError {
    /// The handle's transaction already committed or rolled back. Only
    /// reachable by caching a handle past its unit of work, which the
    /// repository contract forbids.
    Spent,
    Pool(sqlx::Error),
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleError::Spent => write!(f, "transaction handle already finished"),
            HandleError::Pool(e) => write!(f, "failed to check out connection: {}", e),
        }
    }
}

impl std::error::Error for HandleError {}

/// Ambient database handle. Clones are cheap and all point at the same
/// underlying transaction or pool.
#[derive(Clone)]
pub struct PgHandle {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Tx(SharedTx),
    Pool(PgPool),
}

impl PgHandle {
    /// Check out a connection guard for one read or write. For a
    /// transactional handle this locks the shared transaction for the
    /// guard's lifetime; for a default handle it pulls a pooled connection.
    pub async fn conn(&self) -> Result<PgConn<'_>, HandleError> {
        match &self.inner {
            Inner::Tx(shared) => {
                let guard = shared.lock().await;
                MutexGuard::try_map(guard, Option::as_mut)
                    .map(PgConn::Tx)
                    .map_err(|_| HandleError::Spent)
            }
            Inner::Pool(pool) => pool
                .acquire()
                .await
                .map(PgConn::Direct)
                .map_err(HandleError::Pool),
        }
    }
}

pub enum PgConn<'h> {
    Tx(MappedMutexGuard<'h, PgTx>),
    Direct(PoolConnection<Postgres>),
}

impl PgConn<'_> {
    /// The connection to run queries on, accepted by any Executor-generic
    /// domain function.
    pub fn executor(&mut self) -> &mut PgConnection {
        match self {
            PgConn::Tx(tx) => &mut ***tx,
            PgConn::Direct(conn) => &mut **conn,
        }
    }
}

#[derive(Clone)]
pub struct PgEngine {
    pool: PgPool,
}

impl PgEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxEngine for PgEngine {
    type Handle = PgHandle;
    type Error = sqlx::Error;

    async fn begin(&self) -> Result<PgHandle, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(PgHandle {
            inner: Inner::Tx(Arc::new(Mutex::new(Some(tx)))),
        })
    }

    async fn commit(&self, handle: PgHandle) -> Result<(), sqlx::Error> {
        match handle.inner {
            Inner::Tx(shared) => {
                let tx = shared.lock().await.take();
                match tx {
                    Some(tx) => tx.commit().await,
                    // Already torn down.
                    None => Ok(()),
                }
            }
            Inner::Pool(_) => Ok(()),
        }
    }

    async fn rollback(&self, handle: PgHandle) -> Result<(), sqlx::Error> {
        match handle.inner {
            Inner::Tx(shared) => {
                let tx = shared.lock().await.take();
                match tx {
                    Some(tx) => tx.rollback().await,
                    None => Ok(()),
                }
            }
            Inner::Pool(_) => Ok(()),
        }
    }

    fn default_handle(&self) -> PgHandle {
        PgHandle {
            inner: Inner::Pool(self.pool.clone()),
        }
    }
}
