//! Unit-of-Work context manager
//!
//! Bridges a persistence engine's transaction API to the execution-scoped
//! store: `run` opens a transaction and makes its handle ambient for the
//! whole unit of work; `current` hands any collaborator "the right handle"
//! whether or not a transaction is active. Repositories call `current`
//! immediately before every read/write and never begin, commit or roll back
//! themselves.

use std::future::Future;

use async_trait::async_trait;

use super::scope;

/// Well-known scope key under which the ambient transaction handle lives.
pub const TX_HANDLE: &str = "db.current_handle";

/// Boundary to the persistence engine.
///
/// `commit` and `rollback` consume a handle produced by `begin`; calling
/// either on a handle whose transaction already finished is a no-op, so
/// teardown is idempotent by construction.
#[async_trait]
pub trait TxEngine: Send + Sync + 'static {
    /// Opaque ambient handle: one live transaction, or the engine's
    /// non-transactional default. Clones all point at the same resource.
    type Handle: Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn begin(&self) -> Result<Self::Handle, Self::Error>;
    async fn commit(&self, handle: Self::Handle) -> Result<(), Self::Error>;
    async fn rollback(&self, handle: Self::Handle) -> Result<(), Self::Error>;

    /// Ad-hoc non-transactional handle, for callers outside any unit of
    /// work. Must not block and must not fail.
    fn default_handle(&self) -> Self::Handle;
}

/// The coordination component: owns the engine, decides per call chain
/// whether the ambient handle is a shared transaction or a default one.
#[derive(Clone)]
pub struct UnitOfWork<Eng: TxEngine> {
    engine: Eng,
}

impl<Eng: TxEngine> UnitOfWork<Eng> {
    pub fn new(engine: Eng) -> Self {
        Self { engine }
    }

    #[allow(dead_code)] // tests assert committed state through the engine
    pub fn engine(&self) -> &Eng {
        &self.engine
    }

    /// The ambient handle for the calling execution: the enclosing unit of
    /// work's transaction when one is open, otherwise a default handle.
    ///
    /// Never blocks, never fails; no active scope is a normal outcome.
    pub fn current(&self) -> Eng::Handle {
        scope::get::<Eng::Handle>(TX_HANDLE)
            .map(|handle| handle.as_ref().clone())
            .unwrap_or_else(|| self.engine.default_handle())
    }

    /// Run `work` as one atomic unit: open a new transaction, bind its
    /// handle into a fresh execution scope, and drive `work` inside it.
    ///
    /// On `Ok` the transaction commits and the value is returned; on `Err`
    /// every write performed inside the unit is rolled back and the original
    /// error is re-raised unchanged. A rollback failure is logged and never
    /// replaces the original error.
    ///
    /// A nested `run` inside an open unit of work starts an independent
    /// transaction whose scope shadows the outer handle for its extent; the
    /// two commit or roll back separately.
    pub async fn run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<Eng::Error>,
    {
        let handle = self.engine.begin().await?;

        let result = scope::run_scoped(scope::single(TX_HANDLE, handle.clone()), work).await;

        match result {
            Ok(value) => {
                self.engine.commit(handle).await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = self.engine.rollback(handle).await {
                    eprintln!("Transaction rollback failed: {}", rollback_error);
                }
                Err(error)
            }
        }
    }
}
