//! Transaction boundary adapter
//!
//! The two integration shapes for opening a unit of work, with identical
//! atomicity semantics. `run` is the explicit form for call sites that
//! construct their own continuation; `around_handler` is the cross-cutting
//! form, applied as an axum route layer around logic it does not author.
//! Both delegate to `UnitOfWork::run` and add no transaction logic of their
//! own.

use std::future::Future;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::uow::{TxEngine, UnitOfWork};
use crate::AppState;

// Responses produced inside a transaction are buffered in full before
// commit; plenty for the JSON bodies this service returns.
const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// Explicit transaction boundary: run `work` as one atomic unit of work.
pub async fn run<Eng, T, E, F>(uow: &UnitOfWork<Eng>, work: F) -> Result<T, E>
where
    Eng: TxEngine,
    F: Future<Output = Result<T, E>>,
    E: From<Eng::Error>,
{
    uow.run(work).await
}

enum Abort<E> {
    /// Downstream produced a failure response; returned unchanged after
    /// rollback.
    Failed(Box<Response>),
    Body(axum::Error),
    Tx(E),
}

impl<E> From<E> for Abort<E> {
    fn from(e: E) -> Self {
        Abort::Tx(e)
    }
}

/// Cross-cutting transaction boundary: wrap the rest of request processing
/// in one unit of work.
///
/// The downstream response body is collected *inside* the transaction scope,
/// so a failure surfacing anywhere later in request handling, including a
/// lazily-produced body, still rolls the transaction back. A non-success
/// status counts as the unit of work failing: the transaction is rolled back
/// and the handler's response is returned unchanged.
pub async fn around_handler(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    commit_on_success(&state.uow, next.run(req)).await
}

/// Engine-generic core of `around_handler`: drive `respond` inside a unit
/// of work, commit on a fully-buffered success response, roll back on
/// anything else.
async fn commit_on_success<Eng, F>(uow: &UnitOfWork<Eng>, respond: F) -> Response
where
    Eng: TxEngine,
    F: Future<Output = Response>,
{
    let outcome: Result<Response, Abort<Eng::Error>> = uow
        .run(async {
            let response = respond.await;
            let (parts, body) = response.into_parts();
            let bytes = to_bytes(body, MAX_BUFFERED_BODY).await.map_err(Abort::Body)?;
            let response = Response::from_parts(parts, Body::from(bytes));

            if response.status().is_success() {
                Ok(response)
            } else {
                Err(Abort::Failed(Box::new(response)))
            }
        })
        .await;

    match outcome {
        Ok(response) => response,
        Err(Abort::Failed(response)) => *response,
        Err(Abort::Body(e)) => {
            eprintln!("Transactional handler body error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(Abort::Tx(e)) => {
            eprintln!("Transaction error around handler: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
