//! Execution-scoped storage
//!
//! A key-value container bound to one logical unit of async execution. Values
//! placed in a scope are visible to every nested call and every resumption
//! after an await within that scope, and invisible to concurrent executions
//! interleaved on the same runtime workers. Built on `tokio::task_local!`,
//! so nothing has to be threaded through function signatures.
//!
//! A scope does NOT cross `tokio::spawn` - a spawned task is a new logical
//! execution and starts with no scope.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Backing store for one scope. Keys are fixed well-known strings owned by
/// the module that defines them (see `services::uow::TX_HANDLE`).
pub type Entries = HashMap<&'static str, Arc<dyn Any + Send + Sync>>;

tokio::task_local! {
    static SCOPE: Entries;
}

/// Build a one-entry store.
pub fn single<T: Send + Sync + 'static>(key: &'static str, value: T) -> Entries {
    let mut entries = Entries::new();
    entries.insert(key, Arc::new(value));
    entries
}

/// Run `work` with `entries` as the current scope's backing store for its
/// full dynamic extent, returning `work`'s output.
///
/// Re-entrant: a scope opened inside an existing scope shadows the outer one
/// until `work` completes, after which the outer scope is visible again. The
/// caller's own scope is never mutated.
pub async fn run_scoped<F>(entries: Entries, work: F) -> F::Output
where
    F: Future,
{
    SCOPE.scope(entries, work).await
}

/// Nearest enclosing scope's value for `key`, or `None` when no scope is
/// active, the key is absent, or the stored type is not `T`.
///
/// Never blocks and never fails; "no scope" is a normal outcome.
pub fn get<T: Send + Sync + 'static>(key: &'static str) -> Option<Arc<T>> {
    SCOPE
        .try_with(|entries| entries.get(key).cloned())
        .ok()
        .flatten()
        .and_then(|value| value.downcast::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test.value";

    #[tokio::test]
    async fn absent_outside_any_scope() {
        assert!(get::<String>(KEY).is_none());
    }

    #[tokio::test]
    async fn visible_across_awaits_and_nested_calls() {
        async fn leaf() -> Option<Arc<String>> {
            tokio::task::yield_now().await;
            get::<String>(KEY)
        }

        async fn middle() -> Option<Arc<String>> {
            tokio::task::yield_now().await;
            leaf().await
        }

        let seen = run_scoped(single(KEY, "ambient".to_string()), middle()).await;
        assert_eq!(seen.as_deref().map(String::as_str), Some("ambient"));
    }

    #[tokio::test]
    async fn wrong_type_reads_as_absent() {
        run_scoped(single(KEY, 7_i64), async {
            assert!(get::<String>(KEY).is_none());
            assert_eq!(get::<i64>(KEY).as_deref(), Some(&7));
        })
        .await;
    }

    #[tokio::test]
    async fn nested_scope_shadows_then_restores() {
        run_scoped(single(KEY, "outer".to_string()), async {
            assert_eq!(get::<String>(KEY).unwrap().as_str(), "outer");

            run_scoped(single(KEY, "inner".to_string()), async {
                assert_eq!(get::<String>(KEY).unwrap().as_str(), "inner");
            })
            .await;

            assert_eq!(get::<String>(KEY).unwrap().as_str(), "outer");
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_siblings_are_isolated() {
        // Two logical executions interleave on the same worker; each must see
        // only its own value at every point between suspensions.
        async fn unit(tag: &'static str, rounds: usize) {
            for _ in 0..rounds {
                tokio::task::yield_now().await;
                assert_eq!(get::<String>(KEY).unwrap().as_str(), tag);
            }
        }

        tokio::join!(
            run_scoped(single(KEY, "a".to_string()), unit("a", 16)),
            run_scoped(single(KEY, "b".to_string()), unit("b", 16)),
        );
    }

    #[tokio::test]
    async fn failure_propagates_and_scope_unwinds() {
        let result: Result<(), &str> =
            run_scoped(single(KEY, 1_u32), async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
        assert!(get::<u32>(KEY).is_none());
    }
}
