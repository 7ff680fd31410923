//! Call-scoped context for instrumented invocations.
//!
//! A [`CallScope`] carries the wrapped function's name, its source file
//! base name and the call-site correlation id for the duration of one
//! invocation. Visibility is confined to the logical call chain: async
//! invocations bind a `task_local` scope around the wrapped future,
//! synchronous invocations push onto a thread-local stack behind an RAII
//! guard. Both release on every exit path, including panics and task
//! cancellation.

use std::cell::RefCell;
use std::future::Future;

/// Context bound for the duration of one instrumented call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallScope {
    /// Wrapped function's name (`_function` record field).
    pub function: String,
    /// Base name of the wrapped function's source file (`_script`).
    pub script: String,
    /// Correlation id shared by all records of this call.
    pub call_id: u64,
}

tokio::task_local! {
    static TASK_SCOPE: CallScope;
}

thread_local! {
    static THREAD_SCOPES: RefCell<Vec<CallScope>> = RefCell::new(Vec::new());
}

/// RAII guard returned by [`bind`]; pops the scope when dropped.
#[must_use = "the scope is released as soon as the guard is dropped"]
pub struct ScopeGuard {
    _private: (),
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        THREAD_SCOPES.with(|scopes| {
            scopes.borrow_mut().pop();
        });
    }
}

/// Bind a scope on the current thread until the guard drops.
pub fn bind(scope: CallScope) -> ScopeGuard {
    THREAD_SCOPES.with(|scopes| scopes.borrow_mut().push(scope));
    ScopeGuard { _private: () }
}

/// Run a future with a task-local scope bound around it.
///
/// The binding ends when the future completes or is dropped, so a
/// cancelled invocation releases its context as well.
pub async fn scope<F: Future>(call: CallScope, future: F) -> F::Output {
    TASK_SCOPE.scope(call, future).await
}

/// The innermost scope visible to the current logical call chain:
/// task-local first, then the thread-local stack.
pub fn current() -> Option<CallScope> {
    if let Ok(scope) = TASK_SCOPE.try_with(Clone::clone) {
        return Some(scope);
    }
    THREAD_SCOPES.with(|scopes| scopes.borrow().last().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_named(function: &str) -> CallScope {
        CallScope {
            function: function.to_string(),
            script: "test.rs".to_string(),
            call_id: 7,
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        assert!(current().is_none());
        {
            let _guard = bind(scope_named("outer"));
            assert_eq!(current().map(|s| s.function), Some("outer".to_string()));
            {
                let _inner = bind(scope_named("inner"));
                assert_eq!(current().map(|s| s.function), Some("inner".to_string()));
            }
            assert_eq!(current().map(|s| s.function), Some("outer".to_string()));
        }
        assert!(current().is_none());
    }

    #[test]
    fn guard_releases_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _guard = bind(scope_named("doomed"));
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn task_scope_is_visible_inside_and_gone_after() {
        assert!(current().is_none());
        scope(scope_named("task"), async {
            assert_eq!(current().map(|s| s.function), Some("task".to_string()));
        })
        .await;
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn concurrent_tasks_see_their_own_scope() {
        let a = tokio::spawn(scope(scope_named("a"), async {
            tokio::task::yield_now().await;
            current().map(|s| s.function)
        }));
        let b = tokio::spawn(scope(scope_named("b"), async {
            tokio::task::yield_now().await;
            current().map(|s| s.function)
        }));

        assert_eq!(a.await.unwrap(), Some("a".to_string()));
        assert_eq!(b.await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn cancelled_scope_is_released() {
        let task = tokio::spawn(scope(scope_named("cancelled"), async {
            tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
        }));
        task.abort();
        let _ = task.await;
        assert!(current().is_none());
    }
}
