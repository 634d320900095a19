//! Request-scoped "current" session id
//!
//! Middleware enters a [`scope`] for the duration of a request; manager calls
//! made without an explicit id inside it pick the id up from here. The slot is
//! task-local, so concurrent requests never observe each other's id.

use phpsess_core::SessionId;
use std::future::Future;

tokio::task_local! {
    static CURRENT_SESSION_ID: Option<SessionId>;
}

/// Run `fut` with `session_id` as the current session id.
///
/// `None` is allowed and means the request carried no usable id. The id is
/// gone again once `fut` completes; spawned tasks do not inherit it.
pub async fn scope<F>(session_id: Option<SessionId>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_SESSION_ID.scope(session_id, fut).await
}

/// The id set by the innermost enclosing [`scope`], if any
pub fn current_session_id() -> Option<SessionId> {
    CURRENT_SESSION_ID
        .try_with(|id| id.clone())
        .ok()
        .flatten()
}
