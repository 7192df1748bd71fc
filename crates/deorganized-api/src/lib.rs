pub mod admin;
pub mod auth;
pub mod comments;
pub mod episodes;
pub mod error;
pub mod events;
pub mod extract;
pub mod feedback;
pub mod follows;
pub mod guest_requests;
pub mod likes;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod routes;
pub mod shows;
pub mod tags;
pub mod users;
mod views;

pub use auth::{AppState, AppStateInner, AuthConfig};
pub use error::{ApiError, ApiResult};
pub use routes::router;

use deorganized_db::Database;

/// Run database work off the async runtime.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
}
