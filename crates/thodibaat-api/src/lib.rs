pub mod auth;
pub mod blocked;
pub mod businesses;
pub mod conversations;
pub mod error;
pub mod extractors;
pub mod messages;
pub mod poll;
pub mod routes;
pub mod upload;
pub mod users;
pub mod waitlist;

use std::path::PathBuf;
use std::sync::Arc;

use thodibaat_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
}

/// Run a handler's database work off the async runtime. `Database` is
/// synchronous SQLite behind a mutex, so each handler groups its queries
/// into one closure on the blocking pool instead of stalling a runtime
/// worker.
pub(crate) async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, error::ApiError>
where
    F: FnOnce(AppState) -> Result<T, error::ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {}", e);
            anyhow::anyhow!("blocking task failed")
        })?
}
