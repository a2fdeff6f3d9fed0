use std::sync::Arc;

use tracing::error;

use murmur_db::Database;
use murmur_gateway::Dispatcher;
use murmur_media::{MediaPolicy, Storage};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub media_policy: MediaPolicy,
    pub dispatcher: Dispatcher,
    pub session_secret: String,
}

/// Run a blocking DB closure off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("background task failed"))
        })?
        .map_err(ApiError::Internal)
}
