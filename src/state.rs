use std::path::PathBuf;
use std::sync::Arc;

use actix_web::web;

use crate::errors::ApiResult;
use crate::helpers::media::MediaStorage;
use crate::helpers::tokens::SessionManager;
use crate::store::Store;

/// Handles shared by every worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub media: Arc<dyn MediaStorage>,
    pub sessions: Arc<SessionManager>,
    pub upload_dir: PathBuf,
}

impl AppState {
    /// Runs a store job on the blocking pool. A check-then-act sequence
    /// belongs in a single job.
    pub async fn blocking<F, T>(&self, job: F) -> ApiResult<T>
    where
        F: FnOnce(&dyn Store, &SessionManager) -> ApiResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let sessions = self.sessions.clone();

        web::block(move || job(store.as_ref(), sessions.as_ref())).await?
    }
}
