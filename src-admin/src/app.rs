use std::path::PathBuf;
use std::sync::Arc;

use config_engine::Store;
use tokio_util::sync::CancellationToken;

/// State shared by every axum handler.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    store: Store,
    data_dir: PathBuf,
    port: u16,
    /// Cancelled once on shutdown; request tokens are its children.
    shutdown: CancellationToken,
}

impl SharedState {
    pub fn new(store: Store, data_dir: PathBuf, port: u16) -> Self {
        Self {
            inner: Arc::new(SharedStateInner {
                store,
                data_dir,
                port,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn server_port(&self) -> u16 {
        self.inner.port
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Token for one request's storage work. Fires on shutdown too.
    pub fn request_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }
}
