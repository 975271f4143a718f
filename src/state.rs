use crate::api::ResponseSource;
use crate::cache::{Snapshot, SnapshotCache};
use crate::config::DashboardConfig;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Everything the request handlers and the poller share.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn ResponseSource>,
    pub cache: Arc<SnapshotCache>,
    /// Latest snapshot; replaced wholesale on every refresh.
    pub snapshot: Arc<RwLock<Snapshot>>,
    /// When the last manual refresh ran, for throttling.
    pub last_manual_refresh: Arc<Mutex<Option<Instant>>>,
    pub dashboard: Arc<DashboardConfig>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn ResponseSource>,
        cache: Arc<SnapshotCache>,
        dashboard: Arc<DashboardConfig>,
        initial: Snapshot,
    ) -> Self {
        Self {
            source,
            cache,
            snapshot: Arc::new(RwLock::new(initial)),
            last_manual_refresh: Arc::new(Mutex::new(None)),
            dashboard,
        }
    }
}
