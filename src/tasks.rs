//! Snapshot refresh: the startup fetch, the background poll loop, and the
//! throttled manual refresh behind the admin endpoint.

use crate::cache::Snapshot;
use crate::error::Result;
use crate::observability::counters;
use crate::state::AppState;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Outcome of a manual refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { responses: usize },
    Throttled,
}

/// Fetches the survey, persists the snapshot, and swaps it into shared state.
/// Returns the number of responses fetched.
pub async fn refresh_once(state: &AppState) -> Result<usize> {
    let responses = match state.source.fetch_responses().await {
        Ok(responses) => responses,
        Err(e) => {
            counters::fetch_error();
            return Err(e);
        }
    };
    let snapshot = Snapshot::new(responses);
    state.cache.store(&snapshot)?;
    let count = snapshot.responses.len();
    counters::fetch_success(count as u64);
    *state.snapshot.write().await = snapshot;
    Ok(count)
}

/// Refresh triggered from the dashboard, throttled so a reload storm cannot
/// hammer the survey backend.
pub async fn manual_refresh(state: &AppState) -> Result<RefreshOutcome> {
    let throttle = Duration::from_secs(state.dashboard.refresh_throttle_secs);
    let mut last = state.last_manual_refresh.lock().await;
    if let Some(at) = *last {
        if at.elapsed() < throttle {
            counters::refresh_throttled();
            return Ok(RefreshOutcome::Throttled);
        }
    }
    let responses = refresh_once(state).await?;
    *last = Some(Instant::now());
    Ok(RefreshOutcome::Refreshed { responses })
}

/// Spawns the background poll loop. A failed poll keeps the previous
/// snapshot and is retried on the next tick.
pub fn spawn_poller(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.dashboard.refresh_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; the startup fetch already ran.
        interval.tick().await;
        loop {
            interval.tick().await;
            match refresh_once(&state).await {
                Ok(count) => info!("Background refresh stored {} responses", count),
                Err(e) => warn!("Background refresh failed, keeping stale snapshot: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ResponseSource;
    use crate::cache::SnapshotCache;
    use crate::config::DashboardConfig;
    use crate::error::DashboardError;
    use crate::types::SurveyResponse;
    use serde_json::json;
    use std::sync::Arc;

    struct FixedSource {
        rows: Vec<SurveyResponse>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ResponseSource for FixedSource {
        fn source_name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_responses(&self) -> Result<Vec<SurveyResponse>> {
            if self.fail {
                return Err(DashboardError::Api {
                    message: "backend down".to_string(),
                });
            }
            Ok(self.rows.clone())
        }
    }

    fn test_state(dir: &std::path::Path, fail: bool) -> AppState {
        let raw = json!({"id": "1", "lastpage": 4, "startdate": "2025-05-21 10:00:00"});
        let rows = vec![SurveyResponse::from_raw(&raw, 3).unwrap()];
        AppState::new(
            Arc::new(FixedSource { rows, fail }),
            Arc::new(SnapshotCache::new(dir)),
            Arc::new(DashboardConfig::default()),
            Snapshot::empty(),
        )
    }

    #[tokio::test]
    async fn refresh_updates_state_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);

        let count = refresh_once(&state).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(state.snapshot.read().await.responses.len(), 1);
        assert_eq!(state.cache.load().unwrap().responses.len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), true);

        assert!(refresh_once(&state).await.is_err());
        assert!(state.snapshot.read().await.responses.is_empty());
        assert!(!state.cache.exists());
    }

    #[tokio::test]
    async fn manual_refresh_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);

        let first = manual_refresh(&state).await.unwrap();
        assert_eq!(first, RefreshOutcome::Refreshed { responses: 1 });

        let second = manual_refresh(&state).await.unwrap();
        assert_eq!(second, RefreshOutcome::Throttled);
    }

    #[tokio::test]
    async fn zero_throttle_allows_back_to_back_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path(), false);
        let mut config = DashboardConfig::default();
        config.refresh_throttle_secs = 0;
        state.dashboard = Arc::new(config);

        manual_refresh(&state).await.unwrap();
        let again = manual_refresh(&state).await.unwrap();
        assert_eq!(again, RefreshOutcome::Refreshed { responses: 1 });
    }
}
