//! Background maintenance of server-side state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use bizdesk_infra::Store;

/// Hourly.
pub const SESSION_PURGE_PERIOD: Duration = Duration::from_secs(3600);

/// Delete expired sessions now and then every `period`.
///
/// The first tick fires immediately, so startup leftovers go first.
pub fn spawn_session_purge(store: Arc<dyn Store>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            purge_expired_sessions(store.as_ref()).await;
        }
    })
}

/// One purge cycle; failures are logged and retried on the next tick.
pub async fn purge_expired_sessions(store: &dyn Store) -> u64 {
    match store.purge_expired_sessions(Utc::now()).await {
        Ok(0) => 0,
        Ok(purged) => {
            tracing::info!(purged, "removed expired sessions");
            purged
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to purge expired sessions");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bizdesk_auth::Session;
    use bizdesk_infra::InMemoryStore;

    fn sessions() -> (Session, Session) {
        let now = Utc::now();
        let live = Session::start(None, now, chrono::Duration::hours(1));
        let stale = Session::start(None, now - chrono::Duration::hours(2), chrono::Duration::hours(1));
        (live, stale)
    }

    #[tokio::test]
    async fn one_cycle_reports_removed_sessions() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let (live, stale) = sessions();
        store.save_session(&live).await.unwrap();
        store.save_session(&stale).await.unwrap();

        assert_eq!(purge_expired_sessions(store.as_ref()).await, 1);
        assert_eq!(purge_expired_sessions(store.as_ref()).await, 0);
    }

    #[tokio::test]
    async fn background_task_keeps_purging() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let (live, stale) = sessions();
        store.save_session(&live).await.unwrap();

        let handle = spawn_session_purge(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Saved after the first cycle; a later tick must still catch it.
        store.save_session(&stale).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        assert!(store.load_session(&live.token).await.unwrap().is_some());
        assert!(store.load_session(&stale.token).await.unwrap().is_none());
    }
}
